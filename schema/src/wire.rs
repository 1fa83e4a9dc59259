//! Wire serialization for an effective [`Schema`].
//!
//! `int32 count` followed by `count` column records, each
//! `utf(name) | utf(dataset) | utf(columnTypeTag) | int32(version)`.
//! `serializer`, `isDeleted`, and `isSystem` are not written: readers
//! reconstruct the default serializer, assume `isDeleted = false` (an
//! effective schema by definition has no live tombstones), and derive
//! `isSystem` from the name prefix.

use crate::column::{Column, ColumnType, Serializer};
use crate::effective::Schema;
use crate::error::{InvalidUtf8Snafu, TruncatedBufferSnafu, UnknownColumnTypeSnafu};
use crate::Result;
use snafu::{OptionExt, ResultExt};

fn write_utf(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn read_utf<'a>(buf: &mut &'a [u8], field: &'static str) -> Result<String> {
    if buf.len() < 4 {
        return TruncatedBufferSnafu { field }.fail();
    }
    let len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
    *buf = &buf[4..];
    if buf.len() < len {
        return TruncatedBufferSnafu { field }.fail();
    }
    let (bytes, rest) = buf.split_at(len);
    *buf = rest;
    String::from_utf8(bytes.to_vec()).context(InvalidUtf8Snafu { field })
}

/// Serialize the effective columns of `schema` to the wire form.
pub fn to_bytes(schema: &Schema) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(schema.len() as u32).to_be_bytes());
    for column in schema.columns() {
        write_utf(&mut out, column.name());
        write_utf(&mut out, column.dataset());
        write_utf(&mut out, column.column_type().wire_tag());
        out.extend_from_slice(&column.version().to_be_bytes());
    }
    out
}

/// Decode the wire form back into the column list it was built from. Callers
/// that want an effective [`Schema`] pass the result through
/// [`Schema::fold`]; since the wire form only ever holds live (non-deleted)
/// columns, folding it back reproduces the original schema exactly.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Column>> {
    let mut buf = bytes;
    if buf.len() < 4 {
        return TruncatedBufferSnafu { field: "count" }.fail();
    }
    let count = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    buf = &buf[4..];

    let mut columns = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = read_utf(&mut buf, "name")?;
        let dataset = read_utf(&mut buf, "dataset")?;
        let tag = read_utf(&mut buf, "columnTypeTag")?;
        if buf.len() < 4 {
            return TruncatedBufferSnafu { field: "version" }.fail();
        }
        let version = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        buf = &buf[4..];

        let column_type = ColumnType::from_wire_tag(&tag).context(UnknownColumnTypeSnafu { tag })?;
        columns.push(Column::with_derived_system_flag(
            name,
            dataset,
            version,
            column_type,
            Serializer::default(),
            false,
        ));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;

    #[test]
    fn round_trips_effective_schema() {
        let schema = Schema::fold(vec![
            Column::with_derived_system_flag("first", "foo", 1, ColumnType::String, Serializer::default(), false),
            Column::with_derived_system_flag("age", "foo", 2, ColumnType::Int, Serializer::default(), false),
        ]);
        let bytes = to_bytes(&schema);
        let decoded = from_bytes(&bytes).unwrap();
        let refolded = Schema::fold(decoded);
        assert_eq!(schema, refolded);
    }

    #[test]
    fn empty_schema_round_trips() {
        let schema = Schema::empty();
        let bytes = to_bytes(&schema);
        assert_eq!(bytes, 0u32.to_be_bytes().to_vec());
        assert!(from_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn unknown_type_tag_is_a_metadata_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_be_bytes());
        write_utf(&mut bytes, "first");
        write_utf(&mut bytes, "foo");
        write_utf(&mut bytes, "_so_not_a_real_type");
        bytes.extend_from_slice(&1u32.to_be_bytes());

        let err = from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, crate::Error::UnknownColumnType { .. }));
    }
}
