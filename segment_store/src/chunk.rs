//! The chunk model: an immutable, append-only batch of rows plus the
//! overrides it declares against earlier chunks.

use crate::error::{
    ColumnVectorMismatchSnafu, CorruptBufferSnafu, OverrideNotEarlierSnafu,
    OverridePositionsUnsortedSnafu, Result,
};
use data_types::{ChunkId, RowKey};
use std::collections::BTreeMap;

/// Encodes a column's per-row raw value bytes into the single opaque byte
/// buffer persisted for that column. The real columnar value encoder is an
/// external collaborator out of scope for this crate; this is the minimal
/// reference encoding needed to assemble and read chunks end-to-end, kept
/// pluggable the same way [`RowKey`] encoding is.
pub trait ColumnVectorCodec: std::fmt::Debug + Send + Sync {
    /// Concatenate `rows` (one raw value per row, in row order) into a
    /// single buffer.
    fn encode(&self, rows: &[Vec<u8>]) -> Vec<u8>;

    /// Split a buffer produced by [`Self::encode`] back into per-row values.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>>;
}

/// Length-prefixed row values, the default [`ColumnVectorCodec`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LengthPrefixedCodec;

impl ColumnVectorCodec for LengthPrefixedCodec {
    fn encode(&self, rows: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        for row in rows {
            out.extend_from_slice(&(row.len() as u32).to_be_bytes());
            out.extend_from_slice(row);
        }
        out
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut rows = Vec::new();
        let mut buf = bytes;
        while !buf.is_empty() {
            if buf.len() < 4 {
                return CorruptBufferSnafu {
                    what: "column vector",
                    reason: "truncated length prefix",
                }
                .fail();
            }
            let len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
            buf = &buf[4..];
            if buf.len() < len {
                return CorruptBufferSnafu {
                    what: "column vector",
                    reason: "truncated row value",
                }
                .fail();
            }
            rows.push(buf[..len].to_vec());
            buf = &buf[len..];
        }
        Ok(rows)
    }
}

/// A chunk's decoded metadata: its overrides against earlier chunks and its
/// row count. Separated from keys and column vectors so the read path's
/// masking step can load just this.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkMeta {
    /// `priorChunkId -> sorted ascending positions superseded in that chunk`.
    pub overrides: BTreeMap<ChunkId, Vec<u32>>,
    /// Number of rows in the chunk this metadata describes.
    pub num_rows: u32,
}

impl ChunkMeta {
    /// `int32 overridesCount` then that many `{bytes[16] priorChunkId,
    /// int32 posCount, int32[posCount] positions}` entries, then
    /// `int32 numRows`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.overrides.len() as u32).to_be_bytes());
        for (chunk_id, positions) in &self.overrides {
            out.extend_from_slice(&chunk_id.to_bytes());
            out.extend_from_slice(&(positions.len() as u32).to_be_bytes());
            for pos in positions {
                out.extend_from_slice(&pos.to_be_bytes());
            }
        }
        out.extend_from_slice(&self.num_rows.to_be_bytes());
        out
    }

    /// Decode a buffer written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        let overrides_count = take_u32(&mut buf, "chunk metadata")?;
        let mut overrides = BTreeMap::new();
        for _ in 0..overrides_count {
            let chunk_id = take_chunk_id(&mut buf, "chunk metadata")?;
            let pos_count = take_u32(&mut buf, "chunk metadata")?;
            let mut positions = Vec::with_capacity(pos_count as usize);
            for _ in 0..pos_count {
                positions.push(take_u32(&mut buf, "chunk metadata")?);
            }
            overrides.insert(chunk_id, positions);
        }
        let num_rows = take_u32(&mut buf, "chunk metadata")?;
        Ok(Self {
            overrides,
            num_rows,
        })
    }
}

fn take_u32(buf: &mut &[u8], what: &'static str) -> Result<u32> {
    if buf.len() < 4 {
        return CorruptBufferSnafu {
            what,
            reason: "truncated while reading a 4-byte field",
        }
        .fail();
    }
    let (field, rest) = buf.split_at(4);
    *buf = rest;
    Ok(u32::from_be_bytes(field.try_into().unwrap()))
}

fn take_chunk_id(buf: &mut &[u8], what: &'static str) -> Result<ChunkId> {
    if buf.len() < 16 {
        return CorruptBufferSnafu {
            what,
            reason: "truncated while reading a chunk id",
        }
        .fail();
    }
    let (field, rest) = buf.split_at(16);
    *buf = rest;
    Ok(ChunkId::from_bytes(field.try_into().unwrap()))
}

/// `int32 keyCount` then that many `{int32 byteLen, bytes[byteLen]
/// keyPayload}` records.
pub fn encode_keys(keys: &[RowKey]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(keys.len() as u32).to_be_bytes());
    for key in keys {
        out.extend_from_slice(&(key.as_bytes().len() as u32).to_be_bytes());
        out.extend_from_slice(key.as_bytes());
    }
    out
}

/// Decode a buffer written by [`encode_keys`].
pub fn decode_keys(bytes: &[u8]) -> Result<Vec<RowKey>> {
    let mut buf = bytes;
    let count = take_u32(&mut buf, "key buffer")?;
    let mut keys = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = take_u32(&mut buf, "key buffer")? as usize;
        if buf.len() < len {
            return CorruptBufferSnafu {
                what: "key buffer",
                reason: "truncated key payload",
            }
            .fail();
        }
        let (payload, rest) = buf.split_at(len);
        buf = rest;
        keys.push(RowKey::new(payload.to_vec()));
    }
    Ok(keys)
}

/// An immutable set of rows appended in one flush.
#[derive(Debug, Clone)]
pub struct Chunk {
    chunk_id: ChunkId,
    keys: Vec<RowKey>,
    columns: Vec<String>,
    column_vectors: Vec<Vec<u8>>,
    meta: ChunkMeta,
}

impl Chunk {
    /// Construct a chunk, validating its invariants: `columns.len() ==
    /// columnVectors.len()`, and every override references a strictly
    /// earlier chunk with ascending-sorted positions.
    pub fn new(
        chunk_id: ChunkId,
        keys: Vec<RowKey>,
        columns: Vec<String>,
        column_vectors: Vec<Vec<u8>>,
        overrides: BTreeMap<ChunkId, Vec<u32>>,
    ) -> Result<Self> {
        if columns.len() != column_vectors.len() {
            return ColumnVectorMismatchSnafu {
                columns: columns.len(),
                vectors: column_vectors.len(),
            }
            .fail();
        }
        for (prior, positions) in &overrides {
            if *prior >= chunk_id {
                return OverrideNotEarlierSnafu {
                    referenced: *prior,
                    building: chunk_id,
                }
                .fail();
            }
            if !positions.windows(2).all(|w| w[0] < w[1]) {
                return OverridePositionsUnsortedSnafu { chunk: *prior }.fail();
            }
        }
        let num_rows = keys.len() as u32;
        Ok(Self {
            chunk_id,
            keys,
            columns,
            column_vectors,
            meta: ChunkMeta { overrides, num_rows },
        })
    }

    /// This chunk's time-ordered id.
    pub fn chunk_id(&self) -> ChunkId {
        self.chunk_id
    }

    /// Row keys, in the order they were appended.
    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    /// Number of rows in this chunk.
    pub fn num_rows(&self) -> u32 {
        self.meta.num_rows
    }

    /// Names of the columns carried by this chunk.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// The raw encoded byte buffer for `column`, if this chunk carries it.
    pub fn column_bytes(&self, column: &str) -> Option<&[u8]> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.column_vectors[i].as_slice())
    }

    /// This chunk's decoded metadata (overrides + row count).
    pub fn meta(&self) -> &ChunkMeta {
        &self.meta
    }

    /// The metadata buffer as persisted.
    pub fn metadata_bytes(&self) -> Vec<u8> {
        self.meta.to_bytes()
    }

    /// The key buffer as persisted.
    pub fn key_bytes(&self) -> Vec<u8> {
        encode_keys(&self.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> ChunkId {
        ChunkId::from_bytes(n.to_be_bytes())
    }

    #[test]
    fn rejects_column_vector_length_mismatch() {
        let err = Chunk::new(
            id(5),
            vec![RowKey::from("a")],
            vec!["x".into(), "y".into()],
            vec![vec![1]],
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::ColumnVectorMismatch { .. }));
    }

    #[test]
    fn rejects_override_of_later_or_equal_chunk() {
        let mut overrides = BTreeMap::new();
        overrides.insert(id(10), vec![0]);
        let err = Chunk::new(id(5), vec![], vec![], vec![], overrides).unwrap_err();
        assert!(matches!(err, crate::Error::OverrideNotEarlier { .. }));
    }

    #[test]
    fn rejects_unsorted_override_positions() {
        let mut overrides = BTreeMap::new();
        overrides.insert(id(1), vec![3, 1]);
        let err = Chunk::new(id(5), vec![], vec![], vec![], overrides).unwrap_err();
        assert!(matches!(err, crate::Error::OverridePositionsUnsorted { .. }));
    }

    #[test]
    fn metadata_and_keys_round_trip() {
        let mut overrides = BTreeMap::new();
        overrides.insert(id(1), vec![0, 2]);
        let keys = vec![RowKey::from("a"), RowKey::from("bb")];
        let chunk = Chunk::new(
            id(5),
            keys.clone(),
            vec!["v".into()],
            vec![LengthPrefixedCodec.encode(&[b"1".to_vec(), b"2".to_vec()])],
            overrides.clone(),
        )
        .unwrap();

        let meta = ChunkMeta::from_bytes(&chunk.metadata_bytes()).unwrap();
        assert_eq!(meta.overrides, overrides);
        assert_eq!(meta.num_rows, 2);

        let decoded_keys = decode_keys(&chunk.key_bytes()).unwrap();
        assert_eq!(decoded_keys, keys);
    }
}
