//! Column definitions.

use std::fmt;

/// The value types a column may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 64-bit floating point.
    Double,
    /// UTF-8 string.
    String,
    /// Compressed bitmap (e.g. a roaring bitmap) column.
    Bitmap,
}

impl ColumnType {
    /// The wire tag written for this type.
    pub fn wire_tag(self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Double => "double",
            ColumnType::String => "string",
            ColumnType::Bitmap => "bitmap",
        }
    }

    /// Parse a wire tag, returning `None` for anything unrecognized. Callers
    /// turn `None` into a metadata-rejection error.
    pub fn from_wire_tag(tag: &str) -> Option<Self> {
        match tag {
            "int" => Some(ColumnType::Int),
            "long" => Some(ColumnType::Long),
            "double" => Some(ColumnType::Double),
            "string" => Some(ColumnType::String),
            "bitmap" => Some(ColumnType::Bitmap),
            _ => None,
        }
    }
}

/// Opaque tag identifying the value codec for a column's data. The codec
/// itself (a columnar byte-buffer encoder) is an external collaborator;
/// this crate only carries the tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Serializer(String);

impl Serializer {
    /// The system default serializer tag.
    pub const DEFAULT_TAG: &'static str = "Filo";

    /// Wrap an explicit serializer tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self(Self::DEFAULT_TAG.to_string())
    }
}

impl fmt::Display for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, typed column belonging to a `(dataset, version)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    dataset: String,
    version: u32,
    column_type: ColumnType,
    serializer: Serializer,
    is_deleted: bool,
    is_system: bool,
}

impl Column {
    /// Reserved name for the row-level tombstone system column.
    pub const DELETED_MARKER: &'static str = ":deleted";
    /// Reserved name for the chunk-inheritance marker system column.
    pub const INHERITED_MARKER: &'static str = ":inherited";

    /// Build a column from the fields an external proposal carries,
    /// including `is_system` as given. A proposal is untrusted input (it may
    /// come from a caller that got the `:`-prefix convention wrong), so
    /// `is_system` is taken verbatim here rather than derived — that is what
    /// gives [`crate::effective::validate`]'s system-flag rule something to
    /// check. Use [`Self::with_derived_system_flag`] when building a column
    /// from a source that doesn't carry the flag at all.
    pub fn new(
        name: impl Into<String>,
        dataset: impl Into<String>,
        version: u32,
        column_type: ColumnType,
        serializer: Serializer,
        is_deleted: bool,
        is_system: bool,
    ) -> Self {
        Self {
            name: name.into(),
            dataset: dataset.into(),
            version,
            column_type,
            serializer,
            is_deleted,
            is_system,
        }
    }

    /// Build a column the way [`crate::wire`] does when decoding the
    /// effective-schema wire form, which never carries `is_system` on the
    /// wire: derive it from the `:`-prefix convention instead of trusting an
    /// external value.
    pub fn with_derived_system_flag(
        name: impl Into<String>,
        dataset: impl Into<String>,
        version: u32,
        column_type: ColumnType,
        serializer: Serializer,
        is_deleted: bool,
    ) -> Self {
        let name = name.into();
        let is_system = name.starts_with(':');
        Self::new(name, dataset, version, column_type, serializer, is_deleted, is_system)
    }

    /// Column name. Names beginning with `:` are reserved for system columns.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning dataset name.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Version at which this column definition was introduced.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The column's value type.
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// The column's value codec tag.
    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// Whether this definition tombstones the column from its version
    /// onward.
    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Whether this is flagged as a reserved system column. Carried as given
    /// rather than derived; [`crate::effective::validate`] is what checks it
    /// against the `:`-prefix convention.
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Two columns are property-equal iff `columnType`, `serializer`, and
    /// `isDeleted` all match. Name, dataset, and version are intentionally
    /// excluded: this is what makes a re-declaration "redundant" under the
    /// fold rule.
    pub fn is_property_equal(&self, other: &Column) -> bool {
        self.column_type == other.column_type
            && self.serializer == other.serializer
            && self.is_deleted == other.is_deleted
    }
}
