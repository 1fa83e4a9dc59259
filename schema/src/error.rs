//! Error kinds for the schema engine.

use crate::effective::ValidationViolation;
use snafu::Snafu;

/// Errors raised by schema wire decoding and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A column record names a type tag this engine does not recognize.
    #[snafu(display("unknown column type tag: {tag}"))]
    UnknownColumnType {
        /// The unrecognized tag text.
        tag: String,
    },

    /// The wire buffer ended before a length-prefixed field it promised.
    #[snafu(display("schema buffer truncated while reading {field}"))]
    TruncatedBuffer {
        /// Name of the field being decoded when the buffer ran out.
        field: &'static str,
    },

    /// A string field's length prefix did not point at valid UTF-8.
    #[snafu(display("schema buffer field {field} is not valid UTF-8: {source}"))]
    InvalidUtf8 {
        /// Name of the field being decoded.
        field: &'static str,
        /// The underlying UTF-8 decoding failure.
        source: std::string::FromUtf8Error,
    },

    /// A proposed column change violated one or more fold-validation rules.
    /// Surfaced to the caller in full; does not mutate the schema.
    #[snafu(display("column change is invalid: {violations:?}"))]
    Validation {
        /// Every rule the proposal violated.
        violations: Vec<ValidationViolation>,
    },

    /// Requested dataset is absent.
    #[snafu(display("dataset not found: {dataset}"))]
    DatasetNotFound {
        /// The dataset name that was looked up.
        dataset: String,
    },
}

/// Convenience alias matching this crate's `Error`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
