//! Error kinds shared by the schema and segment stores.

use snafu::Snafu;

/// Outcome of an admin-style store operation that is not naturally
/// `Result`-shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// The operation completed.
    Success,
    /// The thing being created already exists.
    AlreadyExists,
    /// The thing being looked up or deleted does not exist.
    NotFound,
}

/// Errors surfaced by the persistent-store and schema-store collaborators.
/// `CasConflict` is deliberately absent: a failed compare-and-swap is a
/// normal `false` return, never an error.
#[derive(Debug, Snafu)]
pub enum Error {
    /// Requested dataset, segment, or chunk is absent.
    #[snafu(display("not found: {what}"))]
    NotFound {
        /// Human-readable description of what was missing.
        what: String,
    },

    /// Attempted to create something that already exists.
    #[snafu(display("already exists: {what}"))]
    AlreadyExists {
        /// Human-readable description of the duplicate.
        what: String,
    },

    /// A row's partition column evaluated to null and no
    /// `defaultPartitionKey` was configured.
    #[snafu(display(
        "row has null value in partition column '{column}' and no default partition key is configured"
    ))]
    NullPartitionValue {
        /// The partition column that evaluated to null.
        column: String,
    },

    /// A chunk's overrides reference a prior chunk that is missing from the
    /// store: a fatal data-integrity error.
    #[snafu(display("chunk {missing} referenced by an override is missing from the store"))]
    MissingPriorChunk {
        /// Id of the missing chunk, formatted for display.
        missing: String,
    },

    /// The underlying persistent store failed (timeout, I/O, etc), and is
    /// propagated unchanged.
    #[snafu(display("persistent store error: {source}"))]
    Store {
        /// The underlying store failure.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Convenience alias matching this crate's `Error`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
