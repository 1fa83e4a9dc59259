//! Error kinds for the chunk model, summary, flush protocol, and read path.

use data_types::ChunkId;
use snafu::Snafu;

/// Errors raised by this crate. Store-level failures
/// (`NotFound`/`AlreadyExists`/`NullPartitionValue`/`MissingPriorChunk`/
/// `Store`) are [`data_types::Error`] and surface unchanged through
/// [`Error::Store`]; everything specific to chunk construction or wire
/// decoding lives here.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// `columns.len() != columnVectors.len()` when constructing a chunk.
    #[snafu(display(
        "chunk has {columns} column identifiers but {vectors} column vectors"
    ))]
    ColumnVectorMismatch { columns: usize, vectors: usize },

    /// An override entry names a chunk id that is not strictly earlier than
    /// the chunk being built.
    #[snafu(display(
        "override references chunk {referenced}, which is not earlier than {building}"
    ))]
    OverrideNotEarlier {
        referenced: ChunkId,
        building: ChunkId,
    },

    /// An override's position list was not sorted ascending.
    #[snafu(display("override positions for chunk {chunk} are not sorted ascending"))]
    OverridePositionsUnsorted { chunk: ChunkId },

    /// A chunk's overrides reference a prior chunk absent from the summary
    /// it is being appended to — a data-integrity bug, not a normal runtime
    /// condition.
    #[snafu(display(
        "chunk {missing} is referenced by an override but is not in the segment summary"
    ))]
    MissingPriorChunk { missing: ChunkId },

    /// The metadata or key buffer was truncated or malformed.
    #[snafu(display("{what} buffer is corrupt: {reason}"))]
    CorruptBuffer {
        what: &'static str,
        reason: String,
    },

    /// A store-level failure, propagated unchanged.
    #[snafu(display("{source}"))]
    Store { source: data_types::Error },

    /// A retry loop gave up after exhausting its attempt budget without a
    /// successful compare-and-swap.
    #[snafu(display("gave up after {attempts} attempts without a successful flush"))]
    RetriesExhausted { attempts: u32 },
}

impl From<data_types::Error> for Error {
    fn from(source: data_types::Error) -> Self {
        Error::Store { source }
    }
}

/// Convenience alias matching this crate's `Error`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
