//! The chunk model, segment summary, flush protocol, and read path for a
//! columnar, partitioned, versioned store.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, missing_docs)]

mod chunk;
mod error;
mod flush;
mod partitioning;
mod read;
mod retry;
mod store;
mod summary;

pub use chunk::{Chunk, ChunkMeta, ColumnVectorCodec, LengthPrefixedCodec};
pub use error::{Error, Result};
pub use flush::{flush_once, FlushRequest, IncomingColumn};
pub use partitioning::{token_for, PartitionRouter};
pub use read::{read_segment, RowView};
pub use retry::flush_with_retry;
pub use store::{KeyRangeFilter, MemStore, PersistentStore, Split};
pub use summary::{ChunkSummary, SegmentSummary, SummaryVersion};
