//! Shared types for the segment store workspace: time-ordered chunk ids,
//! probabilistic key digests, store-level error kinds, and the result codes
//! returned by admin-style store operations.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, missing_docs)]

mod chunk_id;
mod digest;
mod error;
mod key;

pub use chunk_id::{ChunkId, ChunkIdGenerator};
pub use digest::{BloomDigest, DigestError, KeySetDigest};
pub use error::{Error, Result, ResultCode};
pub use key::RowKey;
