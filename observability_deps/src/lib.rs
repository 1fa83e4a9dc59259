//! Re-exports the tracing ecosystem crates used for structured logging across
//! the segment store workspace, so every crate pulls the same versions
//! through a single dependency edge.

pub use tracing;
