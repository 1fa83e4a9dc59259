//! The schema engine: folds versioned column definitions into an effective
//! schema and validates proposed changes against it.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, missing_docs)]

mod column;
mod effective;
mod error;
mod store;
mod wire;

pub use column::{Column, ColumnType, Serializer};
pub use effective::{validate, Schema, ValidationViolation};
pub use error::{Error, Result};
pub use store::{MemSchemaStore, SchemaStore};
pub use wire::{from_bytes, to_bytes};
