//! The schema/metadata store collaborator.

use crate::column::Column;
use crate::effective::Schema;
use crate::error::DatasetNotFoundSnafu;
use crate::Result;
use async_trait::async_trait;
use data_types::ResultCode;

/// Persists dataset column history and computes effective schemas on
/// demand: register/look up/remove a dataset, append a column, and fold
/// the effective schema as of a given version.
#[async_trait]
pub trait SchemaStore: std::fmt::Debug + Send + Sync {
    /// Register a new, empty dataset.
    async fn new_dataset(&self, dataset: &str) -> Result<ResultCode>;

    /// Check whether a dataset has been registered.
    async fn get_dataset(&self, dataset: &str) -> Result<ResultCode>;

    /// Remove a dataset and all of its column history.
    ///
    /// Deleting an unknown dataset returns `Err(DatasetNotFound)` here (see
    /// `DESIGN.md`), a deliberately stricter choice than treating the
    /// absence as a no-op success.
    async fn delete_dataset(&self, dataset: &str) -> Result<ResultCode>;

    /// Append a column definition to a dataset's history, after validating
    /// it against the dataset's current effective schema.
    async fn insert_column(&self, column: Column) -> Result<()>;

    /// Compute the effective schema for `dataset` using only column records
    /// with `version <= asked version`.
    async fn get_schema(&self, dataset: &str, version: u32) -> Result<Schema>;
}

/// An in-memory [`SchemaStore`]: one mutex-guarded table per dataset, each
/// holding the dataset's full column history so `getSchema` can refold it
/// against any version bound.
#[derive(Debug, Default)]
pub struct MemSchemaStore {
    datasets: parking_lot::Mutex<std::collections::HashMap<String, Vec<Column>>>,
}

impl MemSchemaStore {
    /// An empty store with no datasets registered.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchemaStore for MemSchemaStore {
    async fn new_dataset(&self, dataset: &str) -> Result<ResultCode> {
        let mut datasets = self.datasets.lock();
        if datasets.contains_key(dataset) {
            return Ok(ResultCode::AlreadyExists);
        }
        datasets.insert(dataset.to_string(), Vec::new());
        Ok(ResultCode::Success)
    }

    async fn get_dataset(&self, dataset: &str) -> Result<ResultCode> {
        let datasets = self.datasets.lock();
        Ok(if datasets.contains_key(dataset) {
            ResultCode::Success
        } else {
            ResultCode::NotFound
        })
    }

    async fn delete_dataset(&self, dataset: &str) -> Result<ResultCode> {
        let mut datasets = self.datasets.lock();
        if datasets.remove(dataset).is_some() {
            Ok(ResultCode::Success)
        } else {
            DatasetNotFoundSnafu { dataset }.fail()
        }
    }

    async fn insert_column(&self, column: Column) -> Result<()> {
        let mut datasets = self.datasets.lock();
        let history = datasets
            .get_mut(column.dataset())
            .ok_or_else(|| DatasetNotFoundSnafu { dataset: column.dataset() }.build())?;

        let effective = Schema::fold(history.iter().cloned());
        let violations = crate::effective::validate(&effective, &column);
        if !violations.is_empty() {
            return crate::error::ValidationSnafu { violations }.fail();
        }
        history.push(column);
        Ok(())
    }

    async fn get_schema(&self, dataset: &str, version: u32) -> Result<Schema> {
        let datasets = self.datasets.lock();
        let history = datasets
            .get(dataset)
            .ok_or_else(|| DatasetNotFoundSnafu { dataset }.build())?;
        Ok(Schema::fold(
            history.iter().filter(|c| c.version() <= version).cloned(),
        ))
    }
}
