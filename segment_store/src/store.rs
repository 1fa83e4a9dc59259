//! The persistent store collaborator: the interface this crate requires
//! from a wide-column backing database, plus an in-memory reference
//! implementation for tests and local use.

use crate::summary::SummaryVersion;
use async_trait::async_trait;
use data_types::{ChunkId, Result, ResultCode};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// A token-range shard of a scan, as produced by [`PersistentStore::scan_splits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Inclusive lower token bound.
    pub min_token: u64,
    /// Inclusive upper token bound.
    pub max_token: u64,
    /// Partition keys whose token falls in this split.
    pub partitions: Vec<String>,
}

/// An inclusive row-key range filter for [`PersistentStore::scan_splits`].
#[derive(Debug, Clone)]
pub struct KeyRangeFilter {
    /// Lower bound, if any.
    pub start: Bound<Vec<u8>>,
    /// Upper bound, if any.
    pub end: Bound<Vec<u8>>,
}

impl Default for KeyRangeFilter {
    fn default() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }
}

/// The backing store this crate requires. All operations are suspension
/// points: a real implementation talks to a networked, wide-column
/// database.
#[async_trait]
pub trait PersistentStore: std::fmt::Debug + Send + Sync {
    /// Load the current `(version, summary bytes)` for a segment, or `None`
    /// if it has never been flushed.
    async fn load_summary(
        &self,
        partition: &str,
        segment: &str,
    ) -> Result<Option<(SummaryVersion, Vec<u8>)>>;

    /// Persist a new chunk's buffers. Does not make the chunk visible to
    /// readers on its own — visibility is gated on [`Self::cas_summary`].
    async fn write_chunk(
        &self,
        partition: &str,
        segment: &str,
        chunk_id: ChunkId,
        meta_bytes: Vec<u8>,
        key_bytes: Vec<u8>,
        column_bytes: Vec<(String, Vec<u8>)>,
    ) -> Result<()>;

    /// Compare-and-swap the segment's `(version, summary bytes)`. Returns
    /// `false` on a version mismatch; a conflict is a normal boolean
    /// outcome, never an error.
    async fn cas_summary(
        &self,
        partition: &str,
        segment: &str,
        expected_version: SummaryVersion,
        new_version: SummaryVersion,
        new_summary_bytes: Vec<u8>,
    ) -> Result<bool>;

    /// Load the key buffer of an already-committed chunk.
    async fn load_chunk_keys(
        &self,
        partition: &str,
        segment: &str,
        chunk_id: ChunkId,
    ) -> Result<Vec<u8>>;

    /// Load the requested columns' byte buffers for a committed chunk.
    async fn load_chunk_columns(
        &self,
        partition: &str,
        segment: &str,
        chunk_id: ChunkId,
        column_subset: &[String],
    ) -> Result<Vec<(String, Vec<u8>)>>;

    /// Load the metadata buffer of a committed chunk.
    async fn load_chunk_meta(
        &self,
        partition: &str,
        segment: &str,
        chunk_id: ChunkId,
    ) -> Result<Vec<u8>>;

    /// Prepare the store for use (e.g. create keyspaces/tables).
    async fn initialize(&self) -> Result<()>;

    /// Remove everything this store manages. Destructive; intended for
    /// tests and re-provisioning.
    async fn clear_all(&self) -> Result<()>;

    /// Remove an entire projection (the set of partitions/segments backing
    /// one dataset's storage).
    async fn delete_projection(&self, projection: &str) -> Result<ResultCode>;

    /// Plan a parallel scan: bucket partitions matching `partition_filter`
    /// and `key_range_filter` into token-range splits sized between
    /// `min_tokens_per_split` and `max_tokens_per_split`.
    #[allow(clippy::too_many_arguments)]
    async fn scan_splits(
        &self,
        min_tokens_per_split: u64,
        max_tokens_per_split: u64,
        projection: &str,
        column_subset: &[String],
        partition_filter: Option<&str>,
        key_range_filter: Option<&KeyRangeFilter>,
    ) -> Result<Vec<Split>>;
}

#[derive(Debug, Default)]
struct ChunkRow {
    meta_bytes: Vec<u8>,
    key_bytes: Vec<u8>,
    columns: HashMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
struct SegmentRow {
    version: SummaryVersion,
    summary_bytes: Vec<u8>,
    chunks: HashMap<ChunkId, ChunkRow>,
}

/// An in-memory [`PersistentStore`]: one mutex-guarded table, with the
/// per-segment version counter living right next to the data it guards so
/// CAS is a single critical section.
#[derive(Debug, Default)]
pub struct MemStore {
    segments: parking_lot::Mutex<HashMap<(String, String), SegmentRow>>,
    projections: parking_lot::Mutex<BTreeMap<String, ()>>,
}

impl MemStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistentStore for MemStore {
    async fn load_summary(
        &self,
        partition: &str,
        segment: &str,
    ) -> Result<Option<(SummaryVersion, Vec<u8>)>> {
        let segments = self.segments.lock();
        Ok(segments
            .get(&(partition.to_string(), segment.to_string()))
            .map(|row| (row.version, row.summary_bytes.clone())))
    }

    async fn write_chunk(
        &self,
        partition: &str,
        segment: &str,
        chunk_id: ChunkId,
        meta_bytes: Vec<u8>,
        key_bytes: Vec<u8>,
        column_bytes: Vec<(String, Vec<u8>)>,
    ) -> Result<()> {
        let mut segments = self.segments.lock();
        let row = segments
            .entry((partition.to_string(), segment.to_string()))
            .or_default();
        row.chunks.insert(
            chunk_id,
            ChunkRow {
                meta_bytes,
                key_bytes,
                columns: column_bytes.into_iter().collect(),
            },
        );
        Ok(())
    }

    async fn cas_summary(
        &self,
        partition: &str,
        segment: &str,
        expected_version: SummaryVersion,
        new_version: SummaryVersion,
        new_summary_bytes: Vec<u8>,
    ) -> Result<bool> {
        let mut segments = self.segments.lock();
        let row = segments
            .entry((partition.to_string(), segment.to_string()))
            .or_default();
        if row.version != expected_version {
            return Ok(false);
        }
        row.version = new_version;
        row.summary_bytes = new_summary_bytes;
        Ok(true)
    }

    async fn load_chunk_keys(
        &self,
        partition: &str,
        segment: &str,
        chunk_id: ChunkId,
    ) -> Result<Vec<u8>> {
        self.chunk(partition, segment, chunk_id, |c| c.key_bytes.clone())
    }

    async fn load_chunk_columns(
        &self,
        partition: &str,
        segment: &str,
        chunk_id: ChunkId,
        column_subset: &[String],
    ) -> Result<Vec<(String, Vec<u8>)>> {
        self.chunk(partition, segment, chunk_id, |c| {
            column_subset
                .iter()
                .filter_map(|name| c.columns.get(name).map(|bytes| (name.clone(), bytes.clone())))
                .collect()
        })
    }

    async fn load_chunk_meta(
        &self,
        partition: &str,
        segment: &str,
        chunk_id: ChunkId,
    ) -> Result<Vec<u8>> {
        self.chunk(partition, segment, chunk_id, |c| c.meta_bytes.clone())
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.segments.lock().clear();
        self.projections.lock().clear();
        Ok(())
    }

    async fn delete_projection(&self, projection: &str) -> Result<ResultCode> {
        let mut projections = self.projections.lock();
        if projections.remove(projection).is_some() {
            Ok(ResultCode::Success)
        } else {
            Ok(ResultCode::NotFound)
        }
    }

    async fn scan_splits(
        &self,
        min_tokens_per_split: u64,
        max_tokens_per_split: u64,
        _projection: &str,
        _column_subset: &[String],
        partition_filter: Option<&str>,
        _key_range_filter: Option<&KeyRangeFilter>,
    ) -> Result<Vec<Split>> {
        let segments = self.segments.lock();
        let mut partitions: Vec<String> = segments
            .keys()
            .map(|(partition, _)| partition.clone())
            .filter(|p| partition_filter.map_or(true, |f| f == p))
            .collect();
        partitions.sort();
        partitions.dedup();

        let mut tokenized: Vec<(u64, String)> = partitions
            .into_iter()
            .map(|p| (crate::partitioning::token_for(&p), p))
            .collect();
        tokenized.sort_by_key(|(token, _)| *token);

        let span = max_tokens_per_split.max(min_tokens_per_split).max(1);
        let mut splits: Vec<Split> = Vec::new();
        for (token, partition) in tokenized {
            match splits.last_mut() {
                Some(split) if token <= split.min_token + span => {
                    split.max_token = token;
                    split.partitions.push(partition);
                }
                _ => splits.push(Split {
                    min_token: token,
                    max_token: token,
                    partitions: vec![partition],
                }),
            }
        }
        Ok(splits)
    }
}

impl MemStore {
    fn chunk<T>(
        &self,
        partition: &str,
        segment: &str,
        chunk_id: ChunkId,
        f: impl FnOnce(&ChunkRow) -> T,
    ) -> Result<T> {
        let segments = self.segments.lock();
        let row = segments
            .get(&(partition.to_string(), segment.to_string()))
            .ok_or_else(|| data_types::Error::NotFound {
                what: format!("segment {partition}/{segment}"),
            })?;
        let chunk = row
            .chunks
            .get(&chunk_id)
            .ok_or_else(|| data_types::Error::MissingPriorChunk {
                missing: chunk_id.to_string(),
            })?;
        Ok(f(chunk))
    }
}
