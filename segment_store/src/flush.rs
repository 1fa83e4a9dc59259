//! The flush protocol: compute overrides for a new chunk against the
//! current summary, then compare-and-swap summary and chunk together.

use crate::chunk::{decode_keys, Chunk, ColumnVectorCodec};
use crate::error::Result;
use crate::store::PersistentStore;
use crate::summary::{SegmentSummary, SummaryVersion};
use data_types::{ChunkId, ChunkIdGenerator, RowKey};
use observability_deps::tracing::error;
use std::collections::{BTreeMap, HashMap};

/// One column's raw per-row values for an incoming batch, before encoding.
/// The column codec itself is an external, byte-buffer-producing
/// collaborator; this crate keeps rows individually addressable only long
/// enough to apply the intra-batch de-duplication the flush protocol
/// requires, then hands the surviving rows to a [`ColumnVectorCodec`].
#[derive(Debug, Clone)]
pub struct IncomingColumn {
    /// Column name.
    pub name: String,
    /// One raw value per row, aligned with [`FlushRequest::keys`].
    pub row_values: Vec<Vec<u8>>,
}

/// A prepared batch for one `(partition, segment)` flush.
#[derive(Debug, Clone)]
pub struct FlushRequest {
    /// Destination partition.
    pub partition: String,
    /// Destination segment.
    pub segment: String,
    /// One key per incoming row; may contain duplicates.
    pub keys: Vec<RowKey>,
    /// Incoming columns, each with one raw value per row in `keys`.
    pub columns: Vec<IncomingColumn>,
}

/// Positions to retain under "last write wins within batch": for each
/// distinct key, keep only its last occurrence, then return the retained
/// positions in ascending order so row order within the assembled chunk
/// matches first-seen-after-dedup order.
fn dedup_last_write_wins(keys: &[RowKey]) -> Vec<usize> {
    let mut last_index: HashMap<&RowKey, usize> = HashMap::with_capacity(keys.len());
    for (position, key) in keys.iter().enumerate() {
        last_index.insert(key, position);
    }
    let mut positions: Vec<usize> = last_index.into_values().collect();
    positions.sort_unstable();
    positions
}

/// Attempt exactly one flush of `request` against `store`. Returns
/// `Ok(true)` iff the compare-and-swap landed. `Ok(false)` is the normal
/// conflict outcome: the caller discards the chunk this call assembled (its
/// id is not reused) and calls again, which reloads the summary from
/// scratch. See [`crate::retry`] for a retry driver.
pub async fn flush_once(
    store: &dyn PersistentStore,
    request: &FlushRequest,
    id_generator: &ChunkIdGenerator,
    codec: &dyn ColumnVectorCodec,
) -> Result<bool> {
    // 1. Load.
    let loaded = store
        .load_summary(&request.partition, &request.segment)
        .await
        .map_err(|e| {
            error!(error = %e, partition = %request.partition, segment = %request.segment, "store error loading segment summary");
            e
        })?;
    let (expected_version, summary) = match loaded {
        Some((version, bytes)) => (version, SegmentSummary::from_bytes(&bytes)?),
        None => (SummaryVersion::ABSENT, SegmentSummary::empty()),
    };

    let kept_positions = dedup_last_write_wins(&request.keys);
    let kept_keys: Vec<RowKey> = kept_positions
        .iter()
        .map(|&i| request.keys[i].clone())
        .collect();

    // 2. Prefilter.
    let candidates = summary.possible_overrides(&kept_keys);

    // 3. Fetch keys. An empty candidate list skips straight past steps 3-4.
    let mut fetched = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let key_bytes = store
            .load_chunk_keys(&request.partition, &request.segment, candidate)
            .await
            .map_err(|e| {
                error!(error = %e, chunk = %candidate, "store error loading chunk keys for override check");
                e
            })?;
        fetched.push((candidate, decode_keys(&key_bytes)?));
    }

    // 4. Exact compute.
    let overrides: BTreeMap<ChunkId, Vec<u32>> =
        SegmentSummary::actual_overrides(&kept_keys, &fetched)
            .into_iter()
            .collect();

    // 5. Assemble.
    let chunk_id = id_generator.next();
    let column_names: Vec<String> = request.columns.iter().map(|c| c.name.clone()).collect();
    let column_vectors: Vec<Vec<u8>> = request
        .columns
        .iter()
        .map(|column| {
            let rows: Vec<Vec<u8>> = kept_positions
                .iter()
                .map(|&i| column.row_values[i].clone())
                .collect();
            codec.encode(&rows)
        })
        .collect();
    let chunk = Chunk::new(
        chunk_id,
        kept_keys.clone(),
        column_names.clone(),
        column_vectors.clone(),
        overrides,
    )?;

    // 6. Extend summary (original `summary` is untouched, per its contract).
    let new_summary = summary.with_keys(chunk_id, &kept_keys);

    // 7. Commit.
    store
        .write_chunk(
            &request.partition,
            &request.segment,
            chunk_id,
            chunk.metadata_bytes(),
            chunk.key_bytes(),
            column_names.into_iter().zip(column_vectors).collect(),
        )
        .await
        .map_err(|e| {
            error!(error = %e, chunk = %chunk_id, "store error writing chunk");
            e
        })?;

    let committed = store
        .cas_summary(
            &request.partition,
            &request.segment,
            expected_version,
            expected_version.next(),
            new_summary.to_bytes(),
        )
        .await
        .map_err(|e| {
            error!(error = %e, partition = %request.partition, segment = %request.segment, "store error during summary compare-and-swap");
            e
        })?;
    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::LengthPrefixedCodec;
    use crate::store::{MemStore, PersistentStore};

    fn req(partition: &str, segment: &str, keys: &[&str], values: &[&str]) -> FlushRequest {
        FlushRequest {
            partition: partition.to_string(),
            segment: segment.to_string(),
            keys: keys.iter().map(|k| RowKey::from(*k)).collect(),
            columns: vec![IncomingColumn {
                name: "v".to_string(),
                row_values: values.iter().map(|v| v.as_bytes().to_vec()).collect(),
            }],
        }
    }

    #[tokio::test]
    async fn no_candidates_commits_with_no_overrides() {
        let store = MemStore::new();
        let ids = ChunkIdGenerator;
        let request = req("p", "s", &["a", "b"], &["1", "2"]);
        let ok = flush_once(&store, &request, &ids, &LengthPrefixedCodec)
            .await
            .unwrap();
        assert!(ok);

        let (_, bytes) = store.load_summary("p", "s").await.unwrap().unwrap();
        let summary = SegmentSummary::from_bytes(&bytes).unwrap();
        assert_eq!(summary.num_chunks(), 1);
    }

    #[tokio::test]
    async fn overwrite_produces_override_map() {
        let store = MemStore::new();
        let ids = ChunkIdGenerator;
        let codec = LengthPrefixedCodec;

        let first = req("p", "s", &["r1", "r2", "r3", "r4"], &["a", "b", "c", "d"]);
        assert!(flush_once(&store, &first, &ids, &codec).await.unwrap());

        let second = req("p", "s", &["r1", "r2"], &["a2", "b2"]);
        assert!(flush_once(&store, &second, &ids, &codec).await.unwrap());

        let (_, bytes) = store.load_summary("p", "s").await.unwrap().unwrap();
        let summary = SegmentSummary::from_bytes(&bytes).unwrap();
        assert_eq!(summary.num_chunks(), 2);
    }

    #[tokio::test]
    async fn intra_batch_duplicates_keep_last_write() {
        let store = MemStore::new();
        let ids = ChunkIdGenerator;
        let request = req("p", "s", &["a", "a", "a"], &["1", "2", "3"]);
        assert!(flush_once(&store, &request, &ids, &LengthPrefixedCodec)
            .await
            .unwrap());

        let (_, bytes) = store.load_summary("p", "s").await.unwrap().unwrap();
        let summary = SegmentSummary::from_bytes(&bytes).unwrap();
        assert_eq!(summary.chunks().next().unwrap().1.num_rows(), 1);
    }
}
