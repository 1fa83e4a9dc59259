//! The segment summary: a per-segment index of chunks with a probabilistic
//! key digest per chunk, used for override detection.

use crate::error::{CorruptBufferSnafu, Result};
use data_types::{BloomDigest, ChunkId, KeySetDigest, RowKey};

/// An opaque, monotonically-increasing token produced by the store on each
/// successful compare-and-swap. Not constructible outside the store; callers
/// only ever pass one back to `cas_summary` exactly as they received it from
/// `load_summary`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SummaryVersion(pub(crate) u64);

impl SummaryVersion {
    /// The version preceding any committed chunk, used when a segment has
    /// never been flushed.
    pub const ABSENT: SummaryVersion = SummaryVersion(0);

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// A compact per-chunk record: a key digest and the chunk's row count.
#[derive(Debug, Clone)]
pub struct ChunkSummary {
    digest: BloomDigest,
    num_rows: u32,
}

impl ChunkSummary {
    /// Build a summary record for a chunk given its full, distinct key list.
    pub fn new(keys: &[RowKey]) -> Self {
        Self {
            digest: BloomDigest::new(keys),
            num_rows: keys.len() as u32,
        }
    }

    /// The chunk's row count.
    pub fn num_rows(&self) -> u32 {
        self.num_rows
    }
}

/// An ordered sequence of `(ChunkId, ChunkSummary)` for all committed chunks
/// of a segment, in write order.
#[derive(Debug, Clone, Default)]
pub struct SegmentSummary {
    chunks: Vec<(ChunkId, ChunkSummary)>,
}

impl SegmentSummary {
    /// A summary for a segment that has never been flushed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of chunks indexed by this summary.
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Chunks in write order.
    pub fn chunks(&self) -> impl Iterator<Item = (ChunkId, &ChunkSummary)> {
        self.chunks.iter().map(|(id, summary)| (*id, summary))
    }

    /// For each existing chunk, count how many of `incoming_keys` its digest
    /// claims membership for; return the ids of chunks with a strictly
    /// positive count. A digest hit never means "definitely overridden",
    /// only "worth an exact check" — any hit at all triggers the exact
    /// check, there is no minimum-count threshold.
    pub fn possible_overrides(&self, incoming_keys: &[RowKey]) -> Vec<ChunkId> {
        self.chunks
            .iter()
            .filter(|(_, summary)| {
                incoming_keys
                    .iter()
                    .any(|key| summary.digest.contains(key.as_bytes()))
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// For each candidate chunk's key list, the positions (in that chunk's
    /// key order) whose key equals any incoming key. Chunks with no actual
    /// match are omitted.
    pub fn actual_overrides(
        incoming_keys: &[RowKey],
        fetched: &[(ChunkId, Vec<RowKey>)],
    ) -> Vec<(ChunkId, Vec<u32>)> {
        use std::collections::HashSet;
        let incoming: HashSet<&RowKey> = incoming_keys.iter().collect();
        fetched
            .iter()
            .filter_map(|(chunk_id, keys)| {
                let positions: Vec<u32> = keys
                    .iter()
                    .enumerate()
                    .filter(|(_, key)| incoming.contains(key))
                    .map(|(pos, _)| pos as u32)
                    .collect();
                (!positions.is_empty()).then_some((*chunk_id, positions))
            })
            .collect()
    }

    /// Return a new summary with `(chunkId, ChunkSummary(keys))` appended.
    /// The receiver is left untouched.
    pub fn with_keys(&self, chunk_id: ChunkId, keys: &[RowKey]) -> Self {
        let mut chunks = self.chunks.clone();
        chunks.push((chunk_id, ChunkSummary::new(keys)));
        Self { chunks }
    }

    /// Upper-bound byte size for storage provisioning.
    pub fn size(&self) -> usize {
        self.chunks
            .iter()
            .map(|(_, s)| 16 + 4 + s.digest.to_bytes().len() + 4)
            .sum()
    }

    /// `int32 count` then that many `{bytes[16] chunkId, int32 digestLen,
    /// bytes[digestLen] digest, int32 numRows}` records.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.chunks.len() as u32).to_be_bytes());
        for (chunk_id, summary) in &self.chunks {
            out.extend_from_slice(&chunk_id.to_bytes());
            let digest_bytes = summary.digest.to_bytes();
            out.extend_from_slice(&(digest_bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(&digest_bytes);
            out.extend_from_slice(&summary.num_rows.to_be_bytes());
        }
        out
    }

    /// Decode a buffer written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        let count = take_u32(&mut buf, "segment summary")?;
        let mut chunks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let chunk_id = take_chunk_id(&mut buf, "segment summary")?;
            let digest_len = take_u32(&mut buf, "segment summary")? as usize;
            if buf.len() < digest_len {
                return CorruptBufferSnafu {
                    what: "segment summary",
                    reason: "truncated digest",
                }
                .fail();
            }
            let (digest_bytes, rest) = buf.split_at(digest_len);
            buf = rest;
            let digest = BloomDigest::from_bytes(digest_bytes).map_err(|e| {
                crate::error::Error::CorruptBuffer {
                    what: "segment summary digest",
                    reason: e.to_string(),
                }
            })?;
            let num_rows = take_u32(&mut buf, "segment summary")?;
            chunks.push((chunk_id, ChunkSummary { digest, num_rows }));
        }
        Ok(Self { chunks })
    }
}

fn take_u32(buf: &mut &[u8], what: &'static str) -> Result<u32> {
    if buf.len() < 4 {
        return CorruptBufferSnafu {
            what,
            reason: "truncated while reading a 4-byte field",
        }
        .fail();
    }
    let (field, rest) = buf.split_at(4);
    *buf = rest;
    Ok(u32::from_be_bytes(field.try_into().unwrap()))
}

fn take_chunk_id(buf: &mut &[u8], what: &'static str) -> Result<ChunkId> {
    if buf.len() < 16 {
        return CorruptBufferSnafu {
            what,
            reason: "truncated while reading a chunk id",
        }
        .fail();
    }
    let (field, rest) = buf.split_at(16);
    *buf = rest;
    Ok(ChunkId::from_bytes(field.try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> ChunkId {
        ChunkId::from_bytes(n.to_be_bytes())
    }

    #[test]
    fn with_keys_does_not_mutate_original() {
        let empty = SegmentSummary::empty();
        let extended = empty.with_keys(id(1), &[RowKey::from("a")]);
        assert_eq!(empty.num_chunks(), 0);
        assert_eq!(extended.num_chunks(), 1);
    }

    #[test]
    fn possible_overrides_has_no_false_negatives() {
        let summary = SegmentSummary::empty().with_keys(
            id(1),
            &[RowKey::from("a"), RowKey::from("b"), RowKey::from("c")],
        );
        let candidates = summary.possible_overrides(&[RowKey::from("b")]);
        assert_eq!(candidates, vec![id(1)]);
    }

    #[test]
    fn actual_overrides_matches_exact_positions() {
        let fetched = vec![(
            id(1),
            vec![RowKey::from("a"), RowKey::from("b"), RowKey::from("c")],
        )];
        let overrides = SegmentSummary::actual_overrides(&[RowKey::from("b")], &fetched);
        assert_eq!(overrides, vec![(id(1), vec![1])]);
    }

    #[test]
    fn round_trips_through_bytes() {
        let summary = SegmentSummary::empty()
            .with_keys(id(1), &[RowKey::from("a")])
            .with_keys(id(2), &[RowKey::from("b"), RowKey::from("c")]);
        let decoded = SegmentSummary::from_bytes(&summary.to_bytes()).unwrap();
        assert_eq!(decoded.num_chunks(), 2);
        assert_eq!(decoded.chunks[1].1.num_rows(), 2);
    }

    #[test]
    fn empty_summary_serializes_to_zero_count() {
        assert_eq!(
            SegmentSummary::empty().to_bytes(),
            0u32.to_be_bytes().to_vec()
        );
    }
}
