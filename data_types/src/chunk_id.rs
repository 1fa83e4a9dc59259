//! Time-ordered 128-bit chunk identifiers.

use parking_lot::Mutex;
use std::fmt;
use uuid::Uuid;

/// A time-ordered identifier for a [`crate::Chunk`]-equivalent in the owning
/// crate. Newer chunks always compare strictly greater than older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(u128);

impl ChunkId {
    /// Build a `ChunkId` from its raw big-endian byte representation, as read
    /// from a metadata or summary buffer.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }

    /// The raw 16-byte big-endian representation written to metadata and
    /// summary buffers.
    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Global counter ensuring the time-UUIDs handed out by this process are
/// strictly increasing even when [`Uuid::now_v7`] returns two values with an
/// identical millisecond timestamp.
static LAST_ISSUED: Mutex<u128> = Mutex::new(0);

/// Mints chunk ids that are strictly increasing within this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkIdGenerator;

impl ChunkIdGenerator {
    /// Mint a new id, guaranteed to be strictly greater than every id this
    /// process has minted so far.
    pub fn next(&self) -> ChunkId {
        let candidate = Uuid::now_v7().as_u128();
        let mut last = LAST_ISSUED.lock();
        let issued = candidate.max(*last + 1);
        *last = issued;
        ChunkId(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let gen = ChunkIdGenerator;
        let mut prev = gen.next();
        for _ in 0..1000 {
            let next = gen.next();
            assert!(next > prev, "{next} should be greater than {prev}");
            prev = next;
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let id = ChunkIdGenerator.next();
        assert_eq!(ChunkId::from_bytes(id.to_bytes()), id);
    }
}
