//! Probabilistic set-membership digests. False positives are allowed; false
//! negatives are not.

use siphasher::sip::SipHasher13;
use snafu::Snafu;
use std::hash::Hasher;

/// A probabilistic membership structure over a chunk's keys. Implementations
/// must never report `false` for a key that was actually inserted.
pub trait KeySetDigest: std::fmt::Debug + Send + Sync {
    /// Returns `true` if `key` may be a member; `false` means it is
    /// definitely not a member.
    fn contains(&self, key: &[u8]) -> bool;

    /// Serialize to the byte form stored in a segment summary record.
    fn to_bytes(&self) -> Vec<u8>;
}

/// Errors decoding a persisted [`BloomDigest`].
#[derive(Debug, Snafu)]
pub enum DigestError {
    #[snafu(display("bloom digest buffer is truncated: need at least 12 header bytes, got {len}"))]
    TruncatedHeader { len: usize },

    #[snafu(display(
        "bloom digest buffer declares {expected} bit bytes but only {actual} remain"
    ))]
    TruncatedBits { expected: usize, actual: usize },
}

/// The target false-positive rate used to size new digests.
const TARGET_FALSE_POSITIVE_RATE: f64 = 0.01;
const MIN_BITS: u64 = 64;

/// A Bloom filter over a chunk's row keys, built from two independent SipHash
/// functions combined via double hashing (Kirsch–Mitzenmacher), since the
/// workspace already pulls in `siphasher` for partition routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomDigest {
    num_bits: u64,
    num_hashes: u32,
    bits: Vec<u8>,
}

impl BloomDigest {
    /// Build a digest over `keys`, sized for the given row count.
    pub fn new(keys: &[impl AsRef<[u8]>]) -> Self {
        let (num_bits, num_hashes) = Self::size_for(keys.len());
        let mut digest = Self {
            num_bits,
            num_hashes,
            bits: vec![0u8; ((num_bits + 7) / 8) as usize],
        };
        for key in keys {
            digest.insert(key.as_ref());
        }
        digest
    }

    /// Size the filter for `num_rows` keys at [`TARGET_FALSE_POSITIVE_RATE`].
    fn size_for(num_rows: usize) -> (u64, u32) {
        if num_rows == 0 {
            return (MIN_BITS, 1);
        }
        let n = num_rows as f64;
        let m = (-(n * TARGET_FALSE_POSITIVE_RATE.ln()) / std::f64::consts::LN_2.powi(2)).ceil();
        let m = (m as u64).max(MIN_BITS);
        let k = ((m as f64 / n) * std::f64::consts::LN_2).round().max(1.0) as u32;
        (m, k.min(16))
    }

    fn hash_pair(&self, key: &[u8]) -> (u64, u64) {
        let mut h1 = SipHasher13::new_with_keys(0, 0);
        h1.write(key);
        let mut h2 = SipHasher13::new_with_keys(0x5bd1e995, 0xc2b2ae35);
        h2.write(key);
        (h1.finish(), h2.finish())
    }

    fn positions(&self, key: &[u8]) -> impl Iterator<Item = u64> + '_ {
        let (h1, h2) = self.hash_pair(key);
        let num_bits = self.num_bits;
        (0..self.num_hashes).map(move |i| h1.wrapping_add((i as u64).wrapping_mul(h2)) % num_bits)
    }

    fn insert(&mut self, key: &[u8]) {
        for pos in self.positions(key).collect::<Vec<_>>() {
            let byte = (pos / 8) as usize;
            let bit = (pos % 8) as u8;
            self.bits[byte] |= 1 << bit;
        }
    }

    /// Decode a digest previously written by [`BloomDigest::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DigestError> {
        if bytes.len() < 12 {
            return TruncatedHeaderSnafu { len: bytes.len() }.fail();
        }
        let num_bits = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
        let num_hashes = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        let expected_bytes = ((num_bits + 7) / 8) as usize;
        let actual = bytes.len() - 12;
        if actual < expected_bytes {
            return TruncatedBitsSnafu {
                expected: expected_bytes,
                actual,
            }
            .fail();
        }
        Ok(Self {
            num_bits,
            num_hashes,
            bits: bytes[12..12 + expected_bytes].to_vec(),
        })
    }

    fn get_bit(&self, pos: u64) -> bool {
        let byte = (pos / 8) as usize;
        let bit = (pos % 8) as u8;
        self.bits[byte] & (1 << bit) != 0
    }
}

impl KeySetDigest for BloomDigest {
    fn contains(&self, key: &[u8]) -> bool {
        self.positions(key).all(|pos| self.get_bit(pos))
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.bits.len());
        out.extend_from_slice(&self.num_bits.to_be_bytes());
        out.extend_from_slice(&self.num_hashes.to_be_bytes());
        out.extend_from_slice(&self.bits);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let keys: Vec<Vec<u8>> = (0..500u32).map(|i| i.to_be_bytes().to_vec()).collect();
        let digest = BloomDigest::new(&keys);
        for key in &keys {
            assert!(digest.contains(key), "missing key {key:?}");
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let keys: Vec<Vec<u8>> = vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()];
        let digest = BloomDigest::new(&keys);
        let restored = BloomDigest::from_bytes(&digest.to_bytes()).unwrap();
        for key in &keys {
            assert!(restored.contains(key));
        }
        assert_eq!(digest, restored);
    }

    #[test]
    fn empty_digest_has_no_members() {
        let empty: Vec<Vec<u8>> = Vec::new();
        let digest = BloomDigest::new(&empty);
        // No false negatives is vacuous; the filter should still be usable.
        assert!(!digest.bits.is_empty());
        let _ = digest.contains(b"anything");
    }
}
