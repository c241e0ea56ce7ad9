//! BLAKE3 helpers for shard selection and deterministic jitter.

use blake3::Hasher;

#[inline]
pub fn hash_key(key: &str) -> [u8; 32] {
    *blake3::hash(key.as_bytes()).as_bytes()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Only used for striping and jitter, never for equality: the cache always compares
/// full key strings, so a truncation collision costs at most some lock contention.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    first_u64(hash.as_bytes())
}

/// Picks the lock stripe for `key` out of `shard_count` stripes.
#[inline]
pub fn shard_index(key: &str, shard_count: usize) -> usize {
    if shard_count <= 1 {
        return 0;
    }
    (hash_to_u64(key.as_bytes()) % shard_count as u64) as usize
}

/// Hashes `key` under `seed`. Same seed and key always give the same value.
#[inline]
pub fn seeded_hash(seed: u64, key: &str) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(b"|");
    hasher.update(key.as_bytes());
    first_u64(hasher.finalize().as_bytes())
}

#[inline]
fn first_u64(bytes: &[u8; 32]) -> u64 {
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[0..8]);
    u64::from_le_bytes(head)
}
