use crate::hashing::seeded_hash;
use crate::normalize::CacheKey;

/// Bounded, deterministic score offset.
///
/// The offset depends only on the seed and the normalized key, so equal requests
/// always get the same score while near-identical low-information inputs still spread
/// out a little.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashJitter {
    seed: u64,
    amplitude: u8,
}

impl HashJitter {
    pub fn new(seed: u64, amplitude: u8) -> Self {
        Self { seed, amplitude }
    }

    pub fn amplitude(&self) -> u8 {
        self.amplitude
    }

    /// Offset in `[-amplitude, +amplitude]`.
    pub fn offset(&self, key: &CacheKey) -> i16 {
        if self.amplitude == 0 {
            return 0;
        }
        let span = 2 * u64::from(self.amplitude) + 1;
        (seeded_hash(self.seed, key.as_str()) % span) as i16 - i16::from(self.amplitude)
    }
}
