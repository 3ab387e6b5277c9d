//! Explicit random generator handle with snapshot/restore
//!
//! Every randomised operation takes `&mut SpeciesRng` and records the
//! generator position it started from, so a caller can rebuild the exact
//! stream and reproduce the same draws.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Generator used for niche randomisation, conversion and sampling
pub type SpeciesRng = ChaCha8Rng;

/// Create a generator from a 64-bit seed
pub fn seeded(seed: u64) -> SpeciesRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Exact position of a [`SpeciesRng`] stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngSnapshot {
    pub seed: [u8; 32],
    pub stream: u64,
    pub word_pos: u128,
}

impl RngSnapshot {
    pub fn capture(rng: &SpeciesRng) -> Self {
        Self {
            seed: rng.get_seed(),
            stream: rng.get_stream(),
            word_pos: rng.get_word_pos(),
        }
    }

    /// Rebuild a generator positioned exactly where the snapshot was taken
    pub fn restore(&self) -> SpeciesRng {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        rng.set_stream(self.stream);
        rng.set_word_pos(self.word_pos);
        rng
    }
}
