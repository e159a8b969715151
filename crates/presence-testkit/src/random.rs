//! Deterministic randomness

use async_trait::async_trait;
use parking_lot::Mutex;
use presence_core::effects::RandomEffects;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Seeded RNG; the same seed yields the same byte stream.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Deterministic source seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl RandomEffects for SeededRandom {
    async fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.lock().fill_bytes(&mut bytes);
        bytes
    }
}
