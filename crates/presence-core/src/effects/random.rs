//! Randomness effect trait
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `presence-effects` (OS RNG), `presence-testkit` (seeded)

use async_trait::async_trait;

/// Cryptographically secure randomness.
#[async_trait]
pub trait RandomEffects: Send + Sync {
    /// `len` random bytes.
    async fn random_bytes(&self, len: usize) -> Vec<u8>;

    /// 32 random bytes.
    async fn random_bytes_32(&self) -> [u8; 32] {
        let bytes = self.random_bytes(32).await;
        let mut out = [0u8; 32];
        let n = bytes.len().min(32);
        out[..n].copy_from_slice(&bytes[..n]);
        out
    }
}
