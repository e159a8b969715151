//! Time effect trait
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `presence-effects`
//! - **Usage**: timestamps on proofs, session records and gateway state
//!
//! Elapsed-time measurement inside the handshake uses the runtime's monotonic
//! clock directly; this trait supplies wall-clock timestamps only.

use crate::types::PhysicalTime;
use async_trait::async_trait;

/// Wall-clock time source.
#[async_trait]
pub trait TimeEffects: Send + Sync {
    /// Current wall-clock time.
    async fn physical_time(&self) -> PhysicalTime;

    /// Current Unix timestamp in milliseconds.
    async fn current_timestamp_ms(&self) -> u64 {
        self.physical_time().await.ts_ms
    }
}
