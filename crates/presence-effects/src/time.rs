//! Time effect handler - production only
//!
//! The handler samples the system clock once at construction and then
//! advances with the runtime's monotonic clock. Timestamps therefore never go
//! backwards within a process, and they follow the runtime's virtual clock
//! when it is paused.

use async_trait::async_trait;
use presence_core::effects::TimeEffects;
use presence_core::PhysicalTime;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Real time handler for production use
#[derive(Debug, Clone)]
pub struct RealTimeHandler {
    base_ms: u64,
    base_instant: Instant,
}

impl RealTimeHandler {
    /// Create a handler anchored at the current system time
    pub fn new() -> Self {
        let base_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis();
        Self {
            base_ms: u64::try_from(base_ms).unwrap_or(u64::MAX),
            base_instant: Instant::now(),
        }
    }
}

impl Default for RealTimeHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeEffects for RealTimeHandler {
    async fn physical_time(&self) -> PhysicalTime {
        let elapsed = u64::try_from(self.base_instant.elapsed().as_millis()).unwrap_or(u64::MAX);
        PhysicalTime::from_millis(self.base_ms.saturating_add(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_the_runtime_clock() {
        let clock = RealTimeHandler::new();
        let t0 = clock.physical_time().await;
        tokio::time::advance(Duration::from_millis(1_500)).await;
        let t1 = clock.physical_time().await;
        assert_eq!(t1.millis_since(t0), 1_500);
    }
}
