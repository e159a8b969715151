//! Controllable wall clock

use async_trait::async_trait;
use parking_lot::Mutex;
use presence_core::effects::TimeEffects;
use presence_core::PhysicalTime;
use std::sync::Arc;

/// Wall clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ControllableTimeSource {
    current_ms: Arc<Mutex<u64>>,
}

impl ControllableTimeSource {
    /// Start at `initial_ms` since the epoch
    pub fn new(initial_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(Mutex::new(initial_ms)),
        }
    }

    /// Advance by `ms`
    pub fn advance_ms(&self, ms: u64) {
        *self.current_ms.lock() += ms;
    }

    /// Set absolute time
    pub fn set_ms(&self, ms: u64) {
        *self.current_ms.lock() = ms;
    }

    /// Current time
    pub fn now(&self) -> PhysicalTime {
        PhysicalTime::from_millis(*self.current_ms.lock())
    }
}

impl Default for ControllableTimeSource {
    fn default() -> Self {
        Self::new(1_700_000_000_000)
    }
}

#[async_trait]
impl TimeEffects for ControllableTimeSource {
    async fn physical_time(&self) -> PhysicalTime {
        self.now()
    }
}
