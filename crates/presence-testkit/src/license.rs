//! Mock entitlement service

use async_trait::async_trait;
use parking_lot::Mutex;
use presence_core::effects::LicenseEffects;
use presence_core::{OwnerId, PresenceError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory license service with call counting.
#[derive(Debug, Clone)]
pub struct MockLicense {
    active: Arc<Mutex<HashSet<OwnerId>>>,
    online: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockLicense {
    fn default() -> Self {
        Self {
            active: Arc::default(),
            online: Arc::new(AtomicBool::new(true)),
            calls: Arc::default(),
        }
    }
}

impl MockLicense {
    /// Service with no licenses.
    pub fn new() -> Self {
        Self::default()
    }

    /// License `owner`.
    pub fn grant(&self, owner: impl Into<OwnerId>) {
        self.active.lock().insert(owner.into());
    }

    /// Revoke `owner`.
    pub fn revoke(&self, owner: &OwnerId) {
        self.active.lock().remove(owner);
    }

    /// Toggle reachability.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of lookups.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LicenseEffects for MockLicense {
    async fn has_active_license(&self, owner: &OwnerId) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(PresenceError::network("license service offline"));
        }
        Ok(self.active.lock().contains(owner))
    }
}
