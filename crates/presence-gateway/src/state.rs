//! Process-wide session security state

use presence_core::{IdentityHash, PhysicalTime};
use serde::{Deserialize, Serialize};

/// Snapshot of the gateway's single mutable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSecurityState {
    /// Session verified by a handshake or re-validation
    pub verified: bool,
    /// Last successful verification or re-validation
    pub verified_at: Option<PhysicalTime>,
    /// Purged; only a fresh handshake unlocks
    pub locked: bool,
    /// Last observed user interaction
    pub last_activity_at: PhysicalTime,
    /// Identity bound to the current session, for isolation checks
    pub bound_identity: Option<IdentityHash>,
}

impl SessionSecurityState {
    /// Unverified, unlocked state at process start.
    pub fn initial(now: PhysicalTime) -> Self {
        Self {
            verified: false,
            verified_at: None,
            locked: false,
            last_activity_at: now,
            bound_identity: None,
        }
    }

    /// Whether a verified session has been idle for at least `timeout_ms`.
    pub fn is_inactive(&self, now: PhysicalTime, timeout_ms: u64) -> bool {
        self.verified && now.millis_since(self.last_activity_at) >= timeout_ms
    }

    /// Whether `identity` conflicts with the identity already bound.
    pub fn conflicts_with(&self, identity: Option<&IdentityHash>) -> bool {
        matches!((&self.bound_identity, identity), (Some(bound), Some(seen)) if bound != seen)
    }

    pub(crate) fn clear_session(&mut self) {
        self.verified = false;
        self.verified_at = None;
        self.bound_identity = None;
    }
}
