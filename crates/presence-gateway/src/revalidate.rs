//! Presence re-validation
//!
//! The gateway asks a `PresenceRevalidator` whether the device still holds a
//! valid presence, passing the time of the last handshake it witnessed
//! itself. The production implementation reads the identity bound in the
//! local anchor, asks the backend for its latest verified handshake, and
//! takes the newer of the two against the presence expiry.

use async_trait::async_trait;
use presence_anchor::DeviceAnchorStore;
use presence_core::effects::{IdentityBackendEffects, TimeEffects};
use presence_core::{IdentityHash, PhysicalTime, Result};
use std::sync::Arc;

/// Outcome of one re-validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    /// Presence is still valid
    Verified {
        /// Identity bound to the device
        identity: IdentityHash,
        /// Most recent verified handshake, local or on the backend
        presence_at: PhysicalTime,
    },
    /// Presence lapsed or cannot be established
    NotVerified {
        /// Short log-friendly reason
        reason: &'static str,
    },
}

/// Source of truth for periodic presence checks.
#[async_trait]
pub trait PresenceRevalidator: Send + Sync {
    /// Check presence. `local_presence` is the last handshake this process
    /// completed, if any.
    async fn revalidate(&self, local_presence: Option<PhysicalTime>) -> Result<Revalidation>;
}

/// Anchor plus backend re-validation with a presence expiry.
pub struct AnchoredPresenceRevalidator {
    anchor: Arc<DeviceAnchorStore>,
    backend: Arc<dyn IdentityBackendEffects>,
    time: Arc<dyn TimeEffects>,
    expiry_ms: u64,
}

impl AnchoredPresenceRevalidator {
    /// Revalidator treating presence older than `expiry_ms` as lapsed.
    pub fn new(
        anchor: Arc<DeviceAnchorStore>,
        backend: Arc<dyn IdentityBackendEffects>,
        time: Arc<dyn TimeEffects>,
        expiry_ms: u64,
    ) -> Self {
        Self {
            anchor,
            backend,
            time,
            expiry_ms,
        }
    }
}

#[async_trait]
impl PresenceRevalidator for AnchoredPresenceRevalidator {
    async fn revalidate(&self, local_presence: Option<PhysicalTime>) -> Result<Revalidation> {
        if !self.anchor.is_anchored().await {
            return Ok(Revalidation::NotVerified {
                reason: "device not anchored",
            });
        }
        let Some(identity) = self.anchor.anchored_identity().await else {
            return Ok(Revalidation::NotVerified {
                reason: "no identity in anchor",
            });
        };
        let recorded = self.backend.latest_verified_presence(&identity).await?;
        let Some(presence_at) = recorded.max(local_presence) else {
            return Ok(Revalidation::NotVerified {
                reason: "no verified presence on record",
            });
        };
        let now = self.time.physical_time().await;
        if now.millis_since(presence_at) >= self.expiry_ms {
            return Ok(Revalidation::NotVerified {
                reason: "verified presence expired",
            });
        }
        Ok(Revalidation::Verified {
            identity,
            presence_at,
        })
    }
}
