//! License/entitlement service boundary

use crate::types::OwnerId;
use crate::Result;
use async_trait::async_trait;

/// External entitlement service.
#[async_trait]
pub trait LicenseEffects: Send + Sync {
    /// Whether `owner` holds an active license.
    async fn has_active_license(&self, owner: &OwnerId) -> Result<bool>;
}
