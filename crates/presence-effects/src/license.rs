//! Entitlement handler for deployments without a license service

use async_trait::async_trait;
use presence_core::effects::LicenseEffects;
use presence_core::{OwnerId, Result};

/// License service that grants nothing. Licensed routes redirect to the
/// activation page until a real service is wired in.
#[derive(Debug, Clone, Default)]
pub struct UnlicensedHandler;

impl UnlicensedHandler {
    /// Create the handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LicenseEffects for UnlicensedHandler {
    async fn has_active_license(&self, owner: &OwnerId) -> Result<bool> {
        tracing::debug!(owner = %owner, "no license service configured");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nobody_is_licensed() {
        let handler = UnlicensedHandler::new();
        assert!(!handler
            .has_active_license(&OwnerId::new("owner"))
            .await
            .unwrap());
    }
}
