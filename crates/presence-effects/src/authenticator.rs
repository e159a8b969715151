//! Platform authenticator fallback handler
//!
//! Null object for hosts without a hardware-backed authenticator (servers,
//! CI, headless machines). Reports the authenticator as unavailable so the
//! proof generator fails with `UNSUPPORTED` instead of producing anything.
//!
//! **For testing**: use `MockAuthenticator` from `presence-testkit`.

use async_trait::async_trait;
use presence_core::effects::{
    AssertionRequest, AuthenticatorAssertion, AuthenticatorError, PlatformAuthenticatorEffects,
};

/// Fallback authenticator for platforms without authenticator hardware.
#[derive(Debug, Clone, Default)]
pub struct FallbackAuthenticatorHandler {
    secure_context: bool,
}

impl FallbackAuthenticatorHandler {
    /// Create a fallback handler. `secure_context` reflects the host transport.
    pub fn new(secure_context: bool) -> Self {
        Self { secure_context }
    }
}

#[async_trait]
impl PlatformAuthenticatorEffects for FallbackAuthenticatorHandler {
    async fn is_secure_context(&self) -> bool {
        self.secure_context
    }

    async fn is_platform_authenticator_available(&self) -> bool {
        false
    }

    async fn get_assertion(
        &self,
        _request: AssertionRequest,
    ) -> Result<AuthenticatorAssertion, AuthenticatorError> {
        Err(AuthenticatorError::Hardware {
            reason: "no platform authenticator on this host".to_string(),
        })
    }
}
