//! Gateway errors

use presence_core::PresenceError;

/// Gateway command failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The session is locked; only a fresh handshake may unlock it
    #[error("session is locked")]
    Locked,
    /// A different identity was observed on this device; the session was purged
    #[error("identity mismatch on this device")]
    IdentityMismatch,
    /// The gateway has shut down
    #[error("session gateway is closed")]
    Closed,
}

impl From<GatewayError> for PresenceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Locked => PresenceError::permission_denied(err.to_string()),
            GatewayError::IdentityMismatch => PresenceError::security(err.to_string()),
            GatewayError::Closed => PresenceError::internal(err.to_string()),
        }
    }
}
