//! Anchor store errors

use presence_core::effects::StorageError;
use presence_core::PresenceError;

/// Device anchor store failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    /// Local storage refused the operation
    #[error("anchor storage: {0}")]
    Storage(#[from] StorageError),

    /// Record key could not be derived
    #[error("key derivation failed: {reason}")]
    KeyDerivation {
        /// Detail
        reason: String,
    },

    /// Sealing or opening the record failed
    #[error("record seal: {reason}")]
    Seal {
        /// Detail
        reason: String,
    },

    /// Configuration or input rejected
    #[error("invalid anchor input: {reason}")]
    Invalid {
        /// Detail
        reason: String,
    },
}

impl From<AnchorError> for PresenceError {
    fn from(err: AnchorError) -> Self {
        match err {
            AnchorError::Storage(e) => e.into(),
            AnchorError::KeyDerivation { .. } | AnchorError::Seal { .. } => {
                PresenceError::crypto(err.to_string())
            }
            AnchorError::Invalid { reason } => PresenceError::invalid(reason),
        }
    }
}
