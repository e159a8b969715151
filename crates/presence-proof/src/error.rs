//! Proof generation and verification errors

use presence_core::{PresenceError, StatusCode};

/// Failure while generating or verifying a presence proof.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    /// Not running in a secure (encrypted-transport-equivalent) context
    #[error("secure context required")]
    InsecureContext,

    /// No hardware-backed user-verifying authenticator
    #[error("platform authenticator unsupported")]
    Unsupported,

    /// User or OS cancelled, dismissed or timed out the prompt
    #[error("authenticator prompt cancelled")]
    Cancelled,

    /// Authenticator failed internally
    #[error("authenticator failure: {reason}")]
    AuthenticatorFailure {
        /// Authenticator-reported reason
        reason: String,
    },

    /// Assertion did not report a completed user verification
    #[error("assertion lacks user verification")]
    UserNotVerified,

    /// Assertion fields are malformed or do not match the request
    #[error("malformed assertion: {reason}")]
    MalformedAssertion {
        /// What did not match
        reason: String,
    },

    /// Challenge already consumed
    #[error("challenge replay detected")]
    ReplayDetected,

    /// Challenge was never issued by this process, or its issue record lapsed
    #[error("challenge not issued by this verifier")]
    UnknownChallenge,

    /// Signature counter did not increase
    #[error("signature counter did not increase (last {last}, presented {presented})")]
    CounterNotIncreasing {
        /// Last accepted counter for the credential
        last: u32,
        /// Counter carried by the rejected proof
        presented: u32,
    },

    /// Challenge issued longer ago than the replay window
    #[error("proof expired ({age_ms}ms old)")]
    Expired {
        /// Time since the challenge was issued
        age_ms: u64,
    },

    /// Backend rejected the assertion
    #[error("assertion rejected: {reason}")]
    Rejected {
        /// Backend-reported reason
        reason: String,
    },

    /// Backend unreachable while verifying
    #[error("identity backend unavailable: {reason}")]
    BackendUnavailable {
        /// Transport error
        reason: String,
    },
}

impl ProofError {
    /// Stable status code for this failure.
    pub fn code(&self) -> StatusCode {
        match self {
            ProofError::InsecureContext => StatusCode::InsecureContext,
            ProofError::Unsupported => StatusCode::Unsupported,
            ProofError::Cancelled => StatusCode::Cancelled,
            ProofError::AuthenticatorFailure { .. } => StatusCode::SensorHardwareError,
            ProofError::UserNotVerified
            | ProofError::MalformedAssertion { .. }
            | ProofError::Rejected { .. } => StatusCode::AssertionRejected,
            ProofError::ReplayDetected | ProofError::UnknownChallenge => {
                StatusCode::ReplayDetected
            }
            ProofError::CounterNotIncreasing { .. } => StatusCode::CounterNotIncreasing,
            ProofError::Expired { .. } => StatusCode::ProofExpired,
            ProofError::BackendUnavailable { .. } => StatusCode::BackendUnavailable,
        }
    }

    /// Whether the failure must lock the identity rather than allow a retry.
    pub fn is_security_violation(&self) -> bool {
        self.code().is_security()
    }
}

impl From<ProofError> for PresenceError {
    fn from(err: ProofError) -> Self {
        match &err {
            ProofError::BackendUnavailable { .. } => PresenceError::network(err.to_string()),
            ProofError::InsecureContext | ProofError::Unsupported => {
                PresenceError::permission_denied(err.to_string())
            }
            e if e.is_security_violation() => PresenceError::security(err.to_string()),
            _ => PresenceError::crypto(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_violations_map_to_security_codes() {
        assert!(ProofError::ReplayDetected.is_security_violation());
        assert!(ProofError::UnknownChallenge.is_security_violation());
        assert!(ProofError::Expired { age_ms: 1 }.is_security_violation());
        assert!(!ProofError::Cancelled.is_security_violation());
        assert!(!ProofError::BackendUnavailable {
            reason: "down".into()
        }
        .is_security_violation());
    }

    #[test]
    fn conversion_preserves_category() {
        assert!(matches!(
            PresenceError::from(ProofError::ReplayDetected),
            PresenceError::Security { .. }
        ));
        assert!(PresenceError::from(ProofError::BackendUnavailable {
            reason: "down".into()
        })
        .is_infrastructure());
    }
}
