//! Platform Authenticator Effects
//!
//! Boundary to a hardware-backed platform authenticator (secure enclave,
//! TPM, OS biometric prompt). The authenticator performs the biometric match
//! on-device and returns only a signed assertion; raw biometric data never
//! crosses this boundary.
//!
//! # Effect Classification
//!
//! - **Category**: Collaborator Effect
//! - **Implementation**: platform integration; `presence-effects` ships a
//!   fallback handler that reports the authenticator as unavailable
//! - **Usage**: `presence-proof` generator
//!
//! ## Authenticator data layout
//!
//! `authenticator_data` follows the platform assertion layout: 32-byte
//! relying-party id hash, one flags byte, then a big-endian 32-bit signature
//! counter. Flag bit `0x01` is user presence, `0x04` is user verification.

use crate::types::CredentialId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// User-presence flag in the authenticator data flags byte
pub const FLAG_USER_PRESENT: u8 = 0x01;
/// User-verification flag in the authenticator data flags byte
pub const FLAG_USER_VERIFIED: u8 = 0x04;

const RP_ID_HASH_LEN: usize = 32;
const FLAGS_OFFSET: usize = RP_ID_HASH_LEN;
const COUNTER_OFFSET: usize = FLAGS_OFFSET + 1;
/// Minimum length of well-formed authenticator data
pub const AUTHENTICATOR_DATA_MIN_LEN: usize = COUNTER_OFFSET + 4;

/// User verification requirement.
///
/// Only `Required` exists: the authenticator must perform a biometric (or
/// equivalent) check, never a presence-only tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    /// Biometric or PIN verification is mandatory
    Required,
}

/// Assertion request handed to the platform authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionRequest {
    /// Challenge to sign
    pub challenge: Vec<u8>,
    /// Credentials the authenticator may use; empty means any
    pub allow_credentials: Vec<CredentialId>,
    /// Relying-party identifier
    pub rp_id: String,
    /// Prompt timeout in milliseconds
    pub timeout_ms: u64,
    /// Always `Required`
    pub user_verification: UserVerification,
}

/// Raw assertion returned by the platform authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorAssertion {
    /// Credential that answered
    pub credential_id: CredentialId,
    /// Raw authenticator data
    pub authenticator_data: Vec<u8>,
    /// Client data JSON as signed
    pub client_data_json: Vec<u8>,
    /// Signature over authenticator data and client data digest
    pub signature: Vec<u8>,
}

impl AuthenticatorAssertion {
    /// Flags byte, if the authenticator data is well formed.
    pub fn flags(&self) -> Option<u8> {
        if self.authenticator_data.len() < AUTHENTICATOR_DATA_MIN_LEN {
            return None;
        }
        Some(self.authenticator_data[FLAGS_OFFSET])
    }

    /// Signature counter, if the authenticator data is well formed.
    pub fn counter(&self) -> Option<u32> {
        let bytes = self
            .authenticator_data
            .get(COUNTER_OFFSET..COUNTER_OFFSET + 4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Some(u32::from_be_bytes(buf))
    }

    /// Whether the authenticator reports a completed user verification.
    pub fn user_verified(&self) -> bool {
        self.flags()
            .is_some_and(|f| f & FLAG_USER_VERIFIED != 0 && f & FLAG_USER_PRESENT != 0)
    }
}

/// Build authenticator data from its parts.
pub fn encode_authenticator_data(rp_id_hash: &[u8; 32], flags: u8, counter: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(AUTHENTICATOR_DATA_MIN_LEN);
    data.extend_from_slice(rp_id_hash);
    data.push(flags);
    data.extend_from_slice(&counter.to_be_bytes());
    data
}

/// Platform authenticator failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticatorError {
    /// The user dismissed the prompt
    #[error("user cancelled the authenticator prompt")]
    Cancelled,
    /// The OS refused the request (focus lost, policy, user denial)
    #[error("authenticator request not allowed")]
    NotAllowed,
    /// The prompt timed out
    #[error("authenticator prompt timed out")]
    Timeout,
    /// Authenticator failed internally
    #[error("authenticator hardware error: {reason}")]
    Hardware {
        /// Detail
        reason: String,
    },
}

/// Hardware-backed platform authenticator.
#[async_trait]
pub trait PlatformAuthenticatorEffects: Send + Sync {
    /// Whether the caller runs in a secure (encrypted-transport-equivalent) context.
    async fn is_secure_context(&self) -> bool;

    /// Whether a hardware-backed user-verifying authenticator is present.
    async fn is_platform_authenticator_available(&self) -> bool;

    /// Prompt the user and return a signed assertion.
    async fn get_assertion(
        &self,
        request: AssertionRequest,
    ) -> Result<AuthenticatorAssertion, AuthenticatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_and_flags_parse_from_authenticator_data() {
        let data = encode_authenticator_data(
            &[7u8; 32],
            FLAG_USER_PRESENT | FLAG_USER_VERIFIED,
            0x0102_0304,
        );
        let assertion = AuthenticatorAssertion {
            credential_id: CredentialId::new(vec![1]),
            authenticator_data: data,
            client_data_json: b"{}".to_vec(),
            signature: vec![0; 64],
        };
        assert_eq!(assertion.counter(), Some(0x0102_0304));
        assert!(assertion.user_verified());
    }

    #[test]
    fn presence_only_is_not_user_verified() {
        let assertion = AuthenticatorAssertion {
            credential_id: CredentialId::new(vec![1]),
            authenticator_data: encode_authenticator_data(&[0; 32], FLAG_USER_PRESENT, 1),
            client_data_json: Vec::new(),
            signature: Vec::new(),
        };
        assert!(!assertion.user_verified());
    }

    #[test]
    fn short_authenticator_data_has_no_counter() {
        let assertion = AuthenticatorAssertion {
            credential_id: CredentialId::new(vec![1]),
            authenticator_data: vec![0; 10],
            client_data_json: Vec::new(),
            signature: Vec::new(),
        };
        assert_eq!(assertion.counter(), None);
        assert!(!assertion.user_verified());
    }
}
