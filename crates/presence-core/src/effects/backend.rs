//! Identity Backend Effects
//!
//! Boundary to the remote identity store. The store issues challenges,
//! verifies assertions, answers deep-recovery lookups keyed by device
//! fingerprint, holds the remote anchor pointer, and receives handshake
//! telemetry.
//!
//! # Effect Classification
//!
//! - **Category**: Collaborator Effect
//! - **Implementation**: deployment-specific; `presence-effects` ships an
//!   offline handler, `presence-testkit` an in-memory mock
//!
//! Every method may fail with a `Network` error. Callers treat such failures
//! as "not verified" or "not recoverable" and never as fatal.

use crate::codes::StatusCode;
use crate::proof::PresenceProof;
use crate::types::{DeviceFingerprint, IdentityHash, PalmHash, PhoneRef, PhysicalTime, SessionId};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Backend decision on a presence proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionVerdict {
    /// Signature and credential binding check out
    pub valid: bool,
    /// Rejection reason
    pub reason: Option<String>,
    /// Identity bound to the credential, when the backend knows it
    pub identity_hash: Option<IdentityHash>,
}

impl AssertionVerdict {
    /// Accepting verdict
    pub fn accepted(identity_hash: Option<IdentityHash>) -> Self {
        Self {
            valid: true,
            reason: None,
            identity_hash,
        }
    }

    /// Rejecting verdict
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            identity_hash: None,
        }
    }
}

/// Backend identity row found by device fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendIdentityRecord {
    /// Null until the identity completed a biometric enrollment
    pub identity_hash: Option<IdentityHash>,
    /// Phone reference on file
    pub phone_ref: Option<PhoneRef>,
    /// Palm template hash on file
    pub palm_hash: Option<PalmHash>,
}

/// Minimal pointer mirrored remotely so a wiped device can be recovered.
///
/// Carries the one-way token only, never the identity hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorPointer {
    /// Device the pointer belongs to
    pub device_fingerprint: DeviceFingerprint,
    /// Hex anchor token; never the identity hash
    pub token: String,
}

/// Terminal handshake outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandshakeOutcome {
    /// Handshake verified
    Success,
    /// Handshake failed
    Failed,
}

/// Telemetry record for one terminal handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeEvent {
    /// Session the event describes
    pub session_id: SessionId,
    /// Optional nation tag
    pub nation: Option<String>,
    /// Terminal state
    pub outcome: HandshakeOutcome,
    /// Most specific failure code
    pub code: Option<StatusCode>,
    /// Phase-1 start to terminal state
    pub total_duration_ms: u64,
    /// When the event was produced
    pub recorded_at: PhysicalTime,
}

/// Remote identity store.
#[async_trait]
pub trait IdentityBackendEffects: Send + Sync {
    /// Fresh challenge for the platform authenticator.
    async fn issue_challenge(&self) -> Result<Vec<u8>>;

    /// Check a presence proof's signature and credential binding.
    async fn verify_assertion(&self, proof: &PresenceProof) -> Result<AssertionVerdict>;

    /// Deep-recovery lookup.
    async fn lookup_by_device_fingerprint(
        &self,
        fingerprint: &DeviceFingerprint,
    ) -> Result<Option<BackendIdentityRecord>>;

    /// Handshake telemetry.
    async fn record_handshake_event(&self, event: HandshakeEvent) -> Result<()>;

    /// Mirror the anchor pointer for recovery.
    async fn mirror_anchor_pointer(&self, pointer: &AnchorPointer) -> Result<()>;

    /// Remove the mirrored anchor pointer.
    async fn remove_anchor_pointer(&self, fingerprint: &DeviceFingerprint) -> Result<()>;

    /// Time of the most recent verified handshake for `identity`.
    async fn latest_verified_presence(&self, identity: &IdentityHash)
        -> Result<Option<PhysicalTime>>;
}
