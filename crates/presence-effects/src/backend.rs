//! Offline identity backend
//!
//! Null object used when no backend is configured. Every call fails with a
//! `Network` error, which callers treat as "backend unreachable": challenges
//! fall back to local generation, re-validation reports not verified, and
//! recovery reports nothing found.

use async_trait::async_trait;
use presence_core::effects::{
    AnchorPointer, AssertionVerdict, BackendIdentityRecord, HandshakeEvent,
    IdentityBackendEffects,
};
use presence_core::{
    DeviceFingerprint, IdentityHash, PhysicalTime, PresenceError, PresenceProof, Result,
};

/// Identity backend that is never reachable.
#[derive(Debug, Clone, Default)]
pub struct OfflineIdentityBackend;

impl OfflineIdentityBackend {
    /// Create an offline backend
    pub fn new() -> Self {
        Self
    }

    fn unreachable<T>(op: &str) -> Result<T> {
        Err(PresenceError::network(format!("identity backend offline: {op}")))
    }
}

#[async_trait]
impl IdentityBackendEffects for OfflineIdentityBackend {
    async fn issue_challenge(&self) -> Result<Vec<u8>> {
        Self::unreachable("issue_challenge")
    }

    async fn verify_assertion(&self, _proof: &PresenceProof) -> Result<AssertionVerdict> {
        Self::unreachable("verify_assertion")
    }

    async fn lookup_by_device_fingerprint(
        &self,
        _fingerprint: &DeviceFingerprint,
    ) -> Result<Option<BackendIdentityRecord>> {
        Self::unreachable("lookup_by_device_fingerprint")
    }

    async fn record_handshake_event(&self, _event: HandshakeEvent) -> Result<()> {
        Self::unreachable("record_handshake_event")
    }

    async fn mirror_anchor_pointer(&self, _pointer: &AnchorPointer) -> Result<()> {
        Self::unreachable("mirror_anchor_pointer")
    }

    async fn remove_anchor_pointer(&self, _fingerprint: &DeviceFingerprint) -> Result<()> {
        Self::unreachable("remove_anchor_pointer")
    }

    async fn latest_verified_presence(
        &self,
        _identity: &IdentityHash,
    ) -> Result<Option<PhysicalTime>> {
        Self::unreachable("latest_verified_presence")
    }
}
