//! In-memory identity backend

use crate::authenticator::{sign_with, MockCredential};
use async_trait::async_trait;
use parking_lot::Mutex;
use presence_core::effects::{
    AnchorPointer, AssertionVerdict, BackendIdentityRecord, HandshakeEvent, IdentityBackendEffects,
};
use presence_core::{
    CredentialId, DeviceFingerprint, IdentityHash, PhysicalTime, PresenceError, PresenceProof,
    Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct BackendState {
    offline: bool,
    challenge_counter: u64,
    short_challenges: bool,
    credentials: HashMap<CredentialId, ([u8; 32], Option<IdentityHash>)>,
    records: HashMap<DeviceFingerprint, BackendIdentityRecord>,
    pointers: HashMap<DeviceFingerprint, AnchorPointer>,
    events: Vec<HandshakeEvent>,
    presence: HashMap<IdentityHash, PhysicalTime>,
    force_reject: Option<String>,
    verify_calls: usize,
    presence_delay: Duration,
    verify_delay: Duration,
}

/// Identity backend held in memory; every call can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct MockIdentityBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MockIdentityBackend {
    /// Online backend with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offline backends fail every call with a network error
    pub fn set_online(&self, online: bool) {
        self.state.lock().offline = !online;
    }

    /// Issue 8-byte challenges, which the generator refuses
    pub fn issue_short_challenges(&self, short: bool) {
        self.state.lock().short_challenges = short;
    }

    /// Accept assertions from `credential`, bound to `identity`.
    pub fn register_credential(&self, credential: &MockCredential, identity: Option<IdentityHash>) {
        self.state
            .lock()
            .credentials
            .insert(credential.id.clone(), (credential.secret, identity));
    }

    /// Reject every assertion with `reason`
    pub fn force_reject(&self, reason: Option<&str>) {
        self.state.lock().force_reject = reason.map(str::to_string);
    }

    /// Deep-recovery record for `fingerprint`.
    pub fn insert_record(&self, fingerprint: DeviceFingerprint, record: BackendIdentityRecord) {
        self.state.lock().records.insert(fingerprint, record);
    }

    /// Latest verified handshake for `identity`.
    pub fn set_latest_presence(&self, identity: IdentityHash, at: PhysicalTime) {
        self.state.lock().presence.insert(identity, at);
    }

    /// Delay before `latest_verified_presence` answers
    pub fn set_presence_delay(&self, delay: Duration) {
        self.state.lock().presence_delay = delay;
    }

    /// Delay before `verify_assertion` answers
    pub fn set_verify_delay(&self, delay: Duration) {
        self.state.lock().verify_delay = delay;
    }

    /// Mirrored anchor pointer for `fingerprint`.
    pub fn pointer(&self, fingerprint: &DeviceFingerprint) -> Option<AnchorPointer> {
        self.state.lock().pointers.get(fingerprint).cloned()
    }

    /// Telemetry received so far.
    pub fn events(&self) -> Vec<HandshakeEvent> {
        self.state.lock().events.clone()
    }

    /// Number of assertion checks.
    pub fn verify_calls(&self) -> usize {
        self.state.lock().verify_calls
    }

    /// Number of challenges issued.
    pub fn challenges_issued(&self) -> u64 {
        self.state.lock().challenge_counter
    }

    fn check_online(&self) -> Result<()> {
        if self.state.lock().offline {
            return Err(PresenceError::network("identity backend offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityBackendEffects for MockIdentityBackend {
    async fn issue_challenge(&self) -> Result<Vec<u8>> {
        self.check_online()?;
        let mut state = self.state.lock();
        state.challenge_counter += 1;
        let mut challenge = vec![0xC0u8; 24];
        challenge.extend_from_slice(&state.challenge_counter.to_be_bytes());
        if state.short_challenges {
            challenge.truncate(8);
        }
        Ok(challenge)
    }

    async fn verify_assertion(&self, proof: &PresenceProof) -> Result<AssertionVerdict> {
        self.check_online()?;
        let delay = {
            let mut state = self.state.lock();
            state.verify_calls += 1;
            state.verify_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        if let Some(reason) = &state.force_reject {
            return Ok(AssertionVerdict::rejected(reason.clone()));
        }
        let Some((secret, identity)) = state.credentials.get(&proof.credential_id) else {
            return Ok(AssertionVerdict::rejected("unknown credential"));
        };
        let expected = sign_with(secret, &proof.authenticator_data, &proof.client_data_digest);
        if expected != proof.signature {
            return Ok(AssertionVerdict::rejected("signature mismatch"));
        }
        Ok(AssertionVerdict::accepted(identity.clone()))
    }

    async fn lookup_by_device_fingerprint(
        &self,
        fingerprint: &DeviceFingerprint,
    ) -> Result<Option<BackendIdentityRecord>> {
        self.check_online()?;
        Ok(self.state.lock().records.get(fingerprint).cloned())
    }

    async fn record_handshake_event(&self, event: HandshakeEvent) -> Result<()> {
        self.check_online()?;
        self.state.lock().events.push(event);
        Ok(())
    }

    async fn mirror_anchor_pointer(&self, pointer: &AnchorPointer) -> Result<()> {
        self.check_online()?;
        self.state
            .lock()
            .pointers
            .insert(pointer.device_fingerprint.clone(), pointer.clone());
        Ok(())
    }

    async fn remove_anchor_pointer(&self, fingerprint: &DeviceFingerprint) -> Result<()> {
        self.check_online()?;
        self.state.lock().pointers.remove(fingerprint);
        Ok(())
    }

    async fn latest_verified_presence(
        &self,
        identity: &IdentityHash,
    ) -> Result<Option<PhysicalTime>> {
        self.check_online()?;
        let delay = self.state.lock().presence_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.state.lock().presence.get(identity).copied())
    }
}
