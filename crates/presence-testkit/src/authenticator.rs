//! Mock platform authenticator
//!
//! Produces well-formed assertions signed with a per-credential secret. The
//! "signature" is `sha256(secret || authenticator_data || client_data_digest)`,
//! which `MockIdentityBackend` recomputes to verify.

use async_trait::async_trait;
use parking_lot::Mutex;
use presence_core::codec;
use presence_core::effects::{
    encode_authenticator_data, AssertionRequest, AuthenticatorAssertion, AuthenticatorError,
    PlatformAuthenticatorEffects, FLAG_USER_PRESENT, FLAG_USER_VERIFIED,
};
use presence_core::CredentialId;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A credential the mock authenticator can sign with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCredential {
    /// Credential id
    pub id: CredentialId,
    /// Signing secret shared with the mock backend
    pub secret: [u8; 32],
}

impl MockCredential {
    /// Deterministic credential derived from `tag`
    pub fn new(tag: u8) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"mock-credential");
        hasher.update([tag]);
        Self {
            id: CredentialId::new(vec![tag; 16]),
            secret: hasher.finalize().into(),
        }
    }

    /// Keyed digest standing in for a signature.
    pub fn sign(&self, authenticator_data: &[u8], client_data_digest: &[u8]) -> Vec<u8> {
        sign_with(&self.secret, authenticator_data, client_data_digest)
    }
}

pub(crate) fn sign_with(
    secret: &[u8; 32],
    authenticator_data: &[u8],
    client_data_digest: &[u8],
) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(authenticator_data);
    hasher.update(client_data_digest);
    hasher.finalize().to_vec()
}

/// What the next `get_assertion` call does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionBehavior {
    /// Sign normally
    Succeed,
    /// Fail with the given error
    Fail(AuthenticatorError),
    /// Sign, but report presence without user verification
    PresenceOnly,
    /// Sign over a different challenge than requested
    WrongChallenge,
    /// Sign with a credential outside the allow list
    ForeignCredential,
}

/// Scriptable platform authenticator.
#[derive(Debug, Clone)]
pub struct MockAuthenticator {
    credential: MockCredential,
    secure_context: Arc<AtomicBool>,
    available: Arc<AtomicBool>,
    counter: Arc<AtomicU32>,
    counter_frozen: Arc<AtomicBool>,
    script: Arc<Mutex<VecDeque<AssertionBehavior>>>,
    delay: Arc<Mutex<Duration>>,
    requests: Arc<Mutex<Vec<AssertionRequest>>>,
}

impl MockAuthenticator {
    /// Authenticator answering with `credential`.
    pub fn new(credential: MockCredential) -> Self {
        Self {
            credential,
            secure_context: Arc::new(AtomicBool::new(true)),
            available: Arc::new(AtomicBool::new(true)),
            counter: Arc::new(AtomicU32::new(0)),
            counter_frozen: Arc::new(AtomicBool::new(false)),
            script: Arc::default(),
            delay: Arc::default(),
            requests: Arc::default(),
        }
    }

    /// Credential this authenticator answers with.
    pub fn credential(&self) -> &MockCredential {
        &self.credential
    }

    /// Toggle the secure-context check.
    pub fn set_secure_context(&self, secure: bool) {
        self.secure_context.store(secure, Ordering::SeqCst);
    }

    /// Toggle authenticator availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Stop incrementing the signature counter (cloned authenticator)
    pub fn freeze_counter(&self, frozen: bool) {
        self.counter_frozen.store(frozen, Ordering::SeqCst);
    }

    /// Set the signature counter.
    pub fn set_counter(&self, value: u32) {
        self.counter.store(value, Ordering::SeqCst);
    }

    /// Time the simulated user takes at the prompt
    pub fn set_prompt_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Queue a behavior for the next call; unqueued calls succeed
    pub fn push_behavior(&self, behavior: AssertionBehavior) {
        self.script.lock().push_back(behavior);
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<AssertionRequest> {
        self.requests.lock().clone()
    }

    fn next_counter(&self) -> u32 {
        if self.counter_frozen.load(Ordering::SeqCst) {
            self.counter.load(Ordering::SeqCst)
        } else {
            self.counter.fetch_add(1, Ordering::SeqCst) + 1
        }
    }
}

#[async_trait]
impl PlatformAuthenticatorEffects for MockAuthenticator {
    async fn is_secure_context(&self) -> bool {
        self.secure_context.load(Ordering::SeqCst)
    }

    async fn is_platform_authenticator_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get_assertion(
        &self,
        request: AssertionRequest,
    ) -> Result<AuthenticatorAssertion, AuthenticatorError> {
        self.requests.lock().push(request.clone());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let behavior = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(AssertionBehavior::Succeed);

        let mut flags = FLAG_USER_PRESENT | FLAG_USER_VERIFIED;
        let mut challenge = request.challenge.clone();
        let mut credential = self.credential.clone();
        match behavior {
            AssertionBehavior::Fail(err) => return Err(err),
            AssertionBehavior::Succeed => {}
            AssertionBehavior::PresenceOnly => flags = FLAG_USER_PRESENT,
            AssertionBehavior::WrongChallenge => challenge.reverse(),
            AssertionBehavior::ForeignCredential => credential = MockCredential::new(0xEE),
        }

        let rp_id_hash: [u8; 32] = Sha256::digest(request.rp_id.as_bytes()).into();
        let authenticator_data = encode_authenticator_data(&rp_id_hash, flags, self.next_counter());
        let client_data_json = serde_json::json!({
            "type": "webauthn.get",
            "challenge": codec::encode_b64url(&challenge),
            "origin": format!("https://{}", request.rp_id),
        })
        .to_string()
        .into_bytes();
        let signature = credential.sign(&authenticator_data, &Sha256::digest(&client_data_json));

        Ok(AuthenticatorAssertion {
            credential_id: credential.id,
            authenticator_data,
            client_data_json,
            signature,
        })
    }
}
