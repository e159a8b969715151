//! Presence proof generator
//!
//! Wraps the platform authenticator. The generator never sees biometric
//! data: the authenticator matches on-device and hands back a signature over
//! the challenge.

use crate::error::ProofError;
use crate::replay::ReplayGuard;
use presence_core::config::ProofConfig;
use presence_core::effects::{
    AssertionRequest, AuthenticatorError, IdentityBackendEffects, PlatformAuthenticatorEffects,
    RandomEffects, TimeEffects, UserVerification,
};
use presence_core::{codec, CredentialId, PresenceProof, ProofId};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Length of locally generated challenges
pub const LOCAL_CHALLENGE_LEN: usize = 32;

/// Shortest backend challenge accepted before falling back to a local one
const MIN_BACKEND_CHALLENGE_LEN: usize = 16;

const ASSERTION_CLIENT_DATA_TYPE: &str = "webauthn.get";

#[derive(Deserialize)]
struct ClientData {
    #[serde(rename = "type")]
    kind: String,
    challenge: String,
}

/// Turns challenges into presence proofs.
#[derive(Clone)]
pub struct ProofGenerator {
    authenticator: Arc<dyn PlatformAuthenticatorEffects>,
    backend: Arc<dyn IdentityBackendEffects>,
    random: Arc<dyn RandomEffects>,
    time: Arc<dyn TimeEffects>,
    guard: Arc<ReplayGuard>,
    config: ProofConfig,
}

impl ProofGenerator {
    /// Generator registering the challenges it signs with `guard`, which
    /// must be the guard of the verifier that will check its proofs.
    pub fn new(
        authenticator: Arc<dyn PlatformAuthenticatorEffects>,
        backend: Arc<dyn IdentityBackendEffects>,
        random: Arc<dyn RandomEffects>,
        time: Arc<dyn TimeEffects>,
        guard: Arc<ReplayGuard>,
        config: ProofConfig,
    ) -> Self {
        Self {
            authenticator,
            backend,
            random,
            time,
            guard,
            config,
        }
    }

    /// Backend-issued challenge, or 32 local random bytes when the backend is
    /// unreachable or returns something too short to be a real challenge.
    pub async fn obtain_challenge(&self) -> Vec<u8> {
        match self.backend.issue_challenge().await {
            Ok(challenge) if challenge.len() >= MIN_BACKEND_CHALLENGE_LEN => challenge,
            Ok(challenge) => {
                tracing::warn!(
                    len = challenge.len(),
                    "backend challenge too short, using local challenge"
                );
                self.local_challenge().await
            }
            Err(e) => {
                tracing::debug!(error = %e, "backend challenge unavailable, using local challenge");
                self.local_challenge().await
            }
        }
    }

    async fn local_challenge(&self) -> Vec<u8> {
        self.random.random_bytes(LOCAL_CHALLENGE_LEN).await
    }

    /// Prompt the authenticator for a signature over `challenge`.
    ///
    /// `None` (or an empty slice) means no server challenge was supplied and
    /// a local one is generated. `allowed` restricts which credentials may
    /// answer; empty means any.
    pub async fn generate_proof(
        &self,
        challenge: Option<&[u8]>,
        allowed: &[CredentialId],
    ) -> Result<PresenceProof, ProofError> {
        if !self.authenticator.is_secure_context().await {
            return Err(ProofError::InsecureContext);
        }
        if !self.authenticator.is_platform_authenticator_available().await {
            return Err(ProofError::Unsupported);
        }

        let challenge = match challenge {
            Some(c) if !c.is_empty() => c.to_vec(),
            _ => self.local_challenge().await,
        };
        let issued_at = self.time.physical_time().await;

        let request = AssertionRequest {
            challenge: challenge.clone(),
            allow_credentials: allowed.to_vec(),
            rp_id: self.config.rp_id.clone(),
            timeout_ms: self.config.authenticator_timeout_ms,
            user_verification: UserVerification::Required,
        };

        let assertion = self
            .authenticator
            .get_assertion(request)
            .await
            .map_err(|e| match e {
                AuthenticatorError::Cancelled
                | AuthenticatorError::NotAllowed
                | AuthenticatorError::Timeout => ProofError::Cancelled,
                AuthenticatorError::Hardware { reason } => {
                    ProofError::AuthenticatorFailure { reason }
                }
            })?;

        if !allowed.is_empty() && !allowed.contains(&assertion.credential_id) {
            return Err(ProofError::MalformedAssertion {
                reason: "credential not in allow list".to_string(),
            });
        }
        if !assertion.user_verified() {
            return Err(ProofError::UserNotVerified);
        }
        let counter = assertion
            .counter()
            .ok_or_else(|| ProofError::MalformedAssertion {
                reason: "authenticator data too short".to_string(),
            })?;

        let client_data: ClientData = serde_json::from_slice(&assertion.client_data_json)
            .map_err(|e| ProofError::MalformedAssertion {
                reason: format!("client data: {e}"),
            })?;
        if client_data.kind != ASSERTION_CLIENT_DATA_TYPE {
            return Err(ProofError::MalformedAssertion {
                reason: format!("unexpected client data type '{}'", client_data.kind),
            });
        }
        if codec::decode_b64url(&client_data.challenge).ok().as_deref() != Some(&challenge[..]) {
            return Err(ProofError::MalformedAssertion {
                reason: "client data challenge does not match request".to_string(),
            });
        }

        // issue time is taken before the prompt; registration waits for a
        // user-verified assertion over the challenge
        self.guard.register_issued(&challenge, issued_at);

        let proof = PresenceProof {
            proof_id: ProofId::new(),
            challenge,
            signature: assertion.signature,
            client_data_digest: Sha256::digest(&assertion.client_data_json).to_vec(),
            authenticator_data: assertion.authenticator_data,
            credential_id: assertion.credential_id,
            counter,
            created_at: self.time.physical_time().await,
        };

        tracing::debug!(
            proof_id = %proof.proof_id,
            credential = %proof.credential_id,
            counter,
            "presence proof generated"
        );
        Ok(proof)
    }

    /// Fetch a challenge (with local fallback) and generate a proof over it.
    pub async fn generate_with_backend_challenge(
        &self,
        allowed: &[CredentialId],
    ) -> Result<PresenceProof, ProofError> {
        if !self.authenticator.is_secure_context().await {
            return Err(ProofError::InsecureContext);
        }
        let challenge = self.obtain_challenge().await;
        self.generate_proof(Some(&challenge), allowed).await
    }
}
