//! Presence proof verification
//!
//! Order of checks: replay guard (issue-time freshness, single use, counter),
//! backend signature check, then commit to the replay guard. A replayed proof
//! is rejected before reaching the backend, and nothing is recorded for a
//! proof the backend did not accept.

use crate::error::ProofError;
use crate::replay::ReplayGuard;
use presence_core::config::ProofConfig;
use presence_core::effects::{IdentityBackendEffects, TimeEffects};
use presence_core::{CredentialId, IdentityHash, PresenceProof, ProofId};
use std::sync::Arc;

/// Outcome of a successful verification. Carries no proof material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPresence {
    /// Nonce of the verified proof
    pub proof_id: ProofId,
    /// Credential that produced the assertion
    pub credential_id: CredentialId,
    /// Identity the backend binds to the credential, if known
    pub identity_hash: Option<IdentityHash>,
}

/// Verifies presence proofs exactly once.
#[derive(Clone)]
pub struct ProofVerifier {
    guard: Arc<ReplayGuard>,
    backend: Arc<dyn IdentityBackendEffects>,
    time: Arc<dyn TimeEffects>,
}

impl ProofVerifier {
    /// Verifier with a fresh replay guard. Generators feeding it must share
    /// the guard (see [`ProofVerifier::guard`]).
    pub fn new(
        backend: Arc<dyn IdentityBackendEffects>,
        time: Arc<dyn TimeEffects>,
        config: &ProofConfig,
    ) -> Self {
        Self {
            guard: Arc::new(ReplayGuard::new(config.replay_window())),
            backend,
            time,
        }
    }

    /// Replay guard shared by clones of this verifier and by the generators
    /// issuing its challenges.
    pub fn guard(&self) -> &Arc<ReplayGuard> {
        &self.guard
    }

    /// Verify and consume `proof`. The proof is dropped on return.
    pub async fn verify(&self, proof: PresenceProof) -> Result<VerifiedPresence, ProofError> {
        let now = self.time.physical_time().await;
        self.guard.check(&proof, now)?;

        let verdict = self
            .backend
            .verify_assertion(&proof)
            .await
            .map_err(|e| {
                tracing::warn!(proof_id = %proof.proof_id, error = %e, "assertion check unreachable");
                ProofError::BackendUnavailable {
                    reason: e.to_string(),
                }
            })?;

        if !verdict.valid {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "signature verification failed".to_string());
            tracing::error!(proof_id = %proof.proof_id, reason = %reason, "assertion rejected");
            return Err(ProofError::Rejected { reason });
        }

        let now = self.time.physical_time().await;
        self.guard.commit(&proof, now)?;

        tracing::info!(
            proof_id = %proof.proof_id,
            credential = %proof.credential_id,
            "presence proof verified"
        );
        Ok(VerifiedPresence {
            proof_id: proof.proof_id,
            credential_id: proof.credential_id,
            identity_hash: verdict.identity_hash,
        })
    }
}
