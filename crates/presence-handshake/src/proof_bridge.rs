//! Presence-proof backed phase 2 and cohesion step
//!
//! `ProofBackedSensors` replaces the tactile sensor with the platform
//! authenticator: the fingerprint match happens on-device and the phase
//! yields a signed proof instead of a template score. `ProofCohesionVerifier`
//! then consumes that proof at the cohesion step (freshness, replay guard,
//! backend signature check).

use crate::capture::{TactileCapture, VisualCapture, VitalCapture};
use crate::sensors::{
    CohesionFault, CohesionInput, CohesionOutcome, CohesionVerifier, PhaseSensors, SensorFault,
};
use async_trait::async_trait;
use presence_core::{CredentialId, SessionId};
use presence_proof::{ProofGenerator, ProofVerifier};
use std::sync::Arc;

/// Phase sensors whose tactile phase is a platform-authenticator assertion.
pub struct ProofBackedSensors {
    inner: Arc<dyn PhaseSensors>,
    generator: ProofGenerator,
    allowed: Vec<CredentialId>,
}

impl ProofBackedSensors {
    /// Wrap `inner`; visual and vital phases still go to it.
    pub fn new(
        inner: Arc<dyn PhaseSensors>,
        generator: ProofGenerator,
        allowed: Vec<CredentialId>,
    ) -> Self {
        Self {
            inner,
            generator,
            allowed,
        }
    }
}

#[async_trait]
impl PhaseSensors for ProofBackedSensors {
    async fn capture_visual(&self, session: SessionId) -> Result<VisualCapture, SensorFault> {
        self.inner.capture_visual(session).await
    }

    async fn capture_tactile(&self, session: SessionId) -> Result<TactileCapture, SensorFault> {
        let proof = self
            .generator
            .generate_with_backend_challenge(&self.allowed)
            .await?;
        tracing::debug!(session_id = %session, proof_id = %proof.proof_id, "tactile phase backed by proof");
        Ok(TactileCapture {
            fingerprint_matched: true,
            match_confidence: 1.0,
            credential_id: Some(proof.credential_id.clone()),
            proof: Some(proof),
        })
    }

    async fn capture_vital(&self, session: SessionId) -> Result<VitalCapture, SensorFault> {
        self.inner.capture_vital(session).await
    }
}

/// Cohesion verifier that requires and consumes the phase-2 proof.
#[derive(Clone)]
pub struct ProofCohesionVerifier {
    verifier: ProofVerifier,
}

impl ProofCohesionVerifier {
    /// Cohesion step backed by `verifier`.
    pub fn new(verifier: ProofVerifier) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl CohesionVerifier for ProofCohesionVerifier {
    async fn verify(&self, mut input: CohesionInput) -> Result<CohesionOutcome, CohesionFault> {
        let Some(proof) = input.tactile.proof.take() else {
            return Err(CohesionFault::Incomplete {
                reason: "tactile phase produced no presence proof".to_string(),
            });
        };
        drop(input);

        let verified = self.verifier.verify(proof).await?;
        Ok(CohesionOutcome {
            identity_hash: verified.identity_hash,
            credential_id: Some(verified.credential_id),
        })
    }
}
