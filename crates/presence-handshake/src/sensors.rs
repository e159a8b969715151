//! Sensor and verifier seams
//!
//! The biometric sensing and matching algorithms are external. The engine
//! sees each phase as one awaited call returning an opaque capture or a
//! fault, and the cohesion step as one awaited call over all three captures.

use crate::capture::{TactileCapture, VisualCapture, VitalCapture};
use async_trait::async_trait;
use presence_core::{CredentialId, IdentityHash, SessionId, StatusCode};
use presence_proof::ProofError;

/// Sensor-level failure of a phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorFault {
    /// Camera access refused
    #[error("camera permission denied")]
    CameraPermissionDenied,
    /// No usable fingerprint sensor
    #[error("fingerprint sensor unavailable")]
    FingerprintSensorUnavailable,
    /// Sensor crashed or misreported
    #[error("sensor hardware error: {detail}")]
    Hardware {
        /// Sensor report
        detail: String,
    },
    /// User or OS dismissed the capture
    #[error("capture cancelled")]
    Cancelled,
    /// The phase was backed by a presence proof that could not be produced
    #[error("presence proof: {0}")]
    Proof(#[from] ProofError),
}

impl SensorFault {
    /// Sub-code recorded alongside `PHASE_n_FAILED`.
    pub fn code(&self) -> StatusCode {
        match self {
            SensorFault::CameraPermissionDenied => StatusCode::CameraPermissionDenied,
            SensorFault::FingerprintSensorUnavailable => StatusCode::FingerprintSensorUnavailable,
            SensorFault::Hardware { .. } => StatusCode::SensorHardwareError,
            SensorFault::Cancelled => StatusCode::Cancelled,
            SensorFault::Proof(e) => e.code(),
        }
    }

    /// Whether the fault points at hardware rather than the user.
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            SensorFault::FingerprintSensorUnavailable | SensorFault::Hardware { .. }
        ) || matches!(self, SensorFault::Proof(ProofError::AuthenticatorFailure { .. }))
    }
}

/// The three biometric phase sensors.
#[async_trait]
pub trait PhaseSensors: Send + Sync {
    /// Phase 1: face mesh and liveness
    async fn capture_visual(&self, session: SessionId) -> Result<VisualCapture, SensorFault>;

    /// Phase 2: fingerprint / platform authenticator
    async fn capture_tactile(&self, session: SessionId) -> Result<TactileCapture, SensorFault>;

    /// Phase 3: heartbeat and voice
    async fn capture_vital(&self, session: SessionId) -> Result<VitalCapture, SensorFault>;
}

/// Everything the cohesion step sees. Moved in and dropped (zeroized) after.
#[derive(Debug)]
pub struct CohesionInput {
    /// Session being verified
    pub session_id: SessionId,
    /// Phase 1 capture
    pub visual: VisualCapture,
    /// Phase 2 capture
    pub tactile: TactileCapture,
    /// Phase 3 capture
    pub vital: VitalCapture,
}

/// Successful cohesion verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CohesionOutcome {
    /// Identity the verifier associates with this presence, when known
    pub identity_hash: Option<IdentityHash>,
    /// Credential that proved presence
    pub credential_id: Option<CredentialId>,
}

/// Cohesion verification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CohesionFault {
    /// Required evidence missing from the captures
    #[error("incomplete captures: {reason}")]
    Incomplete {
        /// Detail
        reason: String,
    },
    /// Proof verification failed
    #[error("presence proof: {0}")]
    Proof(#[from] ProofError),
}

impl CohesionFault {
    /// Status code the session fails with.
    pub fn code(&self) -> StatusCode {
        match self {
            CohesionFault::Incomplete { .. } => StatusCode::BufferFlushRequired,
            CohesionFault::Proof(e) => e.code(),
        }
    }
}

/// Final verification over all three captures.
#[async_trait]
pub trait CohesionVerifier: Send + Sync {
    async fn verify(&self, input: CohesionInput) -> Result<CohesionOutcome, CohesionFault>;
}

/// Cohesion verifier for sensor-only deployments: the three validated
/// captures are the whole evidence.
#[derive(Debug, Clone, Default)]
pub struct LocalCohesionVerifier;

#[async_trait]
impl CohesionVerifier for LocalCohesionVerifier {
    async fn verify(&self, input: CohesionInput) -> Result<CohesionOutcome, CohesionFault> {
        if input.visual.frame_digest.is_empty() {
            return Err(CohesionFault::Incomplete {
                reason: "visual capture has no frame digest".to_string(),
            });
        }
        Ok(CohesionOutcome {
            identity_hash: None,
            credential_id: input.tactile.credential_id.clone(),
        })
    }
}
