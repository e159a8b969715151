//! Scripted sensors for exercising the handshake without hardware
//!
//! Each phase sleeps for its configured duration and returns a capture that
//! passes validation, unless a failure is injected for that phase.

use async_trait::async_trait;
use clap::ValueEnum;
use presence_core::{IdentityHash, SessionId};
use presence_handshake::{
    CohesionFault, CohesionInput, CohesionOutcome, CohesionVerifier, PhaseSensors, SensorFault,
    TactileCapture, VisualCapture, VitalCapture,
};
use std::time::Duration;

/// Failure to inject into a simulated handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InjectedFailure {
    /// Phase 1 sees no face (`FACE_NOT_DETECTED`)
    NoFace,
    /// Phase 1 camera access refused (`CAMERA_PERMISSION_DENIED`)
    CameraDenied,
    /// Phase 2 fingerprint does not match (`FINGERPRINT_MISMATCH`)
    Mismatch,
    /// Phase 3 finds no pulse (`HEARTBEAT_NOT_DETECTED`)
    NoPulse,
    /// Phase 3 sensor fails (`SENSOR_HARDWARE_ERROR`)
    Hardware,
}

/// Durations and injected failure of one simulated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationPlan {
    /// Phase 1 duration
    pub visual: Duration,
    /// Phase 2 duration
    pub tactile: Duration,
    /// Phase 3 duration
    pub vital: Duration,
    /// Cohesion verify duration
    pub verify: Duration,
    /// Failure to inject, if any
    pub failure: Option<InjectedFailure>,
}

/// Phase sensors that sleep for the planned durations.
#[derive(Debug, Clone)]
pub struct SimulatedSensors {
    plan: SimulationPlan,
}

impl SimulatedSensors {
    /// Sensors following `plan`.
    pub fn new(plan: SimulationPlan) -> Self {
        Self { plan }
    }

    fn injected(&self, failure: InjectedFailure) -> bool {
        self.plan.failure == Some(failure)
    }
}

#[async_trait]
impl PhaseSensors for SimulatedSensors {
    async fn capture_visual(&self, session: SessionId) -> Result<VisualCapture, SensorFault> {
        tokio::time::sleep(self.plan.visual).await;
        tracing::debug!(session_id = %session, "simulated visual capture");
        if self.injected(InjectedFailure::CameraDenied) {
            return Err(SensorFault::CameraPermissionDenied);
        }
        Ok(VisualCapture {
            mesh_points: if self.injected(InjectedFailure::NoFace) { 0 } else { 127 },
            liveness_score: 0.995,
            blood_flow_detected: true,
            frame_digest: vec![0x11; 32],
        })
    }

    async fn capture_tactile(&self, session: SessionId) -> Result<TactileCapture, SensorFault> {
        tokio::time::sleep(self.plan.tactile).await;
        tracing::debug!(session_id = %session, "simulated tactile capture");
        let matched = !self.injected(InjectedFailure::Mismatch);
        Ok(TactileCapture {
            fingerprint_matched: matched,
            match_confidence: if matched { 0.98 } else { 0.3 },
            credential_id: None,
            proof: None,
        })
    }

    async fn capture_vital(&self, session: SessionId) -> Result<VitalCapture, SensorFault> {
        tokio::time::sleep(self.plan.vital).await;
        tracing::debug!(session_id = %session, "simulated vital capture");
        if self.injected(InjectedFailure::Hardware) {
            return Err(SensorFault::Hardware {
                detail: "simulated microphone fault".to_string(),
            });
        }
        let pulse = !self.injected(InjectedFailure::NoPulse);
        Ok(VitalCapture {
            pulse_detected: pulse,
            heartbeat_bpm: if pulse { 68 } else { 0 },
            voice_detected: true,
            voice_spectral_hash: vec![0x22; 16],
        })
    }
}

/// Cohesion step that takes `verify` and reports a fixed identity.
#[derive(Debug, Clone)]
pub struct SimulatedCohesion {
    verify: Duration,
    identity: Option<IdentityHash>,
}

impl SimulatedCohesion {
    /// Verify step taking `verify` and reporting `identity`.
    pub fn new(verify: Duration, identity: Option<IdentityHash>) -> Self {
        Self { verify, identity }
    }
}

#[async_trait]
impl CohesionVerifier for SimulatedCohesion {
    async fn verify(&self, input: CohesionInput) -> Result<CohesionOutcome, CohesionFault> {
        tokio::time::sleep(self.verify).await;
        tracing::debug!(session_id = %input.session_id, "simulated cohesion verify");
        Ok(CohesionOutcome {
            identity_hash: self.identity.clone(),
            credential_id: None,
        })
    }
}
