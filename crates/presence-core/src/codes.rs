//! Stable status codes surfaced to callers.
//!
//! The string form of every code is part of the external contract: UI layers
//! and connected applications match on it, so variants may be added but never
//! renamed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error taxonomy used to decide how a failure is recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Secure context or authenticator support missing; not retried automatically
    Environment,
    /// Sensor or matching failure; recovered by starting a fresh session
    Biometric,
    /// Cohesion budget exceeded; recovered by starting a fresh session
    Timing,
    /// Replay, counter regression or rejected assertion; locks the session
    Security,
    /// Backend or storage unreachable; defaults to "not verified"
    Infrastructure,
    /// Session ordering violations (double start, interruption)
    Sequence,
}

/// Stable status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Handshake exceeded the cohesion ceiling
    CohesionTimeout,
    /// Phase 1 (visual liveness) failed
    #[serde(rename = "PHASE_1_FAILED")]
    Phase1Failed,
    /// Phase 2 (tactile identity) failed
    #[serde(rename = "PHASE_2_FAILED")]
    Phase2Failed,
    /// Phase 3 (vital pulse) failed
    #[serde(rename = "PHASE_3_FAILED")]
    Phase3Failed,
    /// Liveness score or blood flow below threshold
    LivenessNotDetected,
    /// No complete face mesh
    FaceNotDetected,
    /// Fingerprint did not match
    FingerprintMismatch,
    /// Sensor crashed or reported a fault
    SensorHardwareError,
    /// Camera access refused
    CameraPermissionDenied,
    /// No usable fingerprint sensor
    FingerprintSensorUnavailable,
    /// No voice capture
    VoiceCaptureFailed,
    /// No pulse in range
    HeartbeatNotDetected,
    /// Double start or cancelled session
    SequenceInterrupted,
    /// Captured evidence incomplete at verify
    BufferFlushRequired,
    /// Not a secure context
    InsecureContext,
    /// No platform authenticator
    Unsupported,
    /// Prompt dismissed by the user or OS
    Cancelled,
    /// Challenge already used or not issued here
    ReplayDetected,
    /// Signature counter went backwards
    CounterNotIncreasing,
    /// Backend refused the assertion
    AssertionRejected,
    /// Challenge older than the replay window
    ProofExpired,
    /// Backend unreachable
    BackendUnavailable,
}

const ALL_CODES: [StatusCode; 22] = [
    StatusCode::CohesionTimeout,
    StatusCode::Phase1Failed,
    StatusCode::Phase2Failed,
    StatusCode::Phase3Failed,
    StatusCode::LivenessNotDetected,
    StatusCode::FaceNotDetected,
    StatusCode::FingerprintMismatch,
    StatusCode::SensorHardwareError,
    StatusCode::CameraPermissionDenied,
    StatusCode::FingerprintSensorUnavailable,
    StatusCode::VoiceCaptureFailed,
    StatusCode::HeartbeatNotDetected,
    StatusCode::SequenceInterrupted,
    StatusCode::BufferFlushRequired,
    StatusCode::InsecureContext,
    StatusCode::Unsupported,
    StatusCode::Cancelled,
    StatusCode::ReplayDetected,
    StatusCode::CounterNotIncreasing,
    StatusCode::AssertionRejected,
    StatusCode::ProofExpired,
    StatusCode::BackendUnavailable,
];

impl StatusCode {
    /// Wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::CohesionTimeout => "COHESION_TIMEOUT",
            StatusCode::Phase1Failed => "PHASE_1_FAILED",
            StatusCode::Phase2Failed => "PHASE_2_FAILED",
            StatusCode::Phase3Failed => "PHASE_3_FAILED",
            StatusCode::LivenessNotDetected => "LIVENESS_NOT_DETECTED",
            StatusCode::FaceNotDetected => "FACE_NOT_DETECTED",
            StatusCode::FingerprintMismatch => "FINGERPRINT_MISMATCH",
            StatusCode::SensorHardwareError => "SENSOR_HARDWARE_ERROR",
            StatusCode::CameraPermissionDenied => "CAMERA_PERMISSION_DENIED",
            StatusCode::FingerprintSensorUnavailable => "FINGERPRINT_SENSOR_UNAVAILABLE",
            StatusCode::VoiceCaptureFailed => "VOICE_CAPTURE_FAILED",
            StatusCode::HeartbeatNotDetected => "HEARTBEAT_NOT_DETECTED",
            StatusCode::SequenceInterrupted => "SEQUENCE_INTERRUPTED",
            StatusCode::BufferFlushRequired => "BUFFER_FLUSH_REQUIRED",
            StatusCode::InsecureContext => "INSECURE_CONTEXT",
            StatusCode::Unsupported => "UNSUPPORTED",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::ReplayDetected => "REPLAY_DETECTED",
            StatusCode::CounterNotIncreasing => "COUNTER_NOT_INCREASING",
            StatusCode::AssertionRejected => "ASSERTION_REJECTED",
            StatusCode::ProofExpired => "PROOF_EXPIRED",
            StatusCode::BackendUnavailable => "BACKEND_UNAVAILABLE",
        }
    }

    /// Recovery category of the code.
    pub fn category(&self) -> ErrorCategory {
        match self {
            StatusCode::InsecureContext | StatusCode::Unsupported => ErrorCategory::Environment,
            StatusCode::CohesionTimeout => ErrorCategory::Timing,
            StatusCode::BackendUnavailable => ErrorCategory::Infrastructure,
            StatusCode::ReplayDetected
            | StatusCode::CounterNotIncreasing
            | StatusCode::AssertionRejected
            | StatusCode::ProofExpired => ErrorCategory::Security,
            StatusCode::SequenceInterrupted
            | StatusCode::BufferFlushRequired
            | StatusCode::Cancelled => ErrorCategory::Sequence,
            StatusCode::Phase1Failed
            | StatusCode::Phase2Failed
            | StatusCode::Phase3Failed
            | StatusCode::LivenessNotDetected
            | StatusCode::FaceNotDetected
            | StatusCode::FingerprintMismatch
            | StatusCode::SensorHardwareError
            | StatusCode::CameraPermissionDenied
            | StatusCode::FingerprintSensorUnavailable
            | StatusCode::VoiceCaptureFailed
            | StatusCode::HeartbeatNotDetected => ErrorCategory::Biometric,
        }
    }

    /// Whether the code should lock the session rather than offer a retry.
    pub fn is_security(&self) -> bool {
        self.category() == ErrorCategory::Security
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status code string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status code: {0}")]
pub struct UnknownStatusCode(pub String);

impl FromStr for StatusCode {
    type Err = UnknownStatusCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_CODES
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownStatusCode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_form_matches_as_str() {
        for code in ALL_CODES {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
            assert_eq!(code.as_str().parse::<StatusCode>().unwrap(), code);
        }
    }

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(
            StatusCode::InsecureContext.category(),
            ErrorCategory::Environment
        );
        assert_eq!(StatusCode::CohesionTimeout.category(), ErrorCategory::Timing);
        assert_eq!(
            StatusCode::FingerprintMismatch.category(),
            ErrorCategory::Biometric
        );
        assert!(StatusCode::ReplayDetected.is_security());
        assert!(!StatusCode::Cancelled.is_security());
        assert_eq!(
            StatusCode::BackendUnavailable.category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!("NOT_A_CODE".parse::<StatusCode>().is_err());
    }
}
