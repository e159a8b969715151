//! Phase captures and their validation
//!
//! Captures are the opaque results returned by phase sensors. They live only
//! inside a running handshake: the engine holds them in a `CaptureBuffer`
//! that is flushed (and zeroized) as soon as the session fails, and they are
//! moved into the cohesion verifier on the success path. Session records
//! never hold capture data.

use presence_core::{CredentialId, PresenceProof, StatusCode};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Exact number of points in a valid face mesh
pub const FACE_MESH_POINTS: u32 = 127;
/// Minimum liveness score for phase 1
pub const MIN_LIVENESS_SCORE: f64 = 0.99;
/// Minimum fingerprint match confidence for phase 2
pub const MIN_FINGERPRINT_CONFIDENCE: f64 = 0.95;
/// Plausible heart-rate range for phase 3
pub const HEARTBEAT_BPM_RANGE: std::ops::RangeInclusive<u32> = 40..=200;

/// Phase 1 result: face mesh and liveness.
#[derive(Debug, Clone, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct VisualCapture {
    /// Face mesh point count
    pub mesh_points: u32,
    /// Liveness score in 0..=1
    pub liveness_score: f64,
    /// Subdermal blood flow observed
    pub blood_flow_detected: bool,
    /// Digest of the captured frame, for the cohesion step
    pub frame_digest: Vec<u8>,
}

/// Phase 2 result: fingerprint match, optionally backed by a presence proof.
#[derive(Debug, Clone, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct TactileCapture {
    /// Sensor reported a match
    pub fingerprint_matched: bool,
    /// Match confidence in 0..=1
    pub match_confidence: f64,
    /// Credential behind a proof-backed match
    #[zeroize(skip)]
    pub credential_id: Option<CredentialId>,
    /// Signed assertion when the match was performed by a platform authenticator
    #[zeroize(skip)]
    pub proof: Option<PresenceProof>,
}

/// Phase 3 result: heartbeat and voice.
#[derive(Debug, Clone, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct VitalCapture {
    /// Pulse observed
    pub pulse_detected: bool,
    /// Heart rate
    pub heartbeat_bpm: u32,
    /// Voice sample captured
    pub voice_detected: bool,
    /// Spectral hash of the voice sample
    pub voice_spectral_hash: Vec<u8>,
}

/// Why a capture was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRejection {
    /// Phase sub-code
    pub code: StatusCode,
    /// Hardware rather than user failure
    pub hardware_error: bool,
    /// Log message
    pub message: String,
}

impl CaptureRejection {
    fn new(code: StatusCode, hardware_error: bool, message: String) -> Self {
        Self {
            code,
            hardware_error,
            message,
        }
    }
}

/// Phase 1 acceptance.
pub fn validate_visual(capture: &VisualCapture) -> Result<(), CaptureRejection> {
    if capture.mesh_points != FACE_MESH_POINTS {
        return Err(CaptureRejection::new(
            StatusCode::FaceNotDetected,
            false,
            format!(
                "invalid mesh points: expected {FACE_MESH_POINTS}, got {}",
                capture.mesh_points
            ),
        ));
    }
    if !capture.blood_flow_detected || capture.liveness_score < MIN_LIVENESS_SCORE {
        return Err(CaptureRejection::new(
            StatusCode::LivenessNotDetected,
            false,
            format!(
                "liveness score too low: {:.3} (required {MIN_LIVENESS_SCORE})",
                capture.liveness_score
            ),
        ));
    }
    Ok(())
}

/// Phase 2 acceptance.
pub fn validate_tactile(capture: &TactileCapture) -> Result<(), CaptureRejection> {
    if !capture.fingerprint_matched || capture.match_confidence < MIN_FINGERPRINT_CONFIDENCE {
        return Err(CaptureRejection::new(
            StatusCode::FingerprintMismatch,
            false,
            format!(
                "fingerprint match confidence too low: {:.3} (required {MIN_FINGERPRINT_CONFIDENCE})",
                capture.match_confidence
            ),
        ));
    }
    Ok(())
}

/// Phase 3 acceptance. Failures here usually mean a sensor problem, so they
/// carry the hardware flag.
pub fn validate_vital(capture: &VitalCapture) -> Result<(), CaptureRejection> {
    if !capture.pulse_detected || !HEARTBEAT_BPM_RANGE.contains(&capture.heartbeat_bpm) {
        return Err(CaptureRejection::new(
            StatusCode::HeartbeatNotDetected,
            true,
            format!(
                "invalid heartbeat: {} BPM (expected {}-{})",
                capture.heartbeat_bpm,
                HEARTBEAT_BPM_RANGE.start(),
                HEARTBEAT_BPM_RANGE.end()
            ),
        ));
    }
    if !capture.voice_detected || capture.voice_spectral_hash.is_empty() {
        return Err(CaptureRejection::new(
            StatusCode::VoiceCaptureFailed,
            true,
            "voice spectral resonance not captured".to_string(),
        ));
    }
    Ok(())
}

/// Captures held while a handshake runs.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    /// Phase 1 capture
    pub visual: Option<VisualCapture>,
    /// Phase 2 capture
    pub tactile: Option<TactileCapture>,
    /// Phase 3 capture
    pub vital: Option<VitalCapture>,
}

impl CaptureBuffer {
    /// Zeroize and drop every capture.
    pub fn flush(&mut self) {
        if let Some(mut visual) = self.visual.take() {
            visual.zeroize();
        }
        if let Some(mut tactile) = self.tactile.take() {
            tactile.zeroize();
        }
        if let Some(mut vital) = self.vital.take() {
            vital.zeroize();
        }
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.visual.is_none() && self.tactile.is_none() && self.vital.is_none()
    }

    /// Move all three captures out, if complete.
    pub fn take_complete(&mut self) -> Option<(VisualCapture, TactileCapture, VitalCapture)> {
        if self.visual.is_some() && self.tactile.is_some() && self.vital.is_some() {
            Some((self.visual.take()?, self.tactile.take()?, self.vital.take()?))
        } else {
            None
        }
    }
}

impl Drop for CaptureBuffer {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visual() -> VisualCapture {
        VisualCapture {
            mesh_points: 127,
            liveness_score: 0.995,
            blood_flow_detected: true,
            frame_digest: vec![7; 32],
        }
    }

    fn vital() -> VitalCapture {
        VitalCapture {
            pulse_detected: true,
            heartbeat_bpm: 72,
            voice_detected: true,
            voice_spectral_hash: vec![1, 2, 3],
        }
    }

    #[test]
    fn visual_thresholds() {
        assert!(validate_visual(&visual()).is_ok());

        let mut c = visual();
        c.mesh_points = 126;
        assert_eq!(validate_visual(&c).unwrap_err().code, StatusCode::FaceNotDetected);

        let mut c = visual();
        c.liveness_score = 0.98;
        assert_eq!(
            validate_visual(&c).unwrap_err().code,
            StatusCode::LivenessNotDetected
        );

        let mut c = visual();
        c.blood_flow_detected = false;
        assert!(!validate_visual(&c).unwrap_err().hardware_error);
    }

    #[test]
    fn tactile_threshold() {
        let mut c = TactileCapture {
            fingerprint_matched: true,
            match_confidence: 0.95,
            credential_id: None,
            proof: None,
        };
        assert!(validate_tactile(&c).is_ok());
        c.match_confidence = 0.949;
        assert_eq!(
            validate_tactile(&c).unwrap_err().code,
            StatusCode::FingerprintMismatch
        );
    }

    #[test]
    fn vital_failures_carry_hardware_flag() {
        assert!(validate_vital(&vital()).is_ok());

        let mut c = vital();
        c.heartbeat_bpm = 201;
        let err = validate_vital(&c).unwrap_err();
        assert_eq!(err.code, StatusCode::HeartbeatNotDetected);
        assert!(err.hardware_error);

        let mut c = vital();
        c.voice_spectral_hash.clear();
        assert_eq!(
            validate_vital(&c).unwrap_err().code,
            StatusCode::VoiceCaptureFailed
        );
    }

    #[test]
    fn flush_empties_buffer() {
        let mut buffer = CaptureBuffer {
            visual: Some(visual()),
            tactile: None,
            vital: Some(vital()),
        };
        assert!(buffer.take_complete().is_none());
        assert!(!buffer.is_empty());
        buffer.flush();
        assert!(buffer.is_empty());
    }
}
