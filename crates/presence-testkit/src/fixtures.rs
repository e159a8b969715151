//! Shared fixtures

use presence_core::config::PresenceConfig;
use presence_handshake::{TactileCapture, VisualCapture, VitalCapture};

/// Configuration with cheap key derivation.
pub fn test_config() -> PresenceConfig {
    PresenceConfig::for_testing()
}

/// Phase 1 capture that passes validation
pub fn good_visual() -> VisualCapture {
    VisualCapture {
        mesh_points: 127,
        liveness_score: 0.995,
        blood_flow_detected: true,
        frame_digest: vec![0xAB; 32],
    }
}

/// Phase 2 capture that passes validation
pub fn good_tactile() -> TactileCapture {
    TactileCapture {
        fingerprint_matched: true,
        match_confidence: 0.97,
        credential_id: None,
        proof: None,
    }
}

/// Phase 3 capture that passes validation
pub fn good_vital() -> VitalCapture {
    VitalCapture {
        pulse_detected: true,
        heartbeat_bpm: 72,
        voice_detected: true,
        voice_spectral_hash: vec![0x5A; 16],
    }
}

/// Phase 2 capture that fails with `FINGERPRINT_MISMATCH`
pub fn mismatched_tactile() -> TactileCapture {
    TactileCapture {
        fingerprint_matched: false,
        match_confidence: 0.41,
        credential_id: None,
        proof: None,
    }
}
