//! Presence Handshake - Sequential Multi-Phase Verification
//!
//! **Purpose**: prove live presence through three ordered biometric phases
//! and a cohesion step, all inside a hard time ceiling.
//!
//! ```text
//! IDLE -> PHASE_1_VISUAL_LIVENESS -> PHASE_2_TACTILE_IDENTITY
//!      -> PHASE_3_VITAL_PULSE -> COHESION_VERIFY -> SUCCESS | FAILED
//! ```
//!
//! # Components
//!
//! - `SequentialHandshake`: the engine; one active session at a time
//! - `PhaseSensors` / `CohesionVerifier`: seams to the external sensors and
//!   to the final verification
//! - `capture`: opaque capture types, acceptance thresholds, and the
//!   zeroizing buffer that holds captures while a session runs
//! - `ProofBackedSensors` / `ProofCohesionVerifier`: phase 2 via the platform
//!   authenticator and proof verification at the cohesion step
//!
//! # Guarantees
//!
//! - Phases run strictly in order; a failed phase ends the session
//! - The ceiling is checked at every boundary and bounds every step
//! - A second `start()` during an active session is rejected and leaves the
//!   active session untouched
//! - Failed sessions keep codes and timings only; captures are flushed

#![forbid(unsafe_code)]

pub mod capture;
pub mod engine;
pub mod proof_bridge;
pub mod sensors;
pub mod state;

pub use capture::{CaptureBuffer, TactileCapture, VisualCapture, VitalCapture};
pub use engine::{HandshakeReport, SequentialHandshake, StartError};
pub use proof_bridge::{ProofBackedSensors, ProofCohesionVerifier};
pub use sensors::{
    CohesionFault, CohesionInput, CohesionOutcome, CohesionVerifier, LocalCohesionVerifier,
    PhaseSensors, SensorFault,
};
pub use state::{
    HandshakeFailure, HandshakePhase, HandshakeSession, PhaseResult, PhaseStatus, Transition,
};
