//! Handshake states, transitions and session records
//!
//! ```text
//! IDLE -> PHASE_1_VISUAL_LIVENESS -> PHASE_2_TACTILE_IDENTITY
//!      -> PHASE_3_VITAL_PULSE -> COHESION_VERIFY -> SUCCESS
//! any non-terminal state -> FAILED
//! ```
//!
//! `HandshakePhase::transition` is the only place a state changes; it refuses
//! skips, re-entry and any move out of a terminal state.

use presence_core::{PhysicalTime, SessionId, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandshakePhase {
    /// Not started
    #[serde(rename = "IDLE")]
    Idle,
    /// Phase 1
    #[serde(rename = "PHASE_1_VISUAL_LIVENESS")]
    VisualLiveness,
    /// Phase 2
    #[serde(rename = "PHASE_2_TACTILE_IDENTITY")]
    TactileIdentity,
    /// Phase 3
    #[serde(rename = "PHASE_3_VITAL_PULSE")]
    VitalPulse,
    /// Cross-phase verification
    #[serde(rename = "COHESION_VERIFY")]
    CohesionVerify,
    /// Terminal: verified
    #[serde(rename = "SUCCESS")]
    Success,
    /// Terminal: failed
    #[serde(rename = "FAILED")]
    Failed,
}

/// Event driving a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Leave IDLE and begin phase 1
    Begin,
    /// The current phase (or the verify step) succeeded within the ceiling
    Advance,
    /// The session failed
    Fail,
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition {event:?} from {from}")]
pub struct InvalidTransition {
    /// State the change was attempted from
    pub from: HandshakePhase,
    /// Refused event
    pub event: Transition,
}

impl HandshakePhase {
    /// The three biometric phases, in order.
    pub const PHASES: [HandshakePhase; 3] = [
        HandshakePhase::VisualLiveness,
        HandshakePhase::TactileIdentity,
        HandshakePhase::VitalPulse,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakePhase::Idle => "IDLE",
            HandshakePhase::VisualLiveness => "PHASE_1_VISUAL_LIVENESS",
            HandshakePhase::TactileIdentity => "PHASE_2_TACTILE_IDENTITY",
            HandshakePhase::VitalPulse => "PHASE_3_VITAL_PULSE",
            HandshakePhase::CohesionVerify => "COHESION_VERIFY",
            HandshakePhase::Success => "SUCCESS",
            HandshakePhase::Failed => "FAILED",
        }
    }

    /// 1-based number of a biometric phase.
    pub fn phase_number(&self) -> Option<usize> {
        match self {
            HandshakePhase::VisualLiveness => Some(1),
            HandshakePhase::TactileIdentity => Some(2),
            HandshakePhase::VitalPulse => Some(3),
            _ => None,
        }
    }

    /// `PHASE_n_FAILED` for a biometric phase.
    pub fn failure_code(&self) -> Option<StatusCode> {
        match self {
            HandshakePhase::VisualLiveness => Some(StatusCode::Phase1Failed),
            HandshakePhase::TactileIdentity => Some(StatusCode::Phase2Failed),
            HandshakePhase::VitalPulse => Some(StatusCode::Phase3Failed),
            _ => None,
        }
    }

    /// SUCCESS or FAILED.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakePhase::Success | HandshakePhase::Failed)
    }

    /// Apply `event`, refusing anything but the strict forward order.
    pub fn transition(self, event: Transition) -> Result<HandshakePhase, InvalidTransition> {
        use HandshakePhase::*;
        let next = match (self, event) {
            (Idle, Transition::Begin) => VisualLiveness,
            (VisualLiveness, Transition::Advance) => TactileIdentity,
            (TactileIdentity, Transition::Advance) => VitalPulse,
            (VitalPulse, Transition::Advance) => CohesionVerify,
            (CohesionVerify, Transition::Advance) => Success,
            (from, Transition::Fail) if !from.is_terminal() => Failed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-phase status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    /// Phase completed and passed validation
    Complete,
    /// Phase failed
    Failed,
}

/// Outcome of one biometric phase. Holds timing and codes only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Outcome
    pub status: PhaseStatus,
    /// Wall-clock start
    pub started_at: PhysicalTime,
    /// Offset of the phase start from the session start
    pub started_offset_ms: u64,
    /// Time spent in the phase
    pub duration_ms: u64,
    /// The phase ran past its soft budget
    pub over_budget: bool,
    /// Sub-code when failed
    pub error: Option<StatusCode>,
}

/// Structured failure record surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeFailure {
    /// `PHASE_n_FAILED`, `COHESION_TIMEOUT`, `SEQUENCE_INTERRUPTED` or a
    /// verify-step code
    pub code: StatusCode,
    /// Specific sub-code for phase failures (e.g. `FINGERPRINT_MISMATCH`)
    pub detail: Option<StatusCode>,
    /// Human-readable summary
    pub message: String,
    /// State the session was in when it failed
    pub phase: HandshakePhase,
    /// Phase-1 start to failure
    pub elapsed_ms: u64,
    /// Wall-clock failure time
    pub at: PhysicalTime,
    /// The failure points at a sensor rather than at the user
    pub hardware_error: bool,
    /// Sensor report, if any
    pub sensor_details: Option<String>,
}

impl HandshakeFailure {
    /// The most specific code available.
    pub fn specific_code(&self) -> StatusCode {
        self.detail.unwrap_or(self.code)
    }

    /// Whether the failure is a security violation (replay, counter
    /// regression, rejected or stale proof).
    pub fn is_security(&self) -> bool {
        self.code.is_security() || self.detail.is_some_and(|d| d.is_security())
    }
}

/// One attempt at proving presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeSession {
    /// Unique per run
    pub session_id: SessionId,
    /// Phase-1 start
    pub started_at: PhysicalTime,
    /// Current state
    pub state: HandshakePhase,
    /// Per-phase results in order
    pub phase_results: [Option<PhaseResult>; 3],
    /// Elapsed time at the terminal transition
    pub cohesion_elapsed_ms: Option<u64>,
    /// Set only on SUCCESS
    pub sovereign_auth_signal: bool,
    /// Failure record once FAILED
    pub failure: Option<HandshakeFailure>,
}

impl HandshakeSession {
    /// Fresh IDLE session.
    pub fn new(started_at: PhysicalTime) -> Self {
        Self {
            session_id: SessionId::new(),
            started_at,
            state: HandshakePhase::Idle,
            phase_results: [None, None, None],
            cohesion_elapsed_ms: None,
            sovereign_auth_signal: false,
            failure: None,
        }
    }

    /// Apply a transition to this session's state.
    pub fn apply(&mut self, event: Transition) -> Result<HandshakePhase, InvalidTransition> {
        self.state = self.state.transition(event)?;
        Ok(self.state)
    }

    /// Whether the session reached SUCCESS or FAILED.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Total duration, once terminal.
    pub fn total_duration_ms(&self) -> Option<u64> {
        self.cohesion_elapsed_ms
    }

    /// Record a phase outcome. `phase` must be a biometric phase.
    pub fn record_phase(&mut self, phase: HandshakePhase, result: PhaseResult) {
        if let Some(n) = phase.phase_number() {
            self.phase_results[n - 1] = Some(result);
        }
    }
}
