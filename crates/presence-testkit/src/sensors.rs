//! Scripted phase sensors and cohesion verifier
//!
//! Each step sleeps for its scripted delay (virtual under paused time) and
//! then yields its scripted outcome.

use crate::fixtures::{good_tactile, good_visual, good_vital};
use async_trait::async_trait;
use parking_lot::Mutex;
use presence_core::SessionId;
use presence_handshake::{
    CohesionFault, CohesionInput, CohesionOutcome, CohesionVerifier, HandshakePhase, PhaseSensors,
    SensorFault, TactileCapture, VisualCapture, VitalCapture,
};
use std::sync::Arc;
use std::time::Duration;

/// Scripted result of one step.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome<T, E = SensorFault> {
    /// Succeed with the value
    Ok(T),
    /// Fail with the fault
    Fault(E),
    /// Panic with the message
    Panic(String),
}

#[derive(Debug, Clone)]
struct Scripted<T, E = SensorFault> {
    delay: Duration,
    outcome: ScriptedOutcome<T, E>,
}

impl<T: Clone, E: Clone> Scripted<T, E> {
    async fn play(&self) -> Result<T, E> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            ScriptedOutcome::Ok(value) => Ok(value.clone()),
            ScriptedOutcome::Fault(err) => Err(err.clone()),
            ScriptedOutcome::Panic(message) => panic!("{message}"),
        }
    }
}

/// Phase sensors driven by a script.
#[derive(Debug, Clone)]
pub struct ScriptedSensors {
    visual: Arc<Mutex<Scripted<VisualCapture>>>,
    tactile: Arc<Mutex<Scripted<TactileCapture>>>,
    vital: Arc<Mutex<Scripted<VitalCapture>>>,
    calls: Arc<Mutex<Vec<(HandshakePhase, SessionId)>>>,
}

impl ScriptedSensors {
    /// All three phases pass after the given delays (milliseconds).
    pub fn passing(visual_ms: u64, tactile_ms: u64, vital_ms: u64) -> Self {
        Self {
            visual: Arc::new(Mutex::new(Scripted {
                delay: Duration::from_millis(visual_ms),
                outcome: ScriptedOutcome::Ok(good_visual()),
            })),
            tactile: Arc::new(Mutex::new(Scripted {
                delay: Duration::from_millis(tactile_ms),
                outcome: ScriptedOutcome::Ok(good_tactile()),
            })),
            vital: Arc::new(Mutex::new(Scripted {
                delay: Duration::from_millis(vital_ms),
                outcome: ScriptedOutcome::Ok(good_vital()),
            })),
            calls: Arc::default(),
        }
    }

    /// Script phase 1.
    pub fn with_visual(self, delay_ms: u64, outcome: ScriptedOutcome<VisualCapture>) -> Self {
        *self.visual.lock() = Scripted {
            delay: Duration::from_millis(delay_ms),
            outcome,
        };
        self
    }

    /// Script phase 2.
    pub fn with_tactile(self, delay_ms: u64, outcome: ScriptedOutcome<TactileCapture>) -> Self {
        *self.tactile.lock() = Scripted {
            delay: Duration::from_millis(delay_ms),
            outcome,
        };
        self
    }

    /// Script phase 3.
    pub fn with_vital(self, delay_ms: u64, outcome: ScriptedOutcome<VitalCapture>) -> Self {
        *self.vital.lock() = Scripted {
            delay: Duration::from_millis(delay_ms),
            outcome,
        };
        self
    }

    /// Phases invoked so far, in order
    pub fn calls(&self) -> Vec<HandshakePhase> {
        self.calls.lock().iter().map(|(phase, _)| *phase).collect()
    }

    /// Sessions that reached a sensor, in call order
    pub fn sessions(&self) -> Vec<SessionId> {
        self.calls.lock().iter().map(|(_, id)| *id).collect()
    }

    fn record(&self, phase: HandshakePhase, session: SessionId) {
        self.calls.lock().push((phase, session));
    }
}

#[async_trait]
impl PhaseSensors for ScriptedSensors {
    async fn capture_visual(&self, session: SessionId) -> Result<VisualCapture, SensorFault> {
        self.record(HandshakePhase::VisualLiveness, session);
        let script = self.visual.lock().clone();
        script.play().await
    }

    async fn capture_tactile(&self, session: SessionId) -> Result<TactileCapture, SensorFault> {
        self.record(HandshakePhase::TactileIdentity, session);
        let script = self.tactile.lock().clone();
        script.play().await
    }

    async fn capture_vital(&self, session: SessionId) -> Result<VitalCapture, SensorFault> {
        self.record(HandshakePhase::VitalPulse, session);
        let script = self.vital.lock().clone();
        script.play().await
    }
}

/// Cohesion verifier driven by a script.
#[derive(Debug, Clone)]
pub struct ScriptedCohesion {
    script: Arc<Mutex<Scripted<CohesionOutcome, CohesionFault>>>,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedCohesion {
    /// Accept after `delay_ms` with the given outcome
    pub fn accepting(delay_ms: u64, outcome: CohesionOutcome) -> Self {
        Self::new(delay_ms, ScriptedOutcome::Ok(outcome))
    }

    /// Run `outcome` after `delay_ms`.
    pub fn new(delay_ms: u64, outcome: ScriptedOutcome<CohesionOutcome, CohesionFault>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Scripted {
                delay: Duration::from_millis(delay_ms),
                outcome,
            })),
            calls: Arc::default(),
        }
    }

    /// Number of verify calls.
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl CohesionVerifier for ScriptedCohesion {
    async fn verify(&self, input: CohesionInput) -> Result<CohesionOutcome, CohesionFault> {
        *self.calls.lock() += 1;
        drop(input);
        let script = self.script.lock().clone();
        script.play().await
    }
}
