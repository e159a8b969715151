//! Sequential handshake engine
//!
//! Drives the three biometric phases and the cohesion step in strict order
//! under a hard ceiling measured from phase-1 start. Each step is one awaited
//! call, bounded by the ceiling, raced against caller cancellation, and
//! guarded against panics. A step still outstanding when the ceiling passes
//! is dropped, so its result can never reach the session.
//!
//! Per-phase budgets are soft: overruns are logged and flagged on the phase
//! result, and only the ceiling fails a session.

use crate::capture::{
    validate_tactile, validate_visual, validate_vital, CaptureBuffer, CaptureRejection,
};
use crate::sensors::{CohesionInput, CohesionOutcome, CohesionVerifier, PhaseSensors, SensorFault};
use crate::state::{
    HandshakeFailure, HandshakePhase, HandshakeSession, PhaseResult, PhaseStatus, Transition,
};
use futures::FutureExt;
use parking_lot::Mutex;
use presence_core::config::HandshakeConfig;
use presence_core::effects::TimeEffects;
use presence_core::{PhysicalTime, SessionId, StatusCode};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Rejected `start()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    /// Another session is still running; it was left untouched
    #[error("handshake {active} already in progress")]
    SequenceInterrupted {
        /// Session still running
        active: SessionId,
    },
}

impl StartError {
    /// Status code for the refusal.
    pub fn code(&self) -> StatusCode {
        match self {
            StartError::SequenceInterrupted { .. } => StatusCode::SequenceInterrupted,
        }
    }
}

/// Terminal result of one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReport {
    /// Terminal session record (timings and codes only)
    pub session: HandshakeSession,
    /// Present on SUCCESS
    pub outcome: Option<CohesionOutcome>,
}

impl HandshakeReport {
    /// Session reached SUCCESS.
    pub fn is_success(&self) -> bool {
        self.session.state == HandshakePhase::Success
    }

    /// Failure record, if the session failed.
    pub fn failure(&self) -> Option<&HandshakeFailure> {
        self.session.failure.as_ref()
    }

    /// Phase-1 start to cohesion completion or failure.
    pub fn total_duration_ms(&self) -> u64 {
        self.session.cohesion_elapsed_ms.unwrap_or(0)
    }
}

struct ActiveSession {
    record: HandshakeSession,
    cancel: watch::Sender<bool>,
    clock: Instant,
}

#[derive(Default)]
struct SessionSlot {
    active: Option<ActiveSession>,
    last: Option<HandshakeSession>,
}

/// Owns the active-session slot for the duration of one run. If the run is
/// dropped before finishing, the session is recorded as interrupted.
struct ActiveGuard {
    slot: Arc<Mutex<SessionSlot>>,
    session_id: SessionId,
    finished: bool,
}

impl ActiveGuard {
    fn publish(&self, record: &HandshakeSession) {
        let mut slot = self.slot.lock();
        if let Some(active) = slot.active.as_mut() {
            if active.record.session_id == self.session_id {
                active.record = record.clone();
            }
        }
    }

    fn finish(mut self, record: HandshakeSession) {
        let mut slot = self.slot.lock();
        if slot
            .active
            .as_ref()
            .is_some_and(|a| a.record.session_id == self.session_id)
        {
            slot.active = None;
        }
        slot.last = Some(record);
        self.finished = true;
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut slot = self.slot.lock();
        let Some(active) = slot.active.take() else {
            return;
        };
        if active.record.session_id != self.session_id {
            slot.active = Some(active);
            return;
        }
        let mut record = active.record;
        let elapsed_ms = millis(active.clock.elapsed());
        let phase = record.state;
        if record.apply(Transition::Fail).is_ok() {
            record.cohesion_elapsed_ms = Some(elapsed_ms);
            record.failure = Some(HandshakeFailure {
                code: StatusCode::SequenceInterrupted,
                detail: None,
                message: "handshake abandoned before completion".to_string(),
                phase,
                elapsed_ms,
                at: record.started_at.plus_millis(elapsed_ms),
                hardware_error: false,
                sensor_details: None,
            });
        }
        tracing::warn!(session_id = %self.session_id, "handshake abandoned");
        slot.last = Some(record);
    }
}

enum Step<T> {
    Finished(T),
    Panicked(String),
    CeilingReached,
    Cancelled,
}

struct Run {
    session: HandshakeSession,
    guard: ActiveGuard,
    cancel: watch::Receiver<bool>,
    clock: Instant,
    deadline: Instant,
    buffer: CaptureBuffer,
}

impl Run {
    fn elapsed_ms(&self) -> u64 {
        millis(self.clock.elapsed())
    }

    fn at(&self, elapsed_ms: u64) -> PhysicalTime {
        self.session.started_at.plus_millis(elapsed_ms)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "sensor panicked".to_string()
    }
}

async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Await `fut` until it finishes, panics, passes `deadline`, or the caller
/// cancels. Whatever is still outstanding is dropped on return.
async fn bounded<F>(fut: F, deadline: Instant, cancel: &mut watch::Receiver<bool>) -> Step<F::Output>
where
    F: Future + Send,
{
    let guarded = AssertUnwindSafe(fut).catch_unwind();
    tokio::select! {
        biased;
        () = wait_for_cancel(cancel) => Step::Cancelled,
        res = tokio::time::timeout_at(deadline, guarded) => match res {
            Err(_) => Step::CeilingReached,
            Ok(Err(payload)) => Step::Panicked(panic_message(payload.as_ref())),
            Ok(Ok(out)) => Step::Finished(out),
        },
    }
}

/// The sequential handshake state machine.
#[derive(Clone)]
pub struct SequentialHandshake {
    sensors: Arc<dyn PhaseSensors>,
    verifier: Arc<dyn CohesionVerifier>,
    time: Arc<dyn TimeEffects>,
    config: HandshakeConfig,
    slot: Arc<Mutex<SessionSlot>>,
}

impl SequentialHandshake {
    /// Engine over the given sensors and cohesion step.
    pub fn new(
        sensors: Arc<dyn PhaseSensors>,
        verifier: Arc<dyn CohesionVerifier>,
        time: Arc<dyn TimeEffects>,
        config: HandshakeConfig,
    ) -> Self {
        Self {
            sensors,
            verifier,
            time,
            config,
            slot: Arc::new(Mutex::new(SessionSlot::default())),
        }
    }

    /// Snapshot of the active session, or of the last terminal one.
    pub fn session_state(&self) -> Option<HandshakeSession> {
        let slot = self.slot.lock();
        slot.active
            .as_ref()
            .map(|a| a.record.clone())
            .or_else(|| slot.last.clone())
    }

    /// Whether a non-terminal session exists.
    pub fn is_active(&self) -> bool {
        self.slot.lock().active.is_some()
    }

    /// Ask the active session to stop at its current step. Best effort: a
    /// biometric prompt already shown cannot be withdrawn.
    pub fn cancel(&self) -> bool {
        let slot = self.slot.lock();
        match &slot.active {
            Some(active) => {
                let _ = active.cancel.send(true);
                tracing::info!(session_id = %active.record.session_id, "handshake cancel requested");
                true
            }
            None => false,
        }
    }

    fn claim(&self, started_at: PhysicalTime) -> Result<Run, StartError> {
        let mut slot = self.slot.lock();
        if let Some(active) = &slot.active {
            tracing::warn!(
                active = %active.record.session_id,
                "start rejected: handshake already in progress"
            );
            return Err(StartError::SequenceInterrupted {
                active: active.record.session_id,
            });
        }

        let session = HandshakeSession::new(started_at);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let clock = Instant::now();
        slot.active = Some(ActiveSession {
            record: session.clone(),
            cancel: cancel_tx,
            clock,
        });

        Ok(Run {
            guard: ActiveGuard {
                slot: Arc::clone(&self.slot),
                session_id: session.session_id,
                finished: false,
            },
            session,
            cancel: cancel_rx,
            clock,
            deadline: clock + self.config.cohesion_timeout(),
            buffer: CaptureBuffer::default(),
        })
    }

    /// Run one complete handshake.
    ///
    /// Returns `SEQUENCE_INTERRUPTED` without touching anything when another
    /// session is active. Every call that gets past that check creates a
    /// brand-new session id.
    pub async fn start(&self) -> Result<HandshakeReport, StartError> {
        let started_at = self.time.physical_time().await;
        let mut run = self.claim(started_at)?;
        let session_id = run.session.session_id;
        tracing::info!(session_id = %session_id, "handshake started");

        let report = self.drive(&mut run, session_id).await;

        run.buffer.flush();
        let Run { guard, .. } = run;
        guard.finish(report.session.clone());
        Ok(report)
    }

    async fn drive(&self, run: &mut Run, session_id: SessionId) -> HandshakeReport {
        let budgets = self.config.phase_budgets();
        if !self.transition(run, Transition::Begin) {
            return self.report(run, None);
        }

        let sensors = Arc::clone(&self.sensors);
        let visual = self
            .run_phase(run, budgets[0], sensors.capture_visual(session_id), validate_visual)
            .await;
        let Some(visual) = visual else {
            return self.report(run, None);
        };
        run.buffer.visual = Some(visual);

        let tactile = self
            .run_phase(run, budgets[1], sensors.capture_tactile(session_id), validate_tactile)
            .await;
        let Some(tactile) = tactile else {
            return self.report(run, None);
        };
        run.buffer.tactile = Some(tactile);

        let vital = self
            .run_phase(run, budgets[2], sensors.capture_vital(session_id), validate_vital)
            .await;
        let Some(vital) = vital else {
            return self.report(run, None);
        };
        run.buffer.vital = Some(vital);

        let outcome = self.run_verify(run, session_id).await;
        self.report(run, outcome)
    }

    fn report(&self, run: &Run, outcome: Option<CohesionOutcome>) -> HandshakeReport {
        HandshakeReport {
            session: run.session.clone(),
            outcome,
        }
    }

    fn transition(&self, run: &mut Run, event: Transition) -> bool {
        let from = run.session.state;
        match run.session.apply(event) {
            Ok(to) => {
                tracing::debug!(
                    session_id = %run.session.session_id,
                    from = %from,
                    to = %to,
                    elapsed_ms = run.elapsed_ms(),
                    "handshake transition"
                );
                run.guard.publish(&run.session);
                true
            }
            Err(e) => {
                tracing::error!(session_id = %run.session.session_id, error = %e, "invalid handshake transition");
                self.fail(
                    run,
                    StatusCode::SequenceInterrupted,
                    None,
                    e.to_string(),
                    false,
                    None,
                );
                false
            }
        }
    }

    fn fail(
        &self,
        run: &mut Run,
        code: StatusCode,
        detail: Option<StatusCode>,
        message: String,
        hardware_error: bool,
        sensor_details: Option<String>,
    ) {
        run.buffer.flush();
        let phase = run.session.state;
        let elapsed_ms = run.elapsed_ms();
        if let Err(e) = run.session.apply(Transition::Fail) {
            tracing::error!(session_id = %run.session.session_id, error = %e, "fail on terminal session");
        }
        run.session.cohesion_elapsed_ms = Some(elapsed_ms);
        run.session.sovereign_auth_signal = false;
        run.session.failure = Some(HandshakeFailure {
            code,
            detail,
            message,
            phase,
            elapsed_ms,
            at: run.at(elapsed_ms),
            hardware_error,
            sensor_details,
        });
        run.guard.publish(&run.session);

        tracing::info!(
            session_id = %run.session.session_id,
            code = %code,
            detail = ?detail.map(|d| d.as_str()),
            phase = %phase,
            elapsed_ms,
            "handshake failed"
        );
    }

    fn fail_ceiling(&self, run: &mut Run) {
        let limit = self.config.cohesion_timeout_ms;
        let elapsed = run.elapsed_ms();
        self.fail(
            run,
            StatusCode::CohesionTimeout,
            None,
            format!("handshake exceeded {limit}ms cohesion ceiling ({elapsed}ms)"),
            false,
            None,
        );
    }

    fn fail_cancelled(&self, run: &mut Run) {
        self.fail(
            run,
            StatusCode::SequenceInterrupted,
            None,
            "handshake cancelled by caller".to_string(),
            false,
            None,
        );
    }

    /// Run one biometric phase. Returns the accepted capture, or `None`
    /// after failing the session.
    async fn run_phase<T, F>(
        &self,
        run: &mut Run,
        budget: Duration,
        capture: F,
        validate: fn(&T) -> Result<(), CaptureRejection>,
    ) -> Option<T>
    where
        F: Future<Output = Result<T, SensorFault>> + Send,
    {
        let phase = run.session.state;
        let Some(phase_code) = phase.failure_code() else {
            self.fail(
                run,
                StatusCode::SequenceInterrupted,
                None,
                format!("{phase} is not a biometric phase"),
                false,
                None,
            );
            return None;
        };
        let offset_ms = run.elapsed_ms();
        let phase_clock = Instant::now();

        let step = bounded(capture, run.deadline, &mut run.cancel).await;

        let duration = phase_clock.elapsed();
        let over_budget = duration > budget;
        if over_budget {
            tracing::warn!(
                session_id = %run.session.session_id,
                phase = %phase,
                duration_ms = millis(duration),
                budget_ms = millis(budget),
                "phase exceeded soft budget"
            );
        }
        let mut result = PhaseResult {
            status: PhaseStatus::Failed,
            started_at: run.at(offset_ms),
            started_offset_ms: offset_ms,
            duration_ms: millis(duration),
            over_budget,
            error: None,
        };

        let capture = match step {
            Step::Cancelled => {
                result.error = Some(StatusCode::SequenceInterrupted);
                run.session.record_phase(phase, result);
                self.fail_cancelled(run);
                return None;
            }
            Step::CeilingReached => {
                result.error = Some(StatusCode::CohesionTimeout);
                run.session.record_phase(phase, result);
                self.fail_ceiling(run);
                return None;
            }
            Step::Panicked(message) => {
                result.error = Some(StatusCode::SensorHardwareError);
                run.session.record_phase(phase, result);
                tracing::error!(session_id = %run.session.session_id, phase = %phase, "phase sensor panicked");
                self.fail(
                    run,
                    phase_code,
                    Some(StatusCode::SensorHardwareError),
                    format!("{phase} sensor crashed"),
                    true,
                    Some(message),
                );
                return None;
            }
            Step::Finished(Err(fault)) => {
                let detail = fault.code();
                result.error = Some(detail);
                run.session.record_phase(phase, result);
                self.fail(
                    run,
                    phase_code,
                    Some(detail),
                    format!("{phase} failed: {fault}"),
                    fault.is_hardware(),
                    Some(fault.to_string()),
                );
                return None;
            }
            Step::Finished(Ok(capture)) => capture,
        };

        if let Err(rejection) = validate(&capture) {
            drop(capture);
            result.error = Some(rejection.code);
            run.session.record_phase(phase, result);
            self.fail(
                run,
                phase_code,
                Some(rejection.code),
                rejection.message.clone(),
                rejection.hardware_error,
                Some(rejection.message),
            );
            return None;
        }

        result.status = PhaseStatus::Complete;
        run.session.record_phase(phase, result);

        if run.elapsed_ms() > self.config.cohesion_timeout_ms {
            self.fail_ceiling(run);
            return None;
        }
        if !self.transition(run, Transition::Advance) {
            return None;
        }
        Some(capture)
    }

    async fn run_verify(&self, run: &mut Run, session_id: SessionId) -> Option<CohesionOutcome> {
        let Some((visual, tactile, vital)) = run.buffer.take_complete() else {
            self.fail(
                run,
                StatusCode::BufferFlushRequired,
                None,
                "one or more phase captures missing".to_string(),
                false,
                None,
            );
            return None;
        };
        let input = CohesionInput {
            session_id,
            visual,
            tactile,
            vital,
        };

        let verify_clock = Instant::now();
        let verifier = Arc::clone(&self.verifier);
        let step = bounded(verifier.verify(input), run.deadline, &mut run.cancel).await;
        let verify_duration = verify_clock.elapsed();
        if verify_duration > self.config.buffer_margin() {
            tracing::warn!(
                session_id = %session_id,
                duration_ms = millis(verify_duration),
                margin_ms = self.config.buffer_margin_ms,
                "cohesion verify exceeded buffer margin"
            );
        }

        let outcome = match step {
            Step::Cancelled => {
                self.fail_cancelled(run);
                return None;
            }
            Step::CeilingReached => {
                self.fail_ceiling(run);
                return None;
            }
            Step::Panicked(message) => {
                tracing::error!(session_id = %session_id, "cohesion verifier panicked");
                self.fail(
                    run,
                    StatusCode::SensorHardwareError,
                    None,
                    "cohesion verifier crashed".to_string(),
                    true,
                    Some(message),
                );
                return None;
            }
            Step::Finished(Err(fault)) => {
                if fault.code().is_security() {
                    tracing::error!(session_id = %session_id, code = %fault.code(), "cohesion verify security failure");
                }
                self.fail(run, fault.code(), None, fault.to_string(), false, None);
                return None;
            }
            Step::Finished(Ok(outcome)) => outcome,
        };

        let elapsed_ms = run.elapsed_ms();
        if elapsed_ms > self.config.cohesion_timeout_ms {
            self.fail_ceiling(run);
            return None;
        }
        if !self.transition(run, Transition::Advance) {
            return None;
        }
        run.session.cohesion_elapsed_ms = Some(elapsed_ms);
        run.session.sovereign_auth_signal = true;
        run.guard.publish(&run.session);

        tracing::info!(
            session_id = %session_id,
            total_duration_ms = elapsed_ms,
            "handshake succeeded"
        );
        Some(outcome)
    }
}
