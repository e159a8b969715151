//! Session Security Gateway
//!
//! A single actor owns `SessionSecurityState`. Callers and the two periodic
//! tasks post commands to it; readers take snapshots from a watch channel.
//!
//! Re-validation calls run on their own tasks and post their results back
//! tagged with the generation they started under. A purge bumps the
//! generation and aborts them, so a late answer can never resurrect a
//! purged session.

use crate::error::GatewayError;
use crate::gate::GateView;
use crate::revalidate::{PresenceRevalidator, Revalidation};
use crate::sso::{SsoBus, SsoEvent};
use crate::state::SessionSecurityState;
use crate::tasks::TaskRegistry;
use presence_anchor::DeviceAnchorStore;
use presence_core::config::GatewayConfig;
use presence_core::effects::TimeEffects;
use presence_core::{IdentityHash, PhysicalTime, StatusCode};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Why a session was purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeReason {
    /// Explicit kill-switch from the caller
    KillSwitch,
    /// No activity for the configured timeout
    Inactivity,
    /// A different identity appeared on this device
    IdentityMismatch,
    /// A handshake failed with a security code
    SecurityViolation(StatusCode),
}

impl fmt::Display for PurgeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurgeReason::KillSwitch => f.write_str("kill-switch"),
            PurgeReason::Inactivity => f.write_str("inactivity"),
            PurgeReason::IdentityMismatch => f.write_str("identity-mismatch"),
            PurgeReason::SecurityViolation(code) => write!(f, "security-violation:{code}"),
        }
    }
}

const ANCHOR_CLEAR_ATTEMPTS: usize = 2;

/// Where the caller goes after a purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Route the caller is sent to
    pub redirect: String,
    /// Device holds the privileged capability
    pub privileged_device: bool,
    /// The local anchor record is gone. False means the record survived
    /// every delete attempt and the device still reads as anchored.
    pub anchor_cleared: bool,
}

/// Collaborators of the gateway.
pub struct GatewayDeps {
    /// Device anchor cleared on purge
    pub anchor: Arc<DeviceAnchorStore>,
    /// Periodic presence check
    pub revalidator: Arc<dyn PresenceRevalidator>,
    /// Clock
    pub time: Arc<dyn TimeEffects>,
}

enum Command {
    MarkVerified {
        identity: Option<IdentityHash>,
        clear_lock: bool,
        reply: oneshot::Sender<Result<(), GatewayError>>,
    },
    Revalidate {
        reply: Option<oneshot::Sender<bool>>,
    },
    Revalidated {
        generation: u64,
        result: presence_core::Result<Revalidation>,
        reply: Option<oneshot::Sender<bool>>,
    },
    RecordActivity,
    InactivityTick,
    PurgeAndLock {
        reason: PurgeReason,
        reply: Option<oneshot::Sender<PurgeOutcome>>,
    },
    ClearLock,
}

fn answer<T>(reply: Option<oneshot::Sender<T>>, value: T) {
    if let Some(reply) = reply {
        let _ = reply.send(value);
    }
}

struct Actor {
    state: SessionSecurityState,
    state_tx: watch::Sender<SessionSecurityState>,
    generation: u64,
    /// Last presence this process witnessed; survives failed re-validation,
    /// dropped on purge
    presence_at: Option<PhysicalTime>,
    pending: Vec<JoinHandle<()>>,
    deps: GatewayDeps,
    config: GatewayConfig,
    sso: SsoBus,
    self_tx: mpsc::WeakSender<Command>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        self.abort_pending();
        tracing::debug!("session gateway stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::MarkVerified {
                identity,
                clear_lock,
                reply,
            } => {
                let result = self.mark_verified(identity, clear_lock).await;
                let _ = reply.send(result);
            }
            Command::Revalidate { reply } => {
                if self.state.locked {
                    answer(reply, false);
                } else {
                    self.start_revalidation(reply);
                }
            }
            Command::Revalidated {
                generation,
                result,
                reply,
            } => {
                let verified = self.apply_revalidation(generation, result).await;
                answer(reply, verified);
            }
            Command::RecordActivity => {
                self.state.last_activity_at = self.now().await;
                self.publish();
            }
            Command::InactivityTick => {
                let now = self.now().await;
                if self
                    .state
                    .is_inactive(now, self.config.inactivity_timeout_ms)
                {
                    tracing::info!(
                        idle_ms = now.millis_since(self.state.last_activity_at),
                        "session idle past timeout"
                    );
                    self.purge_and_lock(PurgeReason::Inactivity).await;
                }
            }
            Command::PurgeAndLock { reason, reply } => {
                let outcome = self.purge_and_lock(reason).await;
                answer(reply, outcome);
            }
            Command::ClearLock => {
                if self.state.locked {
                    self.state.locked = false;
                    self.publish();
                    tracing::info!("session lock cleared");
                }
            }
        }
    }

    async fn now(&self) -> PhysicalTime {
        self.deps.time.physical_time().await
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    fn abort_pending(&mut self) {
        for handle in self.pending.drain(..) {
            handle.abort();
        }
    }

    async fn mark_verified(
        &mut self,
        identity: Option<IdentityHash>,
        clear_lock: bool,
    ) -> Result<(), GatewayError> {
        if clear_lock && self.state.locked {
            self.state.locked = false;
            tracing::info!("session lock cleared by fresh handshake");
        }
        if self.state.locked {
            tracing::warn!("mark verified refused: session locked");
            return Err(GatewayError::Locked);
        }
        if self.state.conflicts_with(identity.as_ref()) {
            tracing::error!("different identity observed on this device");
            self.purge_and_lock(PurgeReason::IdentityMismatch).await;
            return Err(GatewayError::IdentityMismatch);
        }

        let now = self.now().await;
        self.state.verified = true;
        self.state.verified_at = Some(now);
        self.state.last_activity_at = now;
        self.presence_at = Some(now);
        if identity.is_some() {
            self.state.bound_identity = identity;
        }
        self.publish();
        tracing::info!(
            identity = self.state.bound_identity.as_ref().map(|i| i.short()),
            "session verified"
        );
        Ok(())
    }

    fn start_revalidation(&mut self, reply: Option<oneshot::Sender<bool>>) {
        self.pending.retain(|h| !h.is_finished());
        if reply.is_none() && !self.pending.is_empty() {
            tracing::debug!("re-validation already in flight, skipping tick");
            return;
        }
        let Some(tx) = self.self_tx.upgrade() else {
            answer(reply, false);
            return;
        };
        let generation = self.generation;
        let local_presence = self.presence_at;
        let revalidator = Arc::clone(&self.deps.revalidator);
        let handle = tokio::spawn(async move {
            let result = revalidator.revalidate(local_presence).await;
            let _ = tx
                .send(Command::Revalidated {
                    generation,
                    result,
                    reply,
                })
                .await;
        });
        self.pending.push(handle);
    }

    async fn apply_revalidation(
        &mut self,
        generation: u64,
        result: presence_core::Result<Revalidation>,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "stale re-validation discarded");
            return false;
        }
        match result {
            Ok(Revalidation::Verified {
                identity,
                presence_at,
            }) => {
                if self.state.locked {
                    return false;
                }
                if self.state.conflicts_with(Some(&identity)) {
                    tracing::error!("re-validation returned a different identity");
                    self.purge_and_lock(PurgeReason::IdentityMismatch).await;
                    return false;
                }
                let now = self.now().await;
                self.state.verified = true;
                self.state.verified_at = Some(now);
                self.state.bound_identity = Some(identity);
                self.presence_at = self.presence_at.max(Some(presence_at));
                self.publish();
                tracing::debug!("presence re-validated");
                true
            }
            Ok(Revalidation::NotVerified { reason }) => {
                if self.state.verified {
                    tracing::info!(reason, "presence no longer verified");
                }
                self.drop_verification();
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "presence re-validation failed");
                self.drop_verification();
                false
            }
        }
    }

    fn drop_verification(&mut self) {
        if self.state.verified || self.state.verified_at.is_some() {
            self.state.verified = false;
            self.state.verified_at = None;
            self.publish();
        }
    }

    async fn purge_and_lock(&mut self, reason: PurgeReason) -> PurgeOutcome {
        self.generation += 1;
        self.abort_pending();
        self.presence_at = None;
        self.state.locked = true;
        self.state.clear_session();
        self.publish();

        let privileged_device = self.deps.anchor.is_privileged_device().await;
        let anchor_cleared = self.clear_anchor().await;
        self.sso.publish(SsoEvent::IdentityLocked {
            reason: reason.to_string(),
        });

        let redirect = if privileged_device {
            self.config.privileged_landing.clone()
        } else {
            self.config.public_entry.clone()
        };
        tracing::warn!(
            reason = %reason,
            redirect = %redirect,
            privileged_device,
            anchor_cleared,
            "session purged and locked"
        );
        PurgeOutcome {
            redirect,
            privileged_device,
            anchor_cleared,
        }
    }

    async fn clear_anchor(&self) -> bool {
        for attempt in 1..=ANCHOR_CLEAR_ATTEMPTS {
            match self.deps.anchor.clear().await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::error!(attempt, error = %e, "anchor clear failed during purge");
                }
            }
        }
        false
    }
}

impl Drop for Actor {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

/// Handle to the session gateway. Cheap to clone.
#[derive(Clone)]
pub struct SessionGateway {
    tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SessionSecurityState>,
    sso: SsoBus,
    anchor: Arc<DeviceAnchorStore>,
    tasks: Arc<TaskRegistry>,
    config: GatewayConfig,
}

impl SessionGateway {
    /// Spawn the gateway actor and its periodic tasks. Starts unverified.
    pub async fn start(deps: GatewayDeps, config: GatewayConfig) -> Self {
        let now = deps.time.physical_time().await;
        let initial = SessionSecurityState::initial(now);
        let (state_tx, state_rx) = watch::channel(initial.clone());
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let sso = SsoBus::new();
        let anchor = Arc::clone(&deps.anchor);
        let tasks = Arc::new(TaskRegistry::new());

        let actor = Actor {
            state: initial,
            state_tx,
            generation: 0,
            presence_at: None,
            pending: Vec::new(),
            deps,
            config: config.clone(),
            sso: sso.clone(),
            self_tx: tx.downgrade(),
        };
        tasks.spawn_cancellable(actor.run(rx));

        let revalidate_tx = tx.clone();
        tasks.spawn_interval_until(config.revalidate_interval(), move || {
            let tx = revalidate_tx.clone();
            async move { tx.send(Command::Revalidate { reply: None }).await.is_ok() }
        });
        let inactivity_tx = tx.clone();
        tasks.spawn_interval_until(config.inactivity_check_interval(), move || {
            let tx = inactivity_tx.clone();
            async move { tx.send(Command::InactivityTick).await.is_ok() }
        });

        tracing::info!(
            revalidate_ms = config.revalidate_interval_ms,
            inactivity_timeout_ms = config.inactivity_timeout_ms,
            "session gateway started"
        );
        Self {
            tx,
            state_rx,
            sso,
            anchor,
            tasks,
            config,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionSecurityState {
        self.state_rx.borrow().clone()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionSecurityState> {
        self.state_rx.clone()
    }

    /// Gateway schedule and redirect targets.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// First presence check, bounded by the safety timeout. A hung backend
    /// leaves the session unverified instead of blocking the caller.
    pub async fn initialize(&self) -> bool {
        match tokio::time::timeout(self.config.initial_check_timeout(), self.check_and_refresh())
            .await
        {
            Ok(verified) => verified,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.initial_check_timeout_ms,
                    "initial presence check timed out, starting unverified"
                );
                false
            }
        }
    }

    /// Re-validate now. Never fails: errors and empty answers read as false.
    pub async fn check_and_refresh(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Revalidate { reply: Some(reply) })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Mark the session verified. Refused while locked.
    pub async fn mark_verified(&self, identity: Option<IdentityHash>) -> Result<(), GatewayError> {
        self.send_mark(identity, false).await
    }

    /// Handshake success path: clear any lock, then mark verified.
    pub async fn complete_handshake(
        &self,
        identity: Option<IdentityHash>,
    ) -> Result<(), GatewayError> {
        self.send_mark(identity, true).await
    }

    async fn send_mark(
        &self,
        identity: Option<IdentityHash>,
        clear_lock: bool,
    ) -> Result<(), GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::MarkVerified {
                identity,
                clear_lock,
                reply,
            })
            .await
            .map_err(|_| GatewayError::Closed)?;
        rx.await.map_err(|_| GatewayError::Closed)?
    }

    /// Note user interaction.
    pub async fn record_activity(&self) {
        let _ = self.tx.send(Command::RecordActivity).await;
    }

    /// Kill-switch: lock, drop verification, clear the anchor, notify
    /// connected applications.
    pub async fn purge_and_lock(&self, reason: PurgeReason) -> Result<PurgeOutcome, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::PurgeAndLock {
                reason,
                reply: Some(reply),
            })
            .await
            .map_err(|_| GatewayError::Closed)?;
        rx.await.map_err(|_| GatewayError::Closed)
    }

    /// Reset the lock without verifying.
    pub async fn clear_lock(&self) {
        let _ = self.tx.send(Command::ClearLock).await;
    }

    /// Subscribe to single sign-on events.
    pub fn sso_subscribe(&self) -> tokio::sync::broadcast::Receiver<SsoEvent> {
        self.sso.subscribe()
    }

    /// Handle a sign-on request from a connected application.
    pub async fn request_sso(&self, app_id: &str) -> bool {
        self.sso.publish(SsoEvent::AuthRequested {
            app_id: app_id.to_string(),
        });
        let state = self.state();
        let approved = state.verified && !state.locked && self.anchor.is_anchored().await;
        if approved {
            self.sso.publish(SsoEvent::AuthApproved {
                app_id: app_id.to_string(),
            });
        } else {
            tracing::info!(app_id, "sso request denied");
        }
        approved
    }

    /// Inputs for the route gate.
    pub async fn gate_view(&self) -> GateView {
        let state = self.state();
        GateView {
            verified: state.verified,
            locked: state.locked,
            privileged_device: self.anchor.is_privileged_device().await,
        }
    }

    /// Stop the actor and periodic tasks; pending work is aborted.
    pub fn shutdown(&self) {
        self.tasks.shutdown();
        tracing::info!("session gateway shut down");
    }
}
