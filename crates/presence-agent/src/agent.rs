//! The presence agent
//!
//! Implements the caller-facing control flow: a successful handshake verifies
//! the session and anchors the device, a security failure triggers the
//! kill-switch, and every terminal handshake is reported to the backend on a
//! detached task.

use crate::effects::AgentEffects;
use presence_anchor::DeviceAnchorStore;
use presence_core::effects::{HandshakeEvent, HandshakeOutcome};
use presence_core::{IdentityHash, OwnerId};
use presence_gateway::{
    authorize as authorize_route, GateDecision, GatewayError, LicenseState, PurgeOutcome,
    PurgeReason, RouteTable, RouteTier, SessionGateway, SessionSecurityState, SsoEvent,
};
use presence_handshake::{HandshakeReport, HandshakeSession, SequentialHandshake, StartError};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Caller-facing handle. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct PresenceAgent {
    engine: SequentialHandshake,
    gateway: SessionGateway,
    anchor: Arc<DeviceAnchorStore>,
    routes: Arc<RouteTable>,
    effects: AgentEffects,
    nation: Option<String>,
}

impl PresenceAgent {
    pub(crate) fn new(
        engine: SequentialHandshake,
        gateway: SessionGateway,
        anchor: Arc<DeviceAnchorStore>,
        routes: RouteTable,
        effects: AgentEffects,
        nation: Option<String>,
    ) -> Self {
        Self {
            engine,
            gateway,
            anchor,
            routes: Arc::new(routes),
            effects,
            nation,
        }
    }

    /// Process-start check: recover a missing anchor if the backend knows
    /// this device, then run the bounded initial presence check.
    pub async fn initialize(&self) -> bool {
        let anchored = self.is_anchored().await;
        let verified = self.gateway.initialize().await;
        tracing::info!(anchored, verified, "presence agent initialized");
        verified
    }

    /// Run one handshake and apply its outcome.
    pub async fn start_handshake(&self) -> Result<HandshakeReport, StartError> {
        let report = self.engine.start().await?;

        if report.is_success() {
            let identity = report
                .outcome
                .as_ref()
                .and_then(|outcome| outcome.identity_hash.clone());
            match self.gateway.complete_handshake(identity.clone()).await {
                Ok(()) => match &identity {
                    Some(identity) => self.bind_device(identity).await,
                    None => tracing::debug!("no identity from cohesion step, anchor unchanged"),
                },
                Err(e) => {
                    tracing::error!(error = %e, "handshake succeeded but session was not verified");
                }
            }
        } else if let Some(failure) = report.failure() {
            if failure.is_security() {
                let reason = PurgeReason::SecurityViolation(failure.specific_code());
                match self.gateway.purge_and_lock(reason).await {
                    Ok(outcome) if !outcome.anchor_cleared => {
                        tracing::error!("kill-switch ran but the device anchor survived");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "kill-switch after security failure did not run");
                    }
                }
            }
        }

        self.report_telemetry(&report).await;
        Ok(report)
    }

    async fn bind_device(&self, identity: &IdentityHash) {
        let Some(fingerprint) = self.anchor.current_device().await else {
            tracing::warn!("device fingerprint unavailable, device not anchored");
            return;
        };
        if let Err(e) = self.anchor.anchor(identity, &fingerprint, None, None).await {
            tracing::error!(error = %e, "device anchor write failed");
        }
    }

    async fn report_telemetry(&self, report: &HandshakeReport) {
        let (outcome, code) = match report.failure() {
            None => (HandshakeOutcome::Success, None),
            Some(failure) => (HandshakeOutcome::Failed, Some(failure.specific_code())),
        };
        let event = HandshakeEvent {
            session_id: report.session.session_id,
            nation: self.nation.clone(),
            outcome,
            code,
            total_duration_ms: report.total_duration_ms(),
            recorded_at: self.effects.time.physical_time().await,
        };
        let backend = Arc::clone(&self.effects.backend);
        tokio::spawn(async move {
            if let Err(e) = backend.record_handshake_event(event).await {
                tracing::debug!(error = %e, "handshake telemetry dropped");
            }
        });
    }

    /// Best effort; an authenticator prompt already shown stays up.
    pub fn cancel_handshake(&self) -> bool {
        self.engine.cancel()
    }

    /// Active handshake session, or the last terminal one.
    pub fn session_state(&self) -> Option<HandshakeSession> {
        self.engine.session_state()
    }

    /// Current session security snapshot.
    pub fn security_state(&self) -> SessionSecurityState {
        self.gateway.state()
    }

    /// Whether the device is anchored, falling back to deep recovery when
    /// the local record is missing or unreadable.
    pub async fn is_anchored(&self) -> bool {
        if self.anchor.is_anchored().await {
            return true;
        }
        let Some(fingerprint) = self.anchor.current_device().await else {
            return false;
        };
        match self.anchor.recover(&fingerprint).await {
            Ok(recovered) => recovered,
            Err(e) => {
                tracing::warn!(error = %e, "deep recovery failed");
                false
            }
        }
    }

    /// Re-validate presence now; false on any failure.
    pub async fn check_and_refresh_presence(&self) -> bool {
        self.gateway.check_and_refresh().await
    }

    /// Kill-switch.
    pub async fn lock_identity(&self) -> Result<PurgeOutcome, GatewayError> {
        self.gateway.purge_and_lock(PurgeReason::KillSwitch).await
    }

    /// Note a user interaction.
    pub async fn record_activity(&self) {
        self.gateway.record_activity().await;
    }

    /// Gate a navigation. The license service is consulted only for licensed
    /// routes with a verified session.
    pub async fn authorize(&self, route: &str) -> GateDecision {
        let view = self.gateway.gate_view().await;
        let license = match self.routes.tier(route) {
            RouteTier::Licensed if view.verified && !view.locked => self.license_state().await,
            _ => LicenseState::Unknown,
        };
        let decision = authorize_route(route, &view, license, &self.routes);
        tracing::debug!(route, ?decision, "route authorized");
        decision
    }

    async fn license_state(&self) -> LicenseState {
        let Some(identity) = self.gateway.state().bound_identity else {
            return LicenseState::Unknown;
        };
        let owner = OwnerId::new(identity.as_str());
        match self.effects.license.has_active_license(&owner).await {
            Ok(true) => LicenseState::Active,
            Ok(false) => LicenseState::Inactive,
            Err(e) => {
                tracing::warn!(error = %e, "license lookup failed");
                LicenseState::Unknown
            }
        }
    }

    /// Ask the bus to approve a connected application.
    pub async fn request_sso(&self, app_id: &str) -> bool {
        self.gateway.request_sso(app_id).await
    }

    /// Subscribe to single sign-on events.
    pub fn sso_subscribe(&self) -> broadcast::Receiver<SsoEvent> {
        self.gateway.sso_subscribe()
    }

    /// Device anchor store shared with the gateway.
    pub fn anchor_store(&self) -> &DeviceAnchorStore {
        &self.anchor
    }

    /// Stop the gateway and its periodic tasks.
    pub fn shutdown(&self) {
        self.gateway.shutdown();
    }
}
