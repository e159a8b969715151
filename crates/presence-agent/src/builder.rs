//! Agent builder
//!
//! Wires effects, sensors and configuration into the handshake engine, the
//! anchor store and a running session gateway.

use crate::agent::PresenceAgent;
use crate::effects::AgentEffects;
use presence_anchor::DeviceAnchorStore;
use presence_core::{Configuration, CredentialId, PresenceConfig, PresenceError, Result};
use presence_gateway::{AnchoredPresenceRevalidator, GatewayDeps, RouteTable, SessionGateway};
use presence_handshake::{
    CohesionVerifier, LocalCohesionVerifier, PhaseSensors, ProofBackedSensors,
    ProofCohesionVerifier, SequentialHandshake,
};
use presence_proof::{ProofGenerator, ProofVerifier};
use std::sync::Arc;

/// Wires effects, sensors and configuration into a `PresenceAgent`.
pub struct PresenceAgentBuilder {
    config: PresenceConfig,
    effects: Option<AgentEffects>,
    sensors: Option<Arc<dyn PhaseSensors>>,
    cohesion: Option<Arc<dyn CohesionVerifier>>,
    proof_backed: Option<Vec<CredentialId>>,
    nation: Option<String>,
}

impl PresenceAgentBuilder {
    /// Builder over `config`; effects and sensors are required.
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            config,
            effects: None,
            sensors: None,
            cohesion: None,
            proof_backed: None,
            nation: None,
        }
    }

    /// Effect handlers to run against.
    pub fn with_effects(mut self, effects: AgentEffects) -> Self {
        self.effects = Some(effects);
        self
    }

    /// Biometric sensors for the three phases.
    pub fn with_sensors(mut self, sensors: Arc<dyn PhaseSensors>) -> Self {
        self.sensors = Some(sensors);
        self
    }

    /// Replace the sensor-only cohesion verifier.
    pub fn with_cohesion_verifier(mut self, verifier: Arc<dyn CohesionVerifier>) -> Self {
        self.cohesion = Some(verifier);
        self
    }

    /// Run phase 2 through the platform authenticator and verify the proof
    /// at the cohesion step. Takes precedence over `with_cohesion_verifier`.
    pub fn with_proof_backed_tactile(mut self, allowed: Vec<CredentialId>) -> Self {
        self.proof_backed = Some(allowed);
        self
    }

    /// Nation tag attached to handshake telemetry.
    pub fn with_nation(mut self, nation: impl Into<String>) -> Self {
        self.nation = Some(nation.into());
        self
    }

    /// Validate configuration, build every component and start the gateway.
    pub async fn build(self) -> Result<PresenceAgent> {
        self.config.validate()?;
        let effects = self
            .effects
            .ok_or_else(|| PresenceError::invalid("agent effects not configured"))?;
        let sensors = self
            .sensors
            .ok_or_else(|| PresenceError::invalid("phase sensors not configured"))?;
        let config = self.config;
        let proof_backed = self.proof_backed.is_some();

        let (sensors, cohesion): (Arc<dyn PhaseSensors>, Arc<dyn CohesionVerifier>) =
            match self.proof_backed {
                Some(allowed) => {
                    let verifier = ProofVerifier::new(
                        Arc::clone(&effects.backend),
                        Arc::clone(&effects.time),
                        &config.proof,
                    );
                    let generator = ProofGenerator::new(
                        Arc::clone(&effects.authenticator),
                        Arc::clone(&effects.backend),
                        Arc::clone(&effects.random),
                        Arc::clone(&effects.time),
                        Arc::clone(verifier.guard()),
                        config.proof.clone(),
                    );
                    (
                        Arc::new(ProofBackedSensors::new(sensors, generator, allowed)),
                        Arc::new(ProofCohesionVerifier::new(verifier)),
                    )
                }
                None => (
                    sensors,
                    self.cohesion
                        .unwrap_or_else(|| Arc::new(LocalCohesionVerifier)),
                ),
            };

        let engine = SequentialHandshake::new(
            sensors,
            cohesion,
            Arc::clone(&effects.time),
            config.handshake.clone(),
        );

        let anchor = Arc::new(DeviceAnchorStore::new(
            Arc::clone(&effects.storage),
            Arc::clone(&effects.backend),
            Arc::clone(&effects.device),
            Arc::clone(&effects.random),
            &config.anchor,
        )?);

        let revalidator = AnchoredPresenceRevalidator::new(
            Arc::clone(&anchor),
            Arc::clone(&effects.backend),
            Arc::clone(&effects.time),
            config.gateway.presence_expiry_ms,
        );
        let gateway = SessionGateway::start(
            GatewayDeps {
                anchor: Arc::clone(&anchor),
                revalidator: Arc::new(revalidator),
                time: Arc::clone(&effects.time),
            },
            config.gateway.clone(),
        )
        .await;

        let routes = RouteTable::new(&config.routes, &config.gateway);
        tracing::info!(
            proof_backed,
            nation = self.nation.as_deref(),
            "presence agent built"
        );
        Ok(PresenceAgent::new(
            engine,
            gateway,
            anchor,
            routes,
            effects,
            self.nation,
        ))
    }
}
