// Simulated handshake command

use crate::commands::common::CliContext;
use crate::simulate::{InjectedFailure, SimulatedCohesion, SimulatedSensors, SimulationPlan};
use clap::Args;
use presence_agent::{AgentEffects, PresenceAgentBuilder};
use presence_core::IdentityHash;
use presence_handshake::HandshakeSession;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Timings and failure injection for a simulated handshake.
#[derive(Args, Debug, Clone)]
pub struct HandshakeArgs {
    /// Phase 1 (visual liveness) duration in ms
    #[arg(long, default_value = "500")]
    pub visual_ms: u64,

    /// Phase 2 (tactile identity) duration in ms
    #[arg(long, default_value = "400")]
    pub tactile_ms: u64,

    /// Phase 3 (vital pulse) duration in ms
    #[arg(long, default_value = "400")]
    pub vital_ms: u64,

    /// Cohesion verify duration in ms
    #[arg(long, default_value = "150")]
    pub verify_ms: u64,

    /// Inject a failure
    #[arg(long, value_enum)]
    pub fail: Option<InjectedFailure>,

    /// Identity reported by the cohesion step; the device is anchored to it
    /// on success
    #[arg(long)]
    pub identity: Option<String>,

    /// Nation tag for telemetry
    #[arg(long)]
    pub nation: Option<String>,
}

/// JSON report printed by `presence handshake`.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeSummary {
    /// Final session record
    pub session: HandshakeSession,
    /// Phase-1 start to cohesion completion
    pub total_duration_ms: u64,
    /// Session verified afterwards
    pub verified: bool,
    /// Device anchored afterwards
    pub anchored: bool,
}

impl HandshakeArgs {
    fn plan(&self) -> SimulationPlan {
        SimulationPlan {
            visual: Duration::from_millis(self.visual_ms),
            tactile: Duration::from_millis(self.tactile_ms),
            vital: Duration::from_millis(self.vital_ms),
            verify: Duration::from_millis(self.verify_ms),
            failure: self.fail,
        }
    }
}

/// Run a simulated handshake through a full agent.
pub async fn handle_handshake_command(
    args: HandshakeArgs,
    ctx: &CliContext,
) -> anyhow::Result<HandshakeSummary> {
    let plan = args.plan();
    let identity = args.identity.map(IdentityHash::new);
    let effects = AgentEffects::production(ctx.data_dir.clone(), ctx.device.clone());

    let mut builder = PresenceAgentBuilder::new(ctx.config.clone())
        .with_effects(effects)
        .with_sensors(Arc::new(SimulatedSensors::new(plan.clone())))
        .with_cohesion_verifier(Arc::new(SimulatedCohesion::new(plan.verify, identity)));
    if let Some(nation) = args.nation {
        builder = builder.with_nation(nation);
    }
    let agent = builder.build().await?;

    let report = agent.start_handshake().await?;
    let summary = HandshakeSummary {
        total_duration_ms: report.total_duration_ms(),
        verified: agent.security_state().verified,
        anchored: agent.anchor_store().is_anchored().await,
        session: report.session,
    };
    agent.shutdown();

    match summary.session.failure.as_ref() {
        None => tracing::info!(duration_ms = summary.total_duration_ms, "handshake succeeded"),
        Some(failure) => tracing::warn!(
            code = %failure.code,
            detail = ?failure.detail,
            "handshake failed"
        ),
    }
    Ok(summary)
}
