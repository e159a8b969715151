//! End-to-end agent flows over mock collaborators on a paused clock.

use assert_matches::assert_matches;
use presence_agent::{AgentEffects, PresenceAgent, PresenceAgentBuilder};
use presence_core::effects::{
    AuthenticatorError, BackendIdentityRecord, HandshakeOutcome, TimeEffects,
};
use presence_core::{DeviceFingerprint, IdentityHash, StatusCode};
use presence_effects::{RealTimeHandler, StaticDeviceFingerprint};
use presence_gateway::{GateDecision, SsoEvent};
use presence_handshake::StartError;
use presence_testkit::{
    test_config, AssertionBehavior, MemoryStorage, MockAuthenticator, MockCredential,
    MockIdentityBackend, MockLicense, ScriptedSensors, SeededRandom,
};
use std::sync::Arc;
use std::time::Duration;

const DEVICE: &str = "device-agent";

struct Rig {
    authenticator: MockAuthenticator,
    backend: MockIdentityBackend,
    license: MockLicense,
    storage: MemoryStorage,
    time: Arc<RealTimeHandler>,
    agent: PresenceAgent,
}

fn identity() -> IdentityHash {
    IdentityHash::new("identity-charlie")
}

async fn rig() -> Rig {
    let credential = MockCredential::new(5);
    let authenticator = MockAuthenticator::new(credential.clone());
    authenticator.set_prompt_delay(Duration::from_millis(400));
    let backend = MockIdentityBackend::new();
    backend.register_credential(&credential, Some(identity()));
    let license = MockLicense::new();
    let storage = MemoryStorage::new();
    let time = Arc::new(RealTimeHandler::new());

    let effects = AgentEffects::production(std::env::temp_dir(), DeviceFingerprint::new(DEVICE))
        .with_time(time.clone())
        .with_random(Arc::new(SeededRandom::new(21)))
        .with_storage(Arc::new(storage.clone()))
        .with_authenticator(Arc::new(authenticator.clone()))
        .with_backend(Arc::new(backend.clone()))
        .with_license(Arc::new(license.clone()))
        .with_device(Arc::new(StaticDeviceFingerprint::new(DEVICE)));

    let agent = PresenceAgentBuilder::new(test_config())
        .with_effects(effects)
        .with_sensors(Arc::new(ScriptedSensors::passing(500, 0, 400)))
        .with_proof_backed_tactile(vec![credential.id.clone()])
        .with_nation("NG")
        .build()
        .await
        .unwrap();

    Rig {
        authenticator,
        backend,
        license,
        storage,
        time,
        agent,
    }
}

/// Let detached telemetry tasks run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn successful_handshake_verifies_and_anchors() {
    let rig = rig().await;
    assert!(!rig.agent.is_anchored().await);

    let report = rig.agent.start_handshake().await.unwrap();
    assert!(report.is_success());
    assert!(report.session.sovereign_auth_signal);

    let state = rig.agent.security_state();
    assert!(state.verified);
    assert_eq!(state.bound_identity, Some(identity()));
    assert!(rig.agent.is_anchored().await);
    assert!(rig
        .backend
        .pointer(&DeviceFingerprint::new(DEVICE))
        .is_some());

    settle().await;
    let events = rig.backend.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, HandshakeOutcome::Success);
    assert_eq!(events[0].nation.as_deref(), Some("NG"));
    assert_eq!(events[0].total_duration_ms, 1300);
    assert_eq!(events[0].session_id, report.session.session_id);
}

#[tokio::test(start_paused = true)]
async fn verified_session_survives_periodic_revalidation() {
    let rig = rig().await;
    rig.agent.start_handshake().await.unwrap();
    rig.agent.record_activity().await;

    tokio::time::sleep(Duration::from_secs(31)).await;
    let state = rig.agent.security_state();
    assert!(state.verified);
    assert!(!state.locked);
    assert!(rig.agent.is_anchored().await);
    assert!(rig.agent.check_and_refresh_presence().await);
}

#[tokio::test(start_paused = true)]
async fn security_failure_triggers_kill_switch() {
    let rig = rig().await;
    rig.agent.start_handshake().await.unwrap();
    let mut sso = rig.agent.sso_subscribe();

    rig.backend.force_reject(Some("credential revoked"));
    let report = rig.agent.start_handshake().await.unwrap();
    assert_eq!(report.failure().unwrap().code, StatusCode::AssertionRejected);

    let state = rig.agent.security_state();
    assert!(state.locked);
    assert!(!state.verified);
    assert!(rig.storage.is_empty());
    assert_matches!(sso.recv().await.unwrap(), SsoEvent::IdentityLocked { .. });

    settle().await;
    let events = rig.backend.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].outcome, HandshakeOutcome::Failed);
    assert_eq!(events[1].code, Some(StatusCode::AssertionRejected));
}

#[tokio::test(start_paused = true)]
async fn cancelled_prompt_fails_without_locking() {
    let rig = rig().await;
    rig.authenticator
        .push_behavior(AssertionBehavior::Fail(AuthenticatorError::NotAllowed));

    let report = rig.agent.start_handshake().await.unwrap();
    let failure = report.failure().unwrap();
    assert_eq!(failure.code, StatusCode::Phase2Failed);
    assert_eq!(failure.detail, Some(StatusCode::Cancelled));

    let state = rig.agent.security_state();
    assert!(!state.verified);
    assert!(!state.locked);

    settle().await;
    assert_eq!(rig.backend.events()[0].code, Some(StatusCode::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn fresh_handshake_clears_the_lock() {
    let rig = rig().await;
    let outcome = rig.agent.lock_identity().await.unwrap();
    assert_eq!(outcome.redirect, "/");
    assert!(rig.agent.security_state().locked);

    let report = rig.agent.start_handshake().await.unwrap();
    assert!(report.is_success());
    let state = rig.agent.security_state();
    assert!(!state.locked);
    assert!(state.verified);
}

#[tokio::test(start_paused = true)]
async fn concurrent_start_is_rejected() {
    let rig = rig().await;
    let agent = rig.agent.clone();
    let first = tokio::spawn(async move { agent.start_handshake().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = rig.agent.start_handshake().await;
    assert_matches!(second, Err(StartError::SequenceInterrupted { .. }));
    assert!(first.await.unwrap().unwrap().is_success());
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_running_handshake() {
    let rig = rig().await;
    let agent = rig.agent.clone();
    let run = tokio::spawn(async move { agent.start_handshake().await });
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(rig.agent.cancel_handshake());
    let report = run.await.unwrap().unwrap();
    assert_eq!(
        report.failure().unwrap().code,
        StatusCode::SequenceInterrupted
    );
    assert_eq!(
        rig.agent.session_state().unwrap().session_id,
        report.session.session_id
    );
}

#[tokio::test(start_paused = true)]
async fn missing_anchor_is_recovered_from_backend() {
    let rig = rig().await;
    rig.backend.insert_record(
        DeviceFingerprint::new(DEVICE),
        BackendIdentityRecord {
            identity_hash: Some(identity()),
            phone_ref: None,
            palm_hash: None,
        },
    );

    assert!(rig.agent.is_anchored().await);
    assert!(!rig.storage.is_empty());
    assert_eq!(
        rig.agent.anchor_store().anchored_identity().await,
        Some(identity())
    );
}

#[tokio::test(start_paused = true)]
async fn initialize_uses_recovered_anchor_and_backend_presence() {
    let rig = rig().await;
    rig.backend.insert_record(
        DeviceFingerprint::new(DEVICE),
        BackendIdentityRecord {
            identity_hash: Some(identity()),
            phone_ref: None,
            palm_hash: None,
        },
    );
    let now = rig.time.physical_time().await;
    rig.backend.set_latest_presence(identity(), now);

    assert!(rig.agent.initialize().await);
    assert!(rig.agent.security_state().verified);
}

#[tokio::test(start_paused = true)]
async fn licensed_routes_consult_license_only_when_verified() {
    let rig = rig().await;

    assert_eq!(
        rig.agent.authorize("/treasury").await,
        GateDecision::Redirect("/".to_string())
    );
    assert_eq!(rig.license.calls(), 0);
    assert_eq!(rig.agent.authorize("/").await, GateDecision::Allow);

    rig.agent.start_handshake().await.unwrap();
    assert_eq!(rig.agent.authorize("/wallet").await, GateDecision::Allow);
    assert_eq!(rig.license.calls(), 0);
    assert_eq!(
        rig.agent.authorize("/treasury").await,
        GateDecision::Redirect("/activate".to_string())
    );

    rig.license.grant(identity().as_str());
    assert_eq!(rig.agent.authorize("/treasury").await, GateDecision::Allow);
    assert_eq!(rig.license.calls(), 2);

    rig.license.set_online(false);
    assert_eq!(
        rig.agent.authorize("/treasury").await,
        GateDecision::Redirect("/activate".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn sso_follows_session_state() {
    let rig = rig().await;
    assert!(!rig.agent.request_sso("market").await);

    rig.agent.start_handshake().await.unwrap();
    assert!(rig.agent.request_sso("market").await);

    rig.agent.lock_identity().await.unwrap();
    assert!(!rig.agent.request_sso("market").await);
}

#[tokio::test(start_paused = true)]
async fn builder_requires_sensors_and_effects() {
    let missing_effects = PresenceAgentBuilder::new(test_config())
        .with_sensors(Arc::new(ScriptedSensors::passing(1, 1, 1)))
        .build()
        .await;
    assert!(missing_effects.is_err());

    let mut config = test_config();
    config.handshake.cohesion_timeout_ms = 10;
    let invalid = PresenceAgentBuilder::new(config)
        .with_effects(AgentEffects::production(
            std::env::temp_dir(),
            DeviceFingerprint::new(DEVICE),
        ))
        .with_sensors(Arc::new(ScriptedSensors::passing(1, 1, 1)))
        .build()
        .await;
    assert!(invalid.is_err());
}
