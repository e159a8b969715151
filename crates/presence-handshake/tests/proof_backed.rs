//! Handshakes whose tactile phase is a platform-authenticator assertion.

use presence_core::effects::AuthenticatorError;
use presence_core::{IdentityHash, StatusCode};
use presence_handshake::{
    HandshakePhase, ProofBackedSensors, ProofCohesionVerifier, SequentialHandshake,
};
use presence_proof::{ProofGenerator, ProofVerifier};
use presence_testkit::{
    test_config, AssertionBehavior, ControllableTimeSource, MockAuthenticator, MockCredential,
    MockIdentityBackend, ScriptedSensors, SeededRandom,
};
use std::sync::Arc;
use std::time::Duration;

struct Rig {
    authenticator: MockAuthenticator,
    backend: MockIdentityBackend,
    engine: SequentialHandshake,
}

fn rig() -> Rig {
    let config = test_config();
    let credential = MockCredential::new(3);
    let authenticator = MockAuthenticator::new(credential.clone());
    authenticator.set_prompt_delay(Duration::from_millis(400));
    let backend = MockIdentityBackend::new();
    backend.register_credential(&credential, Some(IdentityHash::new("identity-bravo")));
    let time = Arc::new(ControllableTimeSource::default());

    let verifier = ProofVerifier::new(Arc::new(backend.clone()), time.clone(), &config.proof);
    let generator = ProofGenerator::new(
        Arc::new(authenticator.clone()),
        Arc::new(backend.clone()),
        Arc::new(SeededRandom::new(11)),
        time.clone(),
        Arc::clone(verifier.guard()),
        config.proof.clone(),
    );

    let sensors = ProofBackedSensors::new(
        Arc::new(ScriptedSensors::passing(500, 0, 400)),
        generator,
        vec![credential.id.clone()],
    );
    let engine = SequentialHandshake::new(
        Arc::new(sensors),
        Arc::new(ProofCohesionVerifier::new(verifier)),
        time,
        config.handshake,
    );

    Rig {
        authenticator,
        backend,
        engine,
    }
}

#[tokio::test(start_paused = true)]
async fn verified_assertion_yields_identity() {
    let rig = rig();

    let report = rig.engine.start().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.total_duration_ms(), 1300);
    let outcome = report.outcome.unwrap();
    assert_eq!(outcome.identity_hash, Some(IdentityHash::new("identity-bravo")));
    assert_eq!(rig.backend.verify_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn dismissed_prompt_fails_phase_two() {
    let rig = rig();
    rig.authenticator
        .push_behavior(AssertionBehavior::Fail(AuthenticatorError::NotAllowed));

    let report = rig.engine.start().await.unwrap();
    let failure = report.failure().unwrap();

    assert_eq!(failure.code, StatusCode::Phase2Failed);
    assert_eq!(failure.detail, Some(StatusCode::Cancelled));
    assert!(!failure.is_security());
    assert_eq!(rig.backend.verify_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_assertion_is_a_security_failure() {
    let rig = rig();
    rig.backend.force_reject(Some("credential revoked"));

    let report = rig.engine.start().await.unwrap();
    let failure = report.failure().unwrap();

    assert_eq!(failure.code, StatusCode::AssertionRejected);
    assert_eq!(failure.phase, HandshakePhase::CohesionVerify);
    assert!(failure.is_security());
}

#[tokio::test(start_paused = true)]
async fn unreachable_backend_at_verify_is_not_a_security_failure() {
    let rig = rig();
    rig.backend.set_online(false);

    let report = rig.engine.start().await.unwrap();
    let failure = report.failure().unwrap();

    assert_eq!(failure.code, StatusCode::BackendUnavailable);
    assert!(!failure.is_security());
}

#[tokio::test(start_paused = true)]
async fn slow_backend_verify_is_bounded_by_the_ceiling() {
    let rig = rig();
    rig.backend.set_verify_delay(Duration::from_secs(5));

    let report = rig.engine.start().await.unwrap();
    let failure = report.failure().unwrap();

    assert_eq!(failure.code, StatusCode::CohesionTimeout);
    assert_eq!(failure.elapsed_ms, 1500);
}
