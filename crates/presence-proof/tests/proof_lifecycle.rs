//! Proof generation and single-use verification against mock effects.

use assert_matches::assert_matches;
use presence_core::config::ProofConfig;
use presence_core::effects::{AuthenticatorError, UserVerification};
use presence_core::{IdentityHash, StatusCode};
use presence_effects::RealRandomHandler;
use presence_proof::{ProofError, ProofGenerator, ProofVerifier};
use presence_testkit::{
    test_config, AssertionBehavior, ControllableTimeSource, MockAuthenticator, MockCredential,
    MockIdentityBackend, SeededRandom,
};
use std::sync::Arc;

struct Harness {
    authenticator: MockAuthenticator,
    backend: MockIdentityBackend,
    time: ControllableTimeSource,
    config: ProofConfig,
    generator: ProofGenerator,
    verifier: ProofVerifier,
}

fn harness() -> Harness {
    let credential = MockCredential::new(1);
    let authenticator = MockAuthenticator::new(credential.clone());
    let backend = MockIdentityBackend::new();
    backend.register_credential(&credential, Some(IdentityHash::new("identity-alpha")));
    let time = ControllableTimeSource::default();
    let config = test_config().proof;

    let verifier = ProofVerifier::new(Arc::new(backend.clone()), Arc::new(time.clone()), &config);
    let generator = ProofGenerator::new(
        Arc::new(authenticator.clone()),
        Arc::new(backend.clone()),
        Arc::new(SeededRandom::new(7)),
        Arc::new(time.clone()),
        Arc::clone(verifier.guard()),
        config.clone(),
    );

    Harness {
        authenticator,
        backend,
        time,
        config,
        generator,
        verifier,
    }
}

#[tokio::test]
async fn proof_verifies_once_then_replay_is_rejected_before_backend() {
    let h = harness();
    let proof = h.generator.generate_with_backend_challenge(&[]).await.unwrap();
    let replayed = proof.clone();

    let verified = h.verifier.verify(proof).await.unwrap();
    assert_eq!(
        verified.identity_hash,
        Some(IdentityHash::new("identity-alpha"))
    );
    assert_eq!(h.backend.verify_calls(), 1);

    let err = h.verifier.verify(replayed).await.unwrap_err();
    assert_eq!(err, ProofError::ReplayDetected);
    assert_eq!(err.code(), StatusCode::ReplayDetected);
    assert!(err.is_security_violation());
    assert_eq!(h.backend.verify_calls(), 1);
}

#[tokio::test]
async fn assertion_request_demands_user_verification() {
    let h = harness();
    h.generator.generate_with_backend_challenge(&[]).await.unwrap();

    let requests = h.authenticator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].user_verification, UserVerification::Required);
    assert_eq!(requests[0].rp_id, h.config.rp_id);
    assert_eq!(requests[0].timeout_ms, h.config.authenticator_timeout_ms);
    assert_eq!(h.backend.challenges_issued(), 1);
}

#[tokio::test]
async fn insecure_context_is_refused_before_prompting() {
    let h = harness();
    h.authenticator.set_secure_context(false);

    let err = h.generator.generate_proof(None, &[]).await.unwrap_err();
    assert_eq!(err.code(), StatusCode::InsecureContext);
    assert!(h.authenticator.requests().is_empty());

    let err = h
        .generator
        .generate_with_backend_challenge(&[])
        .await
        .unwrap_err();
    assert_eq!(err, ProofError::InsecureContext);
    assert_eq!(h.backend.challenges_issued(), 0);
}

#[tokio::test]
async fn missing_authenticator_is_unsupported() {
    let h = harness();
    h.authenticator.set_available(false);

    let err = h.generator.generate_proof(None, &[]).await.unwrap_err();
    assert_eq!(err, ProofError::Unsupported);
    assert_eq!(err.code(), StatusCode::Unsupported);
}

#[tokio::test]
async fn dismissed_prompts_map_to_cancelled() {
    let h = harness();
    for error in [
        AuthenticatorError::Cancelled,
        AuthenticatorError::NotAllowed,
        AuthenticatorError::Timeout,
    ] {
        h.authenticator.push_behavior(AssertionBehavior::Fail(error));
        let err = h.generator.generate_proof(None, &[]).await.unwrap_err();
        assert_eq!(err, ProofError::Cancelled);
        assert!(!err.is_security_violation());
    }
}

#[tokio::test]
async fn authenticator_hardware_failure_is_a_sensor_error() {
    let h = harness();
    h.authenticator
        .push_behavior(AssertionBehavior::Fail(AuthenticatorError::Hardware {
            reason: "enclave reset".into(),
        }));

    let err = h.generator.generate_proof(None, &[]).await.unwrap_err();
    assert_matches!(err, ProofError::AuthenticatorFailure { ref reason } if reason == "enclave reset");
    assert_eq!(err.code(), StatusCode::SensorHardwareError);
}

#[tokio::test]
async fn presence_without_verification_is_rejected() {
    let h = harness();
    h.authenticator.push_behavior(AssertionBehavior::PresenceOnly);

    let err = h.generator.generate_proof(None, &[]).await.unwrap_err();
    assert_eq!(err, ProofError::UserNotVerified);
}

#[tokio::test]
async fn assertion_over_another_challenge_is_malformed() {
    let h = harness();
    h.authenticator.push_behavior(AssertionBehavior::WrongChallenge);

    let err = h
        .generator
        .generate_proof(Some(&[9u8; 32]), &[])
        .await
        .unwrap_err();
    assert_matches!(err, ProofError::MalformedAssertion { .. });
}

#[tokio::test]
async fn credential_outside_allow_list_is_malformed() {
    let h = harness();
    let allowed = vec![h.authenticator.credential().id.clone()];
    h.authenticator
        .push_behavior(AssertionBehavior::ForeignCredential);

    let err = h
        .generator
        .generate_proof(None, &allowed)
        .await
        .unwrap_err();
    assert_matches!(err, ProofError::MalformedAssertion { .. });
    assert_eq!(h.authenticator.requests()[0].allow_credentials, allowed);
}

#[tokio::test]
async fn offline_backend_falls_back_to_local_challenge() {
    let h = harness();
    h.backend.set_online(false);

    let proof = h.generator.generate_with_backend_challenge(&[]).await.unwrap();
    assert_eq!(proof.challenge.len(), 32);
    assert_eq!(h.backend.challenges_issued(), 0);

    let err = h.verifier.verify(proof).await.unwrap_err();
    assert_matches!(err, ProofError::BackendUnavailable { .. });
    assert_eq!(err.code(), StatusCode::BackendUnavailable);
    assert!(!err.is_security_violation());
}

#[tokio::test]
async fn short_backend_challenge_is_replaced() {
    let h = harness();
    h.backend.issue_short_challenges(true);

    let challenge = h.generator.obtain_challenge().await;
    assert_eq!(challenge.len(), 32);
    assert_eq!(h.backend.challenges_issued(), 1);
}

#[tokio::test]
async fn empty_supplied_challenge_gets_a_local_one() {
    let h = harness();
    let generator = ProofGenerator::new(
        Arc::new(h.authenticator.clone()),
        Arc::new(h.backend.clone()),
        Arc::new(RealRandomHandler::new()),
        Arc::new(h.time.clone()),
        Arc::clone(h.verifier.guard()),
        h.config.clone(),
    );

    let proof = generator.generate_proof(Some(&[]), &[]).await.unwrap();
    assert_eq!(proof.challenge.len(), 32);
    assert_eq!(h.authenticator.requests()[0].challenge, proof.challenge);
}

#[tokio::test]
async fn rejected_proof_does_not_poison_the_counter() {
    let h = harness();
    let credential = h.authenticator.credential().id.clone();

    h.authenticator.set_counter(1_000_000);
    let forged = h.generator.generate_proof(None, &[]).await.unwrap();
    h.backend.force_reject(Some("bad signature"));
    let err = h.verifier.verify(forged).await.unwrap_err();
    assert_matches!(err, ProofError::Rejected { .. });
    assert_eq!(h.verifier.guard().last_counter(&credential), None);
    assert_eq!(h.verifier.guard().consumed_len(), 0);

    h.backend.force_reject(None);
    h.authenticator.set_counter(5);
    let genuine = h.generator.generate_proof(None, &[]).await.unwrap();
    assert_eq!(genuine.counter, 6);
    h.verifier.verify(genuine).await.unwrap();
    assert_eq!(h.verifier.guard().last_counter(&credential), Some(6));
}

#[tokio::test]
async fn unreachable_backend_leaves_proof_verifiable() {
    let h = harness();
    let proof = h.generator.generate_proof(None, &[]).await.unwrap();
    let retried = proof.clone();

    h.backend.set_online(false);
    let err = h.verifier.verify(proof).await.unwrap_err();
    assert_matches!(err, ProofError::BackendUnavailable { .. });
    assert_eq!(h.verifier.guard().consumed_len(), 0);
    assert_eq!(h.verifier.guard().outstanding_len(), 1);

    h.backend.set_online(true);
    h.verifier.verify(retried).await.unwrap();
    assert_eq!(h.verifier.guard().outstanding_len(), 0);
}

#[tokio::test]
async fn challenge_stays_refused_after_the_window() {
    let h = harness();
    h.authenticator.set_counter(0);
    h.authenticator.freeze_counter(true);

    let proof = h.generator.generate_proof(None, &[]).await.unwrap();
    let mut replayed = proof.clone();
    h.verifier.verify(proof).await.unwrap();

    h.time.advance_ms(h.config.replay_window_ms + 1);
    replayed.created_at = h.time.now();
    let err = h.verifier.verify(replayed).await.unwrap_err();
    assert_eq!(err, ProofError::UnknownChallenge);
    assert_eq!(err.code(), StatusCode::ReplayDetected);
    assert_eq!(h.backend.verify_calls(), 1);
}

#[tokio::test]
async fn proof_over_foreign_challenge_is_refused() {
    let h = harness();
    let mut proof = h.generator.generate_proof(None, &[]).await.unwrap();
    proof.challenge = vec![0xAB; 32];

    let err = h.verifier.verify(proof).await.unwrap_err();
    assert_eq!(err, ProofError::UnknownChallenge);
    assert_eq!(h.backend.verify_calls(), 0);
}

#[tokio::test]
async fn stale_proof_is_expired() {
    let h = harness();
    let mut proof = h.generator.generate_proof(None, &[]).await.unwrap();
    h.time.advance_ms(h.config.replay_window_ms + 1);
    // a refreshed proof timestamp does not make it fresh
    proof.created_at = h.time.now();

    let err = h.verifier.verify(proof).await.unwrap_err();
    assert_matches!(err, ProofError::Expired { age_ms } if age_ms == h.config.replay_window_ms + 1);
    assert_eq!(err.code(), StatusCode::ProofExpired);
    assert_eq!(h.backend.verify_calls(), 0);
}

#[tokio::test]
async fn cloned_authenticator_counter_is_rejected() {
    let h = harness();
    h.authenticator.set_counter(5);
    h.authenticator.freeze_counter(true);

    let first = h.generator.generate_proof(None, &[]).await.unwrap();
    let second = h.generator.generate_proof(None, &[]).await.unwrap();
    assert_eq!(first.counter, 5);

    h.verifier.verify(first).await.unwrap();
    let err = h.verifier.verify(second).await.unwrap_err();
    assert_eq!(
        err,
        ProofError::CounterNotIncreasing {
            last: 5,
            presented: 5
        }
    );
    assert!(err.is_security_violation());
}

#[tokio::test]
async fn backend_rejection_and_tampering_are_security_violations() {
    let h = harness();

    let mut tampered = h.generator.generate_proof(None, &[]).await.unwrap();
    tampered.signature[0] ^= 0xFF;
    let err = h.verifier.verify(tampered).await.unwrap_err();
    assert_matches!(err, ProofError::Rejected { ref reason } if reason == "signature mismatch");
    assert_eq!(err.code(), StatusCode::AssertionRejected);

    h.backend.force_reject(Some("credential revoked"));
    let proof = h.generator.generate_proof(None, &[]).await.unwrap();
    let err = h.verifier.verify(proof).await.unwrap_err();
    assert!(err.is_security_violation());
}

#[tokio::test]
async fn verifier_clones_share_one_guard() {
    let h = harness();
    let other = h.verifier.clone();
    let proof = h.generator.generate_proof(None, &[]).await.unwrap();
    let replayed = proof.clone();

    h.verifier.verify(proof).await.unwrap();
    assert_eq!(
        other.verify(replayed).await.unwrap_err(),
        ProofError::ReplayDetected
    );
    assert_eq!(other.guard().consumed_len(), 1);
}
