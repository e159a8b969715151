//! Replay protection
//!
//! Every challenge is accepted at most once, and each credential's signature
//! counter must strictly increase. Authenticators that do not implement a
//! counter report zero on every assertion; a zero following a zero is
//! accepted, anything else that fails to increase is rejected.
//!
//! Freshness is judged from the time this process recorded when it issued a
//! challenge, never from a timestamp carried inside the proof. A challenge
//! that was never issued here, or whose issue record has lapsed, is refused.
//!
//! Verification is split in two. `check` is read-only and runs before the
//! backend signature check; `commit` repeats the check under the same lock
//! and records the challenge and counter, and runs only once the backend has
//! accepted the assertion. A rejected or unverifiable proof leaves no trace.

use crate::error::ProofError;
use parking_lot::Mutex;
use presence_core::{CredentialId, PhysicalTime, PresenceProof};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

type ChallengeDigest = [u8; 32];

#[derive(Debug, Default)]
struct ReplayState {
    issued: HashMap<ChallengeDigest, PhysicalTime>,
    consumed: HashMap<ChallengeDigest, PhysicalTime>,
    counters: HashMap<CredentialId, u32>,
}

impl ReplayState {
    fn prune(&mut self, now: PhysicalTime, window_ms: u64) {
        self.consumed
            .retain(|_, consumed_at| now.millis_since(*consumed_at) <= window_ms);
    }

    fn check(
        &self,
        digest: &ChallengeDigest,
        proof: &PresenceProof,
        now: PhysicalTime,
        window_ms: u64,
    ) -> Result<(), ProofError> {
        if self.consumed.contains_key(digest) {
            tracing::error!(proof_id = %proof.proof_id, "challenge replay rejected");
            return Err(ProofError::ReplayDetected);
        }

        let Some(&issued_at) = self.issued.get(digest) else {
            tracing::error!(proof_id = %proof.proof_id, "challenge was not issued here");
            return Err(ProofError::UnknownChallenge);
        };
        let age_ms = now.millis_since(issued_at);
        if age_ms > window_ms {
            tracing::error!(proof_id = %proof.proof_id, age_ms, "stale proof rejected");
            return Err(ProofError::Expired { age_ms });
        }

        if let Some(&last) = self.counters.get(&proof.credential_id) {
            let increasing = proof.counter > last || (proof.counter == 0 && last == 0);
            if !increasing {
                tracing::error!(
                    credential = %proof.credential_id,
                    last,
                    presented = proof.counter,
                    "signature counter regression rejected"
                );
                return Err(ProofError::CounterNotIncreasing {
                    last,
                    presented: proof.counter,
                });
            }
        }
        Ok(())
    }
}

/// Tracks issued and consumed challenges and per-credential counters.
#[derive(Debug)]
pub struct ReplayGuard {
    window_ms: u64,
    state: Mutex<ReplayState>,
}

fn digest(challenge: &[u8]) -> ChallengeDigest {
    Sha256::digest(challenge).into()
}

impl ReplayGuard {
    /// Create a guard accepting challenges for `window` after issue.
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            state: Mutex::new(ReplayState::default()),
        }
    }

    /// Record that `challenge` was handed to the authenticator at `issued_at`.
    ///
    /// A challenge that was already consumed stays consumed, and re-issuing an
    /// outstanding challenge keeps its first issue time.
    pub fn register_issued(&self, challenge: &[u8], issued_at: PhysicalTime) {
        let digest = digest(challenge);
        let mut state = self.state.lock();
        let window_ms = self.window_ms;
        state
            .issued
            .retain(|_, at| issued_at.millis_since(*at) <= window_ms);
        if state.consumed.contains_key(&digest) {
            tracing::warn!("consumed challenge offered again; not reopening it");
            return;
        }
        state.issued.entry(digest).or_insert(issued_at);
    }

    /// Check `proof` without recording anything.
    pub fn check(&self, proof: &PresenceProof, now: PhysicalTime) -> Result<(), ProofError> {
        let mut state = self.state.lock();
        state.prune(now, self.window_ms);
        state.check(&digest(&proof.challenge), proof, now, self.window_ms)
    }

    /// Check `proof` again and consume its challenge and counter.
    ///
    /// Call only after the assertion has been accepted. Concurrent commits of
    /// the same challenge are serialised; the second one is a replay.
    pub fn commit(&self, proof: &PresenceProof, now: PhysicalTime) -> Result<(), ProofError> {
        let digest = digest(&proof.challenge);
        let mut state = self.state.lock();
        state.prune(now, self.window_ms);
        state.check(&digest, proof, now, self.window_ms)?;

        state.issued.remove(&digest);
        state.consumed.insert(digest, now);
        state
            .counters
            .insert(proof.credential_id.clone(), proof.counter);
        Ok(())
    }

    /// Number of consumed challenges currently remembered.
    pub fn consumed_len(&self) -> usize {
        self.state.lock().consumed.len()
    }

    /// Number of issued challenges awaiting a proof.
    pub fn outstanding_len(&self) -> usize {
        self.state.lock().issued.len()
    }

    /// Last accepted counter for `credential`.
    pub fn last_counter(&self, credential: &CredentialId) -> Option<u32> {
        self.state.lock().counters.get(credential).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_core::ProofId;

    fn proof(challenge: u8, credential: u8, counter: u32) -> PresenceProof {
        PresenceProof {
            proof_id: ProofId::new(),
            challenge: vec![challenge; 32],
            signature: vec![1; 64],
            authenticator_data: vec![0; 37],
            client_data_digest: vec![0; 32],
            credential_id: CredentialId::new(vec![credential]),
            counter,
            created_at: PhysicalTime::from_millis(0),
        }
    }

    fn at(ms: u64) -> PhysicalTime {
        PhysicalTime::from_millis(ms)
    }

    fn guard_with(window_ms: u64, challenges: &[u8]) -> ReplayGuard {
        let guard = ReplayGuard::new(Duration::from_millis(window_ms));
        for &c in challenges {
            guard.register_issued(&[c; 32], at(0));
        }
        guard
    }

    fn accept(guard: &ReplayGuard, p: &PresenceProof, now: PhysicalTime) -> Result<(), ProofError> {
        guard.check(p, now)?;
        guard.commit(p, now)
    }

    #[test]
    fn challenge_is_single_use() {
        let guard = guard_with(300_000, &[1]);
        accept(&guard, &proof(1, 1, 1), at(0)).unwrap();
        assert_eq!(
            accept(&guard, &proof(1, 2, 5), at(10)),
            Err(ProofError::ReplayDetected)
        );
    }

    #[test]
    fn challenge_not_issued_here_is_refused() {
        let guard = guard_with(300_000, &[1]);
        assert_eq!(
            accept(&guard, &proof(2, 1, 1), at(0)),
            Err(ProofError::UnknownChallenge)
        );
    }

    #[test]
    fn counter_must_increase_per_credential() {
        let guard = guard_with(300_000, &[1, 2, 3, 4]);
        accept(&guard, &proof(1, 1, 5), at(0)).unwrap();
        assert_eq!(
            accept(&guard, &proof(2, 1, 5), at(1)),
            Err(ProofError::CounterNotIncreasing {
                last: 5,
                presented: 5
            })
        );
        // other credentials track their own counters
        accept(&guard, &proof(3, 2, 1), at(2)).unwrap();
        accept(&guard, &proof(4, 1, 6), at(3)).unwrap();
        assert_eq!(guard.last_counter(&CredentialId::new(vec![1])), Some(6));
    }

    #[test]
    fn zero_counter_authenticators_are_accepted() {
        let guard = guard_with(300_000, &[1, 2, 3, 4]);
        accept(&guard, &proof(1, 1, 0), at(0)).unwrap();
        accept(&guard, &proof(2, 1, 0), at(1)).unwrap();
        accept(&guard, &proof(3, 1, 4), at(2)).unwrap();
        assert!(accept(&guard, &proof(4, 1, 0), at(3)).is_err());
    }

    #[test]
    fn check_alone_records_nothing() {
        let guard = guard_with(300_000, &[1, 2]);
        guard.check(&proof(1, 1, 1_000_000), at(0)).unwrap();
        assert_eq!(guard.consumed_len(), 0);
        assert_eq!(guard.last_counter(&CredentialId::new(vec![1])), None);

        accept(&guard, &proof(2, 1, 6), at(1)).unwrap();
        // challenge 1 is still outstanding and its proof was never committed
        accept(&guard, &proof(1, 1, 7), at(2)).unwrap();
    }

    #[test]
    fn failed_check_records_nothing() {
        let guard = guard_with(300_000, &[1, 2]);
        accept(&guard, &proof(1, 1, 5), at(0)).unwrap();
        assert!(accept(&guard, &proof(2, 1, 3), at(1)).is_err());
        // challenge 2 was not consumed by the failed attempt
        accept(&guard, &proof(2, 1, 6), at(2)).unwrap();
    }

    #[test]
    fn second_commit_of_a_checked_challenge_is_a_replay() {
        let guard = guard_with(300_000, &[1]);
        let p = proof(1, 1, 0);
        guard.check(&p, at(0)).unwrap();
        guard.check(&p, at(0)).unwrap();
        guard.commit(&p, at(1)).unwrap();
        assert_eq!(guard.commit(&p, at(2)), Err(ProofError::ReplayDetected));
    }

    #[test]
    fn freshness_uses_issue_time_not_proof_timestamp() {
        let guard = guard_with(1_000, &[1]);
        let mut p = proof(1, 1, 0);
        p.created_at = at(5_000);
        assert_eq!(
            guard.check(&p, at(1_500)),
            Err(ProofError::Expired { age_ms: 1_500 })
        );
    }

    #[test]
    fn challenge_stays_refused_after_window() {
        let guard = guard_with(1_000, &[1]);
        let p = proof(1, 1, 0);
        accept(&guard, &p, at(0)).unwrap();

        let mut replayed = p.clone();
        replayed.created_at = at(5_000);
        assert!(accept(&guard, &replayed, at(5_000)).is_err());
        assert_eq!(guard.consumed_len(), 0);

        // the issue record went with the commit, so the lapsed consumed
        // record does not reopen the challenge
        assert_eq!(
            accept(&guard, &replayed, at(6_000)),
            Err(ProofError::UnknownChallenge)
        );
    }

    #[test]
    fn consumed_challenge_is_not_reopened_by_reissue() {
        let guard = guard_with(300_000, &[1]);
        accept(&guard, &proof(1, 1, 0), at(0)).unwrap();
        guard.register_issued(&[1; 32], at(10));
        assert_eq!(guard.outstanding_len(), 0);
        assert_eq!(
            accept(&guard, &proof(1, 1, 0), at(20)),
            Err(ProofError::ReplayDetected)
        );
    }

    #[test]
    fn reissue_keeps_first_issue_time() {
        let guard = guard_with(1_000, &[1]);
        guard.register_issued(&[1; 32], at(900));
        assert_eq!(
            guard.check(&proof(1, 1, 0), at(1_200)),
            Err(ProofError::Expired { age_ms: 1_200 })
        );
    }
}
