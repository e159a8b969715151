//! Presence Proof - Authenticator Assertions as Presence Evidence
//!
//! **Purpose**: turn a challenge into a signed assertion from a hardware-backed
//! platform authenticator, and verify such assertions exactly once.
//!
//! # Flow
//!
//! 1. `ProofGenerator::obtain_challenge` asks the backend for a challenge and
//!    falls back to 32 local random bytes when the backend is unreachable.
//! 2. `ProofGenerator::generate_proof` checks the secure context and
//!    authenticator support, prompts with user verification required, and
//!    packages the assertion as a `PresenceProof`. The challenge and the
//!    time it was issued are registered with the verifier's `ReplayGuard`.
//! 3. `ProofVerifier::verify` checks the `ReplayGuard` (issued here, fresh by
//!    issue time, single use, strictly increasing counter per credential),
//!    asks the backend to check the signature, and only then consumes the
//!    challenge and records the counter.
//!
//! Proofs are moved into the verifier and dropped when it returns; nothing
//! here persists a proof.

#![forbid(unsafe_code)]

pub mod error;
pub mod generator;
pub mod replay;
pub mod verifier;

pub use error::ProofError;
pub use generator::ProofGenerator;
pub use replay::ReplayGuard;
pub use verifier::{ProofVerifier, VerifiedPresence};
