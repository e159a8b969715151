//! Presence Testing Infrastructure
//!
//! Mock handlers for every effect trait in `presence-core`, scripted phase
//! sensors for the handshake engine, and shared fixtures.
//!
//! Add to a crate's dev-dependencies:
//! ```toml
//! [dev-dependencies]
//! presence-testkit = { workspace = true }
//! ```
//!
//! Timing scenarios are meant to run under `#[tokio::test(start_paused = true)]`:
//! scripted delays use `tokio::time::sleep`, so virtual time advances exactly
//! by the scripted amounts.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

pub mod authenticator;
pub mod backend;
pub mod fixtures;
pub mod license;
pub mod random;
pub mod sensors;
pub mod storage;
pub mod time;

pub use authenticator::{AssertionBehavior, MockAuthenticator, MockCredential};
pub use backend::MockIdentityBackend;
pub use fixtures::*;
pub use license::MockLicense;
pub use random::SeededRandom;
pub use sensors::{ScriptedCohesion, ScriptedOutcome, ScriptedSensors};
pub use storage::MemoryStorage;
pub use time::ControllableTimeSource;
