//! Presence Agent - Caller-Facing Facade
//!
//! **Purpose**: one handle for UI and host code. Starts handshakes, applies
//! their outcome to the session gateway and the device anchor, gates routes,
//! and exposes the kill-switch and the SSO bus.
//!
//! ```text
//! start_handshake -> SequentialHandshake
//!     SUCCESS  -> SessionGateway::complete_handshake -> DeviceAnchorStore::anchor
//!     security -> SessionGateway::purge_and_lock
//!     always   -> telemetry (detached)
//! ```

#![forbid(unsafe_code)]

pub mod agent;
pub mod builder;
pub mod effects;

pub use agent::PresenceAgent;
pub use builder::PresenceAgentBuilder;
pub use effects::AgentEffects;
