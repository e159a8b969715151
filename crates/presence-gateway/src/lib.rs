//! Presence Gateway - Session Security and Route Capabilities
//!
//! **Purpose**: own the process-wide verified/locked state, keep it fresh with
//! periodic re-validation, expire idle sessions, and run the kill-switch.
//! The route gate consumes snapshots of that state.
//!
//! # Components
//!
//! - `SessionGateway`: actor handle; the only writer of `SessionSecurityState`
//! - `PresenceRevalidator` / `AnchoredPresenceRevalidator`: anchor + backend
//!   re-validation with presence expiry
//! - `SsoBus`: sign-on events for connected applications
//! - `gate::authorize`: pure route authorization
//! - `TaskRegistry`: periodic tasks with cooperative shutdown

#![forbid(unsafe_code)]

pub mod error;
pub mod gate;
pub mod gateway;
pub mod revalidate;
pub mod sso;
pub mod state;
pub mod tasks;

pub use error::GatewayError;
pub use gate::{authorize, GateDecision, GateView, LicenseState, RouteTable, RouteTier};
pub use gateway::{GatewayDeps, PurgeOutcome, PurgeReason, SessionGateway};
pub use revalidate::{AnchoredPresenceRevalidator, PresenceRevalidator, Revalidation};
pub use sso::{SsoBus, SsoEvent};
pub use state::SessionSecurityState;
pub use tasks::TaskRegistry;
