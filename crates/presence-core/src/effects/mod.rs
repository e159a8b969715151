//! Effect trait definitions
//!
//! Pure trait definitions for every side effect the presence subsystem
//! performs. This module defines **what** effects can be performed; handlers
//! define **how**.
//!
//! # Effect Classification
//!
//! ## Infrastructure Effects (`presence-effects`)
//! OS integration with no presence-specific semantics:
//! - **Time**, **Random**, **Storage**, **Device**
//!
//! ## Collaborator Effects
//! Boundaries to systems this workspace does not own:
//! - **Authenticator**: hardware-backed platform authenticator
//! - **Backend**: remote identity store (challenges, assertion checks,
//!   recovery lookups, telemetry)
//! - **License**: entitlement service
//!
//! Mock handlers for all of these live in `presence-testkit`.

pub mod authenticator;
pub mod backend;
pub mod device;
pub mod license;
pub mod random;
pub mod storage;
pub mod time;

pub use authenticator::{
    encode_authenticator_data, AssertionRequest, AuthenticatorAssertion, AuthenticatorError,
    PlatformAuthenticatorEffects, UserVerification, AUTHENTICATOR_DATA_MIN_LEN, FLAG_USER_PRESENT,
    FLAG_USER_VERIFIED,
};
pub use backend::{
    AnchorPointer, AssertionVerdict, BackendIdentityRecord, HandshakeEvent, HandshakeOutcome,
    IdentityBackendEffects,
};
pub use device::DeviceEffects;
pub use license::LicenseEffects;
pub use random::RandomEffects;
pub use storage::{StorageEffects, StorageError};
pub use time::TimeEffects;
