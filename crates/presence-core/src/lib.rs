//! Presence Core - Shared Foundation
//!
//! **Purpose**: types, error model and effect interfaces shared by every
//! crate of the presence subsystem. Contains no I/O of its own.
//!
//! # Contents
//!
//! ## Types
//! - `SessionId`, `ProofId`, `CredentialId`: attempt and credential identifiers
//! - `IdentityHash`, `DeviceFingerprint`, `PhoneRef`, `PalmHash`, `OwnerId`:
//!   opaque identity material (never raw biometrics)
//! - `PresenceProof`: transient signed assertion from a platform authenticator
//!
//! ## Errors
//! - `PresenceError`: unified error with a crate-wide `Result<T>` alias
//! - `StatusCode`: stable string codes surfaced to callers, grouped by
//!   `ErrorCategory`
//!
//! ## Effect Interfaces
//! - Infrastructure: `TimeEffects`, `RandomEffects`, `StorageEffects`, `DeviceEffects`
//! - Collaborators: `PlatformAuthenticatorEffects`, `IdentityBackendEffects`,
//!   `LicenseEffects`
//!
//! ## Configuration
//! - `PresenceConfig`: TOML + `PRESENCE_*` environment overrides + validation

#![forbid(unsafe_code)]

/// Base64/base64url boundary encoding
pub mod codec;

/// Stable status codes and error taxonomy
pub mod codes;

/// Configuration loading and validation
pub mod config;

/// Pure effect interfaces (no implementations)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Presence proof data type
pub mod proof;

/// Identifier and timestamp types
pub mod types;

pub use codes::{ErrorCategory, StatusCode};
pub use config::{Configuration, PresenceConfig};
pub use errors::{PresenceError, Result};
pub use proof::PresenceProof;
pub use types::{
    CredentialId, DeviceFingerprint, IdentityHash, OwnerId, PalmHash, PhoneRef, PhysicalTime,
    ProofId, SessionId,
};
