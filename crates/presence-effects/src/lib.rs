//! Presence Effects - Production Handlers
//!
//! **Purpose**: stateless production implementations of the effect traits
//! defined in `presence-core`.
//!
//! **Layer Constraint**: NO mock handlers. Mocks live in `presence-testkit`.
//!
//! - `RealTimeHandler`: wall clock that advances with the runtime clock
//! - `RealRandomHandler`: OS-seeded CSPRNG
//! - `FilesystemStorageHandler`: one file per key, written via temp file + rename
//! - `FallbackAuthenticatorHandler`: null object for hosts without an authenticator
//! - `OfflineIdentityBackend`: null object for deployments without a backend
//! - `UnlicensedHandler`: null object for deployments without a license service
//! - `StaticDeviceFingerprint`: fingerprint supplied by the host

#![forbid(unsafe_code)]

pub mod authenticator;
pub mod backend;
pub mod device;
pub mod license;
pub mod random;
pub mod storage;
pub mod time;

pub use authenticator::FallbackAuthenticatorHandler;
pub use backend::OfflineIdentityBackend;
pub use device::StaticDeviceFingerprint;
pub use license::UnlicensedHandler;
pub use random::RealRandomHandler;
pub use storage::FilesystemStorageHandler;
pub use time::RealTimeHandler;
