//! Presence Anchor - Device-Local Identity Binding
//!
//! **Purpose**: bind an identity hash to this device with a one-way token,
//! keep that binding sealed in local storage, and rebuild it from the
//! identity backend after local storage is lost.
//!
//! # Record format
//!
//! One blob under a fixed storage key: `base64(IV || AES-256-GCM ciphertext)`
//! over the JSON record `{token, identity_hash, phone_ref?, palm_hash?}`. The
//! record key is derived once with Argon2id from the application secret.
//!
//! # Failure policy
//!
//! A record that cannot be decoded or decrypted reads as "not anchored".
//! Remote pointer mirroring and removal are best effort. Only local storage
//! failures are reported to the caller.

#![forbid(unsafe_code)]

pub mod error;
pub mod privileged;
pub mod seal;
pub mod store;
pub mod token;

pub use error::AnchorError;
pub use privileged::PrivilegedDevicePolicy;
pub use seal::RecordKey;
pub use store::{AnchorRecord, DeviceAnchorStore};
pub use token::{anchor_token, AnchorToken};
