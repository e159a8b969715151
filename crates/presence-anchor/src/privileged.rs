//! Privileged device capability
//!
//! A narrowly scoped, audited allow-list of device fingerprints that count as
//! anchored without a sealed record and that land on an internal page after a
//! kill-switch. Entries are SHA-256 hex digests of the fingerprint, so the
//! configuration never holds a raw device identifier. The default list is
//! empty, which disables the capability.

use crate::error::AnchorError;
use presence_core::DeviceFingerprint;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Allow-list of privileged device fingerprints, kept as SHA-256 digests.
#[derive(Debug, Clone, Default)]
pub struct PrivilegedDevicePolicy {
    digests: Vec<[u8; 32]>,
}

impl PrivilegedDevicePolicy {
    /// Parse hex digests. Any malformed entry rejects the whole list.
    pub fn from_hex_digests(entries: &[String]) -> Result<Self, AnchorError> {
        let mut digests = Vec::with_capacity(entries.len());
        for entry in entries {
            let bytes = hex::decode(entry.trim()).map_err(|e| AnchorError::Invalid {
                reason: format!("privileged device digest: {e}"),
            })?;
            let digest: [u8; 32] = bytes.try_into().map_err(|_| AnchorError::Invalid {
                reason: "privileged device digest must be 32 bytes".to_string(),
            })?;
            digests.push(digest);
        }
        Ok(Self { digests })
    }

    /// Digest form of a fingerprint, as it appears in the allow-list.
    pub fn digest_of(fingerprint: &DeviceFingerprint) -> String {
        hex::encode(Sha256::digest(fingerprint.as_str().as_bytes()))
    }

    /// No device is privileged.
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Whether `fingerprint` holds the capability. Every entry is compared.
    pub fn grants(&self, fingerprint: &DeviceFingerprint) -> bool {
        let candidate: [u8; 32] = Sha256::digest(fingerprint.as_str().as_bytes()).into();
        let mut granted = subtle::Choice::from(0u8);
        for digest in &self.digests {
            granted |= digest.as_slice().ct_eq(candidate.as_slice());
        }
        let granted: bool = granted.into();
        if granted {
            let digest = Self::digest_of(fingerprint);
            tracing::info!(
                device = digest.get(..8).unwrap_or(""),
                "privileged device capability exercised"
            );
        }
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_grants_nothing() {
        let policy = PrivilegedDevicePolicy::default();
        assert!(!policy.grants(&DeviceFingerprint::new("anything")));
    }

    #[test]
    fn listed_digest_is_granted() {
        let owner = DeviceFingerprint::new("owner-device");
        let policy =
            PrivilegedDevicePolicy::from_hex_digests(&[PrivilegedDevicePolicy::digest_of(&owner)])
                .unwrap();
        assert!(policy.grants(&owner));
        assert!(!policy.grants(&DeviceFingerprint::new("other-device")));
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(PrivilegedDevicePolicy::from_hex_digests(&["zz".to_string()]).is_err());
        assert!(PrivilegedDevicePolicy::from_hex_digests(&["abcd".to_string()]).is_err());
    }
}
