//! One-way anchor token
//!
//! `token = hex(SHA-256(len(identity) || identity || len(fingerprint) ||
//! fingerprint || len(salt) || salt))`, lengths as big-endian `u64`. Length
//! prefixes keep `("ab", "c")` and `("a", "bc")` apart.

use presence_core::{DeviceFingerprint, IdentityHash};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Hex-encoded one-way binding of an identity to a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorToken(String);

impl AnchorToken {
    /// Hex form of the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison
    pub fn matches(&self, other: &AnchorToken) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl fmt::Display for AnchorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn update_prefixed(hasher: &mut Sha256, field: &[u8]) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field);
}

/// Compute the anchor token for `identity` on `fingerprint`.
pub fn anchor_token(
    identity: &IdentityHash,
    fingerprint: &DeviceFingerprint,
    salt: &str,
) -> AnchorToken {
    let mut hasher = Sha256::new();
    update_prefixed(&mut hasher, identity.as_str().as_bytes());
    update_prefixed(&mut hasher, fingerprint.as_str().as_bytes());
    update_prefixed(&mut hasher, salt.as_bytes());
    AnchorToken(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SALT: &str = "salt";

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = anchor_token(&IdentityHash::new("ab"), &DeviceFingerprint::new("c"), SALT);
        let b = anchor_token(&IdentityHash::new("a"), &DeviceFingerprint::new("bc"), SALT);
        assert_ne!(a, b);
    }

    #[test]
    fn token_is_hex_sha256() {
        let t = anchor_token(&IdentityHash::new("h1"), &DeviceFingerprint::new("d1"), SALT);
        assert_eq!(t.as_str().len(), 64);
        assert!(t.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!t.as_str().contains("h1"));
    }

    proptest! {
        #[test]
        fn same_inputs_same_token(identity in "[a-f0-9]{1,64}", device in "[ -~]{1,40}") {
            let identity = IdentityHash::new(identity);
            let device = DeviceFingerprint::new(device);
            let a = anchor_token(&identity, &device, SALT);
            let b = anchor_token(&identity, &device, SALT);
            prop_assert!(a.matches(&b));
        }

        #[test]
        fn different_device_different_token(
            identity in "[a-f0-9]{1,64}",
            d1 in "[a-z0-9]{1,32}",
            d2 in "[a-z0-9]{1,32}",
        ) {
            prop_assume!(d1 != d2);
            let identity = IdentityHash::new(identity);
            let a = anchor_token(&identity, &DeviceFingerprint::new(d1), SALT);
            let b = anchor_token(&identity, &DeviceFingerprint::new(d2), SALT);
            prop_assert_ne!(a, b);
        }

        #[test]
        fn salt_changes_token(identity in "[a-z]{1,16}", device in "[a-z]{1,16}") {
            let identity = IdentityHash::new(identity);
            let device = DeviceFingerprint::new(device);
            prop_assert_ne!(
                anchor_token(&identity, &device, "salt-a"),
                anchor_token(&identity, &device, "salt-b")
            );
        }
    }
}
