//! Device fingerprint handler

use async_trait::async_trait;
use presence_core::effects::DeviceEffects;
use presence_core::{DeviceFingerprint, PresenceError, Result};
use sha2::{Digest, Sha256};

/// Fingerprint supplied by the host platform.
#[derive(Debug, Clone)]
pub struct StaticDeviceFingerprint {
    fingerprint: DeviceFingerprint,
}

impl StaticDeviceFingerprint {
    /// Use `fingerprint` verbatim
    pub fn new(fingerprint: impl Into<DeviceFingerprint>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
        }
    }

    /// Derive a fingerprint from stable host attributes.
    ///
    /// Attributes are length-prefixed before hashing so `["ab", "c"]` and
    /// `["a", "bc"]` never collide.
    pub fn from_attributes<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for attr in attributes {
            let bytes = attr.as_ref().as_bytes();
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        }
        Self::new(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl DeviceEffects for StaticDeviceFingerprint {
    async fn device_fingerprint(&self) -> Result<DeviceFingerprint> {
        if self.fingerprint.is_empty() {
            return Err(PresenceError::not_found("device fingerprint unavailable"));
        }
        Ok(self.fingerprint.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn attribute_boundaries_matter() {
        let a = StaticDeviceFingerprint::from_attributes(["ab", "c"]);
        let b = StaticDeviceFingerprint::from_attributes(["a", "bc"]);
        assert_ne!(
            a.device_fingerprint().await.unwrap(),
            b.device_fingerprint().await.unwrap()
        );
    }

    #[tokio::test]
    async fn empty_fingerprint_is_not_found() {
        let device = StaticDeviceFingerprint::new("");
        assert!(matches!(
            device.device_fingerprint().await,
            Err(PresenceError::NotFound { .. })
        ));
    }
}
