//! Device Anchor Store

use crate::error::AnchorError;
use crate::privileged::PrivilegedDevicePolicy;
use crate::seal::{RecordKey, IV_LEN};
use crate::token::{anchor_token, AnchorToken};
use presence_core::config::AnchorConfig;
use presence_core::effects::{
    AnchorPointer, DeviceEffects, IdentityBackendEffects, RandomEffects, StorageEffects,
};
use presence_core::{DeviceFingerprint, IdentityHash, PalmHash, PhoneRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Decrypted anchor record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// One-way device binding token
    pub token: AnchorToken,
    /// Identity the device is anchored to
    pub identity_hash: IdentityHash,
    /// Phone reference used for recovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_ref: Option<PhoneRef>,
    /// Optional palm template hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palm_hash: Option<PalmHash>,
}

/// Encrypted, device-local identity anchor.
pub struct DeviceAnchorStore {
    storage: Arc<dyn StorageEffects>,
    backend: Arc<dyn IdentityBackendEffects>,
    device: Arc<dyn DeviceEffects>,
    random: Arc<dyn RandomEffects>,
    key: RecordKey,
    policy: PrivilegedDevicePolicy,
    storage_key: String,
    token_salt: String,
}

impl DeviceAnchorStore {
    /// Build the store. Derives the record key, which is deliberately slow.
    pub fn new(
        storage: Arc<dyn StorageEffects>,
        backend: Arc<dyn IdentityBackendEffects>,
        device: Arc<dyn DeviceEffects>,
        random: Arc<dyn RandomEffects>,
        config: &AnchorConfig,
    ) -> Result<Self, AnchorError> {
        Ok(Self {
            storage,
            backend,
            device,
            random,
            key: RecordKey::derive(config)?,
            policy: PrivilegedDevicePolicy::from_hex_digests(&config.privileged_devices)?,
            storage_key: config.storage_key.clone(),
            token_salt: config.token_salt.clone(),
        })
    }

    /// Token for `identity` on `fingerprint` under this store's salt.
    pub fn token_for(&self, identity: &IdentityHash, fingerprint: &DeviceFingerprint) -> AnchorToken {
        anchor_token(identity, fingerprint, &self.token_salt)
    }

    /// Fingerprint of this device, if the platform can provide one.
    pub async fn current_device(&self) -> Option<DeviceFingerprint> {
        match self.device.device_fingerprint().await {
            Ok(fp) => Some(fp),
            Err(e) => {
                tracing::warn!(error = %e, "device fingerprint unavailable");
                None
            }
        }
    }

    /// Seal and persist the binding, then mirror `{fingerprint, token}`
    /// remotely (best effort).
    pub async fn anchor(
        &self,
        identity: &IdentityHash,
        fingerprint: &DeviceFingerprint,
        phone_ref: Option<PhoneRef>,
        palm_hash: Option<PalmHash>,
    ) -> Result<AnchorToken, AnchorError> {
        if identity.is_empty() || fingerprint.is_empty() {
            return Err(AnchorError::Invalid {
                reason: "identity hash and device fingerprint are required".to_string(),
            });
        }

        let token = self.token_for(identity, fingerprint);
        let record = AnchorRecord {
            token: token.clone(),
            identity_hash: identity.clone(),
            phone_ref,
            palm_hash,
        };
        let plaintext = Zeroizing::new(serde_json::to_vec(&record).map_err(|e| {
            AnchorError::Seal {
                reason: format!("record encoding: {e}"),
            }
        })?);

        let iv_bytes = self.random.random_bytes(IV_LEN).await;
        let iv: [u8; IV_LEN] = iv_bytes.try_into().map_err(|_| AnchorError::Seal {
            reason: "random source returned a short IV".to_string(),
        })?;
        let blob = self.key.seal(&plaintext, &iv)?;
        self.storage
            .store(&self.storage_key, blob.into_bytes())
            .await?;

        tracing::info!(identity = identity.short(), "device anchored");

        let pointer = AnchorPointer {
            device_fingerprint: fingerprint.clone(),
            token: token.as_str().to_string(),
        };
        if let Err(e) = self.backend.mirror_anchor_pointer(&pointer).await {
            tracing::warn!(error = %e, "anchor pointer mirror failed");
        }
        Ok(token)
    }

    /// Decrypted record, if one is stored and opens. Undecodable or
    /// undecryptable records read as absent.
    pub async fn load(&self) -> Result<Option<AnchorRecord>, AnchorError> {
        let Some(bytes) = self.storage.retrieve(&self.storage_key).await? else {
            return Ok(None);
        };
        let Ok(blob) = String::from_utf8(bytes) else {
            tracing::warn!("anchor record is not text, treating as absent");
            return Ok(None);
        };
        let plaintext = match self.key.open(&blob) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "anchor record unreadable, treating as absent");
                return Ok(None);
            }
        };
        match serde_json::from_slice::<AnchorRecord>(&plaintext) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(error = %e, "anchor record malformed, treating as absent");
                Ok(None)
            }
        }
    }

    /// Identity bound to this device, if anchored.
    pub async fn anchored_identity(&self) -> Option<IdentityHash> {
        match self.load().await {
            Ok(record) => record.map(|r| r.identity_hash),
            Err(e) => {
                tracing::warn!(error = %e, "anchor read failed");
                None
            }
        }
    }

    /// Whether this device holds the privileged device capability.
    pub async fn is_privileged_device(&self) -> bool {
        if self.policy.is_empty() {
            return false;
        }
        match self.current_device().await {
            Some(fp) => self.policy.grants(&fp),
            None => false,
        }
    }

    /// True when a valid record opens locally, or for a privileged device.
    ///
    /// A record whose token does not match this device's fingerprint (copied
    /// from another device) is not valid.
    pub async fn is_anchored(&self) -> bool {
        if self.is_privileged_device().await {
            return true;
        }
        let record = match self.load().await {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "anchor read failed");
                return false;
            }
        };
        match self.current_device().await {
            Some(fp) => {
                let expected = self.token_for(&record.identity_hash, &fp);
                let valid = expected.matches(&record.token);
                if !valid {
                    tracing::warn!("anchor token does not match this device");
                }
                valid
            }
            None => {
                tracing::warn!("cannot confirm device binding without a fingerprint");
                false
            }
        }
    }

    /// Delete the local record and the remote pointer. Idempotent.
    ///
    /// The remote pointer is removed even when the local delete fails; the
    /// local error is returned afterwards.
    pub async fn clear(&self) -> Result<(), AnchorError> {
        let local = self.storage.remove(&self.storage_key).await;
        if let Some(fp) = self.current_device().await {
            if let Err(e) = self.backend.remove_anchor_pointer(&fp).await {
                tracing::warn!(error = %e, "anchor pointer removal failed");
            }
        }
        let existed = local.map_err(|e| {
            tracing::error!(error = %e, "local anchor record could not be deleted");
            e
        })?;
        tracing::info!(existed, "device anchor cleared");
        Ok(())
    }

    /// Deep recovery: rebuild the anchor from the backend record for
    /// `fingerprint`. Returns false, touching nothing, when the backend is
    /// unreachable or holds no enrolled identity for the device.
    pub async fn recover(&self, fingerprint: &DeviceFingerprint) -> Result<bool, AnchorError> {
        let record = match self.backend.lookup_by_device_fingerprint(fingerprint).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "deep recovery lookup failed");
                return Ok(false);
            }
        };
        let Some(record) = record else {
            tracing::debug!("deep recovery: no backend record for device");
            return Ok(false);
        };
        let Some(identity) = record.identity_hash.filter(|h| !h.is_empty()) else {
            tracing::debug!("deep recovery: backend record has no enrolled identity");
            return Ok(false);
        };

        self.anchor(&identity, fingerprint, record.phone_ref, record.palm_hash)
            .await?;
        tracing::info!(identity = identity.short(), "device anchor recovered");
        Ok(true)
    }
}
