//! Record key derivation and authenticated encryption
//!
//! Blob layout: `base64(IV || ciphertext)`, 12-byte IV, AES-256-GCM.

use crate::error::AnchorError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use presence_core::codec;
use presence_core::config::AnchorConfig;
use zeroize::Zeroizing;

/// AES-GCM IV length
pub const IV_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Symmetric key for the sealed anchor record. Zeroized on drop.
pub struct RecordKey(Zeroizing<[u8; KEY_LEN]>);

impl std::fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecordKey(..)")
    }
}

impl RecordKey {
    /// Derive the record key with Argon2id from the configured secret and salt.
    pub fn derive(config: &AnchorConfig) -> Result<Self, AnchorError> {
        let params = Params::new(
            config.kdf_memory_kib,
            config.kdf_iterations,
            config.kdf_parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| AnchorError::KeyDerivation {
            reason: format!("invalid Argon2 params: {e}"),
        })?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(
                config.app_secret.as_bytes(),
                config.key_salt.as_bytes(),
                key.as_mut_slice(),
            )
            .map_err(|e| AnchorError::KeyDerivation {
                reason: e.to_string(),
            })?;
        Ok(Self(key))
    }

    fn cipher(&self) -> Result<Aes256Gcm, AnchorError> {
        Aes256Gcm::new_from_slice(self.0.as_slice()).map_err(|e| AnchorError::Seal {
            reason: format!("cipher init: {e}"),
        })
    }

    /// Encrypt `plaintext` under `iv` and encode the blob.
    pub fn seal(&self, plaintext: &[u8], iv: &[u8; IV_LEN]) -> Result<String, AnchorError> {
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(iv), plaintext)
            .map_err(|e| AnchorError::Seal {
                reason: format!("encryption failed: {e}"),
            })?;
        let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
        blob.extend_from_slice(iv);
        blob.extend_from_slice(&ciphertext);
        Ok(codec::encode_b64(&blob))
    }

    /// Decode and decrypt a blob produced by `seal`.
    pub fn open(&self, blob: &str) -> Result<Zeroizing<Vec<u8>>, AnchorError> {
        let bytes = codec::decode_b64(blob.trim()).map_err(|e| AnchorError::Seal {
            reason: format!("blob encoding: {e}"),
        })?;
        if bytes.len() <= IV_LEN {
            return Err(AnchorError::Seal {
                reason: format!("blob too short ({} bytes)", bytes.len()),
            });
        }
        let (iv, ciphertext) = bytes.split_at(IV_LEN);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| AnchorError::Seal {
                reason: "decryption failed (corrupt record or foreign key)".to_string(),
            })?;
        Ok(Zeroizing::new(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_core::config::PresenceConfig;

    fn key_for(secret: &str) -> RecordKey {
        let mut config = PresenceConfig::for_testing().anchor;
        config.app_secret = secret.to_string();
        RecordKey::derive(&config).unwrap()
    }

    #[test]
    fn sealed_blob_is_iv_then_ciphertext() {
        let key = key_for("secret");
        let blob = key.seal(b"{\"token\":\"t\"}", &[7u8; IV_LEN]).unwrap();
        let raw = codec::decode_b64(&blob).unwrap();
        assert_eq!(&raw[..IV_LEN], &[7u8; IV_LEN]);
        assert_eq!(key.open(&blob).unwrap().as_slice(), b"{\"token\":\"t\"}");
    }

    #[test]
    fn foreign_key_cannot_open() {
        let blob = key_for("secret-a").seal(b"payload", &[1u8; IV_LEN]).unwrap();
        assert!(matches!(
            key_for("secret-b").open(&blob),
            Err(AnchorError::Seal { .. })
        ));
    }

    #[test]
    fn garbage_is_rejected_not_panicking() {
        let key = key_for("secret");
        assert!(key.open("not base64 !!").is_err());
        assert!(key.open(&codec::encode_b64(&[0u8; 5])).is_err());
    }

    #[test]
    fn bad_kdf_params_are_reported() {
        let mut config = PresenceConfig::for_testing().anchor;
        config.kdf_memory_kib = 1;
        assert!(matches!(
            RecordKey::derive(&config),
            Err(AnchorError::KeyDerivation { .. })
        ));
    }
}
