//! Boundary encoding for binary fields
//!
//! Every binary field that crosses a process boundary (proofs, credential ids,
//! challenges) is base64url without padding. Sealed local records use standard
//! base64 with padding.

use crate::errors::{PresenceError, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

/// Encode bytes as unpadded base64url.
pub fn encode_b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode unpadded base64url.
pub fn decode_b64url(text: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(text.trim_end_matches('='))
        .map_err(|e| PresenceError::serialization(format!("invalid base64url: {e}")))
}

/// Encode bytes as padded standard base64.
pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode padded standard base64.
pub fn decode_b64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| PresenceError::serialization(format!("invalid base64: {e}")))
}

/// Serde adapter rendering `Vec<u8>` as base64url.
///
/// Use with `#[serde(with = "presence_core::codec::b64url")]`.
pub mod b64url {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Encode as base64url.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_b64url(bytes))
    }

    /// Decode from base64url.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_b64url(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn b64url_has_no_padding_or_unsafe_chars() {
        let encoded = encode_b64url(&[0xfb, 0xff, 0xfe, 0x00]);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(decode_b64url(&encoded).unwrap(), vec![0xfb, 0xff, 0xfe, 0x00]);
    }

    #[test]
    fn b64url_tolerates_trailing_padding() {
        assert_eq!(decode_b64url("AQI=").unwrap(), vec![1, 2]);
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(matches!(
            decode_b64("***"),
            Err(PresenceError::Serialization { .. })
        ));
    }
}
