//! Presence proof data type
//!
//! A `PresenceProof` is the transient artifact of one authenticator
//! round-trip. It is verified once and then dropped; it is never written to
//! storage. Binary fields are base64url at the serde boundary.

use crate::types::{CredentialId, PhysicalTime, ProofId};
use serde::{Deserialize, Serialize};

/// Signed assertion produced by a hardware-backed platform authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceProof {
    /// Single-use per-attempt nonce
    pub proof_id: ProofId,
    /// Challenge bytes the authenticator signed over
    #[serde(with = "crate::codec::b64url")]
    pub challenge: Vec<u8>,
    /// Authenticator signature
    #[serde(with = "crate::codec::b64url")]
    pub signature: Vec<u8>,
    /// Raw authenticator data
    #[serde(with = "crate::codec::b64url")]
    pub authenticator_data: Vec<u8>,
    /// SHA-256 digest of the client data
    #[serde(with = "crate::codec::b64url")]
    pub client_data_digest: Vec<u8>,
    /// Credential that produced the assertion
    pub credential_id: CredentialId,
    /// Authenticator signature counter
    pub counter: u32,
    /// When the assertion was produced. Informational only: nothing signs
    /// it, so verifiers judge freshness from their own issue records.
    pub created_at: PhysicalTime,
}

impl PresenceProof {
    /// Age of the proof relative to `now`.
    pub fn age_ms(&self, now: PhysicalTime) -> u64 {
        now.millis_since(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_fields_are_base64url_on_the_wire() {
        let proof = PresenceProof {
            proof_id: ProofId::new(),
            challenge: vec![0xff; 32],
            signature: vec![1, 2, 3],
            authenticator_data: vec![4, 5],
            client_data_digest: vec![6; 32],
            credential_id: CredentialId::new(vec![9, 9]),
            counter: 7,
            created_at: PhysicalTime::from_millis(1_000),
        };

        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(json["signature"], "AQID");
        assert_eq!(json["credentialId"], "CQk");
        assert!(!json["challenge"].as_str().unwrap().contains('='));

        let back: PresenceProof = serde_json::from_value(json).unwrap();
        assert_eq!(back, proof);
        assert_eq!(back.age_ms(PhysicalTime::from_millis(1_500)), 500);
    }
}
