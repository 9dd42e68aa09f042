//! Attestation records and their signature scheme

use heirloom_core::{Address, Digest, WillId};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

const DOMAIN_TAG: &[u8] = b"heirloom/attestation";

/// A stored oracle attestation for one will.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub will_id: WillId,
    pub oracle: Address,
    /// Hash of the off-chain proof (death certificate, court order)
    pub proof_hash: Digest,
    /// Compact 64-byte ECDSA signature
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub timestamp: u64,
    /// Signature checked against the oracle's registered key
    pub verified: bool,
}

/// The message an oracle signs for `(will_id, proof_hash)`.
pub fn attestation_digest(will_id: WillId, proof_hash: &Digest) -> Digest {
    let mut data = Vec::with_capacity(DOMAIN_TAG.len() + 8 + 32);
    data.extend_from_slice(DOMAIN_TAG);
    data.extend_from_slice(&will_id.to_be_bytes());
    data.extend_from_slice(proof_hash.as_bytes());
    Digest::sha256(data)
}

/// Produce the compact signature an oracle submits with [`attestation_digest`].
pub fn sign_attestation(secret_key: &SecretKey, will_id: WillId, proof_hash: &Digest) -> Vec<u8> {
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest(attestation_digest(will_id, proof_hash).to_array());
    secp.sign_ecdsa(&msg, secret_key)
        .serialize_compact()
        .to_vec()
}

/// Check a compact signature against an oracle key.
pub(crate) fn verify_signature(
    public_key: &PublicKey,
    will_id: WillId,
    proof_hash: &Digest,
    signature: &[u8],
) -> bool {
    let Ok(sig) = Signature::from_compact(signature) else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(attestation_digest(will_id, proof_hash).to_array());
    secp.verify_ecdsa(&msg, &sig, public_key).is_ok()
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestOracle;

    #[test]
    fn test_digest_binds_will_and_proof() {
        let proof = Digest::sha256(b"certificate");
        let d1 = attestation_digest(1, &proof);
        let d2 = attestation_digest(2, &proof);
        let d3 = attestation_digest(1, &Digest::sha256(b"other"));
        assert_ne!(d1, d2);
        assert_ne!(d1, d3);
        assert_eq!(d1, attestation_digest(1, &proof));
    }

    #[test]
    fn test_sign_and_verify() {
        let oracle = TestOracle::new(1);
        let proof = Digest::sha256(b"certificate");
        let sig = sign_attestation(&oracle.secret, 7, &proof);
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, oracle.sign(7, &proof));

        assert!(verify_signature(&oracle.public, 7, &proof, &sig));
        assert!(!verify_signature(&oracle.public, 8, &proof, &sig));

        let other = TestOracle::new(2);
        assert_ne!(other.public, oracle.public);
        assert!(!verify_signature(&other.public, 7, &proof, &sig));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let oracle = TestOracle::new(1);
        let proof = Digest::sha256(b"certificate");
        assert!(!verify_signature(&oracle.public, 7, &proof, &[0u8; 10]));
    }

    #[test]
    fn test_attestation_serde() {
        let oracle = TestOracle::new(1);
        let proof = Digest::sha256(b"certificate");
        let att = Attestation {
            will_id: 1,
            oracle: oracle.account,
            proof_hash: proof,
            signature: oracle.sign(1, &proof),
            timestamp: 1_700_000_000,
            verified: true,
        };
        let json = serde_json::to_string(&att).unwrap();
        let back: Attestation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, att);
    }
}
