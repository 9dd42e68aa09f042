//! Oracle fixtures: each test oracle is identified by a small index that
//! fixes both its account and its signing key.

use crate::attestation::sign_attestation;
use heirloom_core::{Address, Digest, WillId};
use secp256k1::{PublicKey, Secp256k1, SecretKey};

pub const fn oracle_account(index: u8) -> Address {
    Address::from_low_u8(0xC0 + index)
}

pub struct TestOracle {
    pub account: Address,
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl TestOracle {
    /// Key material is the SHA-256 of a per-index label, so oracles never
    /// share a key and the same index always signs the same way.
    pub fn new(index: u8) -> Self {
        let seed = Digest::sha256([b"heirloom/test-oracle/".as_slice(), &[index]].concat());
        let secret = SecretKey::from_slice(seed.as_bytes()).unwrap();
        let public = secret.public_key(&Secp256k1::signing_only());
        Self {
            account: oracle_account(index),
            secret,
            public,
        }
    }

    pub fn sign(&self, will_id: WillId, proof_hash: &Digest) -> Vec<u8> {
        sign_attestation(&self.secret, will_id, proof_hash)
    }
}
