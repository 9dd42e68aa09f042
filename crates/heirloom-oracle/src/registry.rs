//! Oracle accreditation and attestation storage

use crate::attestation::{verify_signature, Attestation};
use heirloom_core::{Address, Digest, ErrorKind, EventSource, LedgerEvent, Role, WillId};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Unauthorized: {0} is not an accredited oracle or admin")]
    Unauthorized(Address),

    #[error("Oracle {oracle} already attested for will #{will_id}")]
    DuplicateAttestation { will_id: WillId, oracle: Address },

    #[error("Attestation signature does not match the oracle's registered key")]
    InvalidSignature,

    #[error("Oracle already accredited: {0}")]
    OracleExists(Address),

    #[error("Oracle not found: {0}")]
    OracleNotFound(Address),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl OracleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OracleError::Unauthorized(_) => ErrorKind::Unauthorized,
            OracleError::DuplicateAttestation { .. } | OracleError::OracleExists(_) => {
                ErrorKind::InvalidState
            }
            OracleError::InvalidSignature | OracleError::InvalidParameter(_) => {
                ErrorKind::InvalidParameter
            }
            OracleError::OracleNotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// An accredited (or formerly accredited) oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub account: Address,
    #[serde(with = "pubkey_serde")]
    pub public_key: PublicKey,
    pub added_at: u64,
    pub active: bool,
    pub attestation_count: u64,
}

mod pubkey_serde {
    use secp256k1::PublicKey;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PublicKey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRegistry {
    admin: Address,
    oracles: BTreeMap<Address, Oracle>,
    /// Attestations per will, in arrival order
    attestations: BTreeMap<WillId, Vec<Attestation>>,
    #[serde(skip)]
    events: Vec<LedgerEvent>,
}

impl OracleRegistry {
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            oracles: BTreeMap::new(),
            attestations: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn add_oracle(
        &mut self,
        caller: Address,
        account: Address,
        public_key: PublicKey,
        now: u64,
    ) -> Result<(), OracleError> {
        self.require_admin(caller)?;
        if self.is_accredited(&account) {
            return Err(OracleError::OracleExists(account));
        }
        let attestation_count = self
            .oracles
            .get(&account)
            .map(|o| o.attestation_count)
            .unwrap_or(0);
        self.oracles.insert(
            account,
            Oracle {
                account,
                public_key,
                added_at: now,
                active: true,
                attestation_count,
            },
        );
        self.events.push(LedgerEvent::RoleGranted {
            role: Role::Oracle,
            account,
        });
        log::info!("Oracle accredited: {}", account);
        Ok(())
    }

    /// De-accredit an oracle. Its past attestations are not invalidated.
    pub fn remove_oracle(&mut self, caller: Address, account: Address) -> Result<(), OracleError> {
        self.require_admin(caller)?;
        let oracle = self
            .oracles
            .get_mut(&account)
            .filter(|o| o.active)
            .ok_or(OracleError::OracleNotFound(account))?;
        oracle.active = false;
        self.events.push(LedgerEvent::RoleRevoked {
            role: Role::Oracle,
            account,
        });
        log::warn!(
            "Oracle {} removed; its past attestations still count",
            account
        );
        Ok(())
    }

    /// Record an attestation for `will_id`. Oracle-only, one per (will, oracle).
    pub fn attest(
        &mut self,
        will_id: WillId,
        oracle: Address,
        proof_hash: Digest,
        signature: &[u8],
        now: u64,
    ) -> Result<usize, OracleError> {
        let entry = self
            .oracles
            .get(&oracle)
            .filter(|o| o.active)
            .ok_or(OracleError::Unauthorized(oracle))?;

        if proof_hash == Digest::default() {
            return Err(OracleError::InvalidParameter(
                "proof hash must not be empty".into(),
            ));
        }
        if self
            .attestations
            .get(&will_id)
            .is_some_and(|list| list.iter().any(|a| a.oracle == oracle))
        {
            return Err(OracleError::DuplicateAttestation { will_id, oracle });
        }
        if !verify_signature(&entry.public_key, will_id, &proof_hash, signature) {
            return Err(OracleError::InvalidSignature);
        }

        let list = self.attestations.entry(will_id).or_default();
        list.push(Attestation {
            will_id,
            oracle,
            proof_hash,
            signature: signature.to_vec(),
            timestamp: now,
            verified: true,
        });
        let count = list.len();

        if let Some(o) = self.oracles.get_mut(&oracle) {
            o.attestation_count += 1;
        }
        self.events.push(LedgerEvent::OracleAttested {
            will_id,
            oracle,
            proof_hash,
        });
        log::info!(
            "Oracle {} attested for will #{} ({} total)",
            oracle,
            will_id,
            count
        );
        Ok(count)
    }

    pub fn attestation_count(&self, will_id: WillId) -> usize {
        self.attestations.get(&will_id).map_or(0, Vec::len)
    }

    pub fn attestations(&self, will_id: WillId) -> &[Attestation] {
        self.attestations
            .get(&will_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_accredited(&self, account: &Address) -> bool {
        self.oracles.get(account).is_some_and(|o| o.active)
    }

    pub fn oracle(&self, account: &Address) -> Option<&Oracle> {
        self.oracles.get(account)
    }

    pub fn oracles(&self) -> impl Iterator<Item = &Oracle> {
        self.oracles.values()
    }

    fn require_admin(&self, caller: Address) -> Result<(), OracleError> {
        if caller != self.admin {
            return Err(OracleError::Unauthorized(caller));
        }
        Ok(())
    }
}

impl EventSource for OracleRegistry {
    fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{oracle_account, TestOracle};

    const ADMIN: Address = Address::from_low_u8(0xAD);
    const ORACLE_A: Address = oracle_account(1);
    const ORACLE_B: Address = oracle_account(2);

    fn registry() -> OracleRegistry {
        let mut registry = OracleRegistry::new(ADMIN);
        registry
            .add_oracle(ADMIN, ORACLE_A, TestOracle::new(1).public, 0)
            .unwrap();
        registry
            .add_oracle(ADMIN, ORACLE_B, TestOracle::new(2).public, 0)
            .unwrap();
        registry
    }

    #[test]
    fn test_add_oracle_admin_only() {
        let mut registry = OracleRegistry::new(ADMIN);
        let err = registry
            .add_oracle(ORACLE_A, ORACLE_A, TestOracle::new(1).public, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(!registry.is_accredited(&ORACLE_A));
    }

    #[test]
    fn test_attest_counts_per_will() {
        let mut registry = registry();
        let proof = Digest::sha256(b"death-certificate");
        let oracle_a = TestOracle::new(1);
        let oracle_b = TestOracle::new(2);

        assert_eq!(registry.attestation_count(1), 0);
        let n = registry
            .attest(1, ORACLE_A, proof, &oracle_a.sign(1, &proof), 100)
            .unwrap();
        assert_eq!(n, 1);
        registry
            .attest(1, ORACLE_B, proof, &oracle_b.sign(1, &proof), 110)
            .unwrap();

        assert_eq!(registry.attestation_count(1), 2);
        assert_eq!(registry.attestation_count(2), 0);
        assert!(registry.attestations(1).iter().all(|a| a.verified));
        assert_eq!(registry.oracle(&ORACLE_A).unwrap().attestation_count, 1);
    }

    #[test]
    fn test_attest_requires_accredited_oracle() {
        let mut registry = registry();
        // Index 9 was never accredited
        let oracle = TestOracle::new(9);
        let stranger = oracle.account;
        let proof = Digest::sha256(b"forged");

        let err = registry
            .attest(1, stranger, proof, &oracle.sign(1, &proof), 100)
            .unwrap_err();
        assert_eq!(err, OracleError::Unauthorized(stranger));
        assert_eq!(registry.attestation_count(1), 0);
    }

    #[test]
    fn test_duplicate_attestation_rejected() {
        let mut registry = registry();
        let proof = Digest::sha256(b"death-certificate");
        let oracle_a = TestOracle::new(1);
        let sig = oracle_a.sign(1, &proof);

        registry.attest(1, ORACLE_A, proof, &sig, 100).unwrap();
        let err = registry.attest(1, ORACLE_A, proof, &sig, 101).unwrap_err();
        assert_eq!(
            err,
            OracleError::DuplicateAttestation {
                will_id: 1,
                oracle: ORACLE_A
            }
        );
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(registry.attestation_count(1), 1);
    }

    #[test]
    fn test_signature_from_wrong_key_rejected() {
        let mut registry = registry();
        let proof = Digest::sha256(b"death-certificate");
        let oracle_b = TestOracle::new(2);

        // ORACLE_A registered the index-1 key
        let err = registry
            .attest(1, ORACLE_A, proof, &oracle_b.sign(1, &proof), 100)
            .unwrap_err();
        assert_eq!(err, OracleError::InvalidSignature);
    }

    #[test]
    fn test_removed_oracle_keeps_past_attestations() {
        let mut registry = registry();
        let proof = Digest::sha256(b"death-certificate");
        let oracle_a = TestOracle::new(1);

        registry
            .attest(1, ORACLE_A, proof, &oracle_a.sign(1, &proof), 100)
            .unwrap();
        registry.remove_oracle(ADMIN, ORACLE_A).unwrap();

        assert_eq!(registry.attestation_count(1), 1);
        let err = registry
            .attest(2, ORACLE_A, proof, &oracle_a.sign(2, &proof), 200)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_remove_unknown_oracle() {
        let mut registry = registry();
        let unknown = Address::from_low_u8(0x77);
        assert_eq!(
            registry.remove_oracle(ADMIN, unknown),
            Err(OracleError::OracleNotFound(unknown))
        );
    }

    #[test]
    fn test_registry_serde_roundtrip() {
        let mut registry = registry();
        let proof = Digest::sha256(b"death-certificate");
        let oracle_a = TestOracle::new(1);
        registry
            .attest(3, ORACLE_A, proof, &oracle_a.sign(3, &proof), 100)
            .unwrap();

        let json = serde_json::to_string(&registry).unwrap();
        let restored: OracleRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.attestation_count(3), 1);
        assert_eq!(
            restored.oracle(&ORACLE_A).unwrap().public_key,
            TestOracle::new(1).public
        );
    }
}
