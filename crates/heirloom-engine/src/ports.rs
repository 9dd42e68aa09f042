//! Capabilities the Will Engine needs from its collaborators.
//!
//! The engine never reaches into a registry directly. Each collaborator is
//! seen through the narrowest trait that covers what the engine does with it,
//! so tests can substitute any of them.

use crate::treasury::TreasuryError;
use heirloom_bridge::{BridgeError, BridgeLedger, LockedBalance};
use heirloom_core::{Address, ChainId, TokenId, WillId};
use heirloom_kyc::KycRegistry;
use heirloom_oracle::OracleRegistry;

/// Identity verification as seen by the engine.
pub trait KycPort {
    /// Current, unexpired verification.
    fn is_verified(&self, subject: &Address, now: u64) -> bool;

    /// Make sure a record exists for a freshly added nominee.
    fn register_subject(&mut self, subject: Address);
}

/// Read-only view of oracle attestations.
pub trait OracleView {
    fn attestation_count(&self, will_id: WillId) -> usize;
}

/// Cross-chain balances and payouts.
pub trait BridgePort {
    fn locked_balances(&self, will_id: WillId) -> Vec<LockedBalance>;

    fn request_release(
        &mut self,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
        amount: u128,
        now: u64,
    ) -> Result<u64, BridgeError>;
}

/// Home-chain value transfer.
pub trait Treasury {
    fn balance_of(&self, account: &Address, token: &TokenId) -> u128;

    fn transfer(
        &mut self,
        token: TokenId,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), TreasuryError>;
}

impl KycPort for KycRegistry {
    fn is_verified(&self, subject: &Address, now: u64) -> bool {
        KycRegistry::is_verified(self, subject, now)
    }

    fn register_subject(&mut self, subject: Address) {
        KycRegistry::register_subject(self, subject);
    }
}

impl OracleView for OracleRegistry {
    fn attestation_count(&self, will_id: WillId) -> usize {
        OracleRegistry::attestation_count(self, will_id)
    }
}

impl BridgePort for BridgeLedger {
    fn locked_balances(&self, will_id: WillId) -> Vec<LockedBalance> {
        BridgeLedger::locked_balances(self, will_id).to_vec()
    }

    fn request_release(
        &mut self,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
        amount: u128,
        now: u64,
    ) -> Result<u64, BridgeError> {
        BridgeLedger::request_release(self, will_id, token, chain_id, nominee, amount, now)
    }
}
