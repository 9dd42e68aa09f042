//! Locked balances and release records

use heirloom_core::{Address, ChainId, TokenId, WillId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Funds a will holds on a remote chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedBalance {
    pub will_id: WillId,
    pub token: TokenId,
    pub chain_id: ChainId,
    /// Amount still locked (minor units)
    pub amount: u128,
    /// Portion of `amount` earmarked by pending releases
    pub reserved: u128,
    pub last_locked_at: u64,
}

impl LockedBalance {
    /// Amount not yet earmarked for a release.
    pub fn available(&self) -> u128 {
        self.amount.saturating_sub(self.reserved)
    }
}

/// A release instruction issued on behalf of a nominee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub id: u64,
    pub will_id: WillId,
    pub token: TokenId,
    pub chain_id: ChainId,
    pub nominee: Address,
    pub amount: u128,
    /// Validators that approved this release
    pub approvals: BTreeSet<Address>,
    pub requested_at: u64,
    pub executed_at: Option<u64>,
}

impl ReleaseRecord {
    pub fn is_executed(&self) -> bool {
        self.executed_at.is_some()
    }

    pub(crate) fn matches(
        &self,
        will_id: WillId,
        token: &TokenId,
        chain_id: ChainId,
        nominee: &Address,
    ) -> bool {
        self.will_id == will_id
            && &self.token == token
            && self.chain_id == chain_id
            && &self.nominee == nominee
    }
}

/// Result of `execute_release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseOutcome {
    /// Funds left the locked balance in this call.
    Executed { amount: u128 },
    /// The release had already been executed; nothing changed.
    AlreadyExecuted,
}
