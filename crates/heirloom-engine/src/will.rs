//! Will records and nominee allocations

use crate::distribution::DistributionSnapshot;
use heirloom_core::{Address, Bps, Digest, TokenId, TriggerCause, WillId, MAX_BPS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle state of a will.
///
/// `Active → Triggered` and `Active → Inactive` are the only transitions.
/// Both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WillState {
    Active,
    Inactive,
    Triggered,
}

/// Optional contact details for a nominee. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomineeContact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Ciphertext of any further details, opaque to the ledger
    pub encrypted_details: Option<String>,
}

impl NomineeContact {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomineeAllocation {
    pub nominee: Address,
    pub bps: Bps,
    /// KYC status as last observed by the engine
    pub verified: bool,
    /// `false` once removed by the owner
    pub active: bool,
    pub claimed: bool,
    pub claimed_at: Option<u64>,
    pub added_at: u64,
    pub contact: NomineeContact,
}

/// How and when a will was triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub cause: TriggerCause,
    pub triggered_by: Address,
    pub triggered_at: u64,
    /// Seconds since the last owner activity at trigger time
    pub elapsed_secs: u64,
    /// Oracle attestations on record at trigger time
    pub attestation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Will {
    pub id: WillId,
    pub owner: Address,
    pub name: String,
    pub state: WillState,
    pub created_at: u64,
    pub last_activity: u64,
    /// Seconds of owner silence before the will may trigger
    pub inactivity_period: u64,
    pub requires_oracle: bool,
    /// Hash of the encrypted will document, if one was attached
    pub document_hash: Option<Digest>,
    /// In insertion order; removed nominees stay with `active = false`
    pub nominees: Vec<NomineeAllocation>,
    /// Home-chain balances held in custody for this will
    pub assets: BTreeMap<TokenId, u128>,
    pub trigger: Option<TriggerRecord>,
    pub distribution: Option<DistributionSnapshot>,
}

impl Will {
    pub(crate) fn new(
        id: WillId,
        owner: Address,
        name: String,
        inactivity_period: u64,
        requires_oracle: bool,
        now: u64,
    ) -> Self {
        Self {
            id,
            owner,
            name,
            state: WillState::Active,
            created_at: now,
            last_activity: now,
            inactivity_period,
            requires_oracle,
            document_hash: None,
            nominees: Vec::new(),
            assets: BTreeMap::new(),
            trigger: None,
            distribution: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == WillState::Active
    }

    pub fn is_triggered(&self) -> bool {
        self.state == WillState::Triggered
    }

    /// Sum of active allocations. Never exceeds [`MAX_BPS`].
    pub fn total_bps(&self) -> u32 {
        self.active_nominees().map(|n| n.bps.get()).sum()
    }

    /// Basis points still available for new allocations.
    pub fn unallocated_bps(&self) -> u32 {
        MAX_BPS.saturating_sub(self.total_bps())
    }

    pub fn nominee_count(&self) -> usize {
        self.active_nominees().count()
    }

    pub fn active_nominees(&self) -> impl Iterator<Item = &NomineeAllocation> {
        self.nominees.iter().filter(|n| n.active)
    }

    pub fn nominee(&self, account: &Address) -> Option<&NomineeAllocation> {
        self.nominees.iter().find(|n| &n.nominee == account)
    }

    pub(crate) fn nominee_mut(&mut self, account: &Address) -> Option<&mut NomineeAllocation> {
        self.nominees.iter_mut().find(|n| &n.nominee == account)
    }

    pub fn is_nominee(&self, account: &Address) -> bool {
        self.nominee(account).is_some_and(|n| n.active)
    }

    /// Seconds since the last owner activity.
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_activity)
    }

    /// The inactivity period has fully elapsed.
    pub fn inactivity_elapsed(&self, now: u64) -> bool {
        self.elapsed(now) >= self.inactivity_period
    }

    pub fn asset_balance(&self, token: &TokenId) -> u128 {
        self.assets.get(token).copied().unwrap_or(0)
    }

    /// Active nominees that have not claimed yet.
    pub fn unclaimed_count(&self) -> usize {
        self.active_nominees().filter(|n| !n.claimed).count()
    }

    pub(crate) fn touch(&mut self, now: u64) {
        self.last_activity = self.last_activity.max(now);
    }
}
