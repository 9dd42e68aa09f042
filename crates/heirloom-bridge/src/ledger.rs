//! The bridge ledger: chains, roles, locked balances and releases.

use crate::chain::ChainInfo;
use crate::release::{LockedBalance, ReleaseOutcome, ReleaseRecord};
use heirloom_core::{
    Address, ChainId, ErrorKind, EventSource, LedgerEvent, Role, TokenId, WillId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Unauthorized: {0} lacks the required bridge role")]
    Unauthorized(Address),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(ChainId),

    #[error("Chain {0} is paused")]
    ChainInactive(ChainId),

    #[error("Chain already registered: {0}")]
    ChainExists(ChainId),

    #[error("Insufficient locked balance: available {available}, requested {requested}")]
    InsufficientLocked { available: u128, requested: u128 },

    #[error("No release for will #{will_id} token {token} on chain {chain_id} to {nominee}")]
    ReleaseNotFound {
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
    },

    #[error("Release already requested: #{0}")]
    DuplicateRelease(u64),

    #[error("Quorum not met: {approvals} of {quorum} approvals")]
    QuorumNotMet { approvals: usize, quorum: usize },

    #[error("Account already holds role: {0}")]
    RoleExists(Address),

    #[error("Account does not hold role: {0}")]
    RoleNotFound(Address),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Unauthorized(_) => ErrorKind::Unauthorized,
            BridgeError::ChainInactive(_)
            | BridgeError::ChainExists(_)
            | BridgeError::DuplicateRelease(_)
            | BridgeError::RoleExists(_) => ErrorKind::InvalidState,
            BridgeError::UnsupportedChain(_) | BridgeError::InvalidParameter(_) => {
                ErrorKind::InvalidParameter
            }
            BridgeError::InsufficientLocked { .. } => ErrorKind::InsufficientBalance,
            BridgeError::ReleaseNotFound { .. } | BridgeError::RoleNotFound(_) => {
                ErrorKind::NotFound
            }
            BridgeError::QuorumNotMet { .. } => ErrorKind::QuorumNotMet,
        }
    }

    /// Only a release still collecting approvals is worth resubmitting.
    pub fn is_retriable(&self) -> bool {
        matches!(self, BridgeError::QuorumNotMet { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Distinct validator approvals required to execute a release.
    pub quorum: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { quorum: 1 }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.quorum == 0 {
            return Err(BridgeError::InvalidParameter("quorum must be >= 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeLedger {
    admin: Address,
    config: BridgeConfig,
    chains: BTreeMap<ChainId, ChainInfo>,
    validators: BTreeSet<Address>,
    relayers: BTreeSet<Address>,
    locks: BTreeMap<WillId, Vec<LockedBalance>>,
    releases: BTreeMap<u64, ReleaseRecord>,
    next_release_id: u64,
    #[serde(skip)]
    events: Vec<LedgerEvent>,
}

impl BridgeLedger {
    pub fn new(admin: Address, config: BridgeConfig) -> Self {
        Self {
            admin,
            config,
            chains: BTreeMap::new(),
            validators: BTreeSet::new(),
            relayers: BTreeSet::new(),
            locks: BTreeMap::new(),
            releases: BTreeMap::new(),
            next_release_id: 0,
            events: Vec::new(),
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn quorum(&self) -> usize {
        self.config.quorum
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub fn set_quorum(&mut self, caller: Address, quorum: usize) -> Result<(), BridgeError> {
        self.require_admin(caller)?;
        let config = BridgeConfig { quorum };
        config.validate()?;
        self.config = config;
        log::info!("Bridge quorum set to {}", quorum);
        Ok(())
    }

    pub fn add_chain(&mut self, caller: Address, chain: ChainInfo) -> Result<(), BridgeError> {
        self.require_admin(caller)?;
        if self.chains.contains_key(&chain.chain_id) {
            return Err(BridgeError::ChainExists(chain.chain_id));
        }
        if chain.name.trim().is_empty() {
            return Err(BridgeError::InvalidParameter(
                "chain name must not be empty".into(),
            ));
        }
        self.events.push(LedgerEvent::ChainRegistered {
            chain_id: chain.chain_id,
            name: chain.name.clone(),
        });
        log::info!("Chain registered: {} ({})", chain.chain_id, chain.name);
        self.chains.insert(chain.chain_id, chain);
        Ok(())
    }

    /// Pause or resume locking on a chain. Releases are unaffected.
    pub fn set_chain_active(
        &mut self,
        caller: Address,
        chain_id: ChainId,
        active: bool,
    ) -> Result<(), BridgeError> {
        self.require_admin(caller)?;
        let chain = self
            .chains
            .get_mut(&chain_id)
            .ok_or(BridgeError::UnsupportedChain(chain_id))?;
        chain.is_active = active;
        Ok(())
    }

    pub fn add_validator(&mut self, caller: Address, account: Address) -> Result<(), BridgeError> {
        self.require_admin(caller)?;
        if !self.validators.insert(account) {
            return Err(BridgeError::RoleExists(account));
        }
        self.events.push(LedgerEvent::RoleGranted {
            role: Role::BridgeValidator,
            account,
        });
        log::info!("Bridge validator added: {}", account);
        Ok(())
    }

    /// Approvals already given by a removed validator stop counting.
    pub fn remove_validator(
        &mut self,
        caller: Address,
        account: Address,
    ) -> Result<(), BridgeError> {
        self.require_admin(caller)?;
        if !self.validators.remove(&account) {
            return Err(BridgeError::RoleNotFound(account));
        }
        self.events.push(LedgerEvent::RoleRevoked {
            role: Role::BridgeValidator,
            account,
        });
        Ok(())
    }

    pub fn add_relayer(&mut self, caller: Address, account: Address) -> Result<(), BridgeError> {
        self.require_admin(caller)?;
        if !self.relayers.insert(account) {
            return Err(BridgeError::RoleExists(account));
        }
        self.events.push(LedgerEvent::RoleGranted {
            role: Role::BridgeRelayer,
            account,
        });
        Ok(())
    }

    pub fn remove_relayer(&mut self, caller: Address, account: Address) -> Result<(), BridgeError> {
        self.require_admin(caller)?;
        if !self.relayers.remove(&account) {
            return Err(BridgeError::RoleNotFound(account));
        }
        self.events.push(LedgerEvent::RoleRevoked {
            role: Role::BridgeRelayer,
            account,
        });
        Ok(())
    }

    pub fn is_validator(&self, account: &Address) -> bool {
        self.validators.contains(account)
    }

    pub fn is_relayer(&self, account: &Address) -> bool {
        self.relayers.contains(account)
    }

    pub fn chain(&self, chain_id: ChainId) -> Option<&ChainInfo> {
        self.chains.get(&chain_id)
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainInfo> {
        self.chains.values()
    }

    // ------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------

    /// Record funds locked for `will_id` on a remote chain.
    ///
    /// Called by a relayer or validator after observing the deposit there.
    /// Returns the new locked amount.
    pub fn lock(
        &mut self,
        caller: Address,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        amount: u128,
        now: u64,
    ) -> Result<u128, BridgeError> {
        if !self.is_validator(&caller) && !self.is_relayer(&caller) {
            return Err(BridgeError::Unauthorized(caller));
        }
        let chain = self
            .chains
            .get(&chain_id)
            .ok_or(BridgeError::UnsupportedChain(chain_id))?;
        if !chain.is_active {
            return Err(BridgeError::ChainInactive(chain_id));
        }
        if amount == 0 {
            return Err(BridgeError::InvalidParameter("amount must be > 0".into()));
        }

        let balances = self.locks.entry(will_id).or_default();
        let idx = match balances
            .iter()
            .position(|b| b.token == token && b.chain_id == chain_id)
        {
            Some(idx) => idx,
            None => {
                balances.push(LockedBalance {
                    will_id,
                    token,
                    chain_id,
                    amount: 0,
                    reserved: 0,
                    last_locked_at: now,
                });
                balances.len() - 1
            }
        };
        let balance = &mut balances[idx];
        balance.amount = balance
            .amount
            .checked_add(amount)
            .ok_or_else(|| BridgeError::InvalidParameter("locked amount overflow".into()))?;
        balance.last_locked_at = now;
        let total = balance.amount;

        self.events.push(LedgerEvent::AssetLocked {
            will_id,
            token,
            chain_id,
            amount,
        });
        log::info!(
            "Locked {} of {} on chain {} for will #{} (total {})",
            amount,
            token,
            chain_id,
            will_id,
            total
        );
        Ok(total)
    }

    pub fn locked_balance(&self, will_id: WillId, token: &TokenId, chain_id: ChainId) -> u128 {
        self.find_balance(will_id, token, chain_id)
            .map_or(0, |b| b.amount)
    }

    pub fn locked_balances(&self, will_id: WillId) -> &[LockedBalance] {
        self.locks.get(&will_id).map(Vec::as_slice).unwrap_or(&[])
    }

    // ------------------------------------------------------------------
    // Releases
    // ------------------------------------------------------------------

    /// Issue a release instruction for a nominee, reserving the funds.
    ///
    /// Only the Will Engine calls this, from a successful claim.
    pub fn request_release(
        &mut self,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
        amount: u128,
        now: u64,
    ) -> Result<u64, BridgeError> {
        if amount == 0 {
            return Err(BridgeError::InvalidParameter(
                "release amount must be > 0".into(),
            ));
        }
        if let Some(existing) = self.find_release(will_id, &token, chain_id, &nominee) {
            return Err(BridgeError::DuplicateRelease(existing.id));
        }
        let balance = self
            .locks
            .get_mut(&will_id)
            .and_then(|list| {
                list.iter_mut()
                    .find(|b| b.token == token && b.chain_id == chain_id)
            })
            .ok_or(BridgeError::InsufficientLocked {
                available: 0,
                requested: amount,
            })?;
        if balance.available() < amount {
            return Err(BridgeError::InsufficientLocked {
                available: balance.available(),
                requested: amount,
            });
        }
        balance.reserved += amount;

        let id = self.next_release_id;
        self.next_release_id += 1;
        self.releases.insert(
            id,
            ReleaseRecord {
                id,
                will_id,
                token,
                chain_id,
                nominee,
                amount,
                approvals: BTreeSet::new(),
                requested_at: now,
                executed_at: None,
            },
        );
        self.events.push(LedgerEvent::ReleaseRequested {
            release_id: id,
            will_id,
            token,
            chain_id,
            nominee,
            amount,
        });
        Ok(id)
    }

    /// Validator approval. Repeat approvals by the same validator are no-ops.
    ///
    /// Returns the number of approvals that currently count toward quorum.
    pub fn approve_release(
        &mut self,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
        validator: Address,
    ) -> Result<usize, BridgeError> {
        if !self.is_validator(&validator) {
            return Err(BridgeError::Unauthorized(validator));
        }
        let id = self
            .find_release(will_id, &token, chain_id, &nominee)
            .map(|r| r.id)
            .ok_or(BridgeError::ReleaseNotFound {
                will_id,
                token,
                chain_id,
                nominee,
            })?;
        let inserted = self
            .releases
            .get_mut(&id)
            .map(|r| r.approvals.insert(validator))
            .unwrap_or(false);
        let approvals = self.valid_approvals(id);

        if inserted {
            self.events.push(LedgerEvent::ReleaseApproved {
                release_id: id,
                validator,
                approvals,
            });
        }
        Ok(approvals)
    }

    /// Execute a release once quorum is met. Permissionless and idempotent.
    pub fn execute_release(
        &mut self,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
        now: u64,
    ) -> Result<ReleaseOutcome, BridgeError> {
        let record = self
            .find_release(will_id, &token, chain_id, &nominee)
            .ok_or(BridgeError::ReleaseNotFound {
                will_id,
                token,
                chain_id,
                nominee,
            })?;
        if record.is_executed() {
            return Ok(ReleaseOutcome::AlreadyExecuted);
        }
        let id = record.id;
        let amount = record.amount;

        let approvals = self.valid_approvals(id);
        if approvals < self.config.quorum {
            return Err(BridgeError::QuorumNotMet {
                approvals,
                quorum: self.config.quorum,
            });
        }

        let balance = self
            .locks
            .get_mut(&will_id)
            .and_then(|list| {
                list.iter_mut()
                    .find(|b| b.token == token && b.chain_id == chain_id)
            })
            .ok_or(BridgeError::InsufficientLocked {
                available: 0,
                requested: amount,
            })?;
        if balance.amount < amount {
            return Err(BridgeError::InsufficientLocked {
                available: balance.amount,
                requested: amount,
            });
        }
        balance.amount -= amount;
        balance.reserved = balance.reserved.saturating_sub(amount);

        if let Some(record) = self.releases.get_mut(&id) {
            record.executed_at = Some(now);
        }
        self.events.push(LedgerEvent::AssetReleased {
            release_id: id,
            will_id,
            token,
            chain_id,
            nominee,
            amount,
        });
        log::info!(
            "Release #{} executed: {} of {} on chain {} to {}",
            id,
            amount,
            token,
            chain_id,
            nominee
        );
        Ok(ReleaseOutcome::Executed { amount })
    }

    pub fn release(&self, id: u64) -> Option<&ReleaseRecord> {
        self.releases.get(&id)
    }

    pub fn find_release(
        &self,
        will_id: WillId,
        token: &TokenId,
        chain_id: ChainId,
        nominee: &Address,
    ) -> Option<&ReleaseRecord> {
        self.releases
            .values()
            .find(|r| r.matches(will_id, token, chain_id, nominee))
    }

    pub fn releases_for_will(&self, will_id: WillId) -> Vec<&ReleaseRecord> {
        self.releases
            .values()
            .filter(|r| r.will_id == will_id)
            .collect()
    }

    /// Releases not yet executed.
    pub fn pending_releases(&self) -> Vec<&ReleaseRecord> {
        self.releases
            .values()
            .filter(|r| !r.is_executed())
            .collect()
    }

    /// Pending releases whose approvals already meet quorum.
    pub fn ready_releases(&self) -> Vec<&ReleaseRecord> {
        self.releases
            .values()
            .filter(|r| !r.is_executed() && self.valid_approvals(r.id) >= self.config.quorum)
            .collect()
    }

    /// Approvals from validators that are still accredited.
    pub fn valid_approvals(&self, release_id: u64) -> usize {
        self.releases.get(&release_id).map_or(0, |r| {
            r.approvals
                .iter()
                .filter(|v| self.validators.contains(v))
                .count()
        })
    }

    fn find_balance(
        &self,
        will_id: WillId,
        token: &TokenId,
        chain_id: ChainId,
    ) -> Option<&LockedBalance> {
        self.locks
            .get(&will_id)?
            .iter()
            .find(|b| &b.token == token && b.chain_id == chain_id)
    }

    fn require_admin(&self, caller: Address) -> Result<(), BridgeError> {
        if caller != self.admin {
            return Err(BridgeError::Unauthorized(caller));
        }
        Ok(())
    }
}

impl EventSource for BridgeLedger {
    fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Address = Address::from_low_u8(0xAD);
    const RELAYER: Address = Address::from_low_u8(0x5E);
    const V1: Address = Address::from_low_u8(0xF1);
    const V2: Address = Address::from_low_u8(0xF2);
    const NOMINEE: Address = Address::from_low_u8(0xA1);
    const USDC: TokenId = Address::from_low_u8(0xC0);
    const POLYGON: ChainId = 137;

    fn bridge(quorum: usize) -> BridgeLedger {
        let mut bridge = BridgeLedger::new(ADMIN, BridgeConfig { quorum });
        bridge
            .add_chain(ADMIN, ChainInfo::new(POLYGON, "Polygon", "MATIC"))
            .unwrap();
        bridge.add_validator(ADMIN, V1).unwrap();
        bridge.add_validator(ADMIN, V2).unwrap();
        bridge.add_relayer(ADMIN, RELAYER).unwrap();
        bridge
    }

    #[test]
    fn test_lock_requires_role_and_supported_chain() {
        let mut bridge = bridge(1);
        let stranger = Address::from_low_u8(0x99);

        assert_eq!(
            bridge.lock(stranger, 1, USDC, POLYGON, 100, 0),
            Err(BridgeError::Unauthorized(stranger))
        );
        assert_eq!(
            bridge.lock(RELAYER, 1, USDC, 56, 100, 0),
            Err(BridgeError::UnsupportedChain(56))
        );

        assert_eq!(bridge.lock(RELAYER, 1, USDC, POLYGON, 100, 0), Ok(100));
        assert_eq!(bridge.lock(V1, 1, USDC, POLYGON, 50, 10), Ok(150));
        assert_eq!(bridge.locked_balance(1, &USDC, POLYGON), 150);
        assert_eq!(bridge.locked_balances(1).len(), 1);
    }

    #[test]
    fn test_lock_on_paused_chain() {
        let mut bridge = bridge(1);
        bridge.set_chain_active(ADMIN, POLYGON, false).unwrap();
        assert_eq!(
            bridge.lock(RELAYER, 1, USDC, POLYGON, 100, 0),
            Err(BridgeError::ChainInactive(POLYGON))
        );
    }

    #[test]
    fn test_release_requires_quorum() {
        let mut bridge = bridge(2);
        bridge.lock(RELAYER, 1, USDC, POLYGON, 1_000, 0).unwrap();
        bridge
            .request_release(1, USDC, POLYGON, NOMINEE, 600, 10)
            .unwrap();

        let err = bridge
            .execute_release(1, USDC, POLYGON, NOMINEE, 20)
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::QuorumNotMet {
                approvals: 0,
                quorum: 2
            }
        );
        assert_eq!(err.kind(), ErrorKind::QuorumNotMet);
        assert!(err.is_retriable());

        assert_eq!(bridge.approve_release(1, USDC, POLYGON, NOMINEE, V1), Ok(1));
        // Same validator again: idempotent
        assert_eq!(bridge.approve_release(1, USDC, POLYGON, NOMINEE, V1), Ok(1));
        assert!(bridge.ready_releases().is_empty());
        assert!(bridge
            .execute_release(1, USDC, POLYGON, NOMINEE, 30)
            .is_err());

        assert_eq!(bridge.approve_release(1, USDC, POLYGON, NOMINEE, V2), Ok(2));
        assert_eq!(bridge.ready_releases().len(), 1);
        assert_eq!(
            bridge.execute_release(1, USDC, POLYGON, NOMINEE, 40),
            Ok(ReleaseOutcome::Executed { amount: 600 })
        );
        assert_eq!(bridge.locked_balance(1, &USDC, POLYGON), 400);
    }

    #[test]
    fn test_execute_release_is_idempotent() {
        let mut bridge = bridge(1);
        bridge.lock(RELAYER, 1, USDC, POLYGON, 1_000, 0).unwrap();
        bridge
            .request_release(1, USDC, POLYGON, NOMINEE, 600, 10)
            .unwrap();
        bridge
            .approve_release(1, USDC, POLYGON, NOMINEE, V1)
            .unwrap();

        assert_eq!(
            bridge.execute_release(1, USDC, POLYGON, NOMINEE, 20),
            Ok(ReleaseOutcome::Executed { amount: 600 })
        );
        assert_eq!(
            bridge.execute_release(1, USDC, POLYGON, NOMINEE, 30),
            Ok(ReleaseOutcome::AlreadyExecuted)
        );
        assert_eq!(bridge.locked_balance(1, &USDC, POLYGON), 400);
        assert!(bridge.pending_releases().is_empty());
    }

    #[test]
    fn test_approval_order_does_not_matter() {
        let run = |first: Address, second: Address| {
            let mut bridge = bridge(2);
            bridge.lock(RELAYER, 1, USDC, POLYGON, 1_000, 0).unwrap();
            bridge
                .request_release(1, USDC, POLYGON, NOMINEE, 250, 0)
                .unwrap();
            bridge
                .approve_release(1, USDC, POLYGON, NOMINEE, first)
                .unwrap();
            bridge
                .approve_release(1, USDC, POLYGON, NOMINEE, second)
                .unwrap();
            bridge.execute_release(1, USDC, POLYGON, NOMINEE, 5)
        };
        assert_eq!(run(V1, V2), run(V2, V1));
    }

    #[test]
    fn test_removed_validator_approval_stops_counting() {
        let mut bridge = bridge(2);
        bridge.lock(RELAYER, 1, USDC, POLYGON, 1_000, 0).unwrap();
        bridge
            .request_release(1, USDC, POLYGON, NOMINEE, 100, 0)
            .unwrap();
        bridge
            .approve_release(1, USDC, POLYGON, NOMINEE, V1)
            .unwrap();
        bridge
            .approve_release(1, USDC, POLYGON, NOMINEE, V2)
            .unwrap();

        bridge.remove_validator(ADMIN, V2).unwrap();
        assert!(matches!(
            bridge.execute_release(1, USDC, POLYGON, NOMINEE, 5),
            Err(BridgeError::QuorumNotMet { approvals: 1, .. })
        ));
    }

    #[test]
    fn test_request_release_reserves_funds() {
        let mut bridge = bridge(1);
        bridge.lock(RELAYER, 1, USDC, POLYGON, 1_000, 0).unwrap();
        bridge
            .request_release(1, USDC, POLYGON, NOMINEE, 700, 0)
            .unwrap();

        let other = Address::from_low_u8(0xB2);
        let err = bridge
            .request_release(1, USDC, POLYGON, other, 400, 0)
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::InsufficientLocked {
                available: 300,
                requested: 400
            }
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn test_duplicate_release_rejected() {
        let mut bridge = bridge(1);
        bridge.lock(RELAYER, 1, USDC, POLYGON, 1_000, 0).unwrap();
        let id = bridge
            .request_release(1, USDC, POLYGON, NOMINEE, 100, 0)
            .unwrap();
        let err = bridge
            .request_release(1, USDC, POLYGON, NOMINEE, 100, 0)
            .unwrap_err();
        assert_eq!(err, BridgeError::DuplicateRelease(id));
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_approve_requires_validator_and_release() {
        let mut bridge = bridge(1);
        assert_eq!(
            bridge.approve_release(1, USDC, POLYGON, NOMINEE, RELAYER),
            Err(BridgeError::Unauthorized(RELAYER))
        );
        let err = bridge
            .approve_release(1, USDC, POLYGON, NOMINEE, V1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_set_quorum_validation() {
        let mut bridge = bridge(1);
        assert!(bridge.set_quorum(ADMIN, 0).is_err());
        assert_eq!(
            bridge.set_quorum(V1, 3),
            Err(BridgeError::Unauthorized(V1))
        );
        bridge.set_quorum(ADMIN, 3).unwrap();
        assert_eq!(bridge.quorum(), 3);
    }

    #[test]
    fn test_serde_roundtrip_preserves_releases() {
        let mut bridge = bridge(1);
        bridge.lock(RELAYER, 1, USDC, POLYGON, 1_000, 0).unwrap();
        bridge
            .request_release(1, USDC, POLYGON, NOMINEE, 100, 0)
            .unwrap();
        bridge
            .approve_release(1, USDC, POLYGON, NOMINEE, V1)
            .unwrap();

        let json = serde_json::to_string(&bridge).unwrap();
        let restored: BridgeLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.ready_releases().len(), 1);
        assert_eq!(restored.locked_balance(1, &USDC, POLYGON), 1_000);
    }
}
