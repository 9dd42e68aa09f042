//! Transactional facade over the engine and its registries.
//!
//! Every mutating call runs against a checkpoint of the whole state. On error
//! the checkpoint is restored and buffered events are discarded, so a failed
//! call leaves nothing behind. On success the buffered events are appended to
//! the activity journal.
//!
//! Callers that share a ledger across threads wrap it in [`SharedLedger`];
//! the mutex serialises transactions.

use crate::distribution::Payout;
use crate::engine::{ClaimReceipt, EngineConfig, WillEngine, WillError};
use crate::heartbeat::{HeartbeatConfig, HeartbeatStatus};
use crate::ports::Treasury;
use crate::treasury::{AccountBook, TreasuryError};
use crate::will::{NomineeAllocation, NomineeContact, TriggerRecord, Will, WillState};
use heirloom_bridge::{
    BridgeConfig, BridgeError, BridgeLedger, ChainInfo, LockedBalance, ReleaseOutcome,
    ReleaseRecord,
};
use heirloom_core::{
    ActivityType, Address, Bps, ChainId, Clock, Digest, ErrorKind, EventSource, LedgerEvent,
    TokenId, WillId,
};
use heirloom_kyc::{KycConfig, KycError, KycRegistry, KycStatus};
use heirloom_oracle::{Attestation, OracleError, OracleRegistry};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// The engine wired to the concrete registries.
pub type Engine = WillEngine<KycRegistry, OracleRegistry, BridgeLedger, AccountBook>;

pub type SharedLedger = Arc<Mutex<Ledger>>;

/// Current [`LedgerSnapshot`] format.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Will(#[from] WillError),

    #[error("KYC: {0}")]
    Kyc(#[from] KycError),

    #[error("Oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("Bridge: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Treasury: {0}")]
    Treasury(#[from] TreasuryError),

    #[error("Unauthorized: {0} is not the ledger admin")]
    Unauthorized(Address),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Will(e) => e.kind(),
            LedgerError::Kyc(e) => e.kind(),
            LedgerError::Oracle(e) => e.kind(),
            LedgerError::Bridge(e) => e.kind(),
            LedgerError::Treasury(e) => e.kind(),
            LedgerError::Unauthorized(_) => ErrorKind::Unauthorized,
            LedgerError::Config(_) => ErrorKind::InvalidParameter,
        }
    }

    /// Worth resubmitting later without changes (e.g. quorum not yet met).
    pub fn is_retriable(&self) -> bool {
        match self {
            LedgerError::Will(e) => e.is_retriable(),
            LedgerError::Bridge(e) => e.is_retriable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Administers every registry. Must be set.
    pub admin: Address,
    pub engine: EngineConfig,
    pub kyc: KycConfig,
    pub bridge: BridgeConfig,
    pub heartbeat: HeartbeatConfig,
    /// Activity records kept in memory
    pub journal_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            admin: Address::ZERO,
            engine: EngineConfig::default(),
            kyc: KycConfig::default(),
            bridge: BridgeConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            journal_capacity: 1_000,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.admin.is_zero() {
            return Err(LedgerError::Config("admin account must be set".into()));
        }
        if self.journal_capacity == 0 {
            return Err(LedgerError::Config("journal_capacity must be > 0".into()));
        }
        self.engine.validate()?;
        self.kyc.validate()?;
        self.bridge.validate()?;
        self.heartbeat
            .validate()
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        Ok(())
    }
}

/// One committed event in the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub seq: u64,
    pub timestamp: u64,
    pub activity_type: ActivityType,
    pub will_id: Option<WillId>,
    pub account: Option<Address>,
    pub summary: String,
    pub event: LedgerEvent,
}

/// Everything needed to restore a ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub saved_at: u64,
    pub admin: Address,
    pub engine: Engine,
    pub journal: Vec<ActivityRecord>,
    pub next_seq: u64,
}

pub struct Ledger {
    admin: Address,
    engine: Engine,
    heartbeat: HeartbeatConfig,
    journal: VecDeque<ActivityRecord>,
    journal_capacity: usize,
    next_seq: u64,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(config: LedgerConfig, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        config.validate()?;
        let engine = WillEngine::new(
            config.engine,
            KycRegistry::new(config.admin, config.kyc),
            OracleRegistry::new(config.admin),
            BridgeLedger::new(config.admin, config.bridge),
            AccountBook::new(),
        );
        Ok(Self {
            admin: config.admin,
            engine,
            heartbeat: config.heartbeat,
            journal: VecDeque::new(),
            journal_capacity: config.journal_capacity,
            next_seq: 0,
            clock,
        })
    }

    /// Restore persisted state. Component configs come from the snapshot;
    /// `config` supplies only the heartbeat thresholds and journal size.
    pub fn from_snapshot(
        snapshot: LedgerSnapshot,
        config: &LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LedgerError::Config(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        config
            .heartbeat
            .validate()
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        let mut journal: VecDeque<ActivityRecord> = snapshot.journal.into();
        while journal.len() > config.journal_capacity.max(1) {
            journal.pop_front();
        }
        Ok(Self {
            admin: snapshot.admin,
            engine: snapshot.engine,
            heartbeat: config.heartbeat.clone(),
            journal,
            journal_capacity: config.journal_capacity.max(1),
            next_seq: snapshot.next_seq,
            clock,
        })
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: self.clock.now(),
            admin: self.admin,
            engine: self.engine.clone(),
            journal: self.journal.iter().cloned().collect(),
            next_seq: self.next_seq,
        }
    }

    pub fn into_shared(self) -> SharedLedger {
        Arc::new(Mutex::new(self))
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run `op` atomically: commit its events on success, restore on error.
    fn transact<R>(
        &mut self,
        op: impl FnOnce(&mut Engine, u64) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        let now = self.clock.now();
        let checkpoint = self.engine.clone();
        match op(&mut self.engine, now) {
            Ok(value) => {
                self.commit(now);
                Ok(value)
            }
            Err(e) => {
                log::debug!("Rolled back: {}", e);
                self.engine = checkpoint;
                Err(e)
            }
        }
    }

    fn commit(&mut self, now: u64) {
        let mut events = self.engine.drain_events();
        events.extend(self.engine.kyc_mut().drain_events());
        events.extend(self.engine.oracle_mut().drain_events());
        events.extend(self.engine.bridge_mut().drain_events());

        for event in events {
            let record = ActivityRecord {
                seq: self.next_seq,
                timestamp: now,
                activity_type: event.activity_type(),
                will_id: event.will_id(),
                account: event.account(),
                summary: event.summary(),
                event,
            };
            self.next_seq += 1;
            self.journal.push_back(record);
        }
        while self.journal.len() > self.journal_capacity {
            self.journal.pop_front();
        }
    }

    fn require_admin(&self, caller: Address) -> Result<(), LedgerError> {
        if caller != self.admin {
            return Err(LedgerError::Unauthorized(caller));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Will Engine
    // ------------------------------------------------------------------

    pub fn create_will(
        &mut self,
        owner: Address,
        name: &str,
        inactivity_period: u64,
        requires_oracle: bool,
    ) -> Result<WillId, LedgerError> {
        self.transact(|e, now| {
            Ok(e.create_will(owner, name, inactivity_period, requires_oracle, now)?)
        })
    }

    pub fn add_nominee(
        &mut self,
        will_id: WillId,
        caller: Address,
        nominee: Address,
        bps: Bps,
        contact: NomineeContact,
    ) -> Result<(), LedgerError> {
        self.transact(|e, now| Ok(e.add_nominee(will_id, caller, nominee, bps, contact, now)?))
    }

    pub fn remove_nominee(
        &mut self,
        will_id: WillId,
        caller: Address,
        nominee: Address,
    ) -> Result<(), LedgerError> {
        self.transact(|e, now| Ok(e.remove_nominee(will_id, caller, nominee, now)?))
    }

    pub fn heartbeat(&mut self, will_id: WillId, caller: Address) -> Result<(), LedgerError> {
        self.transact(|e, now| Ok(e.heartbeat(will_id, caller, now)?))
    }

    pub fn deposit_asset(
        &mut self,
        will_id: WillId,
        caller: Address,
        token: TokenId,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        self.transact(|e, now| Ok(e.deposit_asset(will_id, caller, token, amount, now)?))
    }

    pub fn withdraw_asset(
        &mut self,
        will_id: WillId,
        caller: Address,
        token: TokenId,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        self.transact(|e, now| Ok(e.withdraw_asset(will_id, caller, token, amount, now)?))
    }

    pub fn deactivate_will(&mut self, will_id: WillId, caller: Address) -> Result<(), LedgerError> {
        self.transact(|e, now| Ok(e.deactivate_will(will_id, caller, now)?))
    }

    pub fn set_will_document(
        &mut self,
        will_id: WillId,
        caller: Address,
        document_hash: Option<Digest>,
    ) -> Result<(), LedgerError> {
        self.transact(|e, now| Ok(e.set_will_document(will_id, caller, document_hash, now)?))
    }

    pub fn update_inactivity_period(
        &mut self,
        will_id: WillId,
        caller: Address,
        inactivity_period: u64,
    ) -> Result<(), LedgerError> {
        self.transact(|e, now| {
            Ok(e.update_inactivity_period(will_id, caller, inactivity_period, now)?)
        })
    }

    pub fn evaluate_trigger(
        &mut self,
        will_id: WillId,
        caller: Address,
    ) -> Result<TriggerRecord, LedgerError> {
        self.transact(|e, now| Ok(e.evaluate_trigger(will_id, caller, now)?))
    }

    pub fn claim(&mut self, will_id: WillId, nominee: Address) -> Result<ClaimReceipt, LedgerError> {
        self.transact(|e, now| Ok(e.claim(will_id, nominee, now)?))
    }

    /// Credit a home-chain account. Admin-only stand-in for funds arriving
    /// from outside the ledger.
    pub fn fund(
        &mut self,
        caller: Address,
        account: Address,
        token: TokenId,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        self.require_admin(caller)?;
        self.transact(|e, _| {
            if account == e.config().custody_account {
                return Err(WillError::InvalidParameter(
                    "custody is only credited through deposits".into(),
                )
                .into());
            }
            Ok(e.treasury_mut().fund(account, token, amount)?)
        })
    }

    // ------------------------------------------------------------------
    // KYC Registry
    // ------------------------------------------------------------------

    pub fn add_verifier(
        &mut self,
        caller: Address,
        account: Address,
        name: &str,
        license: &str,
    ) -> Result<(), LedgerError> {
        self.transact(|e, now| Ok(e.kyc_mut().add_verifier(caller, account, name, license, now)?))
    }

    pub fn remove_verifier(&mut self, caller: Address, account: Address) -> Result<(), LedgerError> {
        self.transact(|e, _| Ok(e.kyc_mut().remove_verifier(caller, account)?))
    }

    pub fn submit_kyc(
        &mut self,
        subject: Address,
        document_hash: Digest,
    ) -> Result<KycStatus, LedgerError> {
        self.transact(|e, now| Ok(e.kyc_mut().submit(subject, document_hash, now)?))
    }

    pub fn verify_kyc(&mut self, subject: Address, verifier: Address) -> Result<(), LedgerError> {
        self.transact(|e, now| Ok(e.kyc_mut().verify(subject, verifier, now)?))
    }

    pub fn reject_kyc(
        &mut self,
        subject: Address,
        verifier: Address,
        reason: &str,
    ) -> Result<(), LedgerError> {
        self.transact(|e, now| Ok(e.kyc_mut().reject(subject, verifier, reason, now)?))
    }

    pub fn refresh_kyc(&mut self, subject: Address) -> Result<KycStatus, LedgerError> {
        self.transact(|e, now| Ok(e.kyc_mut().refresh_expiry(subject, now)?))
    }

    // ------------------------------------------------------------------
    // Oracle Registry
    // ------------------------------------------------------------------

    pub fn add_oracle(
        &mut self,
        caller: Address,
        account: Address,
        public_key: PublicKey,
    ) -> Result<(), LedgerError> {
        self.transact(|e, now| Ok(e.oracle_mut().add_oracle(caller, account, public_key, now)?))
    }

    pub fn remove_oracle(&mut self, caller: Address, account: Address) -> Result<(), LedgerError> {
        self.transact(|e, _| Ok(e.oracle_mut().remove_oracle(caller, account)?))
    }

    pub fn attest(
        &mut self,
        will_id: WillId,
        oracle: Address,
        proof_hash: Digest,
        signature: &[u8],
    ) -> Result<usize, LedgerError> {
        self.transact(|e, now| {
            e.will(will_id)?;
            Ok(e
                .oracle_mut()
                .attest(will_id, oracle, proof_hash, signature, now)?)
        })
    }

    // ------------------------------------------------------------------
    // Bridge Ledger
    // ------------------------------------------------------------------

    pub fn add_chain(&mut self, caller: Address, chain: ChainInfo) -> Result<(), LedgerError> {
        self.transact(|e, _| Ok(e.bridge_mut().add_chain(caller, chain)?))
    }

    pub fn set_chain_active(
        &mut self,
        caller: Address,
        chain_id: ChainId,
        active: bool,
    ) -> Result<(), LedgerError> {
        self.transact(|e, _| Ok(e.bridge_mut().set_chain_active(caller, chain_id, active)?))
    }

    pub fn add_validator(&mut self, caller: Address, account: Address) -> Result<(), LedgerError> {
        self.transact(|e, _| Ok(e.bridge_mut().add_validator(caller, account)?))
    }

    pub fn remove_validator(
        &mut self,
        caller: Address,
        account: Address,
    ) -> Result<(), LedgerError> {
        self.transact(|e, _| Ok(e.bridge_mut().remove_validator(caller, account)?))
    }

    pub fn add_relayer(&mut self, caller: Address, account: Address) -> Result<(), LedgerError> {
        self.transact(|e, _| Ok(e.bridge_mut().add_relayer(caller, account)?))
    }

    pub fn remove_relayer(&mut self, caller: Address, account: Address) -> Result<(), LedgerError> {
        self.transact(|e, _| Ok(e.bridge_mut().remove_relayer(caller, account)?))
    }

    pub fn set_bridge_quorum(&mut self, caller: Address, quorum: usize) -> Result<(), LedgerError> {
        self.transact(|e, _| Ok(e.bridge_mut().set_quorum(caller, quorum)?))
    }

    /// Record funds locked for an active will on another chain.
    pub fn lock_remote_asset(
        &mut self,
        caller: Address,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        self.transact(|e, now| {
            match e.will(will_id)?.state {
                WillState::Active => {}
                WillState::Triggered => return Err(WillError::WillTriggered(will_id).into()),
                WillState::Inactive => return Err(WillError::WillInactive(will_id).into()),
            }
            Ok(e.bridge_mut()
                .lock(caller, will_id, token, chain_id, amount, now)?)
        })
    }

    pub fn approve_release(
        &mut self,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
        validator: Address,
    ) -> Result<usize, LedgerError> {
        self.transact(|e, _| {
            Ok(e.bridge_mut()
                .approve_release(will_id, token, chain_id, nominee, validator)?)
        })
    }

    pub fn execute_release(
        &mut self,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
    ) -> Result<ReleaseOutcome, LedgerError> {
        self.transact(|e, now| {
            Ok(e.bridge_mut()
                .execute_release(will_id, token, chain_id, nominee, now)?)
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn will(&self, will_id: WillId) -> Result<&Will, LedgerError> {
        Ok(self.engine.will(will_id)?)
    }

    pub fn wills(&self) -> impl Iterator<Item = &Will> {
        self.engine.wills()
    }

    pub fn wills_by_owner(&self, owner: &Address) -> Vec<&Will> {
        self.engine.wills_by_owner(owner)
    }

    pub fn wills_for_nominee(&self, nominee: &Address) -> Vec<&Will> {
        self.engine.wills_for_nominee(nominee)
    }

    pub fn nominees(&self, will_id: WillId) -> Result<Vec<&NomineeAllocation>, LedgerError> {
        Ok(self.engine.nominees(will_id)?)
    }

    pub fn claimable(&self, will_id: WillId, nominee: &Address) -> Result<Vec<Payout>, LedgerError> {
        Ok(self.engine.claimable(will_id, nominee, self.now())?)
    }

    pub fn due_wills(&self) -> Vec<WillId> {
        self.engine.due_wills(self.now())
    }

    pub fn heartbeat_statuses(&self) -> Vec<HeartbeatStatus> {
        self.engine.heartbeat_statuses(self.now(), &self.heartbeat)
    }

    pub fn kyc_status(&self, subject: &Address) -> KycStatus {
        self.engine.kyc().status(subject, self.now())
    }

    pub fn is_verified(&self, subject: &Address) -> bool {
        self.engine.kyc().is_verified(subject, self.now())
    }

    pub fn kyc(&self) -> &KycRegistry {
        self.engine.kyc()
    }

    pub fn attestation_count(&self, will_id: WillId) -> usize {
        self.engine.oracle().attestation_count(will_id)
    }

    pub fn attestations(&self, will_id: WillId) -> &[Attestation] {
        self.engine.oracle().attestations(will_id)
    }

    pub fn oracles(&self) -> &OracleRegistry {
        self.engine.oracle()
    }

    pub fn bridge(&self) -> &BridgeLedger {
        self.engine.bridge()
    }

    pub fn locked_balances(&self, will_id: WillId) -> &[LockedBalance] {
        self.engine.bridge().locked_balances(will_id)
    }

    pub fn releases(&self, will_id: WillId) -> Vec<&ReleaseRecord> {
        self.engine.bridge().releases_for_will(will_id)
    }

    /// Releases with quorum that nobody has executed yet.
    pub fn ready_releases(&self) -> Vec<&ReleaseRecord> {
        self.engine.bridge().ready_releases()
    }

    pub fn balance_of(&self, account: &Address, token: &TokenId) -> u128 {
        self.engine.treasury().balance_of(account, token)
    }

    /// Newest first.
    pub fn recent_activity(&self, limit: usize) -> Vec<&ActivityRecord> {
        self.journal.iter().rev().take(limit).collect()
    }

    /// Records with `seq >= from`, oldest first.
    pub fn activity_since(&self, from: u64) -> Vec<&ActivityRecord> {
        self.journal.iter().filter(|r| r.seq >= from).collect()
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}
