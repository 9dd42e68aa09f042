//! Shared test fixtures: accounts, in-memory port doubles and will builders.

use crate::engine::WillEngine;
use crate::ports::{BridgePort, KycPort, OracleView};
use crate::treasury::AccountBook;
use crate::will::Will;
use heirloom_bridge::{BridgeError, LockedBalance};
use heirloom_core::{Address, Bps, ChainId, TokenId, WillId};
use std::collections::{BTreeMap, BTreeSet};

pub const OWNER: Address = Address::from_low_u8(0x0A);
pub const NOMINEE_A: Address = Address::from_low_u8(0xA1);
pub const NOMINEE_B: Address = Address::from_low_u8(0xB2);
pub const CUSTODY: Address = Address::from_low_u8(0xCC);
pub const ETH: TokenId = Address::ZERO;
pub const USDC: TokenId = Address::from_low_u8(0xC0);

pub const MONTH: u64 = 2_592_000;
pub const YEAR: u64 = 31_536_000;

pub type MockEngine = WillEngine<MockKyc, MockOracle, MockBridge, AccountBook>;

pub fn bps(value: u32) -> Bps {
    Bps::new(value).unwrap()
}

/// An active will with no nominees, last active at `last_activity`.
pub fn make_test_will(id: WillId, inactivity_period: u64, last_activity: u64) -> Will {
    Will::new(
        id,
        OWNER,
        format!("will-{}", id),
        inactivity_period,
        false,
        last_activity,
    )
}

#[derive(Debug, Clone, Default)]
pub struct MockKyc {
    pub verified: BTreeSet<Address>,
    pub registered: BTreeSet<Address>,
}

impl KycPort for MockKyc {
    fn is_verified(&self, subject: &Address, _now: u64) -> bool {
        self.verified.contains(subject)
    }

    fn register_subject(&mut self, subject: Address) {
        self.registered.insert(subject);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockOracle {
    pub counts: BTreeMap<WillId, usize>,
}

impl OracleView for MockOracle {
    fn attestation_count(&self, will_id: WillId) -> usize {
        self.counts.get(&will_id).copied().unwrap_or(0)
    }
}

/// Records release requests instead of reserving anything.
#[derive(Debug, Clone, Default)]
pub struct MockBridge {
    pub balances: Vec<LockedBalance>,
    pub requests: Vec<(WillId, TokenId, ChainId, Address, u128)>,
}

impl MockBridge {
    pub fn lock(&mut self, will_id: WillId, token: TokenId, chain_id: ChainId, amount: u128) {
        self.balances.push(LockedBalance {
            will_id,
            token,
            chain_id,
            amount,
            reserved: 0,
            last_locked_at: 0,
        });
    }
}

impl BridgePort for MockBridge {
    fn locked_balances(&self, will_id: WillId) -> Vec<LockedBalance> {
        self.balances
            .iter()
            .filter(|b| b.will_id == will_id)
            .cloned()
            .collect()
    }

    fn request_release(
        &mut self,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
        amount: u128,
        _now: u64,
    ) -> Result<u64, BridgeError> {
        self.requests
            .push((will_id, token, chain_id, nominee, amount));
        Ok(self.requests.len() as u64 - 1)
    }
}
