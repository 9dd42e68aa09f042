//! Pro-rata distribution of a triggered will.
//!
//! When a will triggers, the engine freezes every asset pool it can pay out
//! from (home-chain custody balances and bridge-locked balances) into a
//! [`DistributionSnapshot`]. Claims are computed against that snapshot, never
//! against live balances, so claim order does not change anyone's share.
//!
//! # Remainder policy
//!
//! Integer basis-point shares truncate. Per pool:
//!
//! ```text
//! allocated       = floor(snapshot * total_bps / 10000)
//! claimant share  = floor(snapshot * bps / 10000)       (not the last claimant)
//! last claimant   = allocated - distributed              (absorbs truncation)
//! residue         = snapshot - allocated                 (stays in custody)
//! ```
//!
//! With a full 10000 bps allocation every unit of the snapshot is paid out.

use heirloom_core::{Bps, ChainId, TokenId};
use serde::{Deserialize, Serialize};

/// Where a pool's funds live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolLocation {
    /// Home-chain custody, paid by direct transfer.
    Local,
    /// Locked on another chain, paid by a bridge release.
    Bridged { chain_id: ChainId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPool {
    pub token: TokenId,
    pub location: PoolLocation,
    /// Balance at trigger time
    pub snapshot: u128,
    /// Portion owed to nominees in total
    pub allocated: u128,
    /// Portion already paid or released
    pub distributed: u128,
}

impl AssetPool {
    /// Units no nominee is entitled to.
    pub fn residue(&self) -> u128 {
        self.snapshot - self.allocated
    }

    pub fn remaining(&self) -> u128 {
        self.allocated.saturating_sub(self.distributed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSnapshot {
    pub taken_at: u64,
    /// Sum of active allocations at trigger time
    pub total_bps: Bps,
    pub pools: Vec<AssetPool>,
}

/// One asset a nominee receives from a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub token: TokenId,
    pub location: PoolLocation,
    pub amount: u128,
    /// Bridge release instruction, for bridged pools
    pub release_id: Option<u64>,
}

impl DistributionSnapshot {
    /// Freeze the given balances. Empty balances are skipped.
    pub fn new(
        taken_at: u64,
        total_bps: Bps,
        local: impl IntoIterator<Item = (TokenId, u128)>,
        bridged: impl IntoIterator<Item = (TokenId, ChainId, u128)>,
    ) -> Self {
        let local = local
            .into_iter()
            .map(|(token, amount)| (token, PoolLocation::Local, amount));
        let bridged = bridged.into_iter().map(|(token, chain_id, amount)| {
            (token, PoolLocation::Bridged { chain_id }, amount)
        });

        let pools = local
            .chain(bridged)
            .filter(|(_, _, amount)| *amount > 0)
            .map(|(token, location, snapshot)| AssetPool {
                token,
                location,
                snapshot,
                allocated: total_bps.apply(snapshot),
                distributed: 0,
            })
            .collect();

        Self {
            taken_at,
            total_bps,
            pools,
        }
    }

    /// Amounts owed to a nominee holding `bps`, as `(pool index, amount)`.
    ///
    /// `is_last` marks the final active nominee to claim, who receives
    /// whatever the pool has left of its allocation. Zero amounts are omitted.
    pub fn shares(&self, bps: Bps, is_last: bool) -> Vec<(usize, u128)> {
        self.pools
            .iter()
            .enumerate()
            .map(|(idx, pool)| {
                let amount = if is_last {
                    pool.remaining()
                } else {
                    bps.apply(pool.snapshot).min(pool.remaining())
                };
                (idx, amount)
            })
            .filter(|(_, amount)| *amount > 0)
            .collect()
    }

    /// Same as [`shares`](Self::shares), shaped as payouts without release ids.
    pub fn preview(&self, bps: Bps, is_last: bool) -> Vec<Payout> {
        self.shares(bps, is_last)
            .into_iter()
            .map(|(idx, amount)| Payout {
                token: self.pools[idx].token,
                location: self.pools[idx].location,
                amount,
                release_id: None,
            })
            .collect()
    }

    pub(crate) fn record(&mut self, pool: usize, amount: u128) {
        if let Some(pool) = self.pools.get_mut(pool) {
            pool.distributed += amount;
        }
    }

    /// Pools with units that will never be distributed.
    pub fn residues(&self) -> impl Iterator<Item = &AssetPool> {
        self.pools.iter().filter(|p| p.residue() > 0)
    }

    pub fn is_fully_distributed(&self) -> bool {
        self.pools.iter().all(|p| p.distributed == p.allocated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heirloom_core::Address;

    const ETH: TokenId = Address::ZERO;
    const USDC: TokenId = Address::from_low_u8(0xC0);

    fn bps(value: u32) -> Bps {
        Bps::new(value).unwrap()
    }

    #[test]
    fn test_full_allocation_distributes_everything() {
        let ten_eth = 10_000_000_000_000_000_000u128;
        let mut snap = DistributionSnapshot::new(0, Bps::FULL, [(ETH, ten_eth)], []);

        let a = snap.shares(bps(6000), false);
        assert_eq!(a, vec![(0, 6_000_000_000_000_000_000)]);
        snap.record(0, a[0].1);

        let b = snap.shares(bps(4000), true);
        assert_eq!(b, vec![(0, 4_000_000_000_000_000_000)]);
        snap.record(0, b[0].1);

        assert!(snap.is_fully_distributed());
        assert_eq!(snap.pools[0].distributed, ten_eth);
        assert_eq!(snap.residues().count(), 0);
    }

    #[test]
    fn test_last_claimant_absorbs_truncation() {
        // 3 nominees at 3333/3333/3334 over 100 units
        let mut snap = DistributionSnapshot::new(0, Bps::FULL, [(ETH, 100)], []);

        let first = snap.shares(bps(3333), false);
        assert_eq!(first, vec![(0, 33)]);
        snap.record(0, 33);

        let second = snap.shares(bps(3334), false);
        assert_eq!(second, vec![(0, 33)]);
        snap.record(0, 33);

        let last = snap.shares(bps(3333), true);
        assert_eq!(last, vec![(0, 34)]);
        snap.record(0, 34);

        assert_eq!(snap.pools[0].distributed, 100);
    }

    #[test]
    fn test_partial_allocation_leaves_residue() {
        // 7000 bps allocated over 1001 units: allocated = 700
        let mut snap = DistributionSnapshot::new(0, bps(7000), [(ETH, 1001)], []);
        assert_eq!(snap.pools[0].allocated, 700);
        assert_eq!(snap.pools[0].residue(), 301);

        let a = snap.shares(bps(5000), false);
        assert_eq!(a, vec![(0, 500)]);
        snap.record(0, 500);
        let b = snap.shares(bps(2000), true);
        assert_eq!(b, vec![(0, 200)]);
        snap.record(0, 200);

        assert!(snap.is_fully_distributed());
        assert_eq!(snap.residues().count(), 1);
    }

    #[test]
    fn test_bridged_pools_and_empty_balances() {
        let snap = DistributionSnapshot::new(
            5,
            Bps::FULL,
            [(ETH, 0), (USDC, 1_000)],
            [(USDC, 137, 500), (ETH, 56, 0)],
        );
        assert_eq!(snap.pools.len(), 2);

        let payouts = snap.preview(bps(2500), false);
        assert_eq!(payouts.len(), 2);
        assert_eq!(payouts[0].location, PoolLocation::Local);
        assert_eq!(payouts[0].amount, 250);
        assert_eq!(payouts[1].location, PoolLocation::Bridged { chain_id: 137 });
        assert_eq!(payouts[1].amount, 125);
    }

    #[test]
    fn test_tiny_share_rounds_to_nothing() {
        let snap = DistributionSnapshot::new(0, Bps::FULL, [(ETH, 3)], []);
        assert!(snap.shares(bps(1), false).is_empty());
    }
}
