//! Heirloom Will Engine
//!
//! Owns will records and nominee allocations, tracks owner proof of life,
//! decides when a will triggers and distributes its assets to verified
//! nominees.
//!
//! # Lifecycle
//!
//! ```text
//!            deactivate_will
//!   Active ─────────────────> Inactive      (terminal, owner may withdraw)
//!     │
//!     │ evaluate_trigger: inactivity elapsed (+ oracle threshold if required)
//!     v
//!   Triggered ──claim──> claim ──> ...       (terminal, one claim per nominee)
//! ```
//!
//! # Collaborators
//!
//! The engine reaches the KYC Registry, Oracle Registry, Bridge Ledger and
//! the home-chain treasury only through the traits in [`ports`].
//! [`Ledger`] wires it to the concrete registries and makes every call
//! all-or-nothing.

pub mod distribution;
pub mod engine;
pub mod heartbeat;
pub mod ledger;
pub mod ports;
pub mod treasury;
pub mod will;

#[cfg(test)]
pub(crate) mod test_utils;

pub use distribution::{AssetPool, DistributionSnapshot, Payout, PoolLocation};
pub use engine::{ClaimReceipt, EngineConfig, WillEngine, WillError, DEFAULT_CUSTODY};
pub use heartbeat::{
    assess_active_wills, assess_will, HeartbeatConfig, HeartbeatError, HeartbeatStatus,
    OwnerStanding,
};
pub use ledger::{
    ActivityRecord, Engine, Ledger, LedgerConfig, LedgerError, LedgerSnapshot, SharedLedger,
    SNAPSHOT_VERSION,
};
pub use ports::{BridgePort, KycPort, OracleView, Treasury};
pub use treasury::{AccountBook, TreasuryError};
pub use will::{NomineeAllocation, NomineeContact, TriggerRecord, Will, WillState};
