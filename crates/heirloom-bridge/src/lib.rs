//! Heirloom Bridge Ledger
//!
//! Tracks assets a will holds on chains other than the home chain, and the
//! validator-approved releases that pay them out to nominees.
//!
//! # Flow
//!
//! ```text
//! relayer/validator ── lock ──> LockedBalance(will, token, chain)
//! Will Engine claim ── request_release ──> ReleaseRecord (reserves funds)
//! validators ── approve_release ──> approvals += 1 (idempotent per validator)
//! anyone ── execute_release ──> balance -= amount   (once quorum is met)
//! ```
//!
//! Cross-chain delivery is eventually consistent and relies on validator
//! quorum; `execute_release` is idempotent so keepers can resubmit freely.

pub mod chain;
pub mod ledger;
pub mod release;

pub use chain::ChainInfo;
pub use ledger::{BridgeConfig, BridgeError, BridgeLedger};
pub use release::{LockedBalance, ReleaseOutcome, ReleaseRecord};
