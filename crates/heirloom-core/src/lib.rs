//! Heirloom Core
//!
//! Primitives shared by every Heirloom component: account and hash types,
//! basis-point shares, the ledger event vocabulary, error classification and
//! the clock abstraction.
//!
//! # Components
//!
//! ```text
//! heirloom-kyc ─┐
//! heirloom-oracle ──> heirloom-engine ──> heirloom-store ──> heirloom-server
//! heirloom-bridge ┘
//! ```
//!
//! All of them speak in terms of the types defined here.

pub mod clock;
pub mod error;
pub mod events;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ErrorKind;
pub use events::{ActivityType, EventSource, LedgerEvent, Role, TriggerCause};
pub use types::{Address, Bps, ChainId, Digest, PrimitiveError, TokenId, WillId, MAX_BPS};
