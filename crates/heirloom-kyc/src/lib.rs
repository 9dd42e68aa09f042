//! Heirloom KYC Registry
//!
//! Tracks accredited verifiers and the identity-verification status of every
//! subject (typically a will nominee).
//!
//! # Status lifecycle
//!
//! ```text
//! NotSubmitted ──submit──> Pending ──verify──> Verified ──(expiry)──> Expired
//!                             │
//!                             └──reject──> Rejected
//!
//! any state ──submit──> Pending   (a new submission starts a new cycle)
//! ```
//!
//! The Will Engine reads [`KycRegistry::is_verified`] at claim time and never
//! writes verification state.

pub mod record;
pub mod registry;

pub use record::{KycRecord, KycStatus, Verifier};
pub use registry::{KycConfig, KycError, KycRegistry};
