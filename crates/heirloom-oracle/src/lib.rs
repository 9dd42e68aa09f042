//! Heirloom Oracle Registry
//!
//! Accredited oracle accounts submit signed attestations (e.g. a
//! death-certificate proof) for a will. The Will Engine only asks one question
//! of this registry: how many attestations exist for a given will.
//!
//! # Attestation signatures
//!
//! Each oracle is registered with a secp256k1 public key. An attestation
//! carries a compact ECDSA signature over
//!
//! ```text
//! sha256("heirloom/attestation" || will_id (u64 BE) || proof_hash)
//! ```
//!
//! # Revocation
//!
//! Removing an oracle stops *future* attestations only. Attestations it
//! already made keep counting toward the threshold; whether they should be
//! invalidated is a policy decision for the surrounding system.

pub mod attestation;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_utils;

pub use attestation::{attestation_digest, sign_attestation, Attestation};
pub use registry::{Oracle, OracleError, OracleRegistry};
