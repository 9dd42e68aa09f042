//! Error classification shared by all components.
//!
//! Each component has its own error enum with precise variants; `ErrorKind`
//! is the coarse category callers branch on (retry, surface to the user, etc).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller lacks the required role or ownership.
    Unauthorized,
    /// Operation not valid for the current record state.
    InvalidState,
    /// Out-of-range or malformed input.
    InvalidParameter,
    InsufficientBalance,
    AlreadyClaimed,
    /// Unknown will, nominee or record id.
    NotFound,
    /// Not enough validator approvals yet. Retriable.
    QuorumNotMet,
}

impl ErrorKind {
    /// Whether every error of this kind may clear on its own. Only a missing
    /// quorum qualifies; `InvalidState` mixes transient and terminal causes,
    /// so component errors decide per variant.
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::QuorumNotMet)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::AlreadyClaimed => "already_claimed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::QuorumNotMet => "quorum_not_met",
        };
        f.write_str(s)
    }
}
