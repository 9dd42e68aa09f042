//! Ledger events emitted by the components
//!
//! Events are buffered inside each component and drained by the ledger facade
//! once a transaction commits, so a failed call never leaves an event behind.
//! Off-chain indexers consume them to build the "recent activity" feed.

use crate::types::{Address, Bps, ChainId, Digest, TokenId, WillId};
use serde::{Deserialize, Serialize};

/// Why a will moved to the triggered state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TriggerCause {
    /// Inactivity period elapsed, no oracle required.
    Inactivity,
    /// Inactivity period elapsed and the oracle attestation threshold was met.
    OracleConfirmed,
}

/// Accredited roles managed by the registries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    KycVerifier,
    Oracle,
    BridgeValidator,
    BridgeRelayer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LedgerEvent {
    WillCreated {
        will_id: WillId,
        owner: Address,
        name: String,
        inactivity_period: u64,
        requires_oracle: bool,
    },
    WillUpdated {
        will_id: WillId,
        /// Which field changed ("inactivity_period", "document_hash")
        field: String,
    },
    WillDeactivated {
        will_id: WillId,
        owner: Address,
    },
    NomineeAdded {
        will_id: WillId,
        nominee: Address,
        bps: Bps,
    },
    NomineeRemoved {
        will_id: WillId,
        nominee: Address,
        bps: Bps,
    },
    Heartbeat {
        will_id: WillId,
        owner: Address,
        timestamp: u64,
    },
    AssetDeposited {
        will_id: WillId,
        token: TokenId,
        amount: u128,
    },
    AssetWithdrawn {
        will_id: WillId,
        token: TokenId,
        amount: u128,
    },
    InheritanceTriggered {
        will_id: WillId,
        cause: TriggerCause,
        triggered_by: Address,
        elapsed_secs: u64,
    },
    InheritanceClaimed {
        will_id: WillId,
        nominee: Address,
        /// Number of locally paid assets
        local_payouts: usize,
        /// Number of bridge release instructions issued
        releases: usize,
    },
    KycSubmitted {
        subject: Address,
        document_hash: Digest,
    },
    KycVerified {
        subject: Address,
        verifier: Address,
        expires_at: u64,
    },
    KycRejected {
        subject: Address,
        verifier: Address,
        reason: String,
    },
    KycExpired {
        subject: Address,
    },
    RoleGranted {
        role: Role,
        account: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
    },
    OracleAttested {
        will_id: WillId,
        oracle: Address,
        proof_hash: Digest,
    },
    ChainRegistered {
        chain_id: ChainId,
        name: String,
    },
    AssetLocked {
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        amount: u128,
    },
    ReleaseRequested {
        release_id: u64,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
        amount: u128,
    },
    ReleaseApproved {
        release_id: u64,
        validator: Address,
        approvals: usize,
    },
    AssetReleased {
        release_id: u64,
        will_id: WillId,
        token: TokenId,
        chain_id: ChainId,
        nominee: Address,
        amount: u128,
    },
}

/// Activity-feed category of an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    WillCreated,
    WillUpdated,
    NomineeAdded,
    NomineeRemoved,
    NomineeVerified,
    Heartbeat,
    AssetDeposited,
    AssetWithdrawn,
    AssetLocked,
    AssetReleased,
    InheritanceTriggered,
    InheritanceClaimed,
    KycSubmitted,
    KycRejected,
    OracleAttested,
    SecurityUpdated,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::WillCreated => "will_created",
            ActivityType::WillUpdated => "will_updated",
            ActivityType::NomineeAdded => "nominee_added",
            ActivityType::NomineeRemoved => "nominee_removed",
            ActivityType::NomineeVerified => "nominee_verified",
            ActivityType::Heartbeat => "heartbeat",
            ActivityType::AssetDeposited => "asset_deposited",
            ActivityType::AssetWithdrawn => "asset_withdrawn",
            ActivityType::AssetLocked => "asset_locked",
            ActivityType::AssetReleased => "asset_released",
            ActivityType::InheritanceTriggered => "inheritance_triggered",
            ActivityType::InheritanceClaimed => "inheritance_claimed",
            ActivityType::KycSubmitted => "kyc_submitted",
            ActivityType::KycRejected => "kyc_rejected",
            ActivityType::OracleAttested => "oracle_attested",
            ActivityType::SecurityUpdated => "security_updated",
        }
    }
}

impl LedgerEvent {
    /// The will this event concerns, if any.
    pub fn will_id(&self) -> Option<WillId> {
        match self {
            LedgerEvent::WillCreated { will_id, .. }
            | LedgerEvent::WillUpdated { will_id, .. }
            | LedgerEvent::WillDeactivated { will_id, .. }
            | LedgerEvent::NomineeAdded { will_id, .. }
            | LedgerEvent::NomineeRemoved { will_id, .. }
            | LedgerEvent::Heartbeat { will_id, .. }
            | LedgerEvent::AssetDeposited { will_id, .. }
            | LedgerEvent::AssetWithdrawn { will_id, .. }
            | LedgerEvent::InheritanceTriggered { will_id, .. }
            | LedgerEvent::InheritanceClaimed { will_id, .. }
            | LedgerEvent::OracleAttested { will_id, .. }
            | LedgerEvent::AssetLocked { will_id, .. }
            | LedgerEvent::ReleaseRequested { will_id, .. }
            | LedgerEvent::AssetReleased { will_id, .. } => Some(*will_id),
            LedgerEvent::KycSubmitted { .. }
            | LedgerEvent::KycVerified { .. }
            | LedgerEvent::KycRejected { .. }
            | LedgerEvent::KycExpired { .. }
            | LedgerEvent::RoleGranted { .. }
            | LedgerEvent::RoleRevoked { .. }
            | LedgerEvent::ChainRegistered { .. }
            | LedgerEvent::ReleaseApproved { .. } => None,
        }
    }

    /// The account primarily associated with this event.
    pub fn account(&self) -> Option<Address> {
        match self {
            LedgerEvent::WillCreated { owner, .. }
            | LedgerEvent::WillDeactivated { owner, .. }
            | LedgerEvent::Heartbeat { owner, .. } => Some(*owner),
            LedgerEvent::NomineeAdded { nominee, .. }
            | LedgerEvent::NomineeRemoved { nominee, .. }
            | LedgerEvent::InheritanceClaimed { nominee, .. }
            | LedgerEvent::ReleaseRequested { nominee, .. }
            | LedgerEvent::AssetReleased { nominee, .. } => Some(*nominee),
            LedgerEvent::InheritanceTriggered { triggered_by, .. } => Some(*triggered_by),
            LedgerEvent::KycSubmitted { subject, .. }
            | LedgerEvent::KycVerified { subject, .. }
            | LedgerEvent::KycRejected { subject, .. }
            | LedgerEvent::KycExpired { subject } => Some(*subject),
            LedgerEvent::RoleGranted { account, .. } | LedgerEvent::RoleRevoked { account, .. } => {
                Some(*account)
            }
            LedgerEvent::OracleAttested { oracle, .. } => Some(*oracle),
            LedgerEvent::ReleaseApproved { validator, .. } => Some(*validator),
            LedgerEvent::WillUpdated { .. }
            | LedgerEvent::AssetDeposited { .. }
            | LedgerEvent::AssetWithdrawn { .. }
            | LedgerEvent::ChainRegistered { .. }
            | LedgerEvent::AssetLocked { .. } => None,
        }
    }

    pub fn activity_type(&self) -> ActivityType {
        match self {
            LedgerEvent::WillCreated { .. } => ActivityType::WillCreated,
            LedgerEvent::WillUpdated { .. } | LedgerEvent::WillDeactivated { .. } => {
                ActivityType::WillUpdated
            }
            LedgerEvent::NomineeAdded { .. } => ActivityType::NomineeAdded,
            LedgerEvent::NomineeRemoved { .. } => ActivityType::NomineeRemoved,
            LedgerEvent::Heartbeat { .. } => ActivityType::Heartbeat,
            LedgerEvent::AssetDeposited { .. } => ActivityType::AssetDeposited,
            LedgerEvent::AssetWithdrawn { .. } => ActivityType::AssetWithdrawn,
            LedgerEvent::InheritanceTriggered { .. } => ActivityType::InheritanceTriggered,
            LedgerEvent::InheritanceClaimed { .. } => ActivityType::InheritanceClaimed,
            LedgerEvent::KycSubmitted { .. } => ActivityType::KycSubmitted,
            LedgerEvent::KycVerified { .. } => ActivityType::NomineeVerified,
            LedgerEvent::KycRejected { .. } | LedgerEvent::KycExpired { .. } => {
                ActivityType::KycRejected
            }
            LedgerEvent::RoleGranted { .. }
            | LedgerEvent::RoleRevoked { .. }
            | LedgerEvent::ChainRegistered { .. } => ActivityType::SecurityUpdated,
            LedgerEvent::OracleAttested { .. } => ActivityType::OracleAttested,
            LedgerEvent::AssetLocked { .. } => ActivityType::AssetLocked,
            LedgerEvent::ReleaseRequested { .. }
            | LedgerEvent::ReleaseApproved { .. }
            | LedgerEvent::AssetReleased { .. } => ActivityType::AssetReleased,
        }
    }

    /// One-line human-readable description for activity feeds and logs.
    pub fn summary(&self) -> String {
        match self {
            LedgerEvent::WillCreated { will_id, name, .. } => {
                format!("Will #{} \"{}\" created", will_id, name)
            }
            LedgerEvent::WillUpdated { will_id, field } => {
                format!("Will #{} updated ({})", will_id, field)
            }
            LedgerEvent::WillDeactivated { will_id, .. } => {
                format!("Will #{} deactivated", will_id)
            }
            LedgerEvent::NomineeAdded { will_id, nominee, bps } => {
                format!("Nominee {} added to will #{} at {}", nominee, will_id, bps)
            }
            LedgerEvent::NomineeRemoved { will_id, nominee, .. } => {
                format!("Nominee {} removed from will #{}", nominee, will_id)
            }
            LedgerEvent::Heartbeat { will_id, .. } => {
                format!("Proof of life recorded for will #{}", will_id)
            }
            LedgerEvent::AssetDeposited { will_id, token, amount } => {
                format!("Deposited {} of {} into will #{}", amount, token, will_id)
            }
            LedgerEvent::AssetWithdrawn { will_id, token, amount } => {
                format!("Withdrew {} of {} from will #{}", amount, token, will_id)
            }
            LedgerEvent::InheritanceTriggered { will_id, cause, .. } => {
                format!("Inheritance triggered for will #{} ({:?})", will_id, cause)
            }
            LedgerEvent::InheritanceClaimed { will_id, nominee, .. } => {
                format!("Nominee {} claimed from will #{}", nominee, will_id)
            }
            LedgerEvent::KycSubmitted { subject, .. } => format!("KYC submitted by {}", subject),
            LedgerEvent::KycVerified { subject, .. } => format!("KYC verified for {}", subject),
            LedgerEvent::KycRejected { subject, reason, .. } => {
                format!("KYC rejected for {}: {}", subject, reason)
            }
            LedgerEvent::KycExpired { subject } => format!("KYC expired for {}", subject),
            LedgerEvent::RoleGranted { role, account } => {
                format!("{:?} role granted to {}", role, account)
            }
            LedgerEvent::RoleRevoked { role, account } => {
                format!("{:?} role revoked from {}", role, account)
            }
            LedgerEvent::OracleAttested { will_id, oracle, .. } => {
                format!("Oracle {} attested for will #{}", oracle, will_id)
            }
            LedgerEvent::ChainRegistered { chain_id, name } => {
                format!("Chain {} ({}) registered", chain_id, name)
            }
            LedgerEvent::AssetLocked {
                will_id,
                token,
                chain_id,
                amount,
            } => format!(
                "Locked {} of {} on chain {} for will #{}",
                amount, token, chain_id, will_id
            ),
            LedgerEvent::ReleaseRequested { release_id, nominee, amount, .. } => {
                format!("Release #{} of {} requested for {}", release_id, amount, nominee)
            }
            LedgerEvent::ReleaseApproved {
                release_id,
                approvals,
                ..
            } => format!("Release #{} approved ({} approvals)", release_id, approvals),
            LedgerEvent::AssetReleased { release_id, nominee, amount, .. } => {
                format!("Release #{} executed: {} to {}", release_id, amount, nominee)
            }
        }
    }
}

/// A component that buffers events until the enclosing transaction commits.
pub trait EventSource {
    fn drain_events(&mut self) -> Vec<LedgerEvent>;
}
