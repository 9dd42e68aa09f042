//! The KYC registry: verifier accreditation plus per-subject records.

use crate::record::{KycRecord, KycStatus, Verifier};
use heirloom_core::{Address, Digest, ErrorKind, EventSource, LedgerEvent, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KycError {
    #[error("Unauthorized: {0} is not permitted to perform this action")]
    Unauthorized(Address),

    #[error("Invalid state for {subject}: expected {expected:?}, found {found:?}")]
    InvalidState {
        subject: Address,
        expected: KycStatus,
        found: KycStatus,
    },

    #[error("No KYC record for {0}")]
    RecordNotFound(Address),

    #[error("Verifier not found: {0}")]
    VerifierNotFound(Address),

    #[error("Verifier already accredited: {0}")]
    VerifierExists(Address),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl KycError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KycError::Unauthorized(_) => ErrorKind::Unauthorized,
            KycError::InvalidState { .. } | KycError::VerifierExists(_) => ErrorKind::InvalidState,
            KycError::RecordNotFound(_) | KycError::VerifierNotFound(_) => ErrorKind::NotFound,
            KycError::InvalidParameter(_) => ErrorKind::InvalidParameter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycConfig {
    /// How long a verification stays valid (seconds). Default: 1 year.
    pub validity_period_secs: u64,
}

impl Default for KycConfig {
    fn default() -> Self {
        Self {
            validity_period_secs: 31_536_000,
        }
    }
}

impl KycConfig {
    pub fn validate(&self) -> Result<(), KycError> {
        if self.validity_period_secs == 0 {
            return Err(KycError::InvalidParameter(
                "validity_period_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycRegistry {
    admin: Address,
    config: KycConfig,
    verifiers: BTreeMap<Address, Verifier>,
    records: BTreeMap<Address, KycRecord>,
    #[serde(skip)]
    events: Vec<LedgerEvent>,
}

impl KycRegistry {
    pub fn new(admin: Address, config: KycConfig) -> Self {
        Self {
            admin,
            config,
            verifiers: BTreeMap::new(),
            records: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn config(&self) -> &KycConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Verifier accreditation (admin-only)
    // ------------------------------------------------------------------

    pub fn add_verifier(
        &mut self,
        caller: Address,
        account: Address,
        name: impl Into<String>,
        license: impl Into<String>,
        now: u64,
    ) -> Result<(), KycError> {
        self.require_admin(caller)?;
        let name = name.into();
        let license = license.into();
        if name.trim().is_empty() || license.trim().is_empty() {
            return Err(KycError::InvalidParameter(
                "verifier name and license must not be empty".into(),
            ));
        }
        if self.verifiers.get(&account).is_some_and(|v| v.active) {
            return Err(KycError::VerifierExists(account));
        }

        // Re-accrediting keeps the historical verification count.
        let verified_count = self
            .verifiers
            .get(&account)
            .map(|v| v.verified_count)
            .unwrap_or(0);
        self.verifiers.insert(
            account,
            Verifier {
                account,
                name,
                license,
                added_at: now,
                active: true,
                verified_count,
            },
        );
        self.events.push(LedgerEvent::RoleGranted {
            role: Role::KycVerifier,
            account,
        });
        log::info!("KYC verifier accredited: {}", account);
        Ok(())
    }

    /// Withdraw accreditation. Past verifications stay valid.
    pub fn remove_verifier(&mut self, caller: Address, account: Address) -> Result<(), KycError> {
        self.require_admin(caller)?;
        let verifier = self
            .verifiers
            .get_mut(&account)
            .filter(|v| v.active)
            .ok_or(KycError::VerifierNotFound(account))?;
        verifier.active = false;
        self.events.push(LedgerEvent::RoleRevoked {
            role: Role::KycVerifier,
            account,
        });
        log::info!("KYC verifier removed: {}", account);
        Ok(())
    }

    pub fn is_accredited(&self, account: &Address) -> bool {
        self.verifiers.get(account).is_some_and(|v| v.active)
    }

    pub fn verifier(&self, account: &Address) -> Option<&Verifier> {
        self.verifiers.get(account)
    }

    pub fn verifiers(&self) -> impl Iterator<Item = &Verifier> {
        self.verifiers.values()
    }

    // ------------------------------------------------------------------
    // Subject lifecycle
    // ------------------------------------------------------------------

    /// Create a `NotSubmitted` record if the subject has none.
    ///
    /// Returns `true` if a record was created.
    pub fn register_subject(&mut self, subject: Address) -> bool {
        if self.records.contains_key(&subject) {
            return false;
        }
        self.records
            .insert(subject, KycRecord::not_submitted(subject));
        true
    }

    /// Subject-initiated submission. Always (re)starts a cycle in `Pending`.
    pub fn submit(
        &mut self,
        subject: Address,
        document_hash: Digest,
        now: u64,
    ) -> Result<KycStatus, KycError> {
        if document_hash == Digest::default() {
            return Err(KycError::InvalidParameter(
                "document hash must not be empty".into(),
            ));
        }
        let record = self
            .records
            .entry(subject)
            .or_insert_with(|| KycRecord::not_submitted(subject));
        record.resubmit(document_hash, now);

        self.events.push(LedgerEvent::KycSubmitted {
            subject,
            document_hash,
        });
        Ok(KycStatus::Pending)
    }

    pub fn verify(&mut self, subject: Address, verifier: Address, now: u64) -> Result<(), KycError> {
        self.require_verifier(subject, verifier)?;
        let validity = self.config.validity_period_secs;
        let record = self.pending_record_mut(subject)?;

        let expires_at = now.saturating_add(validity);
        record.status = KycStatus::Verified;
        record.verifier = Some(verifier);
        record.verified_at = Some(now);
        record.expires_at = Some(expires_at);

        if let Some(v) = self.verifiers.get_mut(&verifier) {
            v.verified_count += 1;
        }
        self.events.push(LedgerEvent::KycVerified {
            subject,
            verifier,
            expires_at,
        });
        log::info!("KYC verified for {} by {}", subject, verifier);
        Ok(())
    }

    pub fn reject(
        &mut self,
        subject: Address,
        verifier: Address,
        reason: impl Into<String>,
        now: u64,
    ) -> Result<(), KycError> {
        self.require_verifier(subject, verifier)?;
        let reason = reason.into();
        let record = self.pending_record_mut(subject)?;

        record.status = KycStatus::Rejected;
        record.verifier = Some(verifier);
        record.verified_at = Some(now);
        record.rejection_reason = Some(reason.clone());

        self.events.push(LedgerEvent::KycRejected {
            subject,
            verifier,
            reason,
        });
        log::info!("KYC rejected for {} by {}", subject, verifier);
        Ok(())
    }

    /// Persist `Verified → Expired` once the expiry timestamp has passed.
    /// Permissionless.
    pub fn refresh_expiry(&mut self, subject: Address, now: u64) -> Result<KycStatus, KycError> {
        let record = self
            .records
            .get_mut(&subject)
            .ok_or(KycError::RecordNotFound(subject))?;

        if record.status != KycStatus::Verified {
            return Err(KycError::InvalidState {
                subject,
                expected: KycStatus::Verified,
                found: record.status,
            });
        }
        if record.effective_status(now) == KycStatus::Expired {
            record.status = KycStatus::Expired;
            self.events.push(LedgerEvent::KycExpired { subject });
        }
        Ok(record.status)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// `true` only for a current, unexpired verification.
    pub fn is_verified(&self, subject: &Address, now: u64) -> bool {
        self.records
            .get(subject)
            .is_some_and(|r| r.is_verified(now))
    }

    pub fn status(&self, subject: &Address, now: u64) -> KycStatus {
        self.records
            .get(subject)
            .map(|r| r.effective_status(now))
            .unwrap_or(KycStatus::NotSubmitted)
    }

    pub fn record(&self, subject: &Address) -> Option<&KycRecord> {
        self.records.get(subject)
    }

    /// Subjects awaiting a verifier decision, oldest submission first.
    pub fn pending(&self) -> Vec<&KycRecord> {
        let mut pending: Vec<&KycRecord> = self
            .records
            .values()
            .filter(|r| r.status == KycStatus::Pending)
            .collect();
        pending.sort_by_key(|r| r.submitted_at);
        pending
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn require_admin(&self, caller: Address) -> Result<(), KycError> {
        if caller != self.admin {
            return Err(KycError::Unauthorized(caller));
        }
        Ok(())
    }

    fn require_verifier(&self, subject: Address, verifier: Address) -> Result<(), KycError> {
        // No self-attestation of identity.
        if !self.is_accredited(&verifier) || verifier == subject {
            return Err(KycError::Unauthorized(verifier));
        }
        Ok(())
    }

    fn pending_record_mut(&mut self, subject: Address) -> Result<&mut KycRecord, KycError> {
        let record = self
            .records
            .get_mut(&subject)
            .ok_or(KycError::RecordNotFound(subject))?;
        if record.status != KycStatus::Pending {
            return Err(KycError::InvalidState {
                subject,
                expected: KycStatus::Pending,
                found: record.status,
            });
        }
        Ok(record)
    }
}

impl EventSource for KycRegistry {
    fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}
