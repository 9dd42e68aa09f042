//! KYC records and verifier accreditation entries

use heirloom_core::{Address, Digest};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Pending,
    Verified,
    Rejected,
    Expired,
}

/// Identity-verification record for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycRecord {
    pub subject: Address,
    /// Stored status. A `Verified` record past its expiry still reads as
    /// `Verified` here until refreshed; use [`KycRecord::effective_status`].
    pub status: KycStatus,
    /// Hash of the submitted identity document
    pub document_hash: Option<Digest>,
    /// Verifier that verified or rejected the current submission
    pub verifier: Option<Address>,
    pub submitted_at: Option<u64>,
    pub verified_at: Option<u64>,
    pub expires_at: Option<u64>,
    pub rejection_reason: Option<String>,
    /// Number of submissions made so far
    pub submissions: u32,
}

impl KycRecord {
    /// Empty record for a subject that has not submitted anything.
    pub fn not_submitted(subject: Address) -> Self {
        Self {
            subject,
            status: KycStatus::NotSubmitted,
            document_hash: None,
            verifier: None,
            submitted_at: None,
            verified_at: None,
            expires_at: None,
            rejection_reason: None,
            submissions: 0,
        }
    }

    /// Status as of `now`, with expiry applied.
    pub fn effective_status(&self, now: u64) -> KycStatus {
        match (self.status, self.expires_at) {
            (KycStatus::Verified, Some(expiry)) if now >= expiry => KycStatus::Expired,
            (status, _) => status,
        }
    }

    pub fn is_verified(&self, now: u64) -> bool {
        self.effective_status(now) == KycStatus::Verified
    }

    /// Start a new submission cycle.
    pub(crate) fn resubmit(&mut self, document_hash: Digest, now: u64) {
        self.status = KycStatus::Pending;
        self.document_hash = Some(document_hash);
        self.verifier = None;
        self.submitted_at = Some(now);
        self.verified_at = None;
        self.expires_at = None;
        self.rejection_reason = None;
        self.submissions += 1;
    }
}

/// An accredited (or formerly accredited) KYC verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verifier {
    pub account: Address,
    pub name: String,
    pub license: String,
    pub added_at: u64,
    pub active: bool,
    /// Number of verifications performed
    pub verified_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_status_applies_expiry() {
        let mut record = KycRecord::not_submitted(Address::from_low_u8(1));
        record.resubmit(Digest::sha256(b"passport"), 100);
        record.status = KycStatus::Verified;
        record.expires_at = Some(1_000);

        assert_eq!(record.effective_status(999), KycStatus::Verified);
        assert_eq!(record.effective_status(1_000), KycStatus::Expired);
        assert!(!record.is_verified(5_000));
    }

    #[test]
    fn test_resubmit_resets_cycle() {
        let mut record = KycRecord::not_submitted(Address::from_low_u8(1));
        record.resubmit(Digest::sha256(b"v1"), 100);
        record.status = KycStatus::Rejected;
        record.rejection_reason = Some("blurry".into());

        record.resubmit(Digest::sha256(b"v2"), 200);
        assert_eq!(record.status, KycStatus::Pending);
        assert_eq!(record.submitted_at, Some(200));
        assert!(record.rejection_reason.is_none());
        assert_eq!(record.submissions, 2);
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&KycStatus::NotSubmitted).unwrap();
        assert_eq!(json, "\"not_submitted\"");
    }
}
