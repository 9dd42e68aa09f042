//! Owner standing: how long a will's owner has been silent, measured against
//! the will's inactivity period.
//!
//! A will triggers once its owner stays silent for the whole inactivity
//! period. Before that the keeper nudges the owner twice: a reminder once
//! `reminder_at` of the period has passed without a heartbeat, and a final
//! notice at `final_notice_at`.
//!
//! ```text
//! last heartbeat      reminder_at       final_notice_at      inactivity period
//!       |---Responsive---|---ReminderDue---|---FinalNotice---|---Lapsed
//! ```
//!
//! Nothing here mutates a will. `Lapsed` only tells the keeper that
//! `evaluate_trigger` is worth calling.

use crate::will::Will;
use heirloom_core::{Address, WillId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// When the keeper reminds silent owners, as fractions of each will's own
/// inactivity period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Default: 0.5, halfway to the trigger.
    pub reminder_at: f64,
    /// Default: 0.9.
    pub final_notice_at: f64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            reminder_at: 0.5,
            final_notice_at: 0.9,
        }
    }
}

impl HeartbeatConfig {
    pub fn validate(&self) -> Result<(), HeartbeatError> {
        if !(self.reminder_at > 0.0 && self.reminder_at < 1.0) {
            return Err(HeartbeatError::NoticeWindow(format!(
                "reminder_at ({}) must fall strictly inside the inactivity period",
                self.reminder_at
            )));
        }
        if !(self.final_notice_at > self.reminder_at && self.final_notice_at < 1.0) {
            return Err(HeartbeatError::NoticeWindow(format!(
                "final_notice_at ({}) must come after the reminder and before the will can trigger",
                self.final_notice_at
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerStanding {
    /// Heartbeat recent enough that nobody needs to hear about it.
    Responsive,
    ReminderDue,
    /// Last chance before the nominees can inherit.
    FinalNotice,
    /// Inactivity period over. The will can be triggered.
    Lapsed,
}

impl OwnerStanding {
    /// Whether the owner should be told to send a heartbeat.
    pub fn needs_notice(self) -> bool {
        matches!(self, OwnerStanding::ReminderDue | OwnerStanding::FinalNotice)
    }

    fn urgency(self) -> u8 {
        match self {
            OwnerStanding::Lapsed => 3,
            OwnerStanding::FinalNotice => 2,
            OwnerStanding::ReminderDue => 1,
            OwnerStanding::Responsive => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    pub will_id: WillId,
    pub owner: Address,
    /// Seconds since the owner last touched the will
    pub silent_secs: u64,
    /// 0 once the will can be triggered
    pub secs_until_trigger: u64,
    /// `silent_secs` over the inactivity period; exceeds 1.0 when overdue
    pub silence_fraction: f64,
    pub standing: OwnerStanding,
}

#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("Invalid notice window: {0}")]
    NoticeWindow(String),
}

/// Where the owner of `will` stands at `now`.
pub fn assess_will(will: &Will, now: u64, config: &HeartbeatConfig) -> HeartbeatStatus {
    let silent_secs = will.elapsed(now);
    let silence_fraction = match will.inactivity_period {
        0 => 1.0,
        period => silent_secs as f64 / period as f64,
    };

    let standing = if will.inactivity_elapsed(now) {
        OwnerStanding::Lapsed
    } else if silence_fraction >= config.final_notice_at {
        OwnerStanding::FinalNotice
    } else if silence_fraction >= config.reminder_at {
        OwnerStanding::ReminderDue
    } else {
        OwnerStanding::Responsive
    };

    HeartbeatStatus {
        will_id: will.id,
        owner: will.owner,
        silent_secs,
        secs_until_trigger: will.inactivity_period.saturating_sub(silent_secs),
        silence_fraction,
        standing,
    }
}

/// Assess every active will. Lapsed wills come first, then owners closest
/// to their deadline.
pub fn assess_active_wills<'a>(
    wills: impl IntoIterator<Item = &'a Will>,
    now: u64,
    config: &HeartbeatConfig,
) -> Vec<HeartbeatStatus> {
    let mut statuses: Vec<HeartbeatStatus> = wills
        .into_iter()
        .filter(|w| w.is_active())
        .map(|w| assess_will(w, now, config))
        .collect();

    statuses.sort_by(|a, b| {
        b.standing.urgency().cmp(&a.standing.urgency()).then_with(|| {
            b.silence_fraction
                .partial_cmp(&a.silence_fraction)
                .unwrap_or(Ordering::Equal)
        })
    });
    statuses
}
