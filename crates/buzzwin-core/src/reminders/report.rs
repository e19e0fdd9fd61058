//! Outcome of one scheduled run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::UnreadableState;

/// Why a candidate received nothing this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Neither reminder time is near the current time.
    OutsideWindow,
    /// The matched reminder slot is turned off.
    SlotDisabled,
    /// Already notified for this kind today.
    AlreadyNotified,
    QuietHours,
    /// The email category is explicitly disabled.
    EmailOptOut,
    /// No address on file, or the lookup failed.
    NoEmail,
    NoGlobalRitual,
    /// A referenced moment no longer exists.
    MissingMoment,
    /// The user joined their own moment.
    SelfJoin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedUser {
    pub user_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUser {
    pub user_id: String,
    pub error: String,
}

/// Counts and per-user details for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub job: String,
    pub ran_at: DateTime<Utc>,
    pub sent: u32,
    pub skipped: Vec<SkippedUser>,
    pub failed: Vec<FailedUser>,
}

impl RunReport {
    pub(crate) fn new(job: &str, ran_at: DateTime<Utc>) -> Self {
        Self {
            job: job.to_string(),
            ran_at,
            sent: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub(crate) fn skip(&mut self, user_id: &str, reason: SkipReason) {
        tracing::debug!(job = %self.job, user = user_id, ?reason, "skipped");
        self.skipped.push(SkippedUser {
            user_id: user_id.to_string(),
            reason,
        });
    }

    pub(crate) fn fail(&mut self, user_id: &str, error: impl ToString) {
        let error = error.to_string();
        tracing::warn!(job = %self.job, user = user_id, %error, "dispatch failed");
        self.failed.push(FailedUser {
            user_id: user_id.to_string(),
            error,
        });
    }

    /// Record a candidate whose stored state could not be read.
    pub(crate) fn unreadable(&mut self, state: &UnreadableState) {
        self.fail(&state.user_id, format!("unreadable state: {}", state.error));
    }

    /// Skips with the given reason.
    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }

    pub(crate) fn log_summary(&self) {
        tracing::info!(
            job = %self.job,
            sent = self.sent,
            skipped = self.skipped.len(),
            failed = self.failed.len(),
            "run finished"
        );
    }
}
