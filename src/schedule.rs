//! Account deactivation schedules and sweep policy.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::FAILED_LOGIN_ALERT_THRESHOLD;
use crate::user::UserId;

/// A pending permanent deletion of a deactivated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactivationSchedule {
    /// Account to delete.
    pub user: UserId,
    /// When the user asked to be deactivated.
    pub requested_at: DateTime<Utc>,
    /// When the sweep may delete the account.
    pub scheduled_deletion_at: DateTime<Utc>,
    /// When the sweep actually deleted it.
    pub actual_deletion_at: Option<DateTime<Utc>>,
}

impl InactivationSchedule {
    /// Returns true when the sweep should delete the account at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.actual_deletion_at.is_none() && self.scheduled_deletion_at < now
    }
}

/// Time windows applied by the daily sweep, plus the login alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPolicy {
    /// Pending links older than this many months are deleted.
    pub pending_expiry_months: u32,
    /// Pending links older than this are escalated to administrators.
    pub escalation_days: i64,
    /// Grace period between deactivation and permanent deletion.
    pub deletion_grace_months: u32,
    /// Consecutive failed logins that trigger a security alert.
    pub failed_login_alert_threshold: u32,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            pending_expiry_months: 1,
            escalation_days: 7,
            deletion_grace_months: 1,
            failed_login_alert_threshold: FAILED_LOGIN_ALERT_THRESHOLD,
        }
    }
}

impl SweepPolicy {
    /// Pending links requested before this instant are expired.
    #[must_use]
    pub fn expiry_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(self.pending_expiry_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Pending links requested before this instant are escalated.
    #[must_use]
    pub fn escalation_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(Duration::days(self.escalation_days))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// When an account deactivated at `requested_at` becomes deletable.
    #[must_use]
    pub fn deletion_time(&self, requested_at: DateTime<Utc>) -> DateTime<Utc> {
        requested_at
            .checked_add_months(Months::new(self.deletion_grace_months))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// First instant strictly after `now` at `hour`:00 UTC.
///
/// `hour` is taken modulo 24.
#[must_use]
pub fn next_sweep_at(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today = now
        .date_naive()
        .and_hms_opt(hour % 24, 0, 0)
        .map_or(now, |t| t.and_utc());
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Outcome of one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Instant the cut-offs were computed from.
    pub ran_at: Option<DateTime<Utc>>,
    /// Pending links deleted for being older than the expiry window.
    pub expired_links: usize,
    /// Pending links older than the escalation window reported to admins.
    pub escalated_links: usize,
    /// Administrators alerted about the escalation.
    pub administrators_alerted: usize,
    /// Accounts permanently deleted.
    pub deleted_users: Vec<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_windows() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 1, 0, 0).unwrap();
        let policy = SweepPolicy::default();
        // Month arithmetic clamps to the last valid day.
        assert_eq!(
            policy.expiry_cutoff(now),
            Utc.with_ymd_and_hms(2024, 2, 29, 1, 0, 0).unwrap()
        );
        assert_eq!(
            policy.escalation_cutoff(now),
            Utc.with_ymd_and_hms(2024, 3, 24, 1, 0, 0).unwrap()
        );
        assert_eq!(
            policy.deletion_time(now),
            Utc.with_ymd_and_hms(2024, 4, 30, 1, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_sweep_rolls_over_midnight() {
        let before = Utc.with_ymd_and_hms(2024, 5, 10, 0, 30, 0).unwrap();
        assert_eq!(
            next_sweep_at(before, 1),
            Utc.with_ymd_and_hms(2024, 5, 10, 1, 0, 0).unwrap()
        );
        let exactly = Utc.with_ymd_and_hms(2024, 5, 10, 1, 0, 0).unwrap();
        assert_eq!(
            next_sweep_at(exactly, 1),
            Utc.with_ymd_and_hms(2024, 5, 11, 1, 0, 0).unwrap()
        );
        let after = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(
            next_sweep_at(after, 1),
            Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_schedule_due() {
        let now = Utc::now();
        let mut schedule = InactivationSchedule {
            user: UserId::new(),
            requested_at: now - Duration::days(40),
            scheduled_deletion_at: now - Duration::days(5),
            actual_deletion_at: None,
        };
        assert!(schedule.is_due(now));
        assert!(!schedule.is_due(now - Duration::days(6)));

        schedule.actual_deletion_at = Some(now);
        assert!(!schedule.is_due(now));
    }
}
