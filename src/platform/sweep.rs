//! Daily maintenance sweep and deletion scheduling.

use crate::error::CoachResult;
use crate::link::LinkStatus;
use crate::notification::Message;
use crate::schedule::{InactivationSchedule, SweepReport};
use crate::user::UserId;

use super::Platform;

impl Platform {
    /// Schedules permanent deletion of a user after the grace period.
    /// An existing schedule is kept as is.
    ///
    /// # Errors
    ///
    /// `UserNotFound` or storage failures.
    pub fn schedule_deletion(&self, user: UserId) -> CoachResult<InactivationSchedule> {
        self.require_user(user)?;
        if let Some(existing) = self.stores.schedules.get_schedule(user)? {
            return Ok(existing);
        }
        let now = self.now();
        let schedule = InactivationSchedule {
            user,
            requested_at: now,
            scheduled_deletion_at: self.policy.deletion_time(now),
            actual_deletion_at: None,
        };
        self.stores.schedules.insert_schedule(schedule.clone())?;
        tracing::info!(%user, deletion_at = %schedule.scheduled_deletion_at, "deletion scheduled");
        Ok(schedule)
    }

    /// Runs the maintenance sweep once, in order:
    ///
    /// 1. deletes pending links older than the expiry window;
    /// 2. alerts every administrator about the pending links that remain
    ///    older than the escalation window;
    /// 3. permanently deletes users whose deletion is due.
    ///
    /// # Errors
    ///
    /// Storage failures. Steps already completed stay applied.
    pub fn run_sweep(&self) -> CoachResult<SweepReport> {
        let now = self.now();
        let mut report = SweepReport {
            ran_at: Some(now),
            ..SweepReport::default()
        };

        let expired = self
            .stores
            .links
            .links_requested_before(LinkStatus::Pending, self.policy.expiry_cutoff(now))?;
        for link in &expired {
            self.stores.links.delete_link(link.id)?;
            tracing::info!(
                target: "audit",
                link = %link.id,
                student = %link.student,
                professional = %link.professional,
                requested_at = %link.requested_at,
                "expired pending link deleted"
            );
        }
        report.expired_links = expired.len();

        let stale = self
            .stores
            .links
            .links_requested_before(LinkStatus::Pending, self.policy.escalation_cutoff(now))?;
        if !stale.is_empty() {
            let admins = self.administrator_ids()?;
            self.notify(&admins, Message::escalation(stale.len()))?;
            tracing::info!(
                target: "audit",
                links = stale.len(),
                administrators = admins.len(),
                "stale pending links escalated"
            );
            report.escalated_links = stale.len();
            report.administrators_alerted = admins.len();
        }

        for mut schedule in self.stores.schedules.due_schedules(now)? {
            if let Some(user) = self.stores.users.get_user(schedule.user)? {
                self.purge_user(&user)?;
            }
            schedule.actual_deletion_at = Some(now);
            self.stores.schedules.update_schedule(schedule.clone())?;
            tracing::info!(
                target: "audit",
                user = %schedule.user,
                scheduled_at = %schedule.scheduled_deletion_at,
                "user permanently deleted"
            );
            report.deleted_users.push(schedule.user);
        }

        tracing::info!(
            expired = report.expired_links,
            escalated = report.escalated_links,
            deleted = report.deleted_users.len(),
            "sweep finished"
        );
        Ok(report)
    }
}
