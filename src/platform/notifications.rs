//! Notification inbox.

use crate::error::{AccessError, CoachResult, ExecutionError};
use crate::notification::{InboxEntry, InboxEntryId, InboxItem};
use crate::user::UserId;

use super::Platform;

impl Platform {
    /// A user's inbox, newest first.
    ///
    /// # Errors
    ///
    /// Storage failures, or an entry whose notification is missing.
    pub fn inbox(&self, user: UserId) -> CoachResult<Vec<InboxItem>> {
        let mut items = Vec::new();
        for entry in self.stores.notifications.inbox(user)? {
            let notification = self
                .stores
                .notifications
                .get_notification(entry.notification)?
                .ok_or_else(|| ExecutionError::InvalidState {
                    reason: format!("inbox entry {} has no notification", entry.id),
                })?;
            items.push(InboxItem { entry, notification });
        }
        items.sort_by(|a, b| b.notification.sent_at.cmp(&a.notification.sent_at));
        Ok(items)
    }

    /// Number of unread entries.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn unread_count(&self, user: UserId) -> CoachResult<usize> {
        Ok(self
            .stores
            .notifications
            .inbox(user)?
            .iter()
            .filter(|e| !e.is_read())
            .count())
    }

    /// Marks one entry read. Already-read entries keep their first read time.
    ///
    /// # Errors
    ///
    /// `InboxEntryNotFound`, or `AccessError::NotOwner` when the entry
    /// belongs to someone else.
    pub fn mark_read(&self, id: InboxEntryId, user: UserId) -> CoachResult<InboxEntry> {
        let entry = self
            .stores
            .notifications
            .get_inbox_entry(id)?
            .ok_or(ExecutionError::InboxEntryNotFound { id })?;
        if entry.recipient != user {
            return Err(AccessError::NotOwner {
                user,
                resource: format!("inbox entry {id}"),
            }
            .into());
        }
        if entry.is_read() {
            return Ok(entry);
        }
        let now = self.now();
        self.stores.notifications.mark_read(id, now)?;
        Ok(InboxEntry {
            read_at: Some(now),
            ..entry
        })
    }

    /// Marks every unread entry read, returning how many changed.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn mark_all_read(&self, user: UserId) -> CoachResult<usize> {
        let now = self.now();
        let mut changed = 0;
        for entry in self.stores.notifications.inbox(user)? {
            if !entry.is_read() {
                self.stores.notifications.mark_read(entry.id, now)?;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
