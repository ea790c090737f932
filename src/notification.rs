//! Notification inbox.
//!
//! A [`Notification`] is written once and fanned out to one or more
//! recipients through [`InboxEntry`] rows, each tracking its own read state.
//! [`Message`] holds the factory texts for every event the platform
//! announces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::define_id;
use crate::user::UserId;

define_id!(
    /// Notification identifier.
    NotificationId
);
define_id!(
    /// Identifier of one recipient's copy of a notification.
    InboxEntryId
);

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Informational.
    Info,
    /// Access to the platform was granted.
    AccessGranted,
    /// Someone is waiting for the recipient's approval.
    PendingApproval,
    /// Security or operational alert.
    SystemAlert,
}

/// A sent notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Stable identifier.
    pub id: NotificationId,
    /// Short title.
    pub title: String,
    /// Message body.
    pub body: String,
    /// Category.
    pub kind: NotificationKind,
    /// Sending user; `None` for the system.
    pub sender: Option<UserId>,
    /// When it was sent.
    pub sent_at: DateTime<Utc>,
}

/// One recipient's copy of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    /// Stable identifier.
    pub id: InboxEntryId,
    /// Notification delivered.
    pub notification: NotificationId,
    /// Recipient.
    pub recipient: UserId,
    /// When the recipient read it.
    pub read_at: Option<DateTime<Utc>>,
}

impl InboxEntry {
    /// Returns true once read.
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// An inbox entry joined with its notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxItem {
    /// Recipient copy.
    pub entry: InboxEntry,
    /// Delivered notification.
    pub notification: Notification,
}

/// Unsent notification content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Short title.
    pub title: String,
    /// Message body.
    pub body: String,
    /// Category.
    pub kind: NotificationKind,
    /// Sending user; `None` for the system.
    pub sender: Option<UserId>,
}

impl Message {
    fn system(title: &str, body: String, kind: NotificationKind) -> Self {
        Self {
            title: title.to_string(),
            body,
            kind,
            sender: None,
        }
    }

    /// Told to a professional once they accept a student.
    #[must_use]
    pub fn link_accepted(student_name: &str) -> Self {
        Self::system(
            "Link accepted",
            format!("You are now linked with student {student_name}. You can share content with them."),
            NotificationKind::Info,
        )
    }

    /// Told to a professional whose registration an administrator approved.
    #[must_use]
    pub fn professional_approved() -> Self {
        Self::system(
            "Registration approved",
            "Your professional registration was approved. You can now log in and use your dashboard."
                .to_string(),
            NotificationKind::AccessGranted,
        )
    }

    /// Told to the other party when a link is removed.
    #[must_use]
    pub fn link_terminated(sender: UserId, sender_name: &str, sender_is_professional: bool) -> Self {
        let body = if sender_is_professional {
            format!("Your link with professional {sender_name} was ended.")
        } else {
            format!("The link with student {sender_name} was ended.")
        };
        Self {
            title: "Link ended".to_string(),
            body,
            kind: NotificationKind::Info,
            sender: Some(sender),
        }
    }

    /// Told to a user whose account became active.
    #[must_use]
    pub fn account_activated() -> Self {
        Self::system(
            "Account activated",
            "Your account was approved. You can now log in and access your content.".to_string(),
            NotificationKind::AccessGranted,
        )
    }

    /// Told to a professional a student asked to be linked with.
    #[must_use]
    pub fn new_student_request(student_name: &str) -> Self {
        Self::system(
            "New link request",
            format!("Student {student_name} asked to be linked with you. Review it on your dashboard."),
            NotificationKind::PendingApproval,
        )
    }

    /// Told to a user after repeated failed logins.
    #[must_use]
    pub fn failed_logins(attempts: u32) -> Self {
        Self::system(
            "Security alert: repeated failed logins",
            format!(
                "We detected {attempts} failed login attempts on your account. If this was not you, change your password now."
            ),
            NotificationKind::SystemAlert,
        )
    }

    /// Told to every administrator when a professional registers.
    #[must_use]
    pub fn professional_pending(username: &str, user: UserId) -> Self {
        Self::system(
            "Professional awaiting approval",
            format!("New professional {username} ({user}) is waiting for registration approval."),
            NotificationKind::PendingApproval,
        )
    }

    /// Told to every administrator when pending links go stale.
    #[must_use]
    pub fn escalation(count: usize) -> Self {
        Self::system(
            "Alert: link requests expiring",
            format!("{count} student link requests have been pending for more than a week. Review needed."),
            NotificationKind::SystemAlert,
        )
    }

    /// Materializes the message as a notification sent at `at`.
    #[must_use]
    pub fn into_notification(self, at: DateTime<Utc>) -> Notification {
        Notification {
            id: NotificationId::new(),
            title: self.title,
            body: self.body,
            kind: self.kind,
            sender: self.sender,
            sent_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_wording_depends_on_sender_role() {
        let sender = UserId::new();
        let from_pro = Message::link_terminated(sender, "coach1", true);
        assert!(from_pro.body.contains("professional coach1"));
        assert_eq!(from_pro.sender, Some(sender));

        let from_student = Message::link_terminated(sender, "student", false);
        assert!(from_student.body.contains("student student"));
    }

    #[test]
    fn test_system_messages_have_no_sender() {
        for msg in [
            Message::professional_approved(),
            Message::account_activated(),
            Message::escalation(3),
            Message::failed_logins(5),
        ] {
            assert!(msg.sender.is_none());
        }
    }

    #[test]
    fn test_message_kinds() {
        assert_eq!(Message::professional_approved().kind, NotificationKind::AccessGranted);
        assert_eq!(Message::new_student_request("ana").kind, NotificationKind::PendingApproval);
        assert_eq!(Message::escalation(1).kind, NotificationKind::SystemAlert);
        assert!(Message::escalation(7).body.contains('7'));
    }

    #[test]
    fn test_into_notification_stamps_time() {
        let at = Utc::now();
        let n = Message::account_activated().into_notification(at);
        assert_eq!(n.sent_at, at);
        assert_eq!(n.kind, NotificationKind::AccessGranted);
    }
}
