//! Coaching platform services.
//!
//! [`Platform`] is the single entry point for every workflow: registration
//! and login, student/professional links, content authoring and access,
//! routine assignment and training logs, the notification inbox,
//! administrator actions and the daily sweep. It holds no state of its own
//! beyond the injected stores, clock and policy, so it is cheap to clone
//! into request handlers.

mod admin;
mod content;
mod links;
mod notifications;
mod seed;
mod sweep;
mod training;
mod users;

pub use seed::{SeedReport, DEMO_PASSWORD};

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::error::{CoachResult, ExecutionError};
use crate::notification::{InboxEntry, InboxEntryId, Message, Notification};
use crate::schedule::SweepPolicy;
use crate::storage::Stores;
use crate::user::{User, UserId};

/// Coaching platform service layer.
#[derive(Clone)]
pub struct Platform {
    stores: Stores,
    clock: Arc<dyn Clock>,
    policy: SweepPolicy,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Platform {
    /// Create a platform over the given stores.
    #[must_use]
    pub fn new(stores: Stores, clock: Arc<dyn Clock>, policy: SweepPolicy) -> Self {
        Self {
            stores,
            clock,
            policy,
        }
    }

    /// In-memory platform on the system clock with the default policy.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Stores::in_memory(), Arc::new(SystemClock), SweepPolicy::default())
    }

    /// Storage handles.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// The injected clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Active sweep policy.
    #[must_use]
    pub fn policy(&self) -> &SweepPolicy {
        &self.policy
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn require_user(&self, id: UserId) -> CoachResult<User> {
        self.stores
            .users
            .get_user(id)?
            .ok_or_else(|| ExecutionError::UserNotFound { id }.into())
    }

    /// Sends `message` to every recipient as one shared notification.
    fn notify(&self, recipients: &[UserId], message: Message) -> CoachResult<Option<Notification>> {
        if recipients.is_empty() {
            return Ok(None);
        }
        let notification = message.into_notification(self.now());
        let entries = recipients
            .iter()
            .map(|&recipient| InboxEntry {
                id: InboxEntryId::new(),
                notification: notification.id,
                recipient,
                read_at: None,
            })
            .collect();
        self.stores.notifications.deliver(notification.clone(), entries)?;
        tracing::info!(
            target: "audit",
            notification = %notification.id,
            kind = ?notification.kind,
            title = %notification.title,
            recipients = recipients.len(),
            "notification sent"
        );
        Ok(Some(notification))
    }
}
