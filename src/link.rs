//! Student–professional linkage.
//!
//! A link starts [`LinkStatus::Pending`] when a student asks to be followed
//! by a professional. Only that professional can move it to
//! [`LinkStatus::Accepted`]. Either party may remove a link in any state;
//! removal of a pending link is how a professional rejects a request.
//! Pending links age out: past the escalation window they are reported to
//! administrators, past the expiry window they are deleted by the sweep.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::id::define_id;
use crate::user::UserId;

define_id!(
    /// Stable link identifier.
    LinkId
);

/// Lifecycle state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    /// Requested by the student, awaiting the professional.
    Pending,
    /// Accepted by the professional.
    Accepted,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
        }
    }
}

/// Which side of a link a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkParty {
    /// The student.
    Student,
    /// The professional.
    Professional,
}

/// A link between a student and a professional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfessionalLink {
    /// Stable identifier.
    pub id: LinkId,
    /// Requesting student.
    pub student: UserId,
    /// Requested professional.
    pub professional: UserId,
    /// Current state.
    pub status: LinkStatus,
    /// When the student asked.
    pub requested_at: DateTime<Utc>,
}

impl StudentProfessionalLink {
    /// Creates a pending link.
    #[must_use]
    pub fn pending(student: UserId, professional: UserId, requested_at: DateTime<Utc>) -> Self {
        Self {
            id: LinkId::new(),
            student,
            professional,
            status: LinkStatus::Pending,
            requested_at,
        }
    }

    /// Returns true for a pending link.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == LinkStatus::Pending
    }

    /// Returns true for an accepted link.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == LinkStatus::Accepted
    }

    /// Moves the link from pending to accepted.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::LinkNotPending` if already accepted.
    pub fn accept(&mut self) -> Result<(), ExecutionError> {
        if !self.is_pending() {
            return Err(ExecutionError::LinkNotPending {
                id: self.id,
                status: self.status,
            });
        }
        self.status = LinkStatus::Accepted;
        Ok(())
    }

    /// Which side `user` is on, if any.
    #[must_use]
    pub fn party(&self, user: UserId) -> Option<LinkParty> {
        if user == self.student {
            Some(LinkParty::Student)
        } else if user == self.professional {
            Some(LinkParty::Professional)
        } else {
            None
        }
    }

    /// The other side of the link from `user`.
    #[must_use]
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        match self.party(user)? {
            LinkParty::Student => Some(self.professional),
            LinkParty::Professional => Some(self.student),
        }
    }

    /// Returns true when the link was requested strictly before `cutoff`.
    #[must_use]
    pub fn requested_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.requested_at < cutoff
    }
}
