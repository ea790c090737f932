//! Student–professional link lifecycle.
//!
//! ```text
//!   request ──→ Pending ──accept──→ Accepted
//!                  │                   │
//!                  └──── remove ───────┴──→ (deleted)
//! ```
//!
//! Rejection is removal of a pending link. Pending links also leave the
//! table through the daily sweep once they outlive the expiry window.

use std::collections::BTreeSet;

use crate::error::{AccessError, CoachResult, ExecutionError, ValidationError};
use crate::link::{LinkId, LinkParty, LinkStatus, StudentProfessionalLink};
use crate::notification::Message;
use crate::user::UserId;

use super::Platform;

fn status_matches(statuses: &[LinkStatus], status: LinkStatus) -> bool {
    statuses.is_empty() || statuses.contains(&status)
}

impl Platform {
    /// Opens a pending link from `student` to each professional and
    /// notifies them. Repeated ids in `professionals` are ignored.
    ///
    /// # Errors
    ///
    /// `NotAStudent` / `NotAProfessional` for wrong roles, `SelfLink` when
    /// a dual-role user names themselves, and
    /// `ExecutionError::InvalidState` when a link to one of the
    /// professionals already exists. Nothing is created on error.
    pub fn create_pending_links(
        &self,
        student: UserId,
        professionals: &[UserId],
    ) -> CoachResult<Vec<StudentProfessionalLink>> {
        let student_user = self.require_user(student)?;
        if !student_user.is_student() {
            return Err(ValidationError::NotAStudent { id: student }.into());
        }

        let unique: BTreeSet<UserId> = professionals.iter().copied().collect();
        if unique.contains(&student) {
            return Err(ValidationError::SelfLink { id: student }.into());
        }
        for &professional in &unique {
            self.require_professional_user(professional)?;
            if let Some(existing) = self.stores.links.find_link(student, professional)? {
                return Err(ExecutionError::InvalidState {
                    reason: format!(
                        "student {student} already has a {} link with {professional}",
                        existing.status
                    ),
                }
                .into());
            }
        }

        let now = self.now();
        let mut created = Vec::with_capacity(unique.len());
        for professional in unique {
            let link = StudentProfessionalLink::pending(student, professional, now);
            self.stores.links.insert_link(link.clone())?;
            tracing::info!(link = %link.id, %student, %professional, "link requested");
            self.notify(&[professional], Message::new_student_request(&student_user.full_name))?;
            created.push(link);
        }
        Ok(created)
    }

    /// Get a link by id.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn get_link(&self, id: LinkId) -> CoachResult<Option<StudentProfessionalLink>> {
        Ok(self.stores.links.get_link(id)?)
    }

    fn require_link(&self, id: LinkId) -> CoachResult<StudentProfessionalLink> {
        self.stores
            .links
            .get_link(id)?
            .ok_or_else(|| ExecutionError::LinkNotFound { id }.into())
    }

    /// Links of a professional, oldest request first. An empty `statuses`
    /// matches every status.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn links_for_professional(
        &self,
        professional: UserId,
        statuses: &[LinkStatus],
    ) -> CoachResult<Vec<StudentProfessionalLink>> {
        let mut links = self.stores.links.links_for_professional(professional)?;
        links.retain(|l| status_matches(statuses, l.status));
        Ok(links)
    }

    /// Links of a student, oldest request first. An empty `statuses`
    /// matches every status.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn links_for_student(
        &self,
        student: UserId,
        statuses: &[LinkStatus],
    ) -> CoachResult<Vec<StudentProfessionalLink>> {
        let mut links = self.stores.links.links_for_student(student)?;
        links.retain(|l| status_matches(statuses, l.status));
        Ok(links)
    }

    /// Links in any of `statuses` requested strictly before `cutoff`.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn links_requested_before(
        &self,
        statuses: &[LinkStatus],
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> CoachResult<Vec<StudentProfessionalLink>> {
        let wanted: BTreeSet<LinkStatus> = if statuses.is_empty() {
            BTreeSet::from([LinkStatus::Pending, LinkStatus::Accepted])
        } else {
            statuses.iter().copied().collect()
        };
        let mut out = Vec::new();
        for status in wanted {
            out.extend(self.stores.links.links_requested_before(status, cutoff)?);
        }
        out.sort_by_key(|l| l.requested_at);
        Ok(out)
    }

    /// Returns true when the pair has an accepted link.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn is_active_link(&self, student: UserId, professional: UserId) -> CoachResult<bool> {
        Ok(self
            .stores
            .links
            .find_link(student, professional)?
            .is_some_and(|l| l.is_accepted()))
    }

    /// Accepts a pending link on behalf of its professional.
    ///
    /// The student's account is activated by the first accepted link
    /// only; later acceptances leave the account state alone.
    ///
    /// # Errors
    ///
    /// `AccessError::NotLinkParty` unless `professional` is the link's
    /// professional, `ExecutionError::LinkNotPending` if already accepted.
    pub fn accept_link(&self, id: LinkId, professional: UserId) -> CoachResult<StudentProfessionalLink> {
        let mut link = self.require_link(id)?;
        if link.professional != professional {
            return Err(AccessError::NotLinkParty {
                user: professional,
                link: id,
            }
            .into());
        }
        link.accept()?;
        self.stores.links.update_link(link.clone())?;
        tracing::info!(link = %id, student = %link.student, %professional, "link accepted");

        let student = self.require_user(link.student)?;
        let accepted = self
            .stores
            .links
            .links_for_student(student.id)?
            .iter()
            .filter(|l| l.is_accepted())
            .count();
        if accepted == 1 {
            self.activate_user(student.id)?;
        }
        self.notify(&[professional], Message::link_accepted(&student.full_name))?;
        Ok(link)
    }

    /// Removes a link at either party's request and tells the other side.
    /// Removing a pending link is how a professional rejects a request.
    ///
    /// # Errors
    ///
    /// `AccessError::NotLinkParty` when `requester` is on neither side.
    pub fn remove_link(&self, id: LinkId, requester: UserId) -> CoachResult<StudentProfessionalLink> {
        let link = self.require_link(id)?;
        let Some(party) = link.party(requester) else {
            return Err(AccessError::NotLinkParty {
                user: requester,
                link: id,
            }
            .into());
        };
        let requester_user = self.require_user(requester)?;

        self.stores.links.delete_link(id)?;
        tracing::info!(link = %id, %requester, status = %link.status, "link removed");

        let other = match party {
            LinkParty::Student => link.professional,
            LinkParty::Professional => link.student,
        };
        self.notify(
            &[other],
            Message::link_terminated(
                requester,
                &requester_user.full_name,
                party == LinkParty::Professional,
            ),
        )?;
        Ok(link)
    }
}
