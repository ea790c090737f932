//! Administrator workflows.

use std::collections::BTreeMap;

use crate::error::{CoachResult, ValidationError};
use crate::link::{LinkId, StudentProfessionalLink};
use crate::notification::Message;
use crate::user::{Role, User, UserId};

use super::Platform;

impl Platform {
    /// Approves a professional registration: activates the account and
    /// tells the professional.
    ///
    /// # Errors
    ///
    /// `UserNotFound`, or `ValidationError::NotAProfessional`.
    pub fn approve_professional(&self, id: UserId) -> CoachResult<User> {
        let user = self.require_user(id)?;
        if !user.is_professional() {
            return Err(ValidationError::NotAProfessional { id }.into());
        }
        if user.active {
            return Ok(user);
        }
        let mut user = user;
        user.active = true;
        self.stores.users.update_user(user.clone())?;
        tracing::info!(target: "audit", user = %id, username = %user.username, "professional approved");
        self.notify(&[id], Message::professional_approved())?;
        Ok(user)
    }

    /// Users holding `role`.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn users_with_role(&self, role: Role) -> CoachResult<Vec<User>> {
        let mut users = self.stores.users.list_users()?;
        users.retain(|u| u.has_role(role));
        Ok(users)
    }

    /// Ids of every administrator.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn administrator_ids(&self) -> CoachResult<Vec<UserId>> {
        Ok(self
            .users_with_role(Role::Administrator)?
            .into_iter()
            .map(|u| u.id)
            .collect())
    }

    /// Professionals still waiting for approval.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn pending_professionals(&self) -> CoachResult<Vec<User>> {
        let mut users = self.stores.users.list_users()?;
        users.retain(|u| !u.active && u.is_professional());
        Ok(users)
    }

    /// Removes a user and everything they own.
    ///
    /// Every counterpart of a link is told the link ended. Authored
    /// content goes with its routine assignments and history.
    ///
    /// # Errors
    ///
    /// `UserNotFound` or storage failures.
    pub fn remove_user(&self, id: UserId) -> CoachResult<User> {
        let user = self.require_user(id)?;
        self.purge_user(&user)?;
        self.stores.schedules.delete_schedule(id)?;
        tracing::info!(target: "audit", user = %id, username = %user.username, "user removed by administrator");
        Ok(user)
    }

    /// Deletes a user's links, content, assignments, profiles, inbox and
    /// account. The deletion schedule is left to the caller.
    pub(super) fn purge_user(&self, user: &User) -> CoachResult<()> {
        let links: BTreeMap<LinkId, StudentProfessionalLink> = self
            .stores
            .links
            .links_for_student(user.id)?
            .into_iter()
            .chain(self.stores.links.links_for_professional(user.id)?)
            .map(|l| (l.id, l))
            .collect();
        for link in links.values() {
            self.stores.links.delete_link(link.id)?;
            if let Some(other) = link.counterpart(user.id).filter(|o| *o != user.id) {
                let as_professional = link.professional == user.id;
                self.notify(
                    &[other],
                    Message::link_terminated(user.id, &user.full_name, as_professional),
                )?;
            }
        }

        for content in self.stores.contents.contents_by_creator(user.id)? {
            self.purge_content(&content)?;
        }
        for instance in self.stores.routines.instances_for_student(user.id)? {
            self.stores.routines.delete_instance(instance.id)?;
        }

        self.stores.profiles.delete_profiles(user.id)?;
        self.stores.notifications.delete_inbox(user.id)?;
        self.stores.users.delete_user(user.id)?;
        tracing::debug!(user = %user.id, links = links.len(), "user data purged");
        Ok(())
    }
}
