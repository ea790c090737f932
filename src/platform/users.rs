//! Registration, login and self-service account management.

use crate::auth::{PasswordHash, Principal};
use crate::error::{AccessError, CoachResult, ValidationError};
use crate::notification::Message;
use crate::user::{
    Goal, ProfessionalProfile, ProfileUpdate, Registration, Role, StudentProfile, User, UserId, UserView,
};

use super::Platform;

impl Platform {
    /// Public sign-up.
    ///
    /// The account starts inactive. Students get a profile and a pending
    /// link to every selected professional; professionals get a profile
    /// and every administrator is asked to approve them.
    ///
    /// # Errors
    ///
    /// Validation errors for malformed input, a self-assigned
    /// administrator role, a taken username or email, or a selected
    /// professional that does not hold a professional role.
    pub fn register(&self, registration: Registration) -> CoachResult<User> {
        if registration.roles.contains(&Role::Administrator) {
            return Err(ValidationError::RoleNotAllowed {
                role: Role::Administrator,
            }
            .into());
        }
        self.create_account(registration, false)
    }

    /// Creates an active administrator. Bootstrap path for seeding and
    /// operators; never exposed through public sign-up.
    ///
    /// # Errors
    ///
    /// Same as [`Platform::register`], minus the administrator rule.
    pub fn register_administrator(&self, mut registration: Registration) -> CoachResult<User> {
        registration.roles.insert(Role::Administrator);
        self.create_account(registration, true)
    }

    fn create_account(&self, registration: Registration, active: bool) -> CoachResult<User> {
        registration.validate()?;
        self.ensure_unique(None, &registration.username, &registration.email)?;
        for area in &registration.expertise_areas {
            if !registration.roles.contains(&area.role()) {
                return Err(ValidationError::OutOfRange {
                    field: "expertise_areas".to_string(),
                    reason: format!("{area:?} requires the {} role", area.role()),
                }
                .into());
            }
        }
        let is_student = registration.roles.contains(&Role::Student);
        if is_student {
            for &professional in &registration.selected_professionals {
                self.require_professional_user(professional)?;
            }
        }

        let now = self.now();
        let user = User {
            id: UserId::new(),
            username: registration.username.trim().to_string(),
            password_hash: PasswordHash::generate(&registration.password).into_string(),
            email: registration.email.trim().to_string(),
            full_name: registration.full_name.trim().to_string(),
            phone_number: registration.phone_number.clone(),
            date_of_birth: registration.date_of_birth,
            roles: registration.roles.clone(),
            failed_login_attempts: 0,
            registered_at: now,
            last_login_at: None,
            active,
        };
        self.stores.users.insert_user(user.clone())?;
        tracing::info!(user = %user.id, username = %user.username, roles = ?user.roles, "user registered");

        if is_student {
            self.stores.profiles.put_student_profile(StudentProfile {
                user_id: user.id,
                goal: Goal::default(),
            })?;
            self.create_pending_links(user.id, &registration.selected_professionals)?;
        }

        if registration.wants_professional() {
            self.stores.profiles.put_professional_profile(ProfessionalProfile {
                user_id: user.id,
                register: registration.register.clone().unwrap_or_default(),
                expertise_areas: registration.expertise_areas.clone(),
            })?;
            if !active {
                let admins = self.administrator_ids()?;
                self.notify(&admins, Message::professional_pending(&user.username, user.id))?;
            }
        }

        Ok(user)
    }

    fn ensure_unique(&self, owner: Option<UserId>, username: &str, email: &str) -> CoachResult<()> {
        if let Some(existing) = self.stores.users.find_by_username(username.trim())? {
            if Some(existing.id) != owner {
                return Err(ValidationError::UsernameTaken {
                    username: username.to_string(),
                }
                .into());
            }
        }
        if let Some(existing) = self.stores.users.find_by_email(email.trim())? {
            if Some(existing.id) != owner {
                return Err(ValidationError::EmailTaken {
                    email: email.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Activates an account, notifying the user when it was inactive.
    /// Activating an active account is a no-op.
    ///
    /// # Errors
    ///
    /// `ExecutionError::UserNotFound` for an unknown id.
    pub fn activate_user(&self, id: UserId) -> CoachResult<User> {
        let mut user = self.require_user(id)?;
        if user.active {
            return Ok(user);
        }
        user.active = true;
        self.stores.users.update_user(user.clone())?;
        tracing::info!(user = %id, username = %user.username, "user activated");
        self.notify(&[id], Message::account_activated())?;
        Ok(user)
    }

    /// Checks credentials.
    ///
    /// A wrong password on a known account counts as a failed attempt;
    /// reaching the alert threshold notifies the account owner once.
    /// Success resets the counter.
    ///
    /// # Errors
    ///
    /// `AccessError::UnknownUser`, `InvalidCredentials` or
    /// `InactiveAccount`.
    pub fn authenticate(&self, username: &str, password: &str) -> CoachResult<Principal> {
        let Some(mut user) = self.stores.users.find_by_username(username.trim())? else {
            tracing::debug!(username, "login for unknown user");
            return Err(AccessError::UnknownUser {
                username: username.to_string(),
            }
            .into());
        };

        if !PasswordHash::from_encoded(user.password_hash.clone()).verify(password) {
            user.failed_login_attempts = user.failed_login_attempts.saturating_add(1);
            let attempts = user.failed_login_attempts;
            self.stores.users.update_user(user.clone())?;
            tracing::warn!(user = %user.id, attempts, "failed login");
            if attempts == self.policy.failed_login_alert_threshold {
                self.notify(&[user.id], Message::failed_logins(attempts))?;
            }
            return Err(AccessError::InvalidCredentials {
                username: user.username,
            }
            .into());
        }

        if !user.active {
            return Err(AccessError::InactiveAccount {
                username: user.username,
            }
            .into());
        }

        user.failed_login_attempts = 0;
        user.last_login_at = Some(self.now());
        self.stores.users.update_user(user.clone())?;
        Ok(Principal::from_user(&user))
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn get_user(&self, id: UserId) -> CoachResult<Option<User>> {
        Ok(self.stores.users.get_user(id)?)
    }

    /// Get a user by username (case-insensitive).
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn get_user_by_username(&self, username: &str) -> CoachResult<Option<User>> {
        Ok(self.stores.users.find_by_username(username)?)
    }

    /// Get a user by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn get_user_by_email(&self, email: &str) -> CoachResult<Option<User>> {
        Ok(self.stores.users.find_by_email(email)?)
    }

    /// Every user, oldest registration first.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn list_users(&self) -> CoachResult<Vec<User>> {
        Ok(self.stores.users.list_users()?)
    }

    /// Outward view of a user with their profiles.
    ///
    /// # Errors
    ///
    /// `ExecutionError::UserNotFound` for an unknown id.
    pub fn user_view(&self, id: UserId) -> CoachResult<UserView> {
        let user = self.require_user(id)?;
        self.view_of(&user)
    }

    pub(super) fn view_of(&self, user: &User) -> CoachResult<UserView> {
        let student = self.stores.profiles.get_student_profile(user.id)?;
        let professional = self.stores.profiles.get_professional_profile(user.id)?;
        Ok(UserView::new(user, student.as_ref(), professional.as_ref()))
    }

    /// Self-service edit. The password is only replaced when provided.
    ///
    /// # Errors
    ///
    /// Validation errors, including a username or email held by someone
    /// else.
    pub fn update_profile(&self, id: UserId, update: ProfileUpdate) -> CoachResult<User> {
        update.validate()?;
        let mut user = self.require_user(id)?;
        self.ensure_unique(Some(id), &update.username, &update.email)?;

        user.username = update.username.trim().to_string();
        user.email = update.email.trim().to_string();
        user.full_name = update.full_name.trim().to_string();
        user.phone_number = update.phone_number;
        user.date_of_birth = update.date_of_birth;
        if let Some(password) = update.password.filter(|p| !p.is_empty()) {
            user.password_hash = PasswordHash::generate(&password).into_string();
        }
        self.stores.users.update_user(user.clone())?;
        Ok(user)
    }

    /// Replaces a student's goal.
    ///
    /// # Errors
    ///
    /// `ValidationError::NotAStudent` when the user has no student profile.
    pub fn update_student_goal(&self, id: UserId, goal: Goal) -> CoachResult<StudentProfile> {
        let goal = goal.validate()?;
        let mut profile = self
            .stores
            .profiles
            .get_student_profile(id)?
            .ok_or(ValidationError::NotAStudent { id })?;
        profile.goal = goal;
        self.stores.profiles.put_student_profile(profile.clone())?;
        Ok(profile)
    }

    /// Deactivates the account now and schedules its permanent deletion.
    ///
    /// # Errors
    ///
    /// `ExecutionError::UserNotFound` for an unknown id.
    pub fn request_deactivation(&self, id: UserId) -> CoachResult<User> {
        let mut user = self.require_user(id)?;
        if user.active {
            user.active = false;
            self.stores.users.update_user(user.clone())?;
        }
        self.schedule_deletion(id)?;
        tracing::info!(user = %id, "deactivation requested");
        Ok(user)
    }

    /// A professional with their profile.
    ///
    /// # Errors
    ///
    /// `ExecutionError::UserNotFound` or `ValidationError::NotAProfessional`.
    pub fn get_professional(&self, id: UserId) -> CoachResult<UserView> {
        let user = self.require_professional_user(id)?;
        self.view_of(&user)
    }

    /// Active professionals students can ask to link with.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn list_professionals(&self) -> CoachResult<Vec<UserView>> {
        self.stores
            .users
            .list_users()?
            .iter()
            .filter(|u| u.active && u.is_professional())
            .map(|u| self.view_of(u))
            .collect()
    }

    /// A student with their profile.
    ///
    /// # Errors
    ///
    /// `ExecutionError::UserNotFound` or `ValidationError::NotAStudent`.
    pub fn get_student(&self, id: UserId) -> CoachResult<UserView> {
        let user = self.require_user(id)?;
        if !user.is_student() {
            return Err(ValidationError::NotAStudent { id }.into());
        }
        self.view_of(&user)
    }

    pub(super) fn require_professional_user(&self, id: UserId) -> CoachResult<User> {
        let user = self.require_user(id)?;
        if !user.is_professional() {
            return Err(ValidationError::NotAProfessional { id }.into());
        }
        Ok(user)
    }
}
