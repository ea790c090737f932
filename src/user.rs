//! User identities, roles and profiles.
//!
//! A [`User`] is the login identity. Role-specific data lives in separate
//! profiles: students carry a [`StudentProfile`] with their body goal and
//! professionals a [`ProfessionalProfile`] with their council register and
//! expertise areas. A user holding both kinds of role gets both profiles.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::define_id;

define_id!(
    /// Stable user identifier.
    UserId
);

/// Maximum length of free-text identity fields.
pub const MAX_NAME_LENGTH: usize = 120;
/// Username length bounds (inclusive).
pub const USERNAME_LENGTH: (usize, usize) = (3, 32);

static USERNAME_RE: OnceLock<Result<Regex, String>> = OnceLock::new();
static EMAIL_RE: OnceLock<Result<Regex, String>> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Result<Regex, String>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).map_err(|e| e.to_string()))
        .as_ref()
        .ok()
}

/// Access role held by a user. A user may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Platform administrator.
    Administrator,
    /// Physical training coach.
    Coach,
    /// Nutritionist.
    Nutritionist,
    /// Psychologist.
    Psychologist,
    /// Student consuming content.
    Student,
}

impl Role {
    /// All roles, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Administrator,
        Self::Coach,
        Self::Nutritionist,
        Self::Psychologist,
        Self::Student,
    ];

    /// Returns true for the roles that author content and accept students.
    #[must_use]
    pub const fn is_professional(self) -> bool {
        matches!(self, Self::Coach | Self::Nutritionist | Self::Psychologist)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Administrator => write!(f, "ADMINISTRATOR"),
            Self::Coach => write!(f, "COACH"),
            Self::Nutritionist => write!(f, "NUTRITIONIST"),
            Self::Psychologist => write!(f, "PSYCHOLOGIST"),
            Self::Student => write!(f, "STUDENT"),
        }
    }
}

/// Area a professional declares expertise in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ExpertiseArea {
    HighPerformanceSports,
    PhysicalEducation,
    Physiotherapy,
    Sports,

    BehavioralNutrition,
    ClinicalNutrition,
    HealthNutrition,
    SportsNutrition,

    ClinicalPsychology,
    ExercisePsychology,
    EducationalPsychology,
    SportsPsychology,
}

impl ExpertiseArea {
    /// Areas of the coaching family.
    #[must_use]
    pub const fn is_coach_area(self) -> bool {
        matches!(
            self,
            Self::HighPerformanceSports | Self::PhysicalEducation | Self::Physiotherapy | Self::Sports
        )
    }

    /// Areas of the nutrition family.
    #[must_use]
    pub const fn is_nutritionist_area(self) -> bool {
        matches!(
            self,
            Self::BehavioralNutrition
                | Self::ClinicalNutrition
                | Self::HealthNutrition
                | Self::SportsNutrition
        )
    }

    /// Areas of the psychology family.
    #[must_use]
    pub const fn is_psychologist_area(self) -> bool {
        matches!(
            self,
            Self::ClinicalPsychology
                | Self::ExercisePsychology
                | Self::EducationalPsychology
                | Self::SportsPsychology
        )
    }

    /// The professional role this area belongs to.
    #[must_use]
    pub const fn role(self) -> Role {
        if self.is_coach_area() {
            Role::Coach
        } else if self.is_nutritionist_area() {
            Role::Nutritionist
        } else {
            Role::Psychologist
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Encoded password hash (see [`crate::auth::PasswordHash`]).
    pub password_hash: String,
    /// Contact email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Optional phone number.
    pub phone_number: Option<String>,
    /// Optional date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Roles held.
    pub roles: BTreeSet<Role>,
    /// Consecutive failed logins since the last success.
    pub failed_login_attempts: u32,
    /// When the account was created.
    pub registered_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Inactive accounts cannot log in.
    pub active: bool,
}

impl User {
    /// Returns true if the user holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns true if the user holds any professional role.
    #[must_use]
    pub fn is_professional(&self) -> bool {
        self.roles.iter().any(|r| r.is_professional())
    }

    /// Returns true if the user holds the student role.
    #[must_use]
    pub fn is_student(&self) -> bool {
        self.has_role(Role::Student)
    }

    /// Returns true if the user holds the administrator role.
    #[must_use]
    pub fn is_administrator(&self) -> bool {
        self.has_role(Role::Administrator)
    }
}

/// Body-composition goal tracked for a student.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Goal {
    /// Target weight in kilograms (0 when unset).
    pub target_weight_kg: f64,
    /// Target body fat percentage (0 when unset).
    pub target_body_fat_pct: f64,
}

impl Goal {
    /// Validates that both targets are plausible.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OutOfRange` for negative or non-finite
    /// values, or body fat above 100%.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !self.target_weight_kg.is_finite() || self.target_weight_kg < 0.0 {
            return Err(ValidationError::OutOfRange {
                field: "target_weight_kg".to_string(),
                reason: format!("{} must be a non-negative number", self.target_weight_kg),
            });
        }
        if !self.target_body_fat_pct.is_finite()
            || !(0.0..=100.0).contains(&self.target_body_fat_pct)
        {
            return Err(ValidationError::OutOfRange {
                field: "target_body_fat_pct".to_string(),
                reason: format!("{} must be within [0, 100]", self.target_body_fat_pct),
            });
        }
        Ok(self)
    }
}

/// Student-specific profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    /// Owning user.
    pub user_id: UserId,
    /// Current goal.
    pub goal: Goal,
}

/// Professional-specific profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    /// Owning user.
    pub user_id: UserId,
    /// Professional council register number.
    pub register: String,
    /// Declared expertise areas.
    pub expertise_areas: BTreeSet<ExpertiseArea>,
}

/// Sign-up request.
///
/// Built with [`Registration::builder`]; the builder validates field shapes,
/// uniqueness is checked by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    /// Desired login name.
    pub username: String,
    /// Plain-text password, hashed before storage.
    pub password: String,
    /// Contact email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Optional phone number.
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Optional date of birth.
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    /// Requested roles.
    pub roles: BTreeSet<Role>,
    /// Council register (professionals).
    #[serde(default)]
    pub register: Option<String>,
    /// Expertise areas (professionals).
    #[serde(default)]
    pub expertise_areas: BTreeSet<ExpertiseArea>,
    /// Professionals the student asks to be linked with.
    #[serde(default)]
    pub selected_professionals: Vec<UserId>,
}

impl Registration {
    /// Starts building a registration.
    #[must_use]
    pub fn builder() -> RegistrationBuilder {
        RegistrationBuilder::default()
    }

    /// Re-checks every field rule. Used for payloads that bypass the builder.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        require_text("password", &self.password, MAX_NAME_LENGTH)?;
        require_text("full_name", &self.full_name, MAX_NAME_LENGTH)?;
        if let Some(phone) = &self.phone_number {
            check_length("phone_number", phone, 32)?;
        }
        if self.roles.is_empty() {
            return Err(ValidationError::NoRoles);
        }
        if self.roles.iter().any(|r| r.is_professional()) {
            let register = self.register.as_deref().unwrap_or_default();
            require_text("register", register, 64)?;
        }
        Ok(())
    }

    /// Returns true when any requested role is a professional role.
    #[must_use]
    pub fn wants_professional(&self) -> bool {
        self.roles.iter().any(|r| r.is_professional())
    }
}

/// Builder for [`Registration`].
#[derive(Debug, Default)]
pub struct RegistrationBuilder {
    username: Option<String>,
    password: Option<String>,
    email: Option<String>,
    full_name: Option<String>,
    phone_number: Option<String>,
    date_of_birth: Option<NaiveDate>,
    roles: BTreeSet<Role>,
    register: Option<String>,
    expertise_areas: BTreeSet<ExpertiseArea>,
    selected_professionals: Vec<UserId>,
}

impl RegistrationBuilder {
    /// Sets the username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the plain-text password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Sets the phone number.
    #[must_use]
    pub fn phone_number(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    /// Sets the date of birth.
    #[must_use]
    pub const fn date_of_birth(mut self, date: NaiveDate) -> Self {
        self.date_of_birth = Some(date);
        self
    }

    /// Adds a role.
    #[must_use]
    pub fn role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    /// Sets the council register.
    #[must_use]
    pub fn register(mut self, register: impl Into<String>) -> Self {
        self.register = Some(register.into());
        self
    }

    /// Adds an expertise area.
    #[must_use]
    pub fn expertise(mut self, area: ExpertiseArea) -> Self {
        self.expertise_areas.insert(area);
        self
    }

    /// Requests a link with a professional.
    #[must_use]
    pub fn link_with(mut self, professional: UserId) -> Self {
        if !self.selected_professionals.contains(&professional) {
            self.selected_professionals.push(professional);
        }
        self
    }

    /// Validates and builds the registration.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` when a required field is
    /// absent, or the first field-shape violation.
    pub fn build(self) -> Result<Registration, ValidationError> {
        let registration = Registration {
            username: self.username.ok_or_else(|| missing("username"))?,
            password: self.password.ok_or_else(|| missing("password"))?,
            email: self.email.ok_or_else(|| missing("email"))?,
            full_name: self.full_name.ok_or_else(|| missing("full_name"))?,
            phone_number: self.phone_number,
            date_of_birth: self.date_of_birth,
            roles: self.roles,
            register: self.register,
            expertise_areas: self.expertise_areas,
            selected_professionals: self.selected_professionals,
        };
        registration.validate()?;
        Ok(registration)
    }
}

/// Self-service profile edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New username (checked for uniqueness against other users).
    pub username: String,
    /// New email.
    pub email: String,
    /// New display name.
    pub full_name: String,
    /// New phone number.
    #[serde(default)]
    pub phone_number: Option<String>,
    /// New date of birth.
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    /// New password; `None` or empty keeps the current one.
    #[serde(default)]
    pub password: Option<String>,
}

impl ProfileUpdate {
    /// Validates field shapes.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        require_text("full_name", &self.full_name, MAX_NAME_LENGTH)?;
        if let Some(password) = &self.password {
            check_length("password", password, MAX_NAME_LENGTH)?;
        }
        Ok(())
    }
}

/// Outward view of a user, never carrying the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    /// Stable identifier.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Phone number.
    pub phone_number: Option<String>,
    /// Date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Roles held.
    pub roles: BTreeSet<Role>,
    /// Whether the account can log in.
    pub active: bool,
    /// Account creation time.
    pub registered_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Student goal, when the user is a student.
    pub goal: Option<Goal>,
    /// Council register, when the user is a professional.
    pub register: Option<String>,
    /// Expertise areas, when the user is a professional.
    pub expertise_areas: BTreeSet<ExpertiseArea>,
}

impl UserView {
    /// Assembles the view from a user and its optional profiles.
    #[must_use]
    pub fn new(
        user: &User,
        student: Option<&StudentProfile>,
        professional: Option<&ProfessionalProfile>,
    ) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            phone_number: user.phone_number.clone(),
            date_of_birth: user.date_of_birth,
            roles: user.roles.clone(),
            active: user.active,
            registered_at: user.registered_at,
            last_login_at: user.last_login_at,
            goal: student.map(|s| s.goal),
            register: professional.map(|p| p.register.clone()),
            expertise_areas: professional
                .map(|p| p.expertise_areas.clone())
                .unwrap_or_default(),
        }
    }
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self::new(user, None, None)
    }
}

fn missing(field: &str) -> ValidationError {
    ValidationError::MissingField {
        field: field.to_string(),
    }
}

/// Rejects values longer than `max_length` characters.
pub(crate) fn check_length(field: &str, value: &str, max_length: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max_length {
        return Err(ValidationError::FieldTooLong {
            field: field.to_string(),
            max_length,
        });
    }
    Ok(())
}

/// Rejects blank values and values longer than `max_length` characters.
pub(crate) fn require_text(field: &str, value: &str, max_length: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(missing(field));
    }
    check_length(field, value, max_length)
}

/// Validates username length and alphabet.
///
/// # Errors
///
/// Returns `ValidationError::InvalidUsername` on a violation.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let (min, max) = USERNAME_LENGTH;
    let len = username.chars().count();
    if len < min || len > max {
        return Err(ValidationError::InvalidUsername {
            username: username.to_string(),
            reason: format!("length must be between {min} and {max}"),
        });
    }
    let re = compiled(&USERNAME_RE, r"^[A-Za-z0-9_.\-]+$").ok_or_else(|| {
        ValidationError::InvalidUsername {
            username: username.to_string(),
            reason: "username rule unavailable".to_string(),
        }
    })?;
    if !re.is_match(username) {
        return Err(ValidationError::InvalidUsername {
            username: username.to_string(),
            reason: "only letters, digits, '_', '.' and '-' are allowed".to_string(),
        });
    }
    Ok(())
}

/// Validates the shape of an email address.
///
/// # Errors
///
/// Returns `ValidationError::InvalidEmail` on a violation.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidEmail {
        email: email.to_string(),
    };
    check_length("email", email, MAX_NAME_LENGTH)?;
    let re = compiled(&EMAIL_RE, r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok_or_else(invalid)?;
    if re.is_match(email) {
        Ok(())
    } else {
        Err(invalid())
    }
}
