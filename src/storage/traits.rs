//! Abstract storage traits for coachdesk.
//!
//! These traits define the contract that storage backends must implement.
//! Each record family gets its own trait so the platform can hold them as
//! independent `Arc<dyn _>` handles; a single backend type may implement
//! all of them.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::content::{Content, ContentId};
use crate::link::{LinkId, LinkStatus, StudentProfessionalLink};
use crate::notification::{InboxEntry, InboxEntryId, Notification, NotificationId};
use crate::schedule::InactivationSchedule;
use crate::training::{Exercise, ExerciseId, RoutineInstance, RoutineInstanceId, TrainingHistory};
use crate::user::{ProfessionalProfile, StudentProfile, User, UserId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record family.
        kind: &'static str,
        /// Missing key.
        id: String,
    },

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StorageError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Storage trait for user accounts.
///
/// Usernames and emails are unique (case-insensitive).
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails on a duplicate id, username or email.
    fn insert_user(&self, user: User) -> Result<(), StorageError>;

    /// Replace an existing user. Fails if missing or if the new username or
    /// email belongs to someone else.
    fn update_user(&self, user: User) -> Result<(), StorageError>;

    /// Delete a user by id.
    fn delete_user(&self, id: UserId) -> Result<(), StorageError>;

    /// Get a user by id.
    fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Find a user by username.
    fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Find a user by email.
    fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    /// All users, ordered by registration time.
    fn list_users(&self) -> Result<Vec<User>, StorageError>;
}

/// Storage trait for role-specific profiles.
pub trait ProfileStore: Send + Sync {
    /// Insert or replace a student profile.
    fn put_student_profile(&self, profile: StudentProfile) -> Result<(), StorageError>;

    /// Get a student profile.
    fn get_student_profile(&self, user: UserId) -> Result<Option<StudentProfile>, StorageError>;

    /// Insert or replace a professional profile.
    fn put_professional_profile(&self, profile: ProfessionalProfile) -> Result<(), StorageError>;

    /// Get a professional profile.
    fn get_professional_profile(&self, user: UserId) -> Result<Option<ProfessionalProfile>, StorageError>;

    /// All professional profiles.
    fn list_professional_profiles(&self) -> Result<Vec<ProfessionalProfile>, StorageError>;

    /// Remove both profiles of a user, if present.
    fn delete_profiles(&self, user: UserId) -> Result<(), StorageError>;
}

/// Storage trait for content.
pub trait ContentStore: Send + Sync {
    /// Insert new content.
    fn insert_content(&self, content: Content) -> Result<(), StorageError>;

    /// Replace existing content.
    fn update_content(&self, content: Content) -> Result<(), StorageError>;

    /// Delete content by id.
    fn delete_content(&self, id: ContentId) -> Result<(), StorageError>;

    /// Get content by id.
    fn get_content(&self, id: ContentId) -> Result<Option<Content>, StorageError>;

    /// Content authored by `creator`, newest first.
    fn contents_by_creator(&self, creator: UserId) -> Result<Vec<Content>, StorageError>;
}

/// Storage trait for the exercise catalog.
pub trait ExerciseStore: Send + Sync {
    /// Insert a catalog exercise. Names are unique (case-insensitive).
    fn insert_exercise(&self, exercise: Exercise) -> Result<(), StorageError>;

    /// Get an exercise by id.
    fn get_exercise(&self, id: ExerciseId) -> Result<Option<Exercise>, StorageError>;

    /// Find an exercise by name.
    fn find_exercise_by_name(&self, name: &str) -> Result<Option<Exercise>, StorageError>;

    /// The whole catalog, ordered by name.
    fn list_exercises(&self) -> Result<Vec<Exercise>, StorageError>;
}

/// Storage trait for student–professional links.
///
/// At most one link exists per (student, professional) pair.
pub trait LinkStore: Send + Sync {
    /// Insert a link. Fails if the pair is already linked.
    fn insert_link(&self, link: StudentProfessionalLink) -> Result<(), StorageError>;

    /// Replace an existing link.
    fn update_link(&self, link: StudentProfessionalLink) -> Result<(), StorageError>;

    /// Delete a link by id.
    fn delete_link(&self, id: LinkId) -> Result<(), StorageError>;

    /// Get a link by id.
    fn get_link(&self, id: LinkId) -> Result<Option<StudentProfessionalLink>, StorageError>;

    /// The link between a student and a professional, if any.
    fn find_link(
        &self,
        student: UserId,
        professional: UserId,
    ) -> Result<Option<StudentProfessionalLink>, StorageError>;

    /// Links where `student` is the student.
    fn links_for_student(&self, student: UserId) -> Result<Vec<StudentProfessionalLink>, StorageError>;

    /// Links where `professional` is the professional.
    fn links_for_professional(
        &self,
        professional: UserId,
    ) -> Result<Vec<StudentProfessionalLink>, StorageError>;

    /// Links in `status` requested strictly before `cutoff`.
    fn links_requested_before(
        &self,
        status: LinkStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<StudentProfessionalLink>, StorageError>;
}

/// Storage trait for notifications and inbox entries.
pub trait NotificationStore: Send + Sync {
    /// Store a notification together with its recipients' entries.
    fn deliver(&self, notification: Notification, entries: Vec<InboxEntry>) -> Result<(), StorageError>;

    /// Get a notification by id.
    fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>, StorageError>;

    /// Get an inbox entry by id.
    fn get_inbox_entry(&self, id: InboxEntryId) -> Result<Option<InboxEntry>, StorageError>;

    /// Mark an entry read at `at`. Already-read entries keep their time.
    fn mark_read(&self, id: InboxEntryId, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// All entries addressed to `recipient`.
    fn inbox(&self, recipient: UserId) -> Result<Vec<InboxEntry>, StorageError>;

    /// Remove every entry addressed to `recipient`, and notifications left
    /// without recipients.
    fn delete_inbox(&self, recipient: UserId) -> Result<(), StorageError>;
}

/// Storage trait for routine assignments and training history.
pub trait RoutineStore: Send + Sync {
    /// Insert a routine assignment.
    fn insert_instance(&self, instance: RoutineInstance) -> Result<(), StorageError>;

    /// Get an assignment by id.
    fn get_instance(&self, id: RoutineInstanceId) -> Result<Option<RoutineInstance>, StorageError>;

    /// Assignments of `student`.
    fn instances_for_student(&self, student: UserId) -> Result<Vec<RoutineInstance>, StorageError>;

    /// Assignments of the routine `routine`.
    fn instances_for_routine(&self, routine: ContentId) -> Result<Vec<RoutineInstance>, StorageError>;

    /// Delete an assignment and its history.
    fn delete_instance(&self, id: RoutineInstanceId) -> Result<(), StorageError>;

    /// Record a training execution. The assignment must exist.
    fn insert_history(&self, history: TrainingHistory) -> Result<(), StorageError>;

    /// Executions logged against an assignment.
    fn history_for_instance(&self, id: RoutineInstanceId) -> Result<Vec<TrainingHistory>, StorageError>;
}

/// Storage trait for deactivation schedules (one per user).
pub trait ScheduleStore: Send + Sync {
    /// Insert a schedule. Fails if the user already has one.
    fn insert_schedule(&self, schedule: InactivationSchedule) -> Result<(), StorageError>;

    /// Replace an existing schedule.
    fn update_schedule(&self, schedule: InactivationSchedule) -> Result<(), StorageError>;

    /// Get the schedule of `user`.
    fn get_schedule(&self, user: UserId) -> Result<Option<InactivationSchedule>, StorageError>;

    /// Remove the schedule of `user`, if present.
    fn delete_schedule(&self, user: UserId) -> Result<(), StorageError>;

    /// Schedules due at `now` and not yet executed.
    fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<InactivationSchedule>, StorageError>;
}
