//! Error types for coachdesk.
//!
//! All errors are strongly typed using thiserror. The tiers mirror the
//! layers of the platform: input validation, access control, execution
//! against the stores, and the admin client transport.

use chrono::NaiveDate;
use thiserror::Error;

use crate::content::{ContentId, ContentKind};
use crate::link::{LinkId, LinkStatus};
use crate::notification::InboxEntryId;
use crate::storage::StorageError;
use crate::training::{ExerciseId, RoutineInstanceId, TrainingId};
use crate::user::{Role, UserId};

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    FieldTooLong {
        field: String,
        max_length: usize,
    },

    #[error("Username '{username}' is invalid: {reason}")]
    InvalidUsername {
        username: String,
        reason: String,
    },

    #[error("Email '{email}' is invalid")]
    InvalidEmail {
        email: String,
    },

    #[error("Username '{username}' is already taken")]
    UsernameTaken {
        username: String,
    },

    #[error("Email '{email}' is already registered")]
    EmailTaken {
        email: String,
    },

    #[error("At least one role must be selected")]
    NoRoles,

    #[error("Role {role} cannot be self-assigned")]
    RoleNotAllowed {
        role: Role,
    },

    #[error("Content is a {actual}, expected a {expected}")]
    ContentKindMismatch {
        expected: ContentKind,
        actual: ContentKind,
    },

    #[error("Exercise {id} does not exist in the catalog")]
    UnknownExercise {
        id: ExerciseId,
    },

    #[error("User {id} is not a professional")]
    NotAProfessional {
        id: UserId,
    },

    #[error("User {id} is not a student")]
    NotAStudent {
        id: UserId,
    },

    #[error("User {id} cannot link with themselves")]
    SelfLink {
        id: UserId,
    },

    #[error("Invalid date range: end ({end}) is before start ({start})")]
    InvalidDateRange {
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Value for '{field}' is out of range: {reason}")]
    OutOfRange {
        field: String,
        reason: String,
    },
}

/// Authentication and authorization failures.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Missing or malformed credentials")]
    MissingCredentials,

    #[error("Unknown user '{username}'")]
    UnknownUser {
        username: String,
    },

    #[error("Invalid credentials for '{username}'")]
    InvalidCredentials {
        username: String,
    },

    #[error("Account '{username}' is not active")]
    InactiveAccount {
        username: String,
    },

    #[error("Role {required} is required")]
    MissingRole {
        required: Role,
    },

    #[error("User {user} is not the author of content {content}")]
    NotAuthor {
        user: UserId,
        content: ContentId,
    },

    #[error("User {user} has no active link with {professional}")]
    NoActiveLink {
        user: UserId,
        professional: UserId,
    },

    #[error("Content {content} is not shared with user {user}")]
    NotShared {
        user: UserId,
        content: ContentId,
    },

    #[error("User {user} is not a party of link {link}")]
    NotLinkParty {
        user: UserId,
        link: LinkId,
    },

    #[error("User {user} does not own {resource}")]
    NotOwner {
        user: UserId,
        resource: String,
    },
}

/// Execution errors that occur while applying an operation.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("User not found: {id}")]
    UserNotFound {
        id: UserId,
    },

    #[error("Content not found: {id}")]
    ContentNotFound {
        id: ContentId,
    },

    #[error("Link not found: {id}")]
    LinkNotFound {
        id: LinkId,
    },

    #[error("Exercise not found: {id}")]
    ExerciseNotFound {
        id: ExerciseId,
    },

    #[error("Routine instance not found: {id}")]
    RoutineInstanceNotFound {
        id: RoutineInstanceId,
    },

    #[error("Training {training} is not part of the assigned routine")]
    TrainingNotFound {
        training: TrainingId,
    },

    #[error("Notification entry not found: {id}")]
    InboxEntryNotFound {
        id: InboxEntryId,
    },

    #[error("Link {id} is {status}, expected pending")]
    LinkNotPending {
        id: LinkId,
        status: LinkStatus,
    },

    #[error("Invalid state: {reason}")]
    InvalidState {
        reason: String,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
    },
}

impl From<StorageError> for ExecutionError {
    fn from(err: StorageError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

/// Transport errors for client-server communication.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        message: String,
    },

    #[error("Failed to deserialize response: {message}")]
    DeserializationFailed {
        message: String,
    },

    #[error("Server error (status {status}): {message}")]
    ServerError {
        status: u16,
        message: String,
    },
}

/// Top-level error type for coachdesk.
#[derive(Debug, Error)]
pub enum CoachError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Access denied: {0}")]
    Access(#[from] AccessError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl From<StorageError> for CoachError {
    fn from(err: StorageError) -> Self {
        Self::Execution(err.into())
    }
}

impl CoachError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an access error.
    #[must_use]
    pub const fn is_access(&self) -> bool {
        matches!(self, Self::Access(_))
    }

    /// Returns true when the caller could not be authenticated at all.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Access(
                AccessError::MissingCredentials
                    | AccessError::UnknownUser { .. }
                    | AccessError::InvalidCredentials { .. }
                    | AccessError::InactiveAccount { .. }
            )
        )
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if the error reports a missing record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Execution(
                ExecutionError::UserNotFound { .. }
                    | ExecutionError::ContentNotFound { .. }
                    | ExecutionError::LinkNotFound { .. }
                    | ExecutionError::ExerciseNotFound { .. }
                    | ExecutionError::RoutineInstanceNotFound { .. }
                    | ExecutionError::TrainingNotFound { .. }
                    | ExecutionError::InboxEntryNotFound { .. }
            )
        )
    }

    /// Returns true if the operation conflicts with the current state.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Execution(
                ExecutionError::LinkNotPending { .. } | ExecutionError::InvalidState { .. }
            )
        )
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Access(_) | Self::Internal { .. } => false,
            Self::Execution(e) => matches!(e, ExecutionError::Storage { .. }),
            Self::Transport(e) => match e {
                TransportError::ConnectionFailed { .. } => true,
                TransportError::ServerError { status, .. } => *status >= 500,
                TransportError::DeserializationFailed { .. } => false,
            },
        }
    }

    /// Short machine-readable category used in REST error bodies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        if self.is_unauthenticated() {
            return "unauthenticated";
        }
        if self.is_not_found() {
            return "not_found";
        }
        if self.is_conflict() {
            return "conflict";
        }
        match self {
            Self::Validation(_) => "validation",
            Self::Access(_) => "forbidden",
            Self::Transport(_) => "transport",
            Self::Execution(_) | Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for coachdesk operations.
pub type CoachResult<T> = Result<T, CoachError>;
