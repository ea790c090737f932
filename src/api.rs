//! REST payloads shared by the server and the admin client.
//!
//! Records that already have an outward shape ([`UserView`], [`Content`],
//! links, inbox items) travel as they are; this module only holds the
//! request bodies, query strings and aggregate responses specific to the
//! HTTP surface.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::LandingArea;
use crate::content::{Content, ContentFilter, ContentKind};
use crate::link::{LinkStatus, StudentProfessionalLink};
use crate::training::{Exercise, ExerciseType, MuscleGroup, RoutineInstance};
use crate::user::{UserId, UserView};

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable category, see [`crate::CoachError::kind`].
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

/// `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server answers.
    pub status: String,
    /// Server crate version.
    pub version: String,
}

impl HealthResponse {
    /// Health of the running build.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// `GET /me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeResponse {
    /// The caller.
    pub user: UserView,
    /// Area the caller's client should open.
    pub landing: LandingArea,
}

/// `GET /me/notifications/unread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    /// Unread inbox entries.
    pub unread: usize,
}

/// `POST /me/notifications/read-all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedRead {
    /// Entries that changed from unread to read.
    pub marked: usize,
}

/// Query string of link listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkQuery {
    /// Only links in this state; every state when absent.
    #[serde(default)]
    pub status: Option<LinkStatus>,
}

impl LinkQuery {
    /// Status filter in the form the platform expects.
    #[must_use]
    pub fn statuses(&self) -> Vec<LinkStatus> {
        self.status.into_iter().collect()
    }
}

/// Query string of content listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentQuery {
    /// Only content of this kind; every kind when absent.
    #[serde(default)]
    pub kind: Option<ContentKind>,
}

impl ContentQuery {
    /// The matching content filter.
    #[must_use]
    pub fn filter(&self) -> ContentFilter {
        self.kind.map_or(ContentFilter::All, ContentFilter::Only)
    }
}

/// `POST /student/links`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRequest {
    /// Professionals to ask for a link.
    pub professionals: Vec<UserId>,
}

/// `POST /professional/routines/:id/assign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRoutineRequest {
    /// Linked student receiving the routine.
    pub student: UserId,
    /// First day.
    pub start_date: NaiveDate,
    /// Last day, open-ended when absent.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// `POST /student/routines/:instance/log/:training`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTrainingRequest {
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
}

/// `POST /admin/api/exercises`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExercise {
    /// Unique display name.
    pub name: String,
    /// How to perform it.
    #[serde(default)]
    pub description: String,
    /// Optional demonstration video.
    #[serde(default)]
    pub video_link: Option<String>,
    /// Loading style.
    pub exercise_type: ExerciseType,
    /// Muscles worked.
    #[serde(default)]
    pub muscle_groups: Vec<MuscleGroup>,
}

impl NewExercise {
    /// Catalog record with a fresh id.
    #[must_use]
    pub fn into_exercise(self) -> Exercise {
        let exercise = Exercise::new(self.name, self.description, self.exercise_type, self.muscle_groups);
        match self.video_link {
            Some(link) => exercise.with_video(link),
            None => exercise,
        }
    }
}

/// `GET /student/dashboard`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDashboard {
    /// The student.
    pub profile: UserView,
    /// Links in every state.
    pub links: Vec<StudentProfessionalLink>,
    /// Content visible through accepted links.
    pub content: Vec<Content>,
    /// Routine assignments.
    pub routines: Vec<RoutineInstance>,
    /// Unread inbox entries.
    pub unread_notifications: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_select_everything() {
        assert!(LinkQuery::default().statuses().is_empty());
        assert_eq!(ContentQuery::default().filter(), ContentFilter::All);
        let query: ContentQuery = serde_json::from_str(r#"{"kind":"ROUTINE"}"#).unwrap();
        assert_eq!(query.filter(), ContentFilter::Only(ContentKind::Routine));
    }

    #[test]
    fn test_new_exercise_keeps_video() {
        let body = r#"{"name":"Row","exercise_type":"FREE_WEIGHTS","video_link":"https://v/1","muscle_groups":["BACK"]}"#;
        let exercise = serde_json::from_str::<NewExercise>(body).unwrap().into_exercise();
        assert_eq!(exercise.video_link.as_deref(), Some("https://v/1"));
        assert!(exercise.muscle_groups.contains(&MuscleGroup::Back));
        assert!(exercise.description.is_empty());
    }
}
