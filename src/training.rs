//! Exercise catalog, trainings and training history.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ContentId;
use crate::error::ValidationError;
use crate::id::define_id;
use crate::user::{check_length, require_text, UserId, MAX_NAME_LENGTH};

define_id!(
    /// Catalog exercise identifier.
    ExerciseId
);
define_id!(
    /// Identifier of a training inside a routine.
    TrainingId
);
define_id!(
    /// Identifier of a routine assigned to a student.
    RoutineInstanceId
);
define_id!(
    /// Identifier of a logged training execution.
    HistoryId
);

/// Longest free-text note a student may attach to an execution.
pub const MAX_NOTES_LENGTH: usize = 2_000;

/// How an exercise is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ExerciseType {
    FreeWeights,
    MachineAssisted,
    BodyWeight,
    Cardio,
    Mobility,
}

/// Muscle groups worked by an exercise or targeted by a training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum MuscleGroup {
    Chest,
    Back,
    Lats,
    Shoulders,
    Biceps,
    Triceps,
    Forearm,
    Core,
    Glutes,
    Quadriceps,
    Hamstrings,
    Calves,
    Legs,
    FullBody,
}

/// Set-execution technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum TrainingTechnique {
    #[default]
    Conventional,
    DropSet,
    RestPause,
    BiSet,
    SuperSet,
    Pyramid,
    Isometric,
}

/// A catalog exercise referenced by training sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    /// Stable identifier.
    pub id: ExerciseId,
    /// Unique display name.
    pub name: String,
    /// How to perform it.
    pub description: String,
    /// Optional demonstration video.
    pub video_link: Option<String>,
    /// Loading style.
    pub exercise_type: ExerciseType,
    /// Muscles worked.
    pub muscle_groups: BTreeSet<MuscleGroup>,
}

impl Exercise {
    /// Creates a catalog exercise.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        exercise_type: ExerciseType,
        muscle_groups: impl IntoIterator<Item = MuscleGroup>,
    ) -> Self {
        Self {
            id: ExerciseId::new(),
            name: name.into(),
            description: description.into(),
            video_link: None,
            exercise_type,
            muscle_groups: muscle_groups.into_iter().collect(),
        }
    }

    /// Attaches a demonstration video link.
    #[must_use]
    pub fn with_video(mut self, link: impl Into<String>) -> Self {
        self.video_link = Some(link.into());
        self
    }

    /// Validates field shapes.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("exercise.name", &self.name, MAX_NAME_LENGTH)?;
        check_length("exercise.description", &self.description, MAX_NOTES_LENGTH)?;
        if self.muscle_groups.is_empty() {
            return Err(ValidationError::MissingField {
                field: "exercise.muscle_groups".to_string(),
            });
        }
        Ok(())
    }
}

/// One prescribed exercise inside a training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    /// Position within the training (1-based).
    pub exercise_order: u32,
    /// Catalog exercise performed.
    pub exercise_id: ExerciseId,
    /// Number of sets.
    pub sets: u32,
    /// Repetitions per set.
    pub repetitions: u32,
    /// Rest between sets.
    pub rest_seconds: u32,
    /// Execution technique.
    #[serde(default)]
    pub technique: TrainingTechnique,
    /// Prescribed load, when weighted.
    #[serde(default)]
    pub load_kg: Option<f32>,
    /// Prescribed duration, when timed.
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

impl TrainingSet {
    /// Validates numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OutOfRange` on a violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sets == 0 {
            return Err(out_of_range("training_set.sets", "must be at least 1"));
        }
        if self.repetitions == 0 && self.duration_seconds.is_none() {
            return Err(out_of_range(
                "training_set.repetitions",
                "must be at least 1 unless a duration is given",
            ));
        }
        if let Some(load) = self.load_kg {
            if !load.is_finite() || load < 0.0 {
                return Err(out_of_range("training_set.load_kg", "must be a non-negative number"));
            }
        }
        Ok(())
    }
}

/// A named workout made of ordered training sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Training {
    /// Stable identifier, preserved across routine edits.
    #[serde(default)]
    pub id: TrainingId,
    /// Display name (e.g. "Upper body A").
    pub name: String,
    /// Muscles this training targets.
    #[serde(default)]
    pub target_muscle_groups: BTreeSet<MuscleGroup>,
    /// Prescribed sets, kept sorted by `exercise_order`.
    #[serde(default)]
    pub sets: Vec<TrainingSet>,
}

impl Training {
    /// Creates an empty training.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TrainingId::new(),
            name: name.into(),
            target_muscle_groups: BTreeSet::new(),
            sets: Vec::new(),
        }
    }

    /// Adds a target muscle group.
    #[must_use]
    pub fn targeting(mut self, group: MuscleGroup) -> Self {
        self.target_muscle_groups.insert(group);
        self
    }

    /// Appends a training set at the next order position.
    #[must_use]
    pub fn with_set(mut self, exercise_id: ExerciseId, sets: u32, repetitions: u32, rest_seconds: u32) -> Self {
        let exercise_order = u32::try_from(self.sets.len()).unwrap_or(u32::MAX).saturating_add(1);
        self.sets.push(TrainingSet {
            exercise_order,
            exercise_id,
            sets,
            repetitions,
            rest_seconds,
            technique: TrainingTechnique::default(),
            load_kg: None,
            duration_seconds: None,
        });
        self
    }

    /// Sorts sets by `exercise_order`.
    pub fn normalize(&mut self) {
        self.sets.sort_by_key(|s| s.exercise_order);
    }

    /// Validates the training and its sets.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("training.name", &self.name, MAX_NAME_LENGTH)?;
        for set in &self.sets {
            set.validate()?;
        }
        Ok(())
    }

    /// Catalog exercises referenced by this training.
    pub fn exercise_ids(&self) -> impl Iterator<Item = ExerciseId> + '_ {
        self.sets.iter().map(|s| s.exercise_id)
    }
}

/// A routine assigned to a student for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineInstance {
    /// Stable identifier.
    pub id: RoutineInstanceId,
    /// Student following the routine.
    pub student: UserId,
    /// Routine content being followed.
    pub routine: ContentId,
    /// First day of the assignment.
    pub start_date: NaiveDate,
    /// Last day of the assignment, open-ended when `None`.
    pub end_date: Option<NaiveDate>,
}

impl RoutineInstance {
    /// Returns true when `date` falls within the assignment period.
    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }
}

/// One logged execution of a training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Stable identifier.
    pub id: HistoryId,
    /// Assignment the execution belongs to.
    pub routine_instance: RoutineInstanceId,
    /// Training that was executed.
    pub training: TrainingId,
    /// When it was executed.
    pub executed_at: DateTime<Utc>,
    /// Free-text notes from the student.
    pub notes: String,
}

fn out_of_range(field: &str, reason: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_set_assigns_increasing_order() {
        let ex = ExerciseId::new();
        let training = Training::new("Upper A")
            .targeting(MuscleGroup::Chest)
            .with_set(ex, 4, 10, 60)
            .with_set(ex, 3, 12, 45);
        assert_eq!(training.sets[0].exercise_order, 1);
        assert_eq!(training.sets[1].exercise_order, 2);
        assert_eq!(training.exercise_ids().count(), 2);
        assert!(training.validate().is_ok());
    }

    #[test]
    fn test_normalize_sorts_sets() {
        let ex = ExerciseId::new();
        let mut training = Training::new("Legs").with_set(ex, 3, 10, 60).with_set(ex, 3, 8, 90);
        training.sets[0].exercise_order = 5;
        training.normalize();
        assert_eq!(training.sets[0].exercise_order, 2);
        assert_eq!(training.sets[1].exercise_order, 5);
    }

    #[test]
    fn test_training_set_validation() {
        let mut set = Training::new("t").with_set(ExerciseId::new(), 3, 10, 60).sets.remove(0);
        assert!(set.validate().is_ok());

        set.sets = 0;
        assert!(set.validate().is_err());

        set.sets = 3;
        set.repetitions = 0;
        assert!(set.validate().is_err());
        set.duration_seconds = Some(30);
        assert!(set.validate().is_ok());

        set.load_kg = Some(-5.0);
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_training_requires_name() {
        assert!(Training::new("  ").validate().is_err());
    }

    #[test]
    fn test_exercise_validation() {
        let ok = Exercise::new("Squat", "Back squat", ExerciseType::FreeWeights, [MuscleGroup::Quadriceps]);
        assert!(ok.validate().is_ok());
        let none = Exercise::new("Plank", "", ExerciseType::BodyWeight, []);
        assert!(none.validate().is_err());
    }

    #[test]
    fn test_routine_instance_active_window() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let instance = RoutineInstance {
            id: RoutineInstanceId::new(),
            student: UserId::new(),
            routine: ContentId::new(),
            start_date: start,
            end_date: Some(end),
        };
        assert!(instance.is_active_on(start));
        assert!(instance.is_active_on(end));
        assert!(!instance.is_active_on(end.succ_opt().unwrap()));
        assert!(!instance.is_active_on(start.pred_opt().unwrap()));

        let open = RoutineInstance { end_date: None, ..instance };
        assert!(open.is_active_on(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
    }
}
