//! Exercise catalog, routine assignment and training logs.

use chrono::NaiveDate;

use crate::content::{ContentId, ContentKind};
use crate::error::{AccessError, CoachResult, ExecutionError, ValidationError};
use crate::training::{
    Exercise, ExerciseId, HistoryId, RoutineInstance, RoutineInstanceId, TrainingHistory, TrainingId,
    MAX_NOTES_LENGTH,
};
use crate::user::{check_length, UserId};

use super::Platform;

impl Platform {
    /// Adds an exercise to the catalog.
    ///
    /// # Errors
    ///
    /// Field validation errors, or `ExecutionError::InvalidState` when an
    /// exercise with the same name exists.
    pub fn add_exercise(&self, exercise: Exercise) -> CoachResult<Exercise> {
        exercise.validate()?;
        if self.stores.exercises.find_exercise_by_name(&exercise.name)?.is_some() {
            return Err(ExecutionError::InvalidState {
                reason: format!("exercise '{}' already exists", exercise.name),
            }
            .into());
        }
        self.stores.exercises.insert_exercise(exercise.clone())?;
        tracing::info!(exercise = %exercise.id, name = %exercise.name, "exercise added");
        Ok(exercise)
    }

    /// The catalog, by name.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn list_exercises(&self) -> CoachResult<Vec<Exercise>> {
        Ok(self.stores.exercises.list_exercises()?)
    }

    /// Get a catalog exercise.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn get_exercise(&self, id: ExerciseId) -> CoachResult<Option<Exercise>> {
        Ok(self.stores.exercises.get_exercise(id)?)
    }

    /// Assigns a routine to a student for a period.
    ///
    /// # Errors
    ///
    /// `NotAStudent`, `ContentNotFound`, `ContentKindMismatch` for non-routine
    /// content, `InvalidDateRange` when `end` precedes `start`, and
    /// `ExecutionError::InvalidState` when the routine is already assigned
    /// to the student.
    pub fn assign_routine(
        &self,
        student: UserId,
        routine: ContentId,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> CoachResult<RoutineInstance> {
        let user = self.require_user(student)?;
        if !user.is_student() {
            return Err(ValidationError::NotAStudent { id: student }.into());
        }
        let content = self
            .stores
            .contents
            .get_content(routine)?
            .ok_or(ExecutionError::ContentNotFound { id: routine })?;
        if content.kind() != ContentKind::Routine {
            return Err(ValidationError::ContentKindMismatch {
                expected: ContentKind::Routine,
                actual: content.kind(),
            }
            .into());
        }
        if let Some(end) = end {
            if end < start {
                return Err(ValidationError::InvalidDateRange { start, end }.into());
            }
        }
        if self
            .stores
            .routines
            .instances_for_student(student)?
            .iter()
            .any(|i| i.routine == routine)
        {
            return Err(ExecutionError::InvalidState {
                reason: format!("routine {routine} is already assigned to {student}"),
            }
            .into());
        }

        let instance = RoutineInstance {
            id: RoutineInstanceId::new(),
            student,
            routine,
            start_date: start,
            end_date: end,
        };
        self.stores.routines.insert_instance(instance.clone())?;
        tracing::info!(instance = %instance.id, %student, %routine, "routine assigned");
        Ok(instance)
    }

    /// Get a routine assignment.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn get_routine_instance(&self, id: RoutineInstanceId) -> CoachResult<Option<RoutineInstance>> {
        Ok(self.stores.routines.get_instance(id)?)
    }

    /// A student's assignments, by start date.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn routine_instances_for_student(&self, student: UserId) -> CoachResult<Vec<RoutineInstance>> {
        Ok(self.stores.routines.instances_for_student(student)?)
    }

    /// The student's assignment of `routine`, if active today.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn active_routine_instance(
        &self,
        student: UserId,
        routine: ContentId,
    ) -> CoachResult<Option<RoutineInstance>> {
        let today = self.clock.today();
        Ok(self
            .stores
            .routines
            .instances_for_student(student)?
            .into_iter()
            .find(|i| i.routine == routine && i.is_active_on(today)))
    }

    /// Records that the student executed one training of an assignment.
    ///
    /// # Errors
    ///
    /// `RoutineInstanceNotFound`, `AccessError::NotOwner` when `requester`
    /// is not the assigned student, `TrainingNotFound` when the training is
    /// not part of the routine, `FieldTooLong` for oversized notes.
    pub fn log_training(
        &self,
        instance: RoutineInstanceId,
        training: TrainingId,
        notes: impl Into<String>,
        requester: UserId,
    ) -> CoachResult<TrainingHistory> {
        let notes = notes.into();
        check_length("notes", &notes, MAX_NOTES_LENGTH)?;
        let assignment = self
            .stores
            .routines
            .get_instance(instance)?
            .ok_or(ExecutionError::RoutineInstanceNotFound { id: instance })?;
        if assignment.student != requester {
            return Err(AccessError::NotOwner {
                user: requester,
                resource: format!("routine instance {instance}"),
            }
            .into());
        }
        let routine = self
            .stores
            .contents
            .get_content(assignment.routine)?
            .ok_or(ExecutionError::ContentNotFound {
                id: assignment.routine,
            })?;
        if !routine.body.trainings().iter().any(|t| t.id == training) {
            return Err(ExecutionError::TrainingNotFound { training }.into());
        }

        let entry = TrainingHistory {
            id: HistoryId::new(),
            routine_instance: instance,
            training,
            executed_at: self.now(),
            notes,
        };
        self.stores.routines.insert_history(entry.clone())?;
        tracing::debug!(%instance, %training, "training logged");
        Ok(entry)
    }

    /// Logged executions of an assignment, newest first.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn history_for_instance(&self, instance: RoutineInstanceId) -> CoachResult<Vec<TrainingHistory>> {
        let mut history = self.stores.routines.history_for_instance(instance)?;
        history.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        Ok(history)
    }
}
