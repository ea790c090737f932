//! Polymorphic professional content.
//!
//! Diets, materials and routines share the base record fields of
//! [`Content`] and differ only in their [`ContentBody`]. The kind of a
//! piece of content is fixed at creation: edits may replace the body but
//! never swap one variant for another.
//!
//! # Access
//!
//! `access_student_ids` narrows who among the creator's linked students
//! may view the content. An empty set shares it with every student holding
//! an accepted link to the creator.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::define_id;
use crate::training::{ExerciseId, Training};
use crate::user::{check_length, require_text, UserId, MAX_NAME_LENGTH};

define_id!(
    /// Stable content identifier.
    ContentId
);

/// Longest description or text block accepted.
pub const MAX_TEXT_LENGTH: usize = 20_000;

/// Discriminant of [`ContentBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentKind {
    /// Meal plan.
    Diet,
    /// Educational material.
    Material,
    /// Training routine.
    Routine,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diet => write!(f, "diet"),
            Self::Material => write!(f, "material"),
            Self::Routine => write!(f, "routine"),
        }
    }
}

/// Listing filter over content kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFilter {
    /// Every kind.
    #[default]
    All,
    /// A single kind.
    Only(ContentKind),
}

impl ContentFilter {
    /// Returns true if `kind` passes the filter.
    #[must_use]
    pub fn matches(self, kind: ContentKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(only) => only == kind,
        }
    }
}

impl From<Option<ContentKind>> for ContentFilter {
    fn from(kind: Option<ContentKind>) -> Self {
        kind.map_or(Self::All, Self::Only)
    }
}

/// Topic tag for materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ContentTag {
    Training,
    Nutrition,
    MentalHealth,
    Recovery,
    Motivation,
    Education,
}

/// Rendering type of a material block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ContentBlockType {
    Heading,
    Text,
    Image,
    Video,
    Link,
}

/// Difficulty level of a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum RoutineLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// Goal a routine is designed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum GoalType {
    Hypertrophy,
    WeightLoss,
    Strength,
    Endurance,
    Conditioning,
    Rehabilitation,
}

/// One ordered block of a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Position within the material.
    pub order: u32,
    /// How the value renders.
    pub kind: ContentBlockType,
    /// Text, URL or caption depending on `kind`.
    pub value: String,
}

/// Variant-specific part of a content record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentBody {
    /// Meal plan.
    Diet {
        /// Free-text meal specification.
        meal_specifications: String,
    },
    /// Educational material.
    Material {
        /// Topic tags.
        #[serde(default)]
        tags: BTreeSet<ContentTag>,
        /// Ordered blocks.
        #[serde(default)]
        blocks: Vec<ContentBlock>,
    },
    /// Training routine.
    Routine {
        /// Difficulty.
        #[serde(default)]
        level: RoutineLevel,
        /// Targeted goals.
        #[serde(default)]
        goals: BTreeSet<GoalType>,
        /// Ordered trainings.
        #[serde(default)]
        trainings: Vec<Training>,
    },
}

impl ContentBody {
    /// The discriminant of this body.
    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        match self {
            Self::Diet { .. } => ContentKind::Diet,
            Self::Material { .. } => ContentKind::Material,
            Self::Routine { .. } => ContentKind::Routine,
        }
    }

    /// Trainings of a routine; empty for other kinds.
    #[must_use]
    pub fn trainings(&self) -> &[Training] {
        match self {
            Self::Routine { trainings, .. } => trainings,
            _ => &[],
        }
    }

    /// Catalog exercises referenced by the body.
    #[must_use]
    pub fn exercise_ids(&self) -> BTreeSet<ExerciseId> {
        self.trainings().iter().flat_map(Training::exercise_ids).collect()
    }

    /// Sorts blocks and training sets into their declared order.
    pub fn normalize(&mut self) {
        match self {
            Self::Material { blocks, .. } => blocks.sort_by_key(|b| b.order),
            Self::Routine { trainings, .. } => trainings.iter_mut().for_each(Training::normalize),
            Self::Diet { .. } => {}
        }
    }

    /// Validates variant fields.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Diet { meal_specifications } => {
                require_text("meal_specifications", meal_specifications, MAX_TEXT_LENGTH)
            }
            Self::Material { blocks, .. } => {
                for block in blocks {
                    check_length("block.value", &block.value, MAX_TEXT_LENGTH)?;
                }
                Ok(())
            }
            Self::Routine { trainings, .. } => {
                for training in trainings {
                    training.validate()?;
                }
                Ok(())
            }
        }
    }
}

/// A stored piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Stable identifier.
    pub id: ContentId,
    /// Title.
    pub name: String,
    /// Summary.
    pub description: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit time.
    pub modified_at: DateTime<Utc>,
    /// Authoring professional.
    pub creator: UserId,
    /// Students it is shared with; empty means every linked student.
    pub access_student_ids: BTreeSet<UserId>,
    /// Variant-specific fields.
    pub body: ContentBody,
}

impl Content {
    /// The kind of this content.
    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        self.body.kind()
    }

    /// Returns true when `student` is covered by the access list.
    ///
    /// This does not check links; see the platform for the full rule.
    #[must_use]
    pub fn is_shared_with(&self, student: UserId) -> bool {
        self.access_student_ids.is_empty() || self.access_student_ids.contains(&student)
    }

    /// Builds a new record from a draft.
    #[must_use]
    pub fn from_draft(draft: ContentDraft, creator: UserId, now: DateTime<Utc>) -> Self {
        let mut body = draft.body;
        body.normalize();
        Self {
            id: ContentId::new(),
            name: draft.name,
            description: draft.description,
            created_at: now,
            modified_at: now,
            creator,
            access_student_ids: draft.access_student_ids,
            body,
        }
    }

    /// Replaces the editable fields with the draft's.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ContentKindMismatch` if the draft would
    /// change the content kind.
    pub fn apply_draft(&mut self, draft: ContentDraft, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if draft.body.kind() != self.kind() {
            return Err(ValidationError::ContentKindMismatch {
                expected: self.kind(),
                actual: draft.body.kind(),
            });
        }
        let mut body = draft.body;
        body.normalize();
        self.name = draft.name;
        self.description = draft.description;
        self.access_student_ids = draft.access_student_ids;
        self.body = body;
        self.modified_at = now;
        Ok(())
    }
}

/// Create/update payload for content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDraft {
    /// Title.
    pub name: String,
    /// Summary.
    #[serde(default)]
    pub description: String,
    /// Students it is shared with; empty means every linked student.
    #[serde(default)]
    pub access_student_ids: BTreeSet<UserId>,
    /// Variant-specific fields.
    pub body: ContentBody,
}

impl ContentDraft {
    /// Starts a diet draft.
    #[must_use]
    pub fn diet(name: impl Into<String>, meal_specifications: impl Into<String>) -> ContentDraftBuilder {
        ContentDraftBuilder::new(
            name,
            ContentBody::Diet {
                meal_specifications: meal_specifications.into(),
            },
        )
    }

    /// Starts a material draft.
    #[must_use]
    pub fn material(name: impl Into<String>) -> ContentDraftBuilder {
        ContentDraftBuilder::new(
            name,
            ContentBody::Material {
                tags: BTreeSet::new(),
                blocks: Vec::new(),
            },
        )
    }

    /// Starts a routine draft.
    #[must_use]
    pub fn routine(name: impl Into<String>, level: RoutineLevel) -> ContentDraftBuilder {
        ContentDraftBuilder::new(
            name,
            ContentBody::Routine {
                level,
                goals: BTreeSet::new(),
                trainings: Vec::new(),
            },
        )
    }

    /// Validates base and variant fields.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, MAX_NAME_LENGTH)?;
        check_length("description", &self.description, MAX_TEXT_LENGTH)?;
        self.body.validate()
    }
}

/// Builder for [`ContentDraft`].
///
/// Variant-specific setters are ignored when they do not apply to the
/// draft's kind.
#[derive(Debug)]
pub struct ContentDraftBuilder {
    draft: ContentDraft,
}

impl ContentDraftBuilder {
    fn new(name: impl Into<String>, body: ContentBody) -> Self {
        Self {
            draft: ContentDraft {
                name: name.into(),
                description: String::new(),
                access_student_ids: BTreeSet::new(),
                body,
            },
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.draft.description = description.into();
        self
    }

    /// Restricts access to `student` (in addition to earlier grants).
    #[must_use]
    pub fn share_with(mut self, student: UserId) -> Self {
        self.draft.access_student_ids.insert(student);
        self
    }

    /// Adds a tag to a material.
    #[must_use]
    pub fn tag(mut self, tag: ContentTag) -> Self {
        if let ContentBody::Material { tags, .. } = &mut self.draft.body {
            tags.insert(tag);
        }
        self
    }

    /// Appends a block to a material.
    #[must_use]
    pub fn block(mut self, kind: ContentBlockType, value: impl Into<String>) -> Self {
        if let ContentBody::Material { blocks, .. } = &mut self.draft.body {
            let order = u32::try_from(blocks.len()).unwrap_or(u32::MAX).saturating_add(1);
            blocks.push(ContentBlock {
                order,
                kind,
                value: value.into(),
            });
        }
        self
    }

    /// Adds a goal to a routine.
    #[must_use]
    pub fn goal(mut self, goal: GoalType) -> Self {
        if let ContentBody::Routine { goals, .. } = &mut self.draft.body {
            goals.insert(goal);
        }
        self
    }

    /// Appends a training to a routine.
    #[must_use]
    pub fn training(mut self, training: Training) -> Self {
        if let ContentBody::Routine { trainings, .. } = &mut self.draft.body {
            trainings.push(training);
        }
        self
    }

    /// Validates and returns the draft.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn build(self) -> Result<ContentDraft, ValidationError> {
        self.draft.validate()?;
        Ok(self.draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::MuscleGroup;

    #[test]
    fn test_filter_matches() {
        assert!(ContentFilter::All.matches(ContentKind::Diet));
        assert!(ContentFilter::Only(ContentKind::Routine).matches(ContentKind::Routine));
        assert!(!ContentFilter::Only(ContentKind::Routine).matches(ContentKind::Material));
        assert_eq!(ContentFilter::from(None), ContentFilter::All);
    }

    #[test]
    fn test_material_blocks_are_ordered() {
        let mut draft = ContentDraft::material("Sleep hygiene")
            .tag(ContentTag::Recovery)
            .block(ContentBlockType::Heading, "Why sleep matters")
            .block(ContentBlockType::Text, "Seven to nine hours.")
            .build()
            .unwrap();
        if let ContentBody::Material { blocks, .. } = &mut draft.body {
            blocks[0].order = 9;
        }
        let content = Content::from_draft(draft, UserId::new(), Utc::now());
        let ContentBody::Material { blocks, tags } = &content.body else {
            panic!("expected material");
        };
        assert_eq!(blocks[0].value, "Seven to nine hours.");
        assert!(tags.contains(&ContentTag::Recovery));
    }

    #[test]
    fn test_variant_setters_ignored_for_other_kinds() {
        let draft = ContentDraft::diet("Cutting", "Breakfast: oats")
            .tag(ContentTag::Nutrition)
            .goal(GoalType::WeightLoss)
            .build()
            .unwrap();
        assert_eq!(draft.body.kind(), ContentKind::Diet);
        assert!(draft.body.trainings().is_empty());
    }

    #[test]
    fn test_apply_draft_rejects_kind_change() {
        let diet = ContentDraft::diet("Bulk", "Lots of rice").build().unwrap();
        let mut content = Content::from_draft(diet, UserId::new(), Utc::now());
        let material = ContentDraft::material("Now a material").build().unwrap();
        let err = content.apply_draft(material, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ContentKindMismatch {
                expected: ContentKind::Diet,
                actual: ContentKind::Material
            }
        ));
        assert_eq!(content.name, "Bulk");
    }

    #[test]
    fn test_apply_draft_updates_fields() {
        let created = Utc::now();
        let diet = ContentDraft::diet("Bulk", "Rice").build().unwrap();
        let mut content = Content::from_draft(diet, UserId::new(), created);
        let student = UserId::new();
        let edit = ContentDraft::diet("Lean bulk", "Rice and beans")
            .share_with(student)
            .build()
            .unwrap();
        let later = created + chrono::Duration::minutes(5);
        content.apply_draft(edit, later).unwrap();
        assert_eq!(content.name, "Lean bulk");
        assert_eq!(content.modified_at, later);
        assert_eq!(content.created_at, created);
        assert!(content.is_shared_with(student));
        assert!(!content.is_shared_with(UserId::new()));
    }

    #[test]
    fn test_empty_access_list_shares_with_everyone() {
        let draft = ContentDraft::diet("Open", "x").build().unwrap();
        let content = Content::from_draft(draft, UserId::new(), Utc::now());
        assert!(content.is_shared_with(UserId::new()));
    }

    #[test]
    fn test_routine_collects_exercise_ids() {
        let squat = ExerciseId::new();
        let bench = ExerciseId::new();
        let draft = ContentDraft::routine("Full body", RoutineLevel::Intermediate)
            .goal(GoalType::Strength)
            .training(Training::new("A").targeting(MuscleGroup::Legs).with_set(squat, 5, 5, 180))
            .training(Training::new("B").with_set(bench, 5, 5, 180).with_set(squat, 3, 8, 120))
            .build()
            .unwrap();
        let ids = draft.body.exercise_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&squat) && ids.contains(&bench));
    }

    #[test]
    fn test_diet_requires_meal_specifications() {
        assert!(ContentDraft::diet("Empty", " ").build().is_err());
        assert!(ContentDraft::diet("", "x").build().is_err());
    }

    #[test]
    fn test_body_serializes_with_kind_tag() {
        let body = ContentBody::Diet {
            meal_specifications: "x".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "DIET");
    }
}
