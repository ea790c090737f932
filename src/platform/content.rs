//! Content authoring and access rules.
//!
//! Authors always see and edit their own content. A student sees another
//! author's content only while holding an accepted link with that author
//! and while the content's access list is empty or names them.

use crate::content::{Content, ContentDraft, ContentFilter, ContentId, ContentKind};
use crate::error::{AccessError, CoachResult, ExecutionError, ValidationError};
use crate::link::LinkStatus;
use crate::user::UserId;

use super::Platform;

impl Platform {
    /// Publishes new content.
    ///
    /// # Errors
    ///
    /// `NotAProfessional` when `creator` has no professional profile,
    /// field validation errors, and `UnknownExercise` for routine sets
    /// that reference exercises outside the catalog.
    pub fn create_content(&self, creator: UserId, draft: ContentDraft) -> CoachResult<Content> {
        if self.stores.profiles.get_professional_profile(creator)?.is_none() {
            return Err(ValidationError::NotAProfessional { id: creator }.into());
        }
        draft.validate()?;
        self.check_exercises(&draft)?;

        let content = Content::from_draft(draft, creator, self.now());
        self.stores.contents.insert_content(content.clone())?;
        tracing::info!(content = %content.id, kind = %content.kind(), %creator, "content created");
        Ok(content)
    }

    fn check_exercises(&self, draft: &ContentDraft) -> CoachResult<()> {
        for id in draft.body.exercise_ids() {
            if self.stores.exercises.get_exercise(id)?.is_none() {
                return Err(ValidationError::UnknownExercise { id }.into());
            }
        }
        Ok(())
    }

    /// Get content by id.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn get_content(&self, id: ContentId) -> CoachResult<Option<Content>> {
        Ok(self.stores.contents.get_content(id)?)
    }

    fn require_content(&self, id: ContentId) -> CoachResult<Content> {
        self.stores
            .contents
            .get_content(id)?
            .ok_or_else(|| ExecutionError::ContentNotFound { id }.into())
    }

    /// Content as seen by its author, optionally requiring a kind.
    ///
    /// # Errors
    ///
    /// `ContentNotFound`, `AccessError::NotAuthor`, or
    /// `ValidationError::ContentKindMismatch`.
    pub fn content_for_author(
        &self,
        id: ContentId,
        author: UserId,
        expected_kind: Option<ContentKind>,
    ) -> CoachResult<Content> {
        let content = self.require_content(id)?;
        if content.creator != author {
            return Err(AccessError::NotAuthor {
                user: author,
                content: id,
            }
            .into());
        }
        if let Some(expected) = expected_kind {
            if content.kind() != expected {
                return Err(ValidationError::ContentKindMismatch {
                    expected,
                    actual: content.kind(),
                }
                .into());
            }
        }
        Ok(content)
    }

    /// An author's content, newest first.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn list_content_by_creator(&self, creator: UserId, filter: ContentFilter) -> CoachResult<Vec<Content>> {
        let mut contents = self.stores.contents.contents_by_creator(creator)?;
        contents.retain(|c| filter.matches(c.kind()));
        Ok(contents)
    }

    /// Content as seen by a student.
    ///
    /// # Errors
    ///
    /// `ContentNotFound`, `AccessError::NoActiveLink` without an accepted
    /// link to the author, `AccessError::NotShared` when the access list
    /// excludes the student.
    pub fn content_for_student(&self, id: ContentId, student: UserId) -> CoachResult<Content> {
        let content = self.require_content(id)?;
        if content.creator == student {
            return Ok(content);
        }
        if !self.is_active_link(student, content.creator)? {
            return Err(AccessError::NoActiveLink {
                user: student,
                professional: content.creator,
            }
            .into());
        }
        if !content.is_shared_with(student) {
            return Err(AccessError::NotShared {
                user: student,
                content: id,
            }
            .into());
        }
        Ok(content)
    }

    /// Returns true when `user` may view `content`.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn can_view(&self, content: &Content, user: UserId) -> CoachResult<bool> {
        if content.creator == user {
            return Ok(true);
        }
        Ok(content.is_shared_with(user) && self.is_active_link(user, content.creator)?)
    }

    /// Replaces an author's content with a draft of the same kind.
    ///
    /// # Errors
    ///
    /// Same as [`Platform::content_for_author`], plus draft validation and
    /// `ContentKindMismatch` when the draft changes the kind.
    pub fn update_content(&self, id: ContentId, draft: ContentDraft, author: UserId) -> CoachResult<Content> {
        let mut content = self.content_for_author(id, author, None)?;
        draft.validate()?;
        self.check_exercises(&draft)?;
        content.apply_draft(draft, self.now())?;
        self.stores.contents.update_content(content.clone())?;
        tracing::info!(content = %id, kind = %content.kind(), "content updated");
        Ok(content)
    }

    /// Deletes an author's content together with routine assignments and
    /// training history that depend on it.
    ///
    /// # Errors
    ///
    /// Same as [`Platform::content_for_author`].
    pub fn delete_content(&self, id: ContentId, author: UserId) -> CoachResult<Content> {
        let content = self.content_for_author(id, author, None)?;
        self.purge_content(&content)?;
        Ok(content)
    }

    pub(super) fn purge_content(&self, content: &Content) -> CoachResult<()> {
        let instances = self.stores.routines.instances_for_routine(content.id)?;
        for instance in &instances {
            self.stores.routines.delete_instance(instance.id)?;
        }
        self.stores.contents.delete_content(content.id)?;
        tracing::info!(
            content = %content.id,
            instances = instances.len(),
            "content deleted"
        );
        Ok(())
    }

    /// Everything a student may view across accepted links, newest first.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub fn list_accessible_content(&self, student: UserId, filter: ContentFilter) -> CoachResult<Vec<Content>> {
        let mut out = Vec::new();
        for link in self.links_for_student(student, &[LinkStatus::Accepted])? {
            out.extend(
                self.stores
                    .contents
                    .contents_by_creator(link.professional)?
                    .into_iter()
                    .filter(|c| filter.matches(c.kind()) && c.is_shared_with(student)),
            );
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::content::{ContentDraft, ContentFilter, ContentKind, RoutineLevel};
    use crate::error::{AccessError, CoachError, ValidationError};
    use crate::platform::Platform;
    use crate::training::{ExerciseId, Training};
    use crate::user::{Registration, Role, User};

    fn professional(platform: &Platform, name: &str) -> User {
        let user = platform
            .register(
                Registration::builder()
                    .username(name)
                    .password("secret")
                    .email(format!("{name}@example.com"))
                    .full_name(name)
                    .role(Role::Nutritionist)
                    .register("CRN-9")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        platform.activate_user(user.id).unwrap()
    }

    #[test]
    fn test_only_author_may_edit() {
        let platform = Platform::in_memory();
        let author = professional(&platform, "nina");
        let other = professional(&platform, "otto");
        let diet = platform
            .create_content(author.id, ContentDraft::diet("Cut", "Lean protein").build().unwrap())
            .unwrap();

        let err = platform
            .update_content(diet.id, ContentDraft::diet("Bulk", "More rice").build().unwrap(), other.id)
            .unwrap_err();
        assert!(matches!(err, CoachError::Access(AccessError::NotAuthor { .. })));
    }

    #[test]
    fn test_kind_cannot_change() {
        let platform = Platform::in_memory();
        let author = professional(&platform, "nina");
        let diet = platform
            .create_content(author.id, ContentDraft::diet("Cut", "Lean protein").build().unwrap())
            .unwrap();
        let err = platform
            .update_content(diet.id, ContentDraft::material("Reading").build().unwrap(), author.id)
            .unwrap_err();
        assert!(matches!(
            err,
            CoachError::Validation(ValidationError::ContentKindMismatch {
                expected: ContentKind::Diet,
                actual: ContentKind::Material
            })
        ));
    }

    #[test]
    fn test_routine_requires_catalog_exercises() {
        let platform = Platform::in_memory();
        let author = professional(&platform, "nina");
        let draft = ContentDraft::routine("Legs", RoutineLevel::Beginner)
            .training(Training::new("Day A").with_set(ExerciseId::new(), 3, 10, 60))
            .build()
            .unwrap();
        let err = platform.create_content(author.id, draft).unwrap_err();
        assert!(matches!(err, CoachError::Validation(ValidationError::UnknownExercise { .. })));
    }

    #[test]
    fn test_students_cannot_author() {
        let platform = Platform::in_memory();
        let student = platform
            .register(
                Registration::builder()
                    .username("stu")
                    .password("secret")
                    .email("stu@example.com")
                    .full_name("Stu")
                    .role(Role::Student)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let err = platform
            .create_content(student.id, ContentDraft::diet("x", "y").build().unwrap())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_filter_by_kind() {
        let platform = Platform::in_memory();
        let author = professional(&platform, "nina");
        platform
            .create_content(author.id, ContentDraft::diet("Cut", "Lean").build().unwrap())
            .unwrap();
        platform
            .create_content(author.id, ContentDraft::material("Guide").build().unwrap())
            .unwrap();
        assert_eq!(
            platform
                .list_content_by_creator(author.id, ContentFilter::Only(ContentKind::Diet))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            platform.list_content_by_creator(author.id, ContentFilter::All).unwrap().len(),
            2
        );
    }
}
