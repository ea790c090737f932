//! In-memory storage backend.
//!
//! All writes are expressed as a [`Mutation`] and go through
//! [`Tables::check`] then [`Tables::apply`]. The split lets a durable
//! backend log the mutation between the two steps: nothing reaches the log
//! unless it is known to apply cleanly, and replaying the log rebuilds the
//! exact same tables.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{Content, ContentId};
use crate::link::{LinkId, LinkStatus, StudentProfessionalLink};
use crate::notification::{InboxEntry, InboxEntryId, Notification, NotificationId};
use crate::schedule::InactivationSchedule;
use crate::storage::traits::{
    ContentStore, ExerciseStore, LinkStore, NotificationStore, ProfileStore, RoutineStore,
    ScheduleStore, StorageError, UserStore,
};
use crate::training::{Exercise, ExerciseId, RoutineInstance, RoutineInstanceId, TrainingHistory};
use crate::user::{ProfessionalProfile, StudentProfile, User, UserId};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// A single write against the tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Mutation {
    InsertUser(User),
    UpdateUser(User),
    DeleteUser { id: UserId },

    PutStudentProfile(StudentProfile),
    PutProfessionalProfile(ProfessionalProfile),
    DeleteProfiles { user: UserId },

    InsertContent(Content),
    UpdateContent(Content),
    DeleteContent { id: ContentId },

    InsertExercise(Exercise),

    InsertLink(StudentProfessionalLink),
    UpdateLink(StudentProfessionalLink),
    DeleteLink { id: LinkId },

    Deliver {
        notification: Notification,
        entries: Vec<InboxEntry>,
    },
    MarkRead { id: InboxEntryId, at: DateTime<Utc> },
    DeleteInbox { recipient: UserId },

    InsertInstance(RoutineInstance),
    DeleteInstance { id: RoutineInstanceId },
    InsertHistory(TrainingHistory),

    InsertSchedule(InactivationSchedule),
    UpdateSchedule(InactivationSchedule),
    DeleteSchedule { user: UserId },
}

/// Serializable image of every primary record, without secondary indexes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablesSnapshot {
    /// Users.
    pub users: Vec<User>,
    /// Student profiles.
    pub students: Vec<StudentProfile>,
    /// Professional profiles.
    pub professionals: Vec<ProfessionalProfile>,
    /// Content.
    pub contents: Vec<Content>,
    /// Exercise catalog.
    pub exercises: Vec<Exercise>,
    /// Links.
    pub links: Vec<StudentProfessionalLink>,
    /// Notifications with their inbox entries.
    pub notifications: Vec<(Notification, Vec<InboxEntry>)>,
    /// Routine assignments.
    pub instances: Vec<RoutineInstance>,
    /// Training history.
    pub history: Vec<TrainingHistory>,
    /// Deactivation schedules.
    pub schedules: Vec<InactivationSchedule>,
}

impl TablesSnapshot {
    /// Number of primary records in the snapshot.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.users.len()
            + self.students.len()
            + self.professionals.len()
            + self.contents.len()
            + self.exercises.len()
            + self.links.len()
            + self.notifications.len()
            + self.instances.len()
            + self.history.len()
            + self.schedules.len()
    }
}

/// Indexed record tables.
#[derive(Debug, Default)]
pub struct Tables {
    users: HashMap<UserId, User>,
    by_username: HashMap<String, UserId>,
    by_email: HashMap<String, UserId>,

    students: HashMap<UserId, StudentProfile>,
    professionals: HashMap<UserId, ProfessionalProfile>,

    contents: HashMap<ContentId, Content>,
    by_creator: HashMap<UserId, HashSet<ContentId>>,

    exercises: HashMap<ExerciseId, Exercise>,
    exercise_by_name: HashMap<String, ExerciseId>,

    links: HashMap<LinkId, StudentProfessionalLink>,
    link_by_pair: HashMap<(UserId, UserId), LinkId>,

    notifications: HashMap<NotificationId, Notification>,
    entries: HashMap<InboxEntryId, InboxEntry>,
    inbox_by_recipient: HashMap<UserId, HashSet<InboxEntryId>>,

    instances: HashMap<RoutineInstanceId, RoutineInstance>,
    history: HashMap<RoutineInstanceId, Vec<TrainingHistory>>,

    schedules: HashMap<UserId, InactivationSchedule>,
}

impl Tables {
    /// Verifies that `mutation` would apply cleanly.
    ///
    /// # Errors
    ///
    /// `NotFound` for updates/deletes of missing records, `DuplicateKey` for
    /// uniqueness violations.
    pub fn check(&self, mutation: &Mutation) -> Result<(), StorageError> {
        match mutation {
            Mutation::InsertUser(user) => {
                if self.users.contains_key(&user.id) {
                    return Err(StorageError::DuplicateKey(format!("user id {}", user.id)));
                }
                self.check_user_keys(user)
            }
            Mutation::UpdateUser(user) => {
                if !self.users.contains_key(&user.id) {
                    return Err(StorageError::not_found("User", user.id));
                }
                self.check_user_keys(user)
            }
            Mutation::DeleteUser { id } => self.require(self.users.contains_key(id), "User", id),
            Mutation::PutStudentProfile(profile) => {
                self.require(self.users.contains_key(&profile.user_id), "User", profile.user_id)
            }
            Mutation::PutProfessionalProfile(profile) => {
                self.require(self.users.contains_key(&profile.user_id), "User", profile.user_id)
            }
            Mutation::DeleteProfiles { .. }
            | Mutation::DeleteInbox { .. }
            | Mutation::DeleteSchedule { .. } => Ok(()),
            Mutation::InsertContent(content) => {
                if self.contents.contains_key(&content.id) {
                    return Err(StorageError::DuplicateKey(format!("content id {}", content.id)));
                }
                Ok(())
            }
            Mutation::UpdateContent(content) => {
                self.require(self.contents.contains_key(&content.id), "Content", content.id)
            }
            Mutation::DeleteContent { id } => self.require(self.contents.contains_key(id), "Content", id),
            Mutation::InsertExercise(exercise) => {
                if self.exercises.contains_key(&exercise.id) {
                    return Err(StorageError::DuplicateKey(format!("exercise id {}", exercise.id)));
                }
                if self.exercise_by_name.contains_key(&normalize_key(&exercise.name)) {
                    return Err(StorageError::DuplicateKey(format!("exercise name {}", exercise.name)));
                }
                Ok(())
            }
            Mutation::InsertLink(link) => {
                if self.links.contains_key(&link.id) {
                    return Err(StorageError::DuplicateKey(format!("link id {}", link.id)));
                }
                if self.link_by_pair.contains_key(&(link.student, link.professional)) {
                    return Err(StorageError::DuplicateKey(format!(
                        "link {} -> {}",
                        link.student, link.professional
                    )));
                }
                Ok(())
            }
            Mutation::UpdateLink(link) => {
                let existing = self
                    .links
                    .get(&link.id)
                    .ok_or_else(|| StorageError::not_found("Link", link.id))?;
                if existing.student != link.student || existing.professional != link.professional {
                    return Err(StorageError::BackendError(format!(
                        "link {} parties cannot change",
                        link.id
                    )));
                }
                Ok(())
            }
            Mutation::DeleteLink { id } => self.require(self.links.contains_key(id), "Link", id),
            Mutation::Deliver { notification, entries } => {
                if self.notifications.contains_key(&notification.id) {
                    return Err(StorageError::DuplicateKey(format!(
                        "notification id {}",
                        notification.id
                    )));
                }
                for entry in entries {
                    if entry.notification != notification.id {
                        return Err(StorageError::BackendError(format!(
                            "inbox entry {} does not belong to notification {}",
                            entry.id, notification.id
                        )));
                    }
                    if self.entries.contains_key(&entry.id) {
                        return Err(StorageError::DuplicateKey(format!("inbox entry id {}", entry.id)));
                    }
                }
                Ok(())
            }
            Mutation::MarkRead { id, .. } => {
                self.require(self.entries.contains_key(id), "Inbox entry", id)
            }
            Mutation::InsertInstance(instance) => {
                if self.instances.contains_key(&instance.id) {
                    return Err(StorageError::DuplicateKey(format!(
                        "routine instance id {}",
                        instance.id
                    )));
                }
                Ok(())
            }
            Mutation::DeleteInstance { id } => {
                self.require(self.instances.contains_key(id), "Routine instance", id)
            }
            Mutation::InsertHistory(history) => self.require(
                self.instances.contains_key(&history.routine_instance),
                "Routine instance",
                history.routine_instance,
            ),
            Mutation::InsertSchedule(schedule) => {
                if self.schedules.contains_key(&schedule.user) {
                    return Err(StorageError::DuplicateKey(format!(
                        "inactivation schedule for {}",
                        schedule.user
                    )));
                }
                Ok(())
            }
            Mutation::UpdateSchedule(schedule) => self.require(
                self.schedules.contains_key(&schedule.user),
                "Inactivation schedule",
                schedule.user,
            ),
        }
    }

    /// Applies a mutation that passed [`Tables::check`].
    pub fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::InsertUser(user) => {
                self.by_username.insert(normalize_key(&user.username), user.id);
                self.by_email.insert(normalize_key(&user.email), user.id);
                self.users.insert(user.id, user);
            }
            Mutation::UpdateUser(user) => {
                if let Some(prev) = self.users.get(&user.id) {
                    self.by_username.remove(&normalize_key(&prev.username));
                    self.by_email.remove(&normalize_key(&prev.email));
                }
                self.by_username.insert(normalize_key(&user.username), user.id);
                self.by_email.insert(normalize_key(&user.email), user.id);
                self.users.insert(user.id, user);
            }
            Mutation::DeleteUser { id } => {
                if let Some(prev) = self.users.remove(&id) {
                    self.by_username.remove(&normalize_key(&prev.username));
                    self.by_email.remove(&normalize_key(&prev.email));
                }
            }
            Mutation::PutStudentProfile(profile) => {
                self.students.insert(profile.user_id, profile);
            }
            Mutation::PutProfessionalProfile(profile) => {
                self.professionals.insert(profile.user_id, profile);
            }
            Mutation::DeleteProfiles { user } => {
                self.students.remove(&user);
                self.professionals.remove(&user);
            }
            Mutation::InsertContent(content) | Mutation::UpdateContent(content) => {
                self.by_creator.entry(content.creator).or_default().insert(content.id);
                self.contents.insert(content.id, content);
            }
            Mutation::DeleteContent { id } => {
                if let Some(prev) = self.contents.remove(&id) {
                    if let Some(set) = self.by_creator.get_mut(&prev.creator) {
                        set.remove(&id);
                        if set.is_empty() {
                            self.by_creator.remove(&prev.creator);
                        }
                    }
                }
            }
            Mutation::InsertExercise(exercise) => {
                self.exercise_by_name.insert(normalize_key(&exercise.name), exercise.id);
                self.exercises.insert(exercise.id, exercise);
            }
            Mutation::InsertLink(link) | Mutation::UpdateLink(link) => {
                self.link_by_pair.insert((link.student, link.professional), link.id);
                self.links.insert(link.id, link);
            }
            Mutation::DeleteLink { id } => {
                if let Some(prev) = self.links.remove(&id) {
                    self.link_by_pair.remove(&(prev.student, prev.professional));
                }
            }
            Mutation::Deliver { notification, entries } => {
                for entry in entries {
                    self.inbox_by_recipient.entry(entry.recipient).or_default().insert(entry.id);
                    self.entries.insert(entry.id, entry);
                }
                self.notifications.insert(notification.id, notification);
            }
            Mutation::MarkRead { id, at } => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.read_at.get_or_insert(at);
                }
            }
            Mutation::DeleteInbox { recipient } => {
                let ids = self.inbox_by_recipient.remove(&recipient).unwrap_or_default();
                let mut touched = HashSet::new();
                for id in ids {
                    if let Some(entry) = self.entries.remove(&id) {
                        touched.insert(entry.notification);
                    }
                }
                for notification in touched {
                    if !self.entries.values().any(|e| e.notification == notification) {
                        self.notifications.remove(&notification);
                    }
                }
            }
            Mutation::InsertInstance(instance) => {
                self.instances.insert(instance.id, instance);
            }
            Mutation::DeleteInstance { id } => {
                self.instances.remove(&id);
                self.history.remove(&id);
            }
            Mutation::InsertHistory(history) => {
                self.history.entry(history.routine_instance).or_default().push(history);
            }
            Mutation::InsertSchedule(schedule) | Mutation::UpdateSchedule(schedule) => {
                self.schedules.insert(schedule.user, schedule);
            }
            Mutation::DeleteSchedule { user } => {
                self.schedules.remove(&user);
            }
        }
    }

    /// Checks then applies.
    ///
    /// # Errors
    ///
    /// Propagates [`Tables::check`] failures; the tables are left untouched.
    pub fn commit(&mut self, mutation: Mutation) -> Result<(), StorageError> {
        self.check(&mutation)?;
        self.apply(mutation);
        Ok(())
    }

    /// Copies every primary record out.
    #[must_use]
    pub fn snapshot(&self) -> TablesSnapshot {
        let mut notifications: HashMap<NotificationId, (Notification, Vec<InboxEntry>)> = self
            .notifications
            .values()
            .map(|n| (n.id, (n.clone(), Vec::new())))
            .collect();
        for entry in self.entries.values() {
            if let Some((_, entries)) = notifications.get_mut(&entry.notification) {
                entries.push(entry.clone());
            }
        }

        TablesSnapshot {
            users: self.users.values().cloned().collect(),
            students: self.students.values().cloned().collect(),
            professionals: self.professionals.values().cloned().collect(),
            contents: self.contents.values().cloned().collect(),
            exercises: self.exercises.values().cloned().collect(),
            links: self.links.values().cloned().collect(),
            notifications: notifications.into_values().collect(),
            instances: self.instances.values().cloned().collect(),
            history: self.history.values().flatten().cloned().collect(),
            schedules: self.schedules.values().cloned().collect(),
        }
    }

    /// Rebuilds tables and indexes from a snapshot.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot violates a uniqueness rule or references a
    /// missing parent record.
    pub fn from_snapshot(snapshot: TablesSnapshot) -> Result<Self, StorageError> {
        let mut tables = Self::default();
        let TablesSnapshot {
            users,
            students,
            professionals,
            contents,
            exercises,
            links,
            notifications,
            instances,
            history,
            schedules,
        } = snapshot;

        let mutations = users
            .into_iter()
            .map(Mutation::InsertUser)
            .chain(students.into_iter().map(Mutation::PutStudentProfile))
            .chain(professionals.into_iter().map(Mutation::PutProfessionalProfile))
            .chain(contents.into_iter().map(Mutation::InsertContent))
            .chain(exercises.into_iter().map(Mutation::InsertExercise))
            .chain(links.into_iter().map(Mutation::InsertLink))
            .chain(
                notifications
                    .into_iter()
                    .map(|(notification, entries)| Mutation::Deliver { notification, entries }),
            )
            .chain(instances.into_iter().map(Mutation::InsertInstance))
            .chain(history.into_iter().map(Mutation::InsertHistory))
            .chain(schedules.into_iter().map(Mutation::InsertSchedule));

        for mutation in mutations {
            tables.commit(mutation)?;
        }
        Ok(tables)
    }

    fn check_user_keys(&self, user: &User) -> Result<(), StorageError> {
        if let Some(owner) = self.by_username.get(&normalize_key(&user.username)) {
            if *owner != user.id {
                return Err(StorageError::DuplicateKey(format!("username {}", user.username)));
            }
        }
        if let Some(owner) = self.by_email.get(&normalize_key(&user.email)) {
            if *owner != user.id {
                return Err(StorageError::DuplicateKey(format!("email {}", user.email)));
            }
        }
        Ok(())
    }

    fn require(&self, present: bool, kind: &'static str, id: impl ToString) -> Result<(), StorageError> {
        if present {
            Ok(())
        } else {
            Err(StorageError::not_found(kind, id))
        }
    }
}

/// Sink that durably records mutations before they are applied.
pub trait CommitLog: Send + Sync {
    /// Records `mutation`. An error aborts the write.
    fn append(&self, mutation: &Mutation) -> Result<(), StorageError>;
}

/// Thread-safe in-memory store implementing every storage trait.
///
/// With a [`CommitLog`] attached, each mutation is logged while the write
/// lock is held, after it has been checked and before it is applied.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    log: Option<Arc<dyn CommitLog>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("logged", &self.log.is_some())
            .finish_non_exhaustive()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store over existing tables, logging every later mutation.
    #[must_use]
    pub fn with_log(tables: Tables, log: Arc<dyn CommitLog>) -> Self {
        Self {
            tables: RwLock::new(tables),
            log: Some(log),
        }
    }

    /// Checks, logs and applies a mutation.
    ///
    /// # Errors
    ///
    /// Returns the check failure or the log failure; the tables are left
    /// untouched in both cases.
    pub fn commit(&self, mutation: Mutation) -> Result<(), StorageError> {
        let mut tables = self.tables.write().map_err(|_| lock_err("store.commit"))?;
        tables.check(&mutation)?;
        if let Some(log) = &self.log {
            log.append(&mutation)?;
        }
        tables.apply(mutation);
        Ok(())
    }

    /// Runs `f` while holding the write lock, so no mutation interleaves.
    ///
    /// # Errors
    ///
    /// Propagates `f`'s error or a poisoned lock.
    pub fn exclusive<T>(
        &self,
        f: impl FnOnce(&Tables) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let tables = self.tables.write().map_err(|_| lock_err("store.exclusive"))?;
        f(&tables)
    }

    fn read<T>(&self, context: &'static str, f: impl FnOnce(&Tables) -> T) -> Result<T, StorageError> {
        let tables = self.tables.read().map_err(|_| lock_err(context))?;
        Ok(f(&tables))
    }
}

impl UserStore for InMemoryStore {
    fn insert_user(&self, user: User) -> Result<(), StorageError> {
        self.commit(Mutation::InsertUser(user))
    }

    fn update_user(&self, user: User) -> Result<(), StorageError> {
        self.commit(Mutation::UpdateUser(user))
    }

    fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        self.commit(Mutation::DeleteUser { id })
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        self.read("user.get", |t| t.users.get(&id).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        self.read("user.find_by_username", |t| {
            t.by_username
                .get(&normalize_key(username))
                .and_then(|id| t.users.get(id))
                .cloned()
        })
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        self.read("user.find_by_email", |t| {
            t.by_email
                .get(&normalize_key(email))
                .and_then(|id| t.users.get(id))
                .cloned()
        })
    }

    fn list_users(&self) -> Result<Vec<User>, StorageError> {
        self.read("user.list", |t| {
            let mut users: Vec<User> = t.users.values().cloned().collect();
            users.sort_by(|a, b| {
                a.registered_at
                    .cmp(&b.registered_at)
                    .then_with(|| a.username.cmp(&b.username))
            });
            users
        })
    }
}

impl ProfileStore for InMemoryStore {
    fn put_student_profile(&self, profile: StudentProfile) -> Result<(), StorageError> {
        self.commit(Mutation::PutStudentProfile(profile))
    }

    fn get_student_profile(&self, user: UserId) -> Result<Option<StudentProfile>, StorageError> {
        self.read("profile.student", |t| t.students.get(&user).cloned())
    }

    fn put_professional_profile(&self, profile: ProfessionalProfile) -> Result<(), StorageError> {
        self.commit(Mutation::PutProfessionalProfile(profile))
    }

    fn get_professional_profile(&self, user: UserId) -> Result<Option<ProfessionalProfile>, StorageError> {
        self.read("profile.professional", |t| t.professionals.get(&user).cloned())
    }

    fn list_professional_profiles(&self) -> Result<Vec<ProfessionalProfile>, StorageError> {
        self.read("profile.list", |t| t.professionals.values().cloned().collect())
    }

    fn delete_profiles(&self, user: UserId) -> Result<(), StorageError> {
        self.commit(Mutation::DeleteProfiles { user })
    }
}

impl ContentStore for InMemoryStore {
    fn insert_content(&self, content: Content) -> Result<(), StorageError> {
        self.commit(Mutation::InsertContent(content))
    }

    fn update_content(&self, content: Content) -> Result<(), StorageError> {
        self.commit(Mutation::UpdateContent(content))
    }

    fn delete_content(&self, id: ContentId) -> Result<(), StorageError> {
        self.commit(Mutation::DeleteContent { id })
    }

    fn get_content(&self, id: ContentId) -> Result<Option<Content>, StorageError> {
        self.read("content.get", |t| t.contents.get(&id).cloned())
    }

    fn contents_by_creator(&self, creator: UserId) -> Result<Vec<Content>, StorageError> {
        self.read("content.by_creator", |t| {
            let mut out: Vec<Content> = t
                .by_creator
                .get(&creator)
                .into_iter()
                .flatten()
                .filter_map(|id| t.contents.get(id))
                .cloned()
                .collect();
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
            out
        })
    }
}

impl ExerciseStore for InMemoryStore {
    fn insert_exercise(&self, exercise: Exercise) -> Result<(), StorageError> {
        self.commit(Mutation::InsertExercise(exercise))
    }

    fn get_exercise(&self, id: ExerciseId) -> Result<Option<Exercise>, StorageError> {
        self.read("exercise.get", |t| t.exercises.get(&id).cloned())
    }

    fn find_exercise_by_name(&self, name: &str) -> Result<Option<Exercise>, StorageError> {
        self.read("exercise.find_by_name", |t| {
            t.exercise_by_name
                .get(&normalize_key(name))
                .and_then(|id| t.exercises.get(id))
                .cloned()
        })
    }

    fn list_exercises(&self) -> Result<Vec<Exercise>, StorageError> {
        self.read("exercise.list", |t| {
            let mut out: Vec<Exercise> = t.exercises.values().cloned().collect();
            out.sort_by(|a, b| a.name.cmp(&b.name));
            out
        })
    }
}

impl LinkStore for InMemoryStore {
    fn insert_link(&self, link: StudentProfessionalLink) -> Result<(), StorageError> {
        self.commit(Mutation::InsertLink(link))
    }

    fn update_link(&self, link: StudentProfessionalLink) -> Result<(), StorageError> {
        self.commit(Mutation::UpdateLink(link))
    }

    fn delete_link(&self, id: LinkId) -> Result<(), StorageError> {
        self.commit(Mutation::DeleteLink { id })
    }

    fn get_link(&self, id: LinkId) -> Result<Option<StudentProfessionalLink>, StorageError> {
        self.read("link.get", |t| t.links.get(&id).cloned())
    }

    fn find_link(
        &self,
        student: UserId,
        professional: UserId,
    ) -> Result<Option<StudentProfessionalLink>, StorageError> {
        self.read("link.find", |t| {
            t.link_by_pair
                .get(&(student, professional))
                .and_then(|id| t.links.get(id))
                .cloned()
        })
    }

    fn links_for_student(&self, student: UserId) -> Result<Vec<StudentProfessionalLink>, StorageError> {
        self.read("link.for_student", |t| {
            sorted_links(t.links.values().filter(|l| l.student == student))
        })
    }

    fn links_for_professional(
        &self,
        professional: UserId,
    ) -> Result<Vec<StudentProfessionalLink>, StorageError> {
        self.read("link.for_professional", |t| {
            sorted_links(t.links.values().filter(|l| l.professional == professional))
        })
    }

    fn links_requested_before(
        &self,
        status: LinkStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<StudentProfessionalLink>, StorageError> {
        self.read("link.requested_before", |t| {
            sorted_links(
                t.links
                    .values()
                    .filter(|l| l.status == status && l.requested_before(cutoff)),
            )
        })
    }
}

fn sorted_links<'a>(
    links: impl Iterator<Item = &'a StudentProfessionalLink>,
) -> Vec<StudentProfessionalLink> {
    let mut out: Vec<StudentProfessionalLink> = links.cloned().collect();
    out.sort_by_key(|l| l.requested_at);
    out
}

impl NotificationStore for InMemoryStore {
    fn deliver(&self, notification: Notification, entries: Vec<InboxEntry>) -> Result<(), StorageError> {
        self.commit(Mutation::Deliver { notification, entries })
    }

    fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>, StorageError> {
        self.read("notification.get", |t| t.notifications.get(&id).cloned())
    }

    fn get_inbox_entry(&self, id: InboxEntryId) -> Result<Option<InboxEntry>, StorageError> {
        self.read("notification.entry", |t| t.entries.get(&id).cloned())
    }

    fn mark_read(&self, id: InboxEntryId, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.commit(Mutation::MarkRead { id, at })
    }

    fn inbox(&self, recipient: UserId) -> Result<Vec<InboxEntry>, StorageError> {
        self.read("notification.inbox", |t| {
            t.inbox_by_recipient
                .get(&recipient)
                .into_iter()
                .flatten()
                .filter_map(|id| t.entries.get(id))
                .cloned()
                .collect()
        })
    }

    fn delete_inbox(&self, recipient: UserId) -> Result<(), StorageError> {
        self.commit(Mutation::DeleteInbox { recipient })
    }
}

impl RoutineStore for InMemoryStore {
    fn insert_instance(&self, instance: RoutineInstance) -> Result<(), StorageError> {
        self.commit(Mutation::InsertInstance(instance))
    }

    fn get_instance(&self, id: RoutineInstanceId) -> Result<Option<RoutineInstance>, StorageError> {
        self.read("routine.get", |t| t.instances.get(&id).cloned())
    }

    fn instances_for_student(&self, student: UserId) -> Result<Vec<RoutineInstance>, StorageError> {
        self.read("routine.for_student", |t| {
            let mut out: Vec<RoutineInstance> =
                t.instances.values().filter(|i| i.student == student).cloned().collect();
            out.sort_by_key(|i| i.start_date);
            out
        })
    }

    fn instances_for_routine(&self, routine: ContentId) -> Result<Vec<RoutineInstance>, StorageError> {
        self.read("routine.for_routine", |t| {
            t.instances.values().filter(|i| i.routine == routine).cloned().collect()
        })
    }

    fn delete_instance(&self, id: RoutineInstanceId) -> Result<(), StorageError> {
        self.commit(Mutation::DeleteInstance { id })
    }

    fn insert_history(&self, history: TrainingHistory) -> Result<(), StorageError> {
        self.commit(Mutation::InsertHistory(history))
    }

    fn history_for_instance(&self, id: RoutineInstanceId) -> Result<Vec<TrainingHistory>, StorageError> {
        self.read("routine.history", |t| t.history.get(&id).cloned().unwrap_or_default())
    }
}

impl ScheduleStore for InMemoryStore {
    fn insert_schedule(&self, schedule: InactivationSchedule) -> Result<(), StorageError> {
        self.commit(Mutation::InsertSchedule(schedule))
    }

    fn update_schedule(&self, schedule: InactivationSchedule) -> Result<(), StorageError> {
        self.commit(Mutation::UpdateSchedule(schedule))
    }

    fn get_schedule(&self, user: UserId) -> Result<Option<InactivationSchedule>, StorageError> {
        self.read("schedule.get", |t| t.schedules.get(&user).cloned())
    }

    fn delete_schedule(&self, user: UserId) -> Result<(), StorageError> {
        self.commit(Mutation::DeleteSchedule { user })
    }

    fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<InactivationSchedule>, StorageError> {
        self.read("schedule.due", |t| {
            let mut out: Vec<InactivationSchedule> =
                t.schedules.values().filter(|s| s.is_due(now)).cloned().collect();
            out.sort_by_key(|s| s.scheduled_deletion_at);
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use chrono::Duration;

    use crate::content::ContentDraft;
    use crate::notification::Message;
    use crate::user::Role;

    fn user(name: &str) -> User {
        User {
            id: UserId::new(),
            username: name.to_string(),
            password_hash: "b3$1$00$00".to_string(),
            email: format!("{name}@example.com"),
            full_name: name.to_string(),
            phone_number: None,
            date_of_birth: None,
            roles: BTreeSet::from([Role::Student]),
            failed_login_attempts: 0,
            registered_at: Utc::now(),
            last_login_at: None,
            active: false,
        }
    }

    #[test]
    fn test_user_unique_username_case_insensitive() {
        let store = InMemoryStore::new();
        store.insert_user(user("Ana")).unwrap();
        let mut dup = user("ana");
        dup.email = "other@example.com".to_string();
        assert!(matches!(store.insert_user(dup), Err(StorageError::DuplicateKey(_))));
        assert!(store.find_by_username("ANA").unwrap().is_some());
    }

    #[test]
    fn test_update_user_reindexes_username() {
        let store = InMemoryStore::new();
        let mut u = user("before");
        store.insert_user(u.clone()).unwrap();
        u.username = "after".to_string();
        store.update_user(u.clone()).unwrap();
        assert!(store.find_by_username("before").unwrap().is_none());
        assert_eq!(store.find_by_username("after").unwrap().unwrap().id, u.id);
    }

    #[test]
    fn test_update_missing_user_fails() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.update_user(user("ghost")),
            Err(StorageError::NotFound { kind: "User", .. })
        ));
    }

    #[test]
    fn test_link_pair_is_unique() {
        let store = InMemoryStore::new();
        let (s, p) = (UserId::new(), UserId::new());
        store
            .insert_link(StudentProfessionalLink::pending(s, p, Utc::now()))
            .unwrap();
        let again = StudentProfessionalLink::pending(s, p, Utc::now());
        assert!(matches!(store.insert_link(again), Err(StorageError::DuplicateKey(_))));
        assert!(store.find_link(s, p).unwrap().is_some());
        assert!(store.find_link(p, s).unwrap().is_none());
    }

    #[test]
    fn test_links_requested_before_filters_status_and_age() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let old = StudentProfessionalLink::pending(UserId::new(), UserId::new(), now - Duration::days(10));
        let mut accepted_old =
            StudentProfessionalLink::pending(UserId::new(), UserId::new(), now - Duration::days(10));
        accepted_old.accept().unwrap();
        let fresh = StudentProfessionalLink::pending(UserId::new(), UserId::new(), now);
        for link in [old.clone(), accepted_old, fresh] {
            store.insert_link(link).unwrap();
        }
        let stale = store
            .links_requested_before(LinkStatus::Pending, now - Duration::days(7))
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
    }

    #[test]
    fn test_delete_inbox_drops_orphan_notifications() {
        let store = InMemoryStore::new();
        let (a, b) = (UserId::new(), UserId::new());
        let shared = Message::escalation(2).into_notification(Utc::now());
        let entries = [a, b]
            .into_iter()
            .map(|recipient| InboxEntry {
                id: InboxEntryId::new(),
                notification: shared.id,
                recipient,
                read_at: None,
            })
            .collect();
        store.deliver(shared.clone(), entries).unwrap();

        store.delete_inbox(a).unwrap();
        assert!(store.inbox(a).unwrap().is_empty());
        assert!(store.get_notification(shared.id).unwrap().is_some());

        store.delete_inbox(b).unwrap();
        assert!(store.get_notification(shared.id).unwrap().is_none());
    }

    #[test]
    fn test_mark_read_keeps_first_time() {
        let store = InMemoryStore::new();
        let n = Message::account_activated().into_notification(Utc::now());
        let entry = InboxEntry {
            id: InboxEntryId::new(),
            notification: n.id,
            recipient: UserId::new(),
            read_at: None,
        };
        store.deliver(n, vec![entry.clone()]).unwrap();
        let first = Utc::now();
        store.mark_read(entry.id, first).unwrap();
        store.mark_read(entry.id, first + Duration::hours(1)).unwrap();
        assert_eq!(store.get_inbox_entry(entry.id).unwrap().unwrap().read_at, Some(first));
    }

    #[test]
    fn test_history_requires_instance() {
        let store = InMemoryStore::new();
        let history = TrainingHistory {
            id: crate::training::HistoryId::new(),
            routine_instance: RoutineInstanceId::new(),
            training: crate::training::TrainingId::new(),
            executed_at: Utc::now(),
            notes: String::new(),
        };
        assert!(matches!(
            store.insert_history(history),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_snapshot_rebuilds_indexes() {
        let store = InMemoryStore::new();
        let u = user("snap");
        store.insert_user(u.clone()).unwrap();
        let draft = ContentDraft::diet("Plan", "Eggs").build().unwrap();
        let content = Content::from_draft(draft, u.id, Utc::now());
        store.insert_content(content.clone()).unwrap();

        let snapshot = store.exclusive(|t| Ok(t.snapshot())).unwrap();
        assert_eq!(snapshot.record_count(), 2);

        let rebuilt = Tables::from_snapshot(snapshot).unwrap();
        let restored = InMemoryStore {
            tables: RwLock::new(rebuilt),
            log: None,
        };
        assert_eq!(restored.find_by_username("snap").unwrap().unwrap().id, u.id);
        assert_eq!(restored.contents_by_creator(u.id).unwrap()[0].id, content.id);
    }

    #[derive(Default)]
    struct RecordingLog {
        seen: Mutex<Vec<Mutation>>,
        fail: bool,
    }

    impl CommitLog for RecordingLog {
        fn append(&self, mutation: &Mutation) -> Result<(), StorageError> {
            if self.fail {
                return Err(StorageError::BackendError("log unavailable".to_string()));
            }
            self.seen.lock().unwrap().push(mutation.clone());
            Ok(())
        }
    }

    #[test]
    fn test_log_sees_only_valid_mutations() {
        let log = Arc::new(RecordingLog::default());
        let store = InMemoryStore::with_log(Tables::default(), log.clone());
        let u = user("logged");
        store.insert_user(u.clone()).unwrap();
        assert!(store.insert_user(u).is_err());
        assert_eq!(log.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_log_failure_leaves_tables_untouched() {
        let log = Arc::new(RecordingLog {
            fail: true,
            ..RecordingLog::default()
        });
        let store = InMemoryStore::with_log(Tables::default(), log);
        assert!(store.insert_user(user("nope")).is_err());
        assert!(store.list_users().unwrap().is_empty());
    }
}
