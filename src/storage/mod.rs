//! Storage for coachdesk.
//!
//! The traits in [`traits`] define the abstract interface. Two backends
//! are provided: [`InMemoryStore`] and, with the `persistent` feature, a
//! write-ahead-logged directory opened via [`open_database`].

pub mod memory;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

use std::sync::Arc;

pub use memory::{CommitLog, InMemoryStore, Mutation, Tables, TablesSnapshot};
pub use traits::{
    ContentStore, ExerciseStore, LinkStore, NotificationStore, ProfileStore, RoutineStore,
    ScheduleStore, StorageError, UserStore,
};

#[cfg(feature = "persistent")]
pub use persistent::{open_database, CompactionResult, PersistentConfig, PersistentStores};

/// One handle per record family.
///
/// The platform only talks to storage through this bundle, so any mix of
/// backends can be plugged in.
#[derive(Clone)]
pub struct Stores {
    /// User accounts.
    pub users: Arc<dyn UserStore>,
    /// Student and professional profiles.
    pub profiles: Arc<dyn ProfileStore>,
    /// Diets, materials and routines.
    pub contents: Arc<dyn ContentStore>,
    /// Exercise catalog.
    pub exercises: Arc<dyn ExerciseStore>,
    /// Student/professional links.
    pub links: Arc<dyn LinkStore>,
    /// Notifications and inboxes.
    pub notifications: Arc<dyn NotificationStore>,
    /// Routine assignments and training history.
    pub routines: Arc<dyn RoutineStore>,
    /// Account deletion schedules.
    pub schedules: Arc<dyn ScheduleStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    /// Fresh in-memory storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryStore::new()))
    }

    /// Uses one backend for every record family.
    #[must_use]
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserStore
            + ProfileStore
            + ContentStore
            + ExerciseStore
            + LinkStore
            + NotificationStore
            + RoutineStore
            + ScheduleStore
            + 'static,
    {
        Self {
            users: backend.clone(),
            profiles: backend.clone(),
            contents: backend.clone(),
            exercises: backend.clone(),
            links: backend.clone(),
            notifications: backend.clone(),
            routines: backend.clone(),
            schedules: backend,
        }
    }
}
