//! # coachdesk - fitness coaching platform
//!
//! Students link with professionals (coaches, nutritionists, psychologists),
//! professionals author content for them, and administrators approve
//! professionals and keep the user base tidy. A daily sweep expires stale
//! link requests and deletes accounts whose deactivation grace period ended.
//!
//! ## Core Concepts
//!
//! - **User**: an account holding one or more roles, with a student or
//!   professional profile
//! - **Link**: the student-professional relation, `Pending` until the
//!   professional accepts it
//! - **Content**: a diet, material or routine authored by a professional and
//!   shared with linked students
//! - **Notification**: a message delivered to one or more inboxes
//! - **Platform**: the service layer tying stores, clock and policy together
//!
//! ## Usage
//!
//! ```rust
//! use coachdesk::{Platform, Registration, Role};
//!
//! # fn main() -> coachdesk::CoachResult<()> {
//! let platform = Platform::in_memory();
//!
//! let coach = platform.register(
//!     Registration::builder()
//!         .username("coach")
//!         .password("secret")
//!         .email("coach@example.com")
//!         .full_name("Carla Coach")
//!         .role(Role::Coach)
//!         .register("CREF-001")
//!         .build()?,
//! )?;
//! platform.approve_professional(coach.id)?;
//!
//! let student = platform.register(
//!     Registration::builder()
//!         .username("sam")
//!         .password("secret")
//!         .email("sam@example.com")
//!         .full_name("Sam Student")
//!         .role(Role::Student)
//!         .link_with(coach.id)
//!         .build()?,
//! )?;
//!
//! let link = platform.links_for_student(student.id, &[])?.remove(0);
//! platform.accept_link(link.id, coach.id)?;
//! assert!(platform.is_active_link(student.id, coach.id)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `persistent`: write-ahead-logged durable store
//! - `transport-http`: axum REST router
//! - `server`: the `coachdesk-server` binary
//! - `client`: [`client::AdminClient`] and the `coachdesk-admin` binary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod id;

// Domain types
pub mod auth;
pub mod clock;
pub mod content;
pub mod error;
pub mod link;
pub mod notification;
pub mod schedule;
pub mod training;
pub mod user;

// Services, storage and configuration
pub mod api;
pub mod config;
pub mod platform;
pub mod storage;

#[cfg(feature = "transport-http")]
pub mod transport;

#[cfg(feature = "client")]
pub mod client;

// Re-export primary types at crate root for convenience
pub use auth::{LandingArea, PasswordHash, Principal};
pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{Content, ContentBody, ContentDraft, ContentFilter, ContentId, ContentKind};
pub use error::{
    AccessError, CoachError, CoachResult, ExecutionError, TransportError, ValidationError,
};
pub use link::{LinkId, LinkStatus, StudentProfessionalLink};
pub use notification::{InboxEntry, InboxItem, Notification, NotificationKind};
pub use platform::{Platform, SeedReport, DEMO_PASSWORD};
pub use schedule::{InactivationSchedule, SweepPolicy, SweepReport};
pub use training::{Exercise, ExerciseId, RoutineInstance, Training, TrainingHistory};
pub use user::{Goal, ProfileUpdate, Registration, Role, User, UserId, UserView};

pub use storage::{StorageError, Stores};
