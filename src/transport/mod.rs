//! REST transport for coachdesk.
//!
//! Every operation of [`Platform`] is exposed as a JSON endpoint. Callers
//! authenticate each request with HTTP Basic credentials; only `/health`,
//! `/register` and `/professionals` are public. Errors are returned as an
//! [`ErrorBody`](crate::api::ErrorBody) with a status derived from the
//! error category.
//!
//! ```text
//!   /health /register /professionals      public
//!   /me/...                               any authenticated user
//!   /exercises                            any authenticated user
//!   /professional/...                     coach | nutritionist | psychologist
//!   /student/...                          student
//!   /admin/api/...                        administrator
//! ```
//!
//! Platform calls may hit the write-ahead log, so handlers run them on the
//! blocking pool through [`AppState::run`].

mod account;
mod admin;
mod auth;
mod error;
mod professional;
mod student;

pub use auth::Authenticated;
pub use error::ApiError;

use std::future::Future;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{CoachError, CoachResult, ValidationError};
use crate::platform::Platform;

/// Shared state of every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    platform: Platform,
}

impl AppState {
    /// Wraps a platform.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// The wrapped platform.
    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Runs a platform operation on the blocking pool.
    ///
    /// # Errors
    ///
    /// The operation's own error, or an internal error if the task panicked.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Platform) -> CoachResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let platform = self.platform.clone();
        tokio::task::spawn_blocking(move || op(&platform))
            .await
            .map_err(|e| CoachError::internal(format!("request task failed: {e}")))?
            .map_err(ApiError::from)
    }
}

/// Builds the REST router over `platform`.
///
/// Browsers get CORS headers only for `allowed_origins`. With an empty
/// list no CORS layer is installed and cross-origin reads are refused.
pub fn router(platform: Platform, allowed_origins: &[HeaderValue]) -> Router {
    let public = Router::new()
        .route("/health", get(account::health))
        .route("/register", post(account::register))
        .route("/professionals", get(account::professionals));

    let me = Router::new()
        .route("/me", get(account::me).put(account::update_me))
        .route("/me/goal", put(account::update_goal))
        .route("/me/deactivate", post(account::deactivate))
        .route("/me/notifications", get(account::notifications))
        .route("/me/notifications/unread", get(account::unread))
        .route("/me/notifications/read-all", post(account::read_all))
        .route("/me/notifications/:id/read", post(account::read_one))
        .route("/exercises", get(account::exercises));

    let professional = Router::new()
        .route("/professional/links", get(professional::links))
        .route("/professional/links/:id/accept", post(professional::accept_link))
        .route("/professional/links/:id/remove", post(professional::remove_link))
        .route(
            "/professional/content",
            get(professional::list_content).post(professional::create_content),
        )
        .route(
            "/professional/content/:id",
            get(professional::get_content)
                .put(professional::update_content)
                .delete(professional::delete_content),
        )
        .route("/professional/routines/:id/assign", post(professional::assign_routine));

    let student = Router::new()
        .route("/student/dashboard", get(student::dashboard))
        .route("/student/content/:id", get(student::content))
        .route("/student/links", get(student::links).post(student::request_links))
        .route("/student/links/:id/remove", post(student::remove_link))
        .route("/student/routines/:instance/log/:training", post(student::log_training))
        .route("/student/routines/:instance/history", get(student::history));

    let admin = Router::new()
        .route("/admin/api/users", get(admin::users))
        .route("/admin/api/pending-professionals", get(admin::pending_professionals))
        .route("/admin/api/approve/:id", post(admin::approve))
        .route("/admin/api/remove/:id", post(admin::remove))
        .route("/admin/api/sweep", post(admin::sweep))
        .route("/admin/api/exercises", post(admin::add_exercise));

    let app = public
        .merge(me)
        .merge(professional)
        .merge(student)
        .merge(admin)
        .layer(TraceLayer::new_for_http());
    let app = if allowed_origins.is_empty() {
        app
    } else {
        app.layer(cors_layer(allowed_origins))
    };
    app.with_state(AppState::new(platform))
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins.iter().cloned()))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

/// Converts configured origins into header values for [`router`].
///
/// # Errors
///
/// `ValidationError::OutOfRange` for an origin that is not a valid header
/// value.
pub fn parse_origins(origins: &[String]) -> CoachResult<Vec<HeaderValue>> {
    origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| {
                ValidationError::OutOfRange {
                    field: "cors_origins".to_string(),
                    reason: format!("'{origin}': {e}"),
                }
                .into()
            })
        })
        .collect()
}

/// Serves `app` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve<S>(listener: TcpListener, app: Router, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "REST API listening");
    }
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}
