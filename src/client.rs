//! Administrator client over the REST API.
//!
//! [`AdminClient`] wraps the `/admin/api` endpoints behind typed async
//! methods. Every request carries the administrator's Basic credentials.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> coachdesk::CoachResult<()> {
//! use coachdesk::client::AdminClient;
//!
//! let client = AdminClient::new("http://127.0.0.1:8080", "admin1", "123456")?;
//! for user in client.pending_professionals().await? {
//!     client.approve_professional(user.id).await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::{ErrorBody, HealthResponse, NewExercise};
use crate::error::{CoachResult, TransportError};
use crate::schedule::SweepReport;
use crate::training::Exercise;
use crate::user::{UserId, UserView};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed client of the administrator API.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl AdminClient {
    /// Creates a client for the server at `base_url` (e.g.
    /// `http://127.0.0.1:8080`).
    ///
    /// # Errors
    ///
    /// `TransportError::ConnectionFailed` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> CoachResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::ConnectionFailed {
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Unauthenticated liveness check.
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn health(&self) -> CoachResult<HealthResponse> {
        let request = self.http.get(format!("{}/health", self.base_url));
        self.send(request).await
    }

    /// Every account.
    ///
    /// # Errors
    ///
    /// Transport failures, or a server error such as 401/403.
    pub async fn list_users(&self) -> CoachResult<Vec<UserView>> {
        self.send(self.admin(Method::GET, "users")).await
    }

    /// Professionals waiting for approval.
    ///
    /// # Errors
    ///
    /// Transport failures, or a server error.
    pub async fn pending_professionals(&self) -> CoachResult<Vec<UserView>> {
        self.send(self.admin(Method::GET, "pending-professionals")).await
    }

    /// Approves a professional registration.
    ///
    /// # Errors
    ///
    /// Transport failures, or a server error (404 unknown user, 400 not a
    /// professional).
    pub async fn approve_professional(&self, id: UserId) -> CoachResult<UserView> {
        self.send(self.admin(Method::POST, &format!("approve/{id}"))).await
    }

    /// Removes a user and everything they own.
    ///
    /// # Errors
    ///
    /// Transport failures, or a server error.
    pub async fn remove_user(&self, id: UserId) -> CoachResult<UserView> {
        self.send(self.admin(Method::POST, &format!("remove/{id}"))).await
    }

    /// Runs the maintenance sweep now.
    ///
    /// # Errors
    ///
    /// Transport failures, or a server error.
    pub async fn run_sweep(&self) -> CoachResult<SweepReport> {
        self.send(self.admin(Method::POST, "sweep")).await
    }

    /// Adds a catalog exercise.
    ///
    /// # Errors
    ///
    /// Transport failures, or a server error (409 duplicate name).
    pub async fn add_exercise(&self, exercise: &NewExercise) -> CoachResult<Exercise> {
        self.send_json(self.admin(Method::POST, "exercises"), exercise).await
    }

    fn admin(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/admin/api/{path}", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn send_json<B, T>(&self, request: RequestBuilder, body: &B) -> CoachResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(request.json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> CoachResult<T> {
        let response = request.send().await.map_err(|e| TransportError::ConnectionFailed {
            message: e.to_string(),
        })?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| {
                TransportError::DeserializationFailed {
                    message: e.to_string(),
                }
                .into()
            })
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => format!("{}: {}", body.error, body.message),
        Err(_) if text.is_empty() => status.canonical_reason().unwrap_or("request failed").to_string(),
        Err(_) => text,
    };
    tracing::debug!(status = status.as_u16(), %message, "admin request failed");
    Err(TransportError::ServerError {
        status: status.as_u16(),
        message,
    })
}
