use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::ErrorBody;
use crate::error::{AccessError, CoachError, ExecutionError, ValidationError};

/// A [`CoachError`] leaving through HTTP.
#[derive(Debug)]
pub struct ApiError(pub CoachError);

impl ApiError {
    /// Status code for the wrapped error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        status_from_coach_error(&self.0)
    }
}

fn status_from_coach_error(err: &CoachError) -> StatusCode {
    if err.is_unauthenticated() {
        StatusCode::UNAUTHORIZED
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_conflict() {
        StatusCode::CONFLICT
    } else if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if err.is_access() {
        StatusCode::FORBIDDEN
    } else if err.is_transport() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(%status, error = %self.0, "request rejected");
        }
        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"coachdesk\""),
            );
        }
        response
    }
}

impl From<CoachError> for ApiError {
    fn from(err: CoachError) -> Self {
        Self(err)
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        Self(err.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        Self(err.into())
    }
}
