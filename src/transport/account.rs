//! Public routes and the caller's own account.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::{HealthResponse, MarkedRead, MeResponse, UnreadCount};
use crate::notification::{InboxEntry, InboxEntryId, InboxItem};
use crate::training::Exercise;
use crate::user::{Goal, ProfileUpdate, Registration, StudentProfile, UserView};

use super::{ApiError, AppState, Authenticated};

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let view = state
        .run(move |p| {
            let user = p.register(registration)?;
            p.user_view(user.id)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub(super) async fn professionals(State(state): State<AppState>) -> Result<Json<Vec<UserView>>, ApiError> {
    Ok(Json(state.run(|p| p.list_professionals()).await?))
}

pub(super) async fn me(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<MeResponse>, ApiError> {
    let landing = principal.landing_area();
    let user = state.run(move |p| p.user_view(principal.user_id)).await?;
    Ok(Json(MeResponse { user, landing }))
}

pub(super) async fn update_me(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserView>, ApiError> {
    let view = state
        .run(move |p| {
            let user = p.update_profile(principal.user_id, update)?;
            p.user_view(user.id)
        })
        .await?;
    Ok(Json(view))
}

pub(super) async fn update_goal(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Json(goal): Json<Goal>,
) -> Result<Json<StudentProfile>, ApiError> {
    Ok(Json(
        state
            .run(move |p| p.update_student_goal(principal.user_id, goal))
            .await?,
    ))
}

pub(super) async fn deactivate(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<UserView>, ApiError> {
    let view = state
        .run(move |p| {
            let user = p.request_deactivation(principal.user_id)?;
            p.user_view(user.id)
        })
        .await?;
    Ok(Json(view))
}

pub(super) async fn notifications(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<Vec<InboxItem>>, ApiError> {
    Ok(Json(state.run(move |p| p.inbox(principal.user_id)).await?))
}

pub(super) async fn unread(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<UnreadCount>, ApiError> {
    let unread = state.run(move |p| p.unread_count(principal.user_id)).await?;
    Ok(Json(UnreadCount { unread }))
}

pub(super) async fn read_all(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<MarkedRead>, ApiError> {
    let marked = state.run(move |p| p.mark_all_read(principal.user_id)).await?;
    Ok(Json(MarkedRead { marked }))
}

pub(super) async fn read_one(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<InboxEntryId>,
) -> Result<Json<InboxEntry>, ApiError> {
    Ok(Json(state.run(move |p| p.mark_read(id, principal.user_id)).await?))
}

pub(super) async fn exercises(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
) -> Result<Json<Vec<Exercise>>, ApiError> {
    Ok(Json(state.run(|p| p.list_exercises()).await?))
}
