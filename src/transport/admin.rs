//! Administrator API, also used by the `coachdesk-admin` client.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::NewExercise;
use crate::auth::Principal;
use crate::error::{CoachResult, ExecutionError};
use crate::platform::Platform;
use crate::schedule::SweepReport;
use crate::training::Exercise;
use crate::user::{Role, User, UserId, UserView};

use super::{ApiError, AppState, Authenticated};

fn administrator(principal: &Principal) -> Result<(), ApiError> {
    principal.require_role(Role::Administrator)?;
    Ok(())
}

fn views(platform: &Platform, users: &[User]) -> CoachResult<Vec<UserView>> {
    users.iter().map(|u| platform.user_view(u.id)).collect()
}

pub(super) async fn users(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<Vec<UserView>>, ApiError> {
    administrator(&principal)?;
    Ok(Json(state.run(|p| views(p, &p.list_users()?)).await?))
}

pub(super) async fn pending_professionals(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<Vec<UserView>>, ApiError> {
    administrator(&principal)?;
    Ok(Json(state.run(|p| views(p, &p.pending_professionals()?)).await?))
}

pub(super) async fn approve(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<UserId>,
) -> Result<Json<UserView>, ApiError> {
    administrator(&principal)?;
    let view = state
        .run(move |p| {
            p.approve_professional(id)?;
            p.user_view(id)
        })
        .await?;
    Ok(Json(view))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<UserId>,
) -> Result<Json<UserView>, ApiError> {
    administrator(&principal)?;
    if id == principal.user_id {
        return Err(ExecutionError::InvalidState {
            reason: "administrators cannot remove their own account".to_string(),
        }
        .into());
    }
    let view = state
        .run(move |p| {
            let view = p.user_view(id)?;
            p.remove_user(id)?;
            Ok(view)
        })
        .await?;
    Ok(Json(view))
}

pub(super) async fn sweep(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<SweepReport>, ApiError> {
    administrator(&principal)?;
    tracing::info!(target: "audit", admin = %principal.username, "sweep triggered manually");
    Ok(Json(state.run(|p| p.run_sweep()).await?))
}

pub(super) async fn add_exercise(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Json(request): Json<NewExercise>,
) -> Result<(StatusCode, Json<Exercise>), ApiError> {
    administrator(&principal)?;
    let exercise = state
        .run(move |p| p.add_exercise(request.into_exercise()))
        .await?;
    Ok((StatusCode::CREATED, Json(exercise)))
}
