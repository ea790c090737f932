//! Student dashboard: links, shared content and training logs.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::{LinkQuery, LinkRequest, LogTrainingRequest, StudentDashboard};
use crate::auth::Principal;
use crate::content::{Content, ContentFilter, ContentId};
use crate::error::{AccessError, ExecutionError};
use crate::link::{LinkId, StudentProfessionalLink};
use crate::training::{RoutineInstanceId, TrainingHistory, TrainingId};
use crate::user::{Role, UserId};

use super::{ApiError, AppState, Authenticated};

fn student(principal: &Principal) -> Result<UserId, ApiError> {
    principal.require_role(Role::Student)?;
    Ok(principal.user_id)
}

pub(super) async fn dashboard(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<StudentDashboard>, ApiError> {
    let me = student(&principal)?;
    let dashboard = state
        .run(move |p| {
            Ok(StudentDashboard {
                profile: p.user_view(me)?,
                links: p.links_for_student(me, &[])?,
                content: p.list_accessible_content(me, ContentFilter::All)?,
                routines: p.routine_instances_for_student(me)?,
                unread_notifications: p.unread_count(me)?,
            })
        })
        .await?;
    Ok(Json(dashboard))
}

pub(super) async fn content(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<ContentId>,
) -> Result<Json<Content>, ApiError> {
    let me = student(&principal)?;
    Ok(Json(state.run(move |p| p.content_for_student(id, me)).await?))
}

pub(super) async fn links(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Query(query): Query<LinkQuery>,
) -> Result<Json<Vec<StudentProfessionalLink>>, ApiError> {
    let me = student(&principal)?;
    Ok(Json(
        state
            .run(move |p| p.links_for_student(me, &query.statuses()))
            .await?,
    ))
}

pub(super) async fn request_links(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Json(request): Json<LinkRequest>,
) -> Result<(StatusCode, Json<Vec<StudentProfessionalLink>>), ApiError> {
    let me = student(&principal)?;
    let links = state
        .run(move |p| p.create_pending_links(me, &request.professionals))
        .await?;
    Ok((StatusCode::CREATED, Json(links)))
}

pub(super) async fn remove_link(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<LinkId>,
) -> Result<Json<StudentProfessionalLink>, ApiError> {
    let me = student(&principal)?;
    Ok(Json(state.run(move |p| p.remove_link(id, me)).await?))
}

pub(super) async fn log_training(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path((instance, training)): Path<(RoutineInstanceId, TrainingId)>,
    request: Option<Json<LogTrainingRequest>>,
) -> Result<(StatusCode, Json<TrainingHistory>), ApiError> {
    let me = student(&principal)?;
    let notes = request.map(|Json(r)| r.notes).unwrap_or_default();
    let entry = state
        .run(move |p| p.log_training(instance, training, notes, me))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub(super) async fn history(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(instance): Path<RoutineInstanceId>,
) -> Result<Json<Vec<TrainingHistory>>, ApiError> {
    let me = student(&principal)?;
    let history = state
        .run(move |p| {
            let assignment = p
                .get_routine_instance(instance)?
                .ok_or(ExecutionError::RoutineInstanceNotFound { id: instance })?;
            if assignment.student != me {
                return Err(AccessError::NotOwner {
                    user: me,
                    resource: format!("routine instance {instance}"),
                }
                .into());
            }
            p.history_for_instance(instance)
        })
        .await?;
    Ok(Json(history))
}
