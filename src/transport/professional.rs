//! Professional dashboard: link requests, authored content and routine
//! assignment.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::{AssignRoutineRequest, ContentQuery, LinkQuery};
use crate::auth::Principal;
use crate::content::{Content, ContentDraft, ContentId, ContentKind};
use crate::error::AccessError;
use crate::link::{LinkId, StudentProfessionalLink};
use crate::training::RoutineInstance;

use super::{ApiError, AppState, Authenticated};

fn professional(principal: Principal) -> Result<Principal, ApiError> {
    principal.require_professional()?;
    Ok(principal)
}

pub(super) async fn links(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Query(query): Query<LinkQuery>,
) -> Result<Json<Vec<StudentProfessionalLink>>, ApiError> {
    let me = professional(principal)?.user_id;
    Ok(Json(
        state
            .run(move |p| p.links_for_professional(me, &query.statuses()))
            .await?,
    ))
}

pub(super) async fn accept_link(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<LinkId>,
) -> Result<Json<StudentProfessionalLink>, ApiError> {
    let me = professional(principal)?.user_id;
    Ok(Json(state.run(move |p| p.accept_link(id, me)).await?))
}

pub(super) async fn remove_link(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<LinkId>,
) -> Result<Json<StudentProfessionalLink>, ApiError> {
    let me = professional(principal)?.user_id;
    Ok(Json(state.run(move |p| p.remove_link(id, me)).await?))
}

pub(super) async fn list_content(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Vec<Content>>, ApiError> {
    let me = professional(principal)?.user_id;
    Ok(Json(
        state
            .run(move |p| p.list_content_by_creator(me, query.filter()))
            .await?,
    ))
}

pub(super) async fn create_content(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Json(draft): Json<ContentDraft>,
) -> Result<(StatusCode, Json<Content>), ApiError> {
    let me = professional(principal)?.user_id;
    let content = state.run(move |p| p.create_content(me, draft)).await?;
    Ok((StatusCode::CREATED, Json(content)))
}

pub(super) async fn get_content(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<ContentId>,
) -> Result<Json<Content>, ApiError> {
    let me = professional(principal)?.user_id;
    Ok(Json(state.run(move |p| p.content_for_author(id, me, None)).await?))
}

pub(super) async fn update_content(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<ContentId>,
    Json(draft): Json<ContentDraft>,
) -> Result<Json<Content>, ApiError> {
    let me = professional(principal)?.user_id;
    Ok(Json(state.run(move |p| p.update_content(id, draft, me)).await?))
}

pub(super) async fn delete_content(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<ContentId>,
) -> Result<Json<Content>, ApiError> {
    let me = professional(principal)?.user_id;
    Ok(Json(state.run(move |p| p.delete_content(id, me)).await?))
}

/// Assigns one of the caller's routines to a student linked with them.
pub(super) async fn assign_routine(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<ContentId>,
    Json(request): Json<AssignRoutineRequest>,
) -> Result<(StatusCode, Json<RoutineInstance>), ApiError> {
    let me = professional(principal)?.user_id;
    let instance = state
        .run(move |p| {
            p.content_for_author(id, me, Some(ContentKind::Routine))?;
            if !p.is_active_link(request.student, me)? {
                return Err(AccessError::NoActiveLink {
                    user: request.student,
                    professional: me,
                }
                .into());
            }
            p.assign_routine(request.student, id, request.start_date, request.end_date)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(instance)))
}
