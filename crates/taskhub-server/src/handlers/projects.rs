//! Project handlers

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use taskhub_core::{NewProject, Project, ProjectPatch};

use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::handlers::write_response;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.projects.list_all().await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.projects.get_by_id(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<NewProject>,
) -> Result<Response, ApiError> {
    Ok(write_response(state.projects.create(req).await?))
}

pub async fn create_bulk(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(batch): Json<Vec<NewProject>>,
) -> Result<Response, ApiError> {
    Ok(write_response(state.projects.create_many(batch).await?))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    Json(patch): Json<ProjectPatch>,
) -> Result<Response, ApiError> {
    Ok(write_response(state.projects.update(id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(write_response(state.projects.delete(id).await?))
}
