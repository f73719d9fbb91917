//! User handlers

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use taskhub_core::{NewUser, User, UserPatch};

use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::handlers::{parse_id_list, write_response};
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.list_all().await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.get_by_id(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct IdsQuery {
    /// Comma-separated ids, e.g. `?ids=1,2,3`.
    ids: String,
}

pub async fn get_by_ids(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<IdsQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let ids = parse_id_list(&query.ids)?;
    Ok(Json(state.users.get_by_ids(&ids).await?))
}

pub async fn create_bulk(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(batch): Json<Vec<NewUser>>,
) -> Result<Response, ApiError> {
    Ok(write_response(state.users.create_many(batch).await?))
}

pub async fn create(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<NewUser>,
) -> Result<Response, ApiError> {
    Ok(write_response(state.users.create(req).await?))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    Json(patch): Json<UserPatch>,
) -> Result<Response, ApiError> {
    Ok(write_response(state.users.update(id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(write_response(state.users.delete(id).await?))
}
