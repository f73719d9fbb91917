//! HTTP handlers

pub mod auth;
pub mod projects;
pub mod users;

use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use taskhub_core::TaskhubError;

use crate::error::ApiError;
use crate::services::WriteOutcome;
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.db.ping().await {
        Ok(version) => Json(json!({ "status": "success", "version": version })),
        Err(e) => Json(json!({ "status": "error", "message": e.to_string() })),
    }
}

/// Parses a comma-separated id list from a query string value.
pub(crate) fn parse_id_list(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ApiError(TaskhubError::Validation(format!("invalid id: {s}"))))
        })
        .collect()
}

/// Renders a committed write. A degraded cache invalidation does not fail
/// the request; it is surfaced as a Warning header on the 200 response.
pub(crate) fn write_response<T: Serialize>(outcome: WriteOutcome<T>) -> Response {
    let mut response = Json(outcome.entity).into_response();
    if outcome.cache_degraded {
        response.headers_mut().insert(
            header::WARNING,
            HeaderValue::from_static(
                "199 - \"cache invalidation failed, stale reads possible until TTL expiry\"",
            ),
        );
    }
    response
}
