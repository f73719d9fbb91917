//! HTTP error mapping
//!
//! One response shape for every failure: a JSON `detail` body plus the
//! status that matches the taxonomy. Rate-limit rejections also carry a
//! `Retry-After` header derived from the window's remaining TTL.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use taskhub_core::TaskhubError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub TaskhubError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TaskhubError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            TaskhubError::EntityNotFound { .. } => StatusCode::NOT_FOUND,
            TaskhubError::InvalidCredentials
            | TaskhubError::TokenMissing
            | TaskhubError::InvalidToken
            | TaskhubError::SessionMissing => StatusCode::UNAUTHORIZED,
            TaskhubError::UsernameExists
            | TaskhubError::EmailExists
            | TaskhubError::Validation(_) => StatusCode::BAD_REQUEST,
            TaskhubError::Database(_)
            | TaskhubError::Cache(_)
            | TaskhubError::Serialization(_)
            | TaskhubError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self.0);
        }

        let mut response = (status, Json(json!({ "detail": self.0.to_string() }))).into_response();

        if let TaskhubError::RateLimitExceeded { retry_after } = &self.0 {
            let secs = retry_after.as_secs().max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let resp = ApiError(TaskhubError::RateLimitExceeded {
            retry_after: Duration::from_secs(42),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            resp.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from(42_u64)
        );

        let resp = ApiError(TaskhubError::not_found(taskhub_core::EntityKind::User, 7))
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError(TaskhubError::SessionMissing).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = ApiError(TaskhubError::UsernameExists).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_retry_after_floor_is_one_second() {
        let resp = ApiError(TaskhubError::RateLimitExceeded {
            retry_after: Duration::from_millis(200),
        })
        .into_response();
        assert_eq!(
            resp.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from(1_u64)
        );
    }
}
