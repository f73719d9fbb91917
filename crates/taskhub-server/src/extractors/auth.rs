//! Auth extractor for protected routes

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use taskhub_core::{TaskhubError, User};

use crate::error::ApiError;
use crate::AppState;

/// The authenticated principal, resolved from the bearer token and the live
/// session behind it.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError(TaskhubError::TokenMissing))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError(TaskhubError::TokenMissing))?;

        let user = state.auth.authenticate(token).await?;
        Ok(AuthUser(user))
    }
}
