//! Authentication handlers

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use taskhub_core::{NewUser, User};
use tracing::info;

use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::handlers::write_response;
use crate::services::auth::AuthTokens;
use crate::services::tasks::Job;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<NewUser>,
) -> Result<Response, ApiError> {
    info!("registration attempt for {}", req.username);

    let email = req.email.clone();
    let username = req.username.clone();
    let outcome = state.users.create(req).await?;

    state.tasks.enqueue(Job::WelcomeEmail {
        to: email,
        username,
    });

    Ok(write_response(outcome))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthTokens>, ApiError> {
    info!("login attempt for {}", req.username);
    let tokens = state.auth.login(&req.username, &req.password).await?;
    Ok(Json(tokens))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}
