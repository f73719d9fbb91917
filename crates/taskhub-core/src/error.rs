//! Error types for Taskhub

use std::time::Duration;

use thiserror::Error;

use crate::keys::EntityKind;

pub type Result<T> = std::result::Result<T, TaskhubError>;

#[derive(Error, Debug)]
pub enum TaskhubError {
    #[error("too many requests")]
    RateLimitExceeded { retry_after: Duration },

    #[error("{kind} {id} not found")]
    EntityNotFound { kind: EntityKind, id: i64 },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token missing")]
    TokenMissing,

    #[error("invalid token")]
    InvalidToken,

    #[error("session missing")]
    SessionMissing,

    #[error("username exists")]
    UsernameExists,

    #[error("email exists")]
    EmailExists,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("password hash error: {0}")]
    PasswordHash(String),
}

impl TaskhubError {
    pub fn database(e: impl std::fmt::Display) -> Self {
        TaskhubError::Database(e.to_string())
    }

    pub fn cache(e: impl std::fmt::Display) -> Self {
        TaskhubError::Cache(e.to_string())
    }

    pub fn not_found(kind: EntityKind, id: i64) -> Self {
        TaskhubError::EntityNotFound { kind, id }
    }
}

impl From<serde_json::Error> for TaskhubError {
    fn from(e: serde_json::Error) -> Self {
        TaskhubError::Serialization(e.to_string())
    }
}
