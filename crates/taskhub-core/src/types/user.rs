//! User types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Project;

/// User account with its owned projects embedded.
///
/// This is the shape that gets serialized under `user:<id>` and `users:all`,
/// so a project write must invalidate the owner's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// User creation payload (also used for registration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Partial user update. Unset fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
}
