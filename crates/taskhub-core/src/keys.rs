//! Cache key namespace
//!
//! Every cache key used by the backend is built here. The exact strings are
//! part of the external contract (other tooling inspects the cache by key),
//! so they must not drift.

use serde::{Deserialize, Serialize};

/// Entity kinds addressed by the cache-aside layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Project,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Project => "project",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `user:<id>` / `project:<id>`: single-entity snapshot.
pub fn entity(kind: EntityKind, id: i64) -> String {
    format!("{}:{}", kind.as_str(), id)
}

/// `users:all` / `projects:all`: whole-collection snapshot.
pub fn list(kind: EntityKind) -> String {
    format!("{}s:all", kind.as_str())
}

/// `rate_limit:<client_identity>`: fixed-window request counter.
pub fn rate_limit(identity: &str) -> String {
    format!("rate_limit:{identity}")
}

/// `session:<session_id>`: login session, value is the owning username.
pub fn session(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// `stats:hits:<kind>:<id>`: cache hit counter for one entity.
pub fn stat_hits(kind: EntityKind, id: i64) -> String {
    format!("stats:hits:{}:{}", kind.as_str(), id)
}

/// `stats:miss:<kind>:<id>`: cache miss counter for one entity.
pub fn stat_miss(kind: EntityKind, id: i64) -> String {
    format!("stats:miss:{}:{}", kind.as_str(), id)
}
