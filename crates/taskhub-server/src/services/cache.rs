//! Cache-aside layer for read-heavy entities
//!
//! Read-through with TTL-bounded staleness plus write-invalidation. Writes
//! never repopulate the cache; they delete the keys a committed write could
//! have made stale, enumerated by [`WriteTouch`]. A cache failure on the
//! read path falls back to the database; a failure during invalidation is
//! reported to the caller as a degraded (but successful) write.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use taskhub_core::ports::CacheStore;
use taskhub_core::{keys, EntityKind, Result};
use tracing::{debug, warn};

pub const DEFAULT_ENTITY_TTL: Duration = Duration::from_secs(300);

/// The set of cache keys a single committed write can make stale.
///
/// Invalidation fan-out between entity kinds is declared here, in one place:
/// user snapshots embed the owner's project list, so any project write
/// touches its `person_in_charge` user; deleting a user cascades to its
/// projects, so any user write touches the project aggregate.
#[derive(Debug, Clone)]
pub struct WriteTouch {
    pub kind: EntityKind,
    pub id: i64,
    pub related_users: Vec<i64>,
}

impl WriteTouch {
    pub fn user(id: i64) -> Self {
        Self {
            kind: EntityKind::User,
            id,
            related_users: Vec::new(),
        }
    }

    pub fn project(id: i64, person_in_charge: i64) -> Self {
        Self {
            kind: EntityKind::Project,
            id,
            related_users: vec![person_in_charge],
        }
    }

    /// The full key fan-out for this write.
    pub fn keys(&self) -> Vec<String> {
        let mut out = vec![keys::entity(self.kind, self.id), keys::list(self.kind)];
        match self.kind {
            EntityKind::Project => {
                for user_id in &self.related_users {
                    out.push(keys::entity(EntityKind::User, *user_id));
                }
                out.push(keys::list(EntityKind::User));
            }
            EntityKind::User => {
                out.push(keys::list(EntityKind::Project));
            }
        }
        out
    }
}

pub struct EntityCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl EntityCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Read-through lookup of a single entity under `<kind>:<id>`.
    ///
    /// Hit and miss counters are recorded best-effort; a not-found result is
    /// never cached, so a later create of the same id is immediately
    /// visible.
    pub async fn read_entity<T, F, Fut>(
        &self,
        kind: EntityKind,
        id: i64,
        load: F,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let key = keys::entity(kind, id);
        if let Some(value) = self.cached(&key).await {
            self.bump_stat(keys::stat_hits(kind, id)).await;
            return Ok(Some(value));
        }

        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.bump_stat(keys::stat_miss(kind, id)).await;
            self.populate(&key, value).await;
        }
        Ok(loaded)
    }

    /// Read-through lookup of the whole collection under `<kind>s:all`.
    /// The aggregate tolerates TTL-bounded staleness; it is invalidated
    /// wholesale on any write of the kind.
    pub async fn read_list<T, F, Fut>(&self, kind: EntityKind, load: F) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        let key = keys::list(kind);
        if let Some(value) = self.cached(&key).await {
            return Ok(value);
        }

        let loaded = load().await?;
        self.populate(&key, &loaded).await;
        Ok(loaded)
    }

    /// Deletes every key the write could have made stale. Idempotent:
    /// deleting absent keys is a no-op. Returns `true` if any delete failed,
    /// meaning stale reads are possible until TTL expiry.
    pub async fn invalidate(&self, touch: &WriteTouch) -> bool {
        let mut degraded = false;
        for key in touch.keys() {
            if let Err(e) = self.store.delete(&key).await {
                warn!("cache invalidation failed for {key}: {e}");
                degraded = true;
            }
        }
        degraded
    }

    /// Cache lookup that never fails the request: backend errors and
    /// undecodable entries both read as a miss.
    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("cache read failed for {key}: {e}; falling back to database");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("dropping undecodable cache entry {key}: {e}");
                let _ = self.store.delete(key).await;
                None
            }
        }
    }

    async fn populate<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_vec(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("cache serialization failed for {key}: {e}");
                return;
            }
        };
        if let Err(e) = self.store.set(key, raw, self.ttl).await {
            warn!("cache population failed for {key}: {e}");
        }
    }

    async fn bump_stat(&self, key: String) {
        // Observability must not break the read path
        if let Err(e) = self.store.increment(&key).await {
            debug!("stat counter {key} not recorded: {e}");
        }
    }
}
