//! Cache store port
//!
//! Key/value store with TTL and atomic increment. No transactional guarantee
//! across keys is assumed; callers must stay correct under independent
//! application of each operation.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a key. `Ok(None)` means absent (or expired).
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value with a relative TTL measured from this write.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Delete a key. Deleting an absent key is a no-op, not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomically increment an integer counter, creating it at 1 with no
    /// expiry if absent. Returns the post-increment value.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Set a relative expiry on an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Remaining time to live. `Ok(None)` if the key is absent or has no
    /// expiry set.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
}
