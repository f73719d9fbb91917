//! In-memory cache store using DashMap
//!
//! Implements the `CacheStore` port: TTL'd values plus the atomic counter
//! operations the rate limiter needs. Expired entries are evicted lazily on
//! read and swept periodically in the background.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use taskhub_core::ports::CacheStore;
use taskhub_core::Result;

pub struct MemoryCache {
    data: Arc<DashMap<String, CacheEntry>>,
}

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        let cache = Self {
            data: Arc::new(DashMap::new()),
        };

        cache.start_cleanup_task();

        cache
    }

    fn start_cleanup_task(&self) {
        let data = self.data.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;

                let now = Instant::now();
                let expired_keys: Vec<String> = data
                    .iter()
                    .filter(|entry| entry.expired(now))
                    .map(|entry| entry.key().clone())
                    .collect();

                for key in expired_keys {
                    data.remove(&key);
                }
            }
        });
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).and_then(|entry| {
            if entry.expired(Instant::now()) {
                drop(entry);
                self.data.remove(key);
                return None;
            }
            Some(entry.value.clone())
        }))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.data.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry {
                value: b"0".to_vec(),
                expires_at: None,
            });

        // An expired counter behaves as absent: reset to a fresh, TTL-less
        // entry so the caller re-arms the window.
        if entry.expired(Instant::now()) {
            entry.value = b"0".to_vec();
            entry.expires_at = None;
        }

        let current: i64 = std::str::from_utf8(&entry.value)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        let next = current + 1;
        entry.value = next.to_string().into_bytes();

        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        if let Some(mut entry) = self.data.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        Ok(self.data.get(key).and_then(|entry| {
            if entry.expired(now) {
                return None;
            }
            entry
                .expires_at
                .map(|at| at.saturating_duration_since(now))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let cache = MemoryCache::new();

        cache
            .set("key1", vec![1, 2, 3], Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("key1").await.unwrap(), Some(vec![1, 2, 3]));

        assert_eq!(cache.get("nonexistent").await.unwrap(), None);

        cache.delete("key1").await.unwrap();
        assert_eq!(cache.get("key1").await.unwrap(), None);

        // Deleting an absent key is a no-op
        cache.delete("key1").await.unwrap();
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = MemoryCache::new();

        cache
            .set("key1", vec![1, 2, 3], Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(cache.get("key1").await.unwrap(), Some(vec![1, 2, 3]));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_increment_and_expire() {
        let cache = MemoryCache::new();

        assert_eq!(cache.increment("counter").await.unwrap(), 1);
        assert_eq!(cache.increment("counter").await.unwrap(), 2);
        assert_eq!(cache.increment("counter").await.unwrap(), 3);

        // Counter created by increment has no expiry until one is set
        assert_eq!(cache.ttl("counter").await.unwrap(), None);

        cache
            .expire("counter", Duration::from_millis(10))
            .await
            .unwrap();
        assert!(cache.ttl("counter").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;
        // Expired counter restarts at 1
        assert_eq!(cache.increment("counter").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ttl_of_absent_key() {
        let cache = MemoryCache::new();
        assert_eq!(cache.ttl("missing").await.unwrap(), None);
    }
}
