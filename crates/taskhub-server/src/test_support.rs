//! Shared test doubles

use std::time::Duration;

use async_trait::async_trait;
use taskhub_core::ports::CacheStore;
use taskhub_core::{Result, TaskhubError};

/// Cache store whose backend is permanently unreachable, for exercising
/// outage policies and fallback paths.
pub struct FailingCache;

impl FailingCache {
    fn offline<T>() -> Result<T> {
        Err(TaskhubError::Cache("cache backend offline".to_string()))
    }
}

#[async_trait]
impl CacheStore for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Self::offline()
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        Self::offline()
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Self::offline()
    }

    async fn increment(&self, _key: &str) -> Result<i64> {
        Self::offline()
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<()> {
        Self::offline()
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>> {
        Self::offline()
    }
}
