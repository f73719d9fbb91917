//! Fixed-window rate limiter backed by the cache store
//!
//! Every inbound request atomically increments `rate_limit:<identity>`. The
//! first increment of a window arms its expiry; a count above the cap
//! rejects with a retry-after hint taken from the remaining TTL. Rejected
//! requests still count, so hammering a closed window never shortens the
//! wait.
//!
//! The increment and the expiry-set are two independent cache operations. If
//! the process dies between them the counter would never expire, so the
//! reject path re-arms the expiry whenever it finds a counter without one.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use taskhub_core::ports::CacheStore;
use taskhub_core::{keys, TaskhubError};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// What to do when the cache backend is unreachable. The default admits
/// traffic unmetered rather than turning a cache outage into a full outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutagePolicy {
    #[default]
    FailOpen,
    FailClosed,
}

impl OutagePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fail_open" => Some(OutagePolicy::FailOpen),
            "fail_closed" => Some(OutagePolicy::FailClosed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject { retry_after: Duration },
}

pub struct RateLimiter {
    cache: Arc<dyn CacheStore>,
    max_requests: i64,
    window: Duration,
    outage_policy: OutagePolicy,
}

impl RateLimiter {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        max_requests: i64,
        window: Duration,
        outage_policy: OutagePolicy,
    ) -> Self {
        Self {
            cache,
            max_requests,
            window,
            outage_policy,
        }
    }

    pub async fn check_and_record(&self, identity: &str) -> Decision {
        let key = keys::rate_limit(identity);

        let count = match self.cache.increment(&key).await {
            Ok(count) => count,
            Err(e) => {
                warn!("rate limiter backend unreachable ({e}), policy {:?}", self.outage_policy);
                return match self.outage_policy {
                    OutagePolicy::FailOpen => Decision::Allow,
                    OutagePolicy::FailClosed => Decision::Reject {
                        retry_after: self.window,
                    },
                };
            }
        };

        if count == 1 {
            // Fresh window: arm its expiry
            if let Err(e) = self.cache.expire(&key, self.window).await {
                warn!("failed to arm rate limit window for {identity}: {e}");
            }
        }

        if count > self.max_requests {
            let retry_after = match self.cache.ttl(&key).await {
                Ok(Some(remaining)) => remaining,
                Ok(None) => {
                    // Counter with no expiry: the incr/expire pair was torn.
                    // Re-arm so the window cannot outlive its length.
                    let _ = self.cache.expire(&key, self.window).await;
                    self.window
                }
                Err(_) => self.window,
            };
            return Decision::Reject { retry_after };
        }

        Decision::Allow
    }
}

/// Axum middleware applying the limiter to every request, keyed by client IP.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let identity = addr.ip().to_string();
    match state.rate_limiter.check_and_record(&identity).await {
        Decision::Allow => next.run(request).await,
        Decision::Reject { retry_after } => {
            ApiError::from(TaskhubError::RateLimitExceeded { retry_after }).into_response()
        }
    }
}
