//! Business logic services

pub mod auth;
pub mod cache;
pub mod projects;
pub mod rate_limit;
pub mod tasks;
pub mod users;

pub use auth::AuthService;
pub use cache::EntityCache;
pub use projects::ProjectService;
pub use rate_limit::RateLimiter;
pub use tasks::TaskRunner;
pub use users::UserService;

/// Result of a committed write. `cache_degraded` means invalidation failed
/// and stale reads are possible until TTL expiry; the write itself stands.
#[derive(Debug)]
pub struct WriteOutcome<T> {
    pub entity: T,
    pub cache_degraded: bool,
}
