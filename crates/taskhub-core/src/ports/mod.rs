//! Port traits (interfaces) for dependency injection

pub mod cache;
pub mod mailer;

pub use cache::CacheStore;
pub use mailer::Mailer;
