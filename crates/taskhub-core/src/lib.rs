//! Taskhub Core Library
//!
//! Domain types, port traits, the cache key namespace, and the shared error
//! taxonomy for the Taskhub backend.

pub mod error;
pub mod keys;
pub mod ports;
pub mod types;

pub use error::{Result, TaskhubError};
pub use keys::EntityKind;
pub use types::*;
