//! Storage layer
//!
//! Uses SQLite (embedded) for the relational store and a DashMap-backed
//! in-memory store for the cache.

pub mod db;
pub mod memory;

pub use db::{Database, NewUserRecord};
pub use memory::MemoryCache;
