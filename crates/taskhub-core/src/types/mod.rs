//! Domain types

pub mod project;
pub mod user;

pub use project::*;
pub use user::*;
