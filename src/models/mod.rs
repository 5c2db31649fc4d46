//! Core data models for the music backend.
//!
//! These entities map to database tables via `sqlx::FromRow` and serialize
//! as camelCase JSON via `serde`.

pub mod jamendo;
pub mod song;
pub mod user;
