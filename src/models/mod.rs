//! Data models for the coordination backend.
//!
//! Field names serialize in camelCase to match the web client's records.

mod post;
mod sheet_config;
mod squad;
mod user;

pub use post::*;
pub use sheet_config::*;
pub use squad::*;
pub use user::*;
