//! Data models shared across database access and API handlers.

pub mod refresh_token;
pub mod user;
