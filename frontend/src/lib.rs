//! HTTP client for the tokenwarden API.
//!
//! UI code talks to the backend through [`api::ApiClient`], passing the
//! current [`state::auth::AuthSession`] explicitly so expired access tokens
//! can be renewed transparently.

pub mod api;
pub mod config;
pub mod state;
