//! Coursebook core library.
//!
//! Client-side session layer for a learning-management REST backend:
//! an API gateway that recovers from expired credentials with one shared
//! refresh, a session expiry monitor, typed resource calls, and a local cache.
//! Front ends (the CLI today) build on top of this crate.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod utils;

#[cfg(test)]
mod testutil;

pub use api::{ApiClient, ApiError};
pub use auth::{ExpiryMonitor, LogoutReason, MonitorState, Navigator, SessionContext};
pub use cache::CacheManager;
pub use config::Config;
