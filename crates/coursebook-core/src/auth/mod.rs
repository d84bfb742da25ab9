//! Authentication module for session state, expiry, and credentials.
//!
//! This module provides:
//! - `SessionContext`: the shared session record and the single in-flight refresh
//! - `ExpiryMonitor`: deadline polling, the expiry warning, extension, forced logout
//! - `CredentialStore`: OS keychain storage for the bearer-mode refresh credential
//!
//! The session is memory-only; in cookie mode the server holds the credentials.

pub mod credentials;
pub mod expiry;
pub mod session;

pub use credentials::CredentialStore;
pub use expiry::{ExpiryMonitor, MonitorState, MonitorStatus};
pub use session::{LogoutReason, Navigator, SessionContext, SessionSnapshot};
