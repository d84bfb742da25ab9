//! Subcommand handlers.

pub mod account;
pub mod resources;
pub mod session;
