//! Utility functions for display formatting.

pub mod format;

pub use format::{format_countdown, format_date, format_file_size, format_optional, truncate_string};
