//! Local caching module for offline reads.
//!
//! This module provides the `CacheManager` for storing and retrieving
//! resource lists locally. Data is cached in JSON format and considered
//! stale after a configurable number of minutes (60 by default).
//!
//! Cached data types include:
//! - Courses, Curriculums, Categories
//! - Notes (all, or per course)
//! - Todos (all, or per status)

pub mod manager;

pub use manager::{CacheManager, CachedData};
