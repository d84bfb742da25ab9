use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{Category, Course, Curriculum, Note, Todo, TodoStatus};

/// Consider cache stale after 1 hour unless configured otherwise.
pub const DEFAULT_STALE_MINUTES: i64 = 60;

const COURSES: &str = "courses";
const NOTES: &str = "notes";
const TODOS: &str = "todos";
const CURRICULUMS: &str = "curriculums";
const CATEGORIES: &str = "categories";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Clock skew lands here too
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            // 1h 30m+ rounds up to 2h
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self, max_age_minutes: i64) -> bool {
        self.age_minutes() > max_age_minutes
    }
}

/// JSON file per list under the cache directory. Mutations invalidate the
/// affected lists; logout clears everything.
pub struct CacheManager {
    cache_dir: PathBuf,
    stale_minutes: i64,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf, stale_minutes: i64) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        Ok(Self {
            cache_dir,
            stale_minutes,
        })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(self.cache_path(name), contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        debug!(name, "Cache saved");
        Ok(())
    }

    /// Cached value when present and younger than the stale threshold.
    /// Unreadable entries count as missing.
    pub fn fresh<T: DeserializeOwned>(&self, name: &str) -> Option<CachedData<T>> {
        match self.load::<T>(name) {
            Ok(Some(cached)) if !cached.is_stale(self.stale_minutes) => Some(cached),
            Ok(_) => None,
            Err(e) => {
                debug!(name, error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Remove a list and every keyed variant of it (`notes`, `notes_course_3`, ...).
    pub fn invalidate(&self, name: &str) -> Result<()> {
        let variant_prefix = format!("{}_", name);
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if is_json && (stem == name || stem.starts_with(&variant_prefix)) {
                std::fs::remove_file(&path)?;
                debug!(entry = stem, "Cache invalidated");
            }
        }
        Ok(())
    }

    /// Drop every cached list, e.g. when the user changes.
    pub fn clear(&self) -> Result<()> {
        for name in [COURSES, NOTES, TODOS, CURRICULUMS, CATEGORIES] {
            self.invalidate(name)?;
        }
        Ok(())
    }

    // ===== Courses =====

    pub fn load_courses(&self) -> Option<CachedData<Vec<Course>>> {
        self.fresh(COURSES)
    }

    pub fn save_courses(&self, courses: &[Course]) -> Result<()> {
        self.save(COURSES, &courses)
    }

    pub fn invalidate_courses(&self) -> Result<()> {
        // Curriculums embed their courses
        self.invalidate(COURSES)?;
        self.invalidate(CURRICULUMS)
    }

    // ===== Notes =====

    fn notes_key(course_id: Option<i64>) -> String {
        match course_id {
            Some(id) => format!("{}_course_{}", NOTES, id),
            None => NOTES.to_string(),
        }
    }

    pub fn load_notes(&self, course_id: Option<i64>) -> Option<CachedData<Vec<Note>>> {
        self.fresh(&Self::notes_key(course_id))
    }

    pub fn save_notes(&self, course_id: Option<i64>, notes: &[Note]) -> Result<()> {
        self.save(&Self::notes_key(course_id), &notes)
    }

    pub fn invalidate_notes(&self) -> Result<()> {
        self.invalidate(NOTES)
    }

    // ===== Todos =====

    fn todos_key(status: Option<TodoStatus>) -> String {
        match status {
            Some(status) => format!("{}_{}", TODOS, status.as_str()),
            None => TODOS.to_string(),
        }
    }

    pub fn load_todos(&self, status: Option<TodoStatus>) -> Option<CachedData<Vec<Todo>>> {
        self.fresh(&Self::todos_key(status))
    }

    pub fn save_todos(&self, status: Option<TodoStatus>, todos: &[Todo]) -> Result<()> {
        self.save(&Self::todos_key(status), &todos)
    }

    pub fn invalidate_todos(&self) -> Result<()> {
        self.invalidate(TODOS)
    }

    // ===== Curriculums =====

    pub fn load_curriculums(&self) -> Option<CachedData<Vec<Curriculum>>> {
        self.fresh(CURRICULUMS)
    }

    pub fn save_curriculums(&self, curriculums: &[Curriculum]) -> Result<()> {
        self.save(CURRICULUMS, &curriculums)
    }

    pub fn invalidate_curriculums(&self) -> Result<()> {
        self.invalidate(CURRICULUMS)
    }

    // ===== Categories =====

    pub fn load_categories(&self) -> Option<CachedData<Vec<Category>>> {
        self.fresh(CATEGORIES)
    }

    pub fn save_categories(&self, categories: &[Category]) -> Result<()> {
        self.save(CATEGORIES, &categories)
    }

    pub fn invalidate_categories(&self) -> Result<()> {
        self.invalidate(CATEGORIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn category(id: i64, name: &str) -> Category {
        serde_json::from_value(serde_json::json!({ "id": id, "userId": 1, "name": name })).unwrap()
    }

    #[test]
    fn test_cached_data_age_display() {
        let mut cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");

        cached.cached_at = Utc::now() - Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");

        cached.cached_at = Utc::now() - Duration::hours(30);
        assert_eq!(cached.age_display(), "1d ago");

        // Future timestamps from clock skew
        cached.cached_at = Utc::now() + Duration::minutes(5);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_is_stale() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_stale(DEFAULT_STALE_MINUTES));

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - Duration::minutes(61);
        assert!(old.is_stale(DEFAULT_STALE_MINUTES));
        assert!(!old.is_stale(120));
    }

    #[test]
    fn test_save_and_load_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().join("cache"), DEFAULT_STALE_MINUTES).unwrap();

        assert!(cache.load_categories().is_none());
        cache.save_categories(&[category(1, "Systems")]).unwrap();

        let cached = cache.load_categories().unwrap();
        assert_eq!(cached.data[0].name, "Systems");
    }

    #[test]
    fn test_stale_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf(), 0).unwrap();

        let mut old = CachedData::new(vec![category(1, "Old")]);
        old.cached_at = Utc::now() - Duration::minutes(5);
        std::fs::write(cache.cache_path(CATEGORIES), serde_json::to_string(&old).unwrap()).unwrap();

        assert!(cache.load_categories().is_none());
    }

    #[test]
    fn test_corrupt_entry_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf(), DEFAULT_STALE_MINUTES).unwrap();
        std::fs::write(cache.cache_path(COURSES), "{not json").unwrap();

        assert!(cache.load_courses().is_none());
    }

    #[test]
    fn test_invalidate_removes_keyed_variants() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf(), DEFAULT_STALE_MINUTES).unwrap();

        cache.save_todos(None, &[]).unwrap();
        cache.save_todos(Some(TodoStatus::Pending), &[]).unwrap();
        cache.save_notes(Some(3), &[]).unwrap();

        cache.invalidate_todos().unwrap();

        assert!(cache.load_todos(None).is_none());
        assert!(cache.load_todos(Some(TodoStatus::Pending)).is_none());
        assert!(cache.load_notes(Some(3)).is_some());

        cache.clear().unwrap();
        assert!(cache.load_notes(Some(3)).is_none());
    }
}
