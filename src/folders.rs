//! Watched-Folder Manager: registration of directories that are indexed
//! repeatedly.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::db::{CatalogStore, WatchedFolder};
use crate::error::{CatalogError, Result};
use crate::scanner::canonical_dir;

pub struct WatchedFolders {
    store: Arc<dyn CatalogStore>,
}

impl WatchedFolders {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Register `path` (stored in canonical form). An empty `name` defaults
    /// to the last path segment. Registering a folder again replaces its
    /// name and auto-reindex flag but keeps its index statistics.
    pub fn add(&self, path: &Path, name: &str, auto_reindex: bool) -> Result<WatchedFolder> {
        let canonical = canonical_dir(path)?;
        self.store.ensure_ready()?;

        let name = match name.trim() {
            "" => canonical
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| canonical.to_string_lossy().to_string()),
            given => given.to_string(),
        };
        let key = canonical.to_string_lossy().to_string();

        self.store.upsert_watched_folder(&WatchedFolder {
            path: key.clone(),
            name,
            added_at: Utc::now(),
            last_indexed_at: None,
            picture_count: 0,
            auto_reindex,
        })?;
        info!("Watching {}", key);

        self.store
            .find_watched_folder(&key)?
            .ok_or_else(|| CatalogError::not_found(format!("watched folder {}", key)))
    }

    /// Stop watching `path`. Pictures already indexed stay in the catalog.
    pub fn remove(&self, path: &str) -> Result<()> {
        let key = lookup_key(path);
        if !self.store.delete_watched_folder(&key)? {
            return Err(CatalogError::not_found(format!("watched folder {}", path)));
        }
        info!("Stopped watching {}", key);
        Ok(())
    }

    pub fn update(&self, path: &str, name: &str, auto_reindex: bool) -> Result<()> {
        let key = lookup_key(path);
        if !self.store.update_watched_folder(&key, name, auto_reindex)? {
            return Err(CatalogError::not_found(format!("watched folder {}", path)));
        }
        Ok(())
    }

    /// The registration for `path`, if any.
    pub fn find(&self, path: &str) -> Result<Option<WatchedFolder>> {
        self.store.find_watched_folder(&lookup_key(path))
    }

    pub fn list(&self) -> Result<Vec<WatchedFolder>> {
        self.store.all_watched_folders()
    }
}

/// Registered folders are keyed by canonical path; fall back to the literal
/// path when the directory no longer exists.
fn lookup_key(path: &str) -> String {
    Path::new(path)
        .canonicalize()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::tempdir;

    fn manager() -> (Arc<dyn CatalogStore>, WatchedFolders) {
        let store = db::open_in_memory().unwrap();
        (store.clone(), WatchedFolders::new(store))
    }

    #[test]
    fn test_add_canonicalizes_and_defaults_name() {
        let dir = tempdir().unwrap();
        let holidays = dir.path().join("Holidays");
        std::fs::create_dir(&holidays).unwrap();
        let (_, folders) = manager();

        let folder = folders.add(&holidays.join("."), "  ", true).unwrap();
        assert_eq!(folder.name, "Holidays");
        assert_eq!(Path::new(&folder.path), holidays.canonicalize().unwrap());
        assert!(folder.auto_reindex);
        assert_eq!(folders.list().unwrap().len(), 1);
    }

    #[test]
    fn test_add_missing_directory_is_invalid() {
        let dir = tempdir().unwrap();
        let (_, folders) = manager();

        let err = folders.add(&dir.path().join("missing"), "x", false).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidPath(_)));
    }

    #[test]
    fn test_re_adding_replaces_name_only() {
        let dir = tempdir().unwrap();
        let (store, folders) = manager();

        let first = folders.add(dir.path(), "Old", false).unwrap();
        store
            .record_index_stats(&first.path, Utc::now(), 12)
            .unwrap();

        let second = folders.add(dir.path(), "New", true).unwrap();
        assert_eq!(second.name, "New");
        assert!(second.auto_reindex);
        assert_eq!(second.picture_count, 12);
        assert_eq!(folders.list().unwrap().len(), 1);
    }

    #[test]
    fn test_update_and_remove() {
        let dir = tempdir().unwrap();
        let (_, folders) = manager();
        let folder = folders.add(dir.path(), "Photos", false).unwrap();

        folders.update(&folder.path, "Archive", true).unwrap();
        let found = folders.find(&dir.path().to_string_lossy()).unwrap().unwrap();
        assert_eq!(found.path, folder.path);
        let listed = &folders.list().unwrap()[0];
        assert_eq!(listed.name, "Archive");
        assert!(listed.auto_reindex);

        folders.remove(&folder.path).unwrap();
        assert!(folders.list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_folder_is_not_found() {
        let (_, folders) = manager();
        assert!(folders.find("/nowhere").unwrap().is_none());
        assert!(folders.remove("/nowhere").unwrap_err().is_not_found());
        assert!(folders.update("/nowhere", "x", false).unwrap_err().is_not_found());
    }
}
