//! Change detection for files in a directory tree.
//!
//! Detects new and modified files by comparing filesystem state against
//! the catalog records. The modification time is the only signal: no
//! content hashing, and any drift from the stored value counts as a change.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use super::discovery::discover_images;
use crate::db::{CatalogStore, Picture};
use crate::error::Result;

/// Result of detecting changes in a directory.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetectionResult {
    /// Files that exist on disk but not in the catalog.
    pub new_files: Vec<PathBuf>,
    /// Files whose mtime on disk differs from the catalog record.
    pub modified_files: Vec<PathBuf>,
}

impl ChangeDetectionResult {
    /// Check if there are any changes detected.
    pub fn has_changes(&self) -> bool {
        !self.new_files.is_empty() || !self.modified_files.is_empty()
    }

    /// Total number of changes (new + modified).
    pub fn total_count(&self) -> usize {
        self.new_files.len() + self.modified_files.len()
    }
}

/// A file must be (re)indexed unless a record exists with exactly the same
/// modification time.
pub fn needs_reindex(existing: Option<&Picture>, modified_at: &DateTime<Utc>) -> bool {
    match existing {
        Some(picture) => picture.modified_at != *modified_at,
        None => true,
    }
}

pub fn file_modified_at(path: &Path) -> Result<DateTime<Utc>> {
    Ok(std::fs::metadata(path)?.modified()?.into())
}

/// Walk `directory` recursively and classify each supported image against
/// the catalog without indexing anything.
pub fn detect_changes(
    directory: &Path,
    store: &dyn CatalogStore,
    extensions: &[String],
    follow_links: bool,
) -> Result<ChangeDetectionResult> {
    store.ensure_ready()?;

    let mut result = ChangeDetectionResult::default();

    for path in discover_images(directory, extensions, follow_links) {
        let path_str = path.to_string_lossy();
        let existing = store.find_picture(&path_str)?;

        let modified_at = match file_modified_at(&path) {
            Ok(time) => time,
            // Vanished between the walk and the stat
            Err(_) => continue,
        };

        if !needs_reindex(existing.as_ref(), &modified_at) {
            continue;
        }

        if existing.is_some() {
            result.modified_files.push(path);
        } else {
            result.new_files.push(path);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::Duration;
    use std::fs::File;
    use tempfile::tempdir;

    fn picture(path: &Path, modified_at: DateTime<Utc>) -> Picture {
        Picture {
            path: path.to_string_lossy().to_string(),
            filename: "x.jpg".to_string(),
            size_bytes: 0,
            width: 1,
            height: 1,
            created_at: modified_at,
            modified_at,
            indexed_at: Utc::now(),
            thumbnail_path: None,
        }
    }

    #[test]
    fn test_change_detection_result() {
        let result = ChangeDetectionResult {
            new_files: vec![PathBuf::from("/test/a.jpg")],
            modified_files: vec![PathBuf::from("/test/b.jpg"), PathBuf::from("/test/c.jpg")],
        };

        assert!(result.has_changes());
        assert_eq!(result.total_count(), 3);
    }

    #[test]
    fn test_empty_result() {
        let result = ChangeDetectionResult::default();
        assert!(!result.has_changes());
        assert_eq!(result.total_count(), 0);
    }

    #[test]
    fn test_needs_reindex_is_exact() {
        let now = Utc::now();
        let existing = picture(Path::new("/p/a.jpg"), now);

        assert!(needs_reindex(None, &now));
        assert!(!needs_reindex(Some(&existing), &now));
        assert!(needs_reindex(Some(&existing), &(now + Duration::nanoseconds(1))));
        assert!(needs_reindex(Some(&existing), &(now - Duration::seconds(5))));
    }

    #[test]
    fn test_detect_changes_classifies_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let unchanged = dir.path().join("same.jpg");
        let modified = dir.path().join("nested/edited.jpg");
        let fresh = dir.path().join("nested/new.png");
        for path in [&unchanged, &modified, &fresh] {
            File::create(path).unwrap();
        }

        let store = db::open_in_memory().unwrap();
        store
            .upsert_picture(&picture(&unchanged, file_modified_at(&unchanged).unwrap()))
            .unwrap();
        let stale = file_modified_at(&modified).unwrap() - Duration::seconds(10);
        store.upsert_picture(&picture(&modified, stale)).unwrap();

        let extensions = vec!["jpg".to_string(), "png".to_string()];
        let changes = detect_changes(dir.path(), store.as_ref(), &extensions, false).unwrap();

        assert_eq!(changes.new_files, vec![fresh]);
        assert_eq!(changes.modified_files, vec![modified]);
        assert_eq!(changes.total_count(), 2);
    }
}
