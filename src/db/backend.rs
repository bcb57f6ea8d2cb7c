//! Catalog store abstraction.
//!
//! Components receive an `Arc<dyn CatalogStore>` at construction time, so
//! tests can run each case against its own in-memory store.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::models::{Picture, Tag, TagCategory, TagWithCount, WatchedFolder};
use crate::error::Result;
use crate::tags::query::GroupQuery;

/// Persistence for pictures, tags, associations and watched folders.
///
/// Every method is its own atomic unit; callers get no cross-call
/// transactions. Implementations must return `StoreUnavailable` rather than
/// touching an uninitialised backend.
pub trait CatalogStore: Send + Sync {
    /// Fail with `StoreUnavailable` unless the store can serve requests.
    fn ensure_ready(&self) -> Result<()>;

    // === Pictures ===

    fn find_picture(&self, path: &str) -> Result<Option<Picture>>;

    /// Insert, or replace every mutable field of the record keyed by path.
    fn upsert_picture(&self, picture: &Picture) -> Result<()>;

    fn all_pictures(&self) -> Result<Vec<Picture>>;

    /// Resolve paths to records, ordered by path. Unknown paths are ignored.
    fn pictures_by_paths(&self, paths: &[String]) -> Result<Vec<Picture>>;

    fn picture_count(&self) -> Result<u64>;

    /// Remove the picture's associations, then the record.
    /// Returns false when no record existed.
    fn delete_picture(&self, path: &str) -> Result<bool>;

    // === Tags ===

    fn find_tag(&self, name: &str) -> Result<Option<Tag>>;

    /// Fails with `AlreadyExists` when the name is taken.
    fn insert_tag(&self, tag: &Tag) -> Result<()>;

    /// Returns false when no tag has that name.
    fn update_tag(&self, name: &str, category: TagCategory, color: &str) -> Result<bool>;

    /// Remove the tag's associations, then the tag.
    /// Returns false when no tag row existed.
    fn delete_tag(&self, name: &str) -> Result<bool>;

    fn all_tags(&self) -> Result<Vec<Tag>>;

    fn all_tags_with_count(&self) -> Result<Vec<TagWithCount>>;

    // === Associations ===

    /// Idempotent: an existing association is left alone.
    fn add_association(&self, picture_path: &str, tag_name: &str) -> Result<()>;

    /// Returns false when the association did not exist.
    fn remove_association(&self, picture_path: &str, tag_name: &str) -> Result<bool>;

    fn tags_for_picture(&self, picture_path: &str) -> Result<Vec<Tag>>;

    /// Picture paths satisfying one tag group.
    fn group_paths(&self, group: &GroupQuery) -> Result<HashSet<String>>;

    // === Watched folders ===

    fn find_watched_folder(&self, path: &str) -> Result<Option<WatchedFolder>>;

    /// Insert, or replace name and auto-reindex flag of an existing record.
    fn upsert_watched_folder(&self, folder: &WatchedFolder) -> Result<()>;

    /// Returns false when the folder is not registered.
    fn update_watched_folder(&self, path: &str, name: &str, auto_reindex: bool) -> Result<bool>;

    /// Returns false when the folder is not registered.
    fn record_index_stats(
        &self,
        path: &str,
        indexed_at: DateTime<Utc>,
        picture_count: u64,
    ) -> Result<bool>;

    /// Returns false when the folder is not registered.
    fn delete_watched_folder(&self, path: &str) -> Result<bool>;

    fn all_watched_folders(&self) -> Result<Vec<WatchedFolder>>;
}
