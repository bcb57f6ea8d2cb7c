//! The public operation surface: one store, shared by every component.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{self, CatalogStore, Picture, Tag, TagCategory, TagWithCount, WatchedFolder};
use crate::error::{CatalogError, Result};
use crate::folders::WatchedFolders;
use crate::scanner::{
    self, canonical_dir, ChangeDetectionResult, Indexer, ReindexSummary, ScanProgress, ScanResult,
    WatchedIndexOutcome,
};
use crate::tags::{SearchCriteria, TagQueryEngine, TagService};

pub struct Catalog {
    store: Arc<dyn CatalogStore>,
    indexer: Indexer,
    folders: WatchedFolders,
    tags: TagService,
    search: TagQueryEngine,
}

impl Catalog {
    /// Open (creating if needed) the SQLite catalog named in `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let store = db::open_sqlite(config.db_path())?;
        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: Arc<dyn CatalogStore>, config: &Config) -> Self {
        Self {
            indexer: Indexer::new(store.clone(), config),
            folders: WatchedFolders::new(store.clone()),
            tags: TagService::new(store.clone()),
            search: TagQueryEngine::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    // === Indexing ===

    pub fn index_folder(
        &self,
        path: &Path,
        progress: Option<&mpsc::Sender<ScanProgress>>,
    ) -> Result<ScanResult> {
        self.indexer.index_folder(path, progress)
    }

    pub fn index_watched_folder(
        &self,
        path: &Path,
        progress: Option<&mpsc::Sender<ScanProgress>>,
    ) -> Result<WatchedIndexOutcome> {
        self.indexer.index_watched_folder(path, progress)
    }

    pub fn reindex_all_watched_folders(&self) -> Result<ReindexSummary> {
        self.indexer.reindex_all_watched_folders()
    }

    pub fn reindex_auto_folders(&self) -> Result<ReindexSummary> {
        self.indexer.reindex_auto_folders()
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.indexer.cancel_handle()
    }

    /// Files under `path` that the next index pass would insert or update.
    pub fn pending_changes(&self, path: &Path) -> Result<ChangeDetectionResult> {
        let root = canonical_dir(path)?;
        let config = self.indexer.scanner_config();
        scanner::detect_changes(
            &root,
            self.store.as_ref(),
            &config.image_extensions,
            config.follow_links,
        )
    }

    // === Watched folders ===

    pub fn add_watched_folder(&self, path: &Path, name: &str, auto_reindex: bool) -> Result<WatchedFolder> {
        self.folders.add(path, name, auto_reindex)
    }

    pub fn remove_watched_folder(&self, path: &str) -> Result<()> {
        self.folders.remove(path)
    }

    pub fn update_watched_folder(&self, path: &str, name: &str, auto_reindex: bool) -> Result<()> {
        self.folders.update(path, name, auto_reindex)
    }

    pub fn watched_folder(&self, path: &str) -> Result<Option<WatchedFolder>> {
        self.folders.find(path)
    }

    pub fn watched_folders(&self) -> Result<Vec<WatchedFolder>> {
        self.folders.list()
    }

    // === Tags ===

    pub fn create_tag(&self, name: &str, category: TagCategory, color: &str) -> Result<Tag> {
        self.tags.create_tag(name, category, color)
    }

    pub fn update_tag(&self, name: &str, category: TagCategory, color: &str) -> Result<()> {
        self.tags.update_tag(name, category, color)
    }

    pub fn delete_tag(&self, name: &str) -> Result<()> {
        self.tags.delete_tag(name)
    }

    pub fn all_tags(&self) -> Result<Vec<Tag>> {
        self.tags.all_tags()
    }

    pub fn all_tags_with_count(&self) -> Result<Vec<TagWithCount>> {
        self.tags.all_tags_with_count()
    }

    pub fn add_tag_to_picture(&self, picture_path: &str, tag_name: &str) -> Result<()> {
        self.tags.add_tag_to_picture(picture_path, tag_name)
    }

    pub fn remove_tag_from_picture(&self, picture_path: &str, tag_name: &str) -> Result<()> {
        self.tags.remove_tag_from_picture(picture_path, tag_name)
    }

    pub fn tags_for_picture(&self, picture_path: &str) -> Result<Vec<Tag>> {
        self.tags.tags_for_picture(picture_path)
    }

    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Picture>> {
        self.search.search(criteria)
    }

    // === Pictures ===

    pub fn pictures(&self) -> Result<Vec<Picture>> {
        self.store.all_pictures()
    }

    pub fn picture_count(&self) -> Result<u64> {
        self.store.picture_count()
    }

    /// Remove a picture from the catalog, and from disk when asked.
    ///
    /// The file goes first: if it cannot be deleted the catalog is left
    /// untouched. The thumbnail is removed last and only logged on failure.
    pub fn delete_picture(&self, path: &str, delete_from_disk: bool) -> Result<()> {
        if self.store.find_picture(path)?.is_none() {
            return Err(CatalogError::not_found(format!("picture {}", path)));
        }

        if delete_from_disk {
            std::fs::remove_file(path)?;
            info!("Deleted file {}", path);
        }

        self.store.delete_picture(path)?;

        if let Err(e) = self.indexer.thumbnails().remove(Path::new(path)) {
            warn!("Could not remove thumbnail for {}: {}", path, e);
        }

        Ok(())
    }
}
