//! Folder Indexer: walks a directory tree and keeps the catalog in step
//! with the images it finds.

pub mod change_detection;
pub mod discovery;
pub mod metadata;
pub mod thumbnails;

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::config::{Config, ScannerConfig};
use crate::db::{CatalogStore, Picture, WatchedFolder};
use crate::error::{CatalogError, Result};

pub use change_detection::{detect_changes, ChangeDetectionResult};
pub use discovery::discover_images;
pub use metadata::{extract_metadata, ImageMetadata};
pub use thumbnails::ThumbnailProvisioner;

#[derive(Debug, Clone)]
pub enum ScanProgress {
    Started { total_files: usize },
    Scanning { current: usize, total: usize, filename: String },
    Warning { path: PathBuf, message: String },
    Completed { new: usize, updated: usize, unchanged: usize, warnings: usize, cancelled: bool },
}

/// A file that could not be indexed. The scan carried on without it.
#[derive(Debug, Clone, Serialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub total_found: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub warnings: Vec<ScanWarning>,
    pub cancelled: bool,
}

impl ScanResult {
    /// Files inserted or updated by this pass.
    pub fn indexed(&self) -> usize {
        self.new + self.updated
    }

    /// Files of the folder that have a catalog record after this pass.
    pub fn catalogued(&self) -> usize {
        self.new + self.updated + self.unchanged
    }
}

/// Result of indexing a registered folder. Indexing succeeded even when
/// `stats_error` is set; only the folder's bookkeeping could not be saved.
#[derive(Debug)]
pub struct WatchedIndexOutcome {
    pub scan: ScanResult,
    pub stats_error: Option<CatalogError>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReindexSummary {
    pub folders_indexed: usize,
    pub folders_failed: usize,
    pub pictures_indexed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    New,
    Updated,
    Unchanged,
}

/// One mutex per canonical folder path, so two scans of the same folder
/// never interleave their skip-or-reindex decisions.
#[derive(Default)]
struct FolderLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FolderLocks {
    fn for_folder(&self, folder: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(folder.to_path_buf()).or_default().clone()
    }
}

pub struct Indexer {
    store: Arc<dyn CatalogStore>,
    config: ScannerConfig,
    thumbnails: ThumbnailProvisioner,
    locks: FolderLocks,
    cancel: Arc<AtomicBool>,
}

impl Indexer {
    pub fn new(store: Arc<dyn CatalogStore>, config: &Config) -> Self {
        Self::with_parts(
            store,
            config.scanner.clone(),
            ThumbnailProvisioner::new(&config.thumbnails),
        )
    }

    pub fn with_parts(
        store: Arc<dyn CatalogStore>,
        config: ScannerConfig,
        thumbnails: ThumbnailProvisioner,
    ) -> Self {
        Self {
            store,
            config,
            thumbnails,
            locks: FolderLocks::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between files. Setting it stops the running scan (or
    /// the next one) after the current file; it is reset when that scan ends.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn thumbnails(&self) -> &ThumbnailProvisioner {
        &self.thumbnails
    }

    pub fn scanner_config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Index every supported image under `directory`, recursively.
    ///
    /// Files whose stored modification time matches the file are skipped.
    /// A file that cannot be read becomes a warning; only a missing
    /// directory or an unavailable store fails the whole call.
    pub fn index_folder(
        &self,
        directory: &Path,
        progress: Option<&mpsc::Sender<ScanProgress>>,
    ) -> Result<ScanResult> {
        let root = canonical_dir(directory)?;
        self.store.ensure_ready()?;

        let lock = self.locks.for_folder(&root);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let result = self.scan(&root, progress);
        self.cancel.store(false, Ordering::SeqCst);
        let result = result?;

        info!(
            "Indexed {}: {} new, {} updated, {} unchanged, {} warnings{}",
            root.display(),
            result.new,
            result.updated,
            result.unchanged,
            result.warnings.len(),
            if result.cancelled { " (cancelled)" } else { "" }
        );

        Ok(result)
    }

    fn scan(&self, root: &Path, progress: Option<&mpsc::Sender<ScanProgress>>) -> Result<ScanResult> {
        let image_paths = discover_images(root, &self.config.image_extensions, self.config.follow_links);
        let total = image_paths.len();

        send(progress, ScanProgress::Started { total_files: total });

        let mut result = ScanResult {
            total_found: total,
            ..Default::default()
        };

        for (index, path) in image_paths.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                result.cancelled = true;
                break;
            }

            send(
                progress,
                ScanProgress::Scanning {
                    current: index + 1,
                    total,
                    filename: file_name(path),
                },
            );

            match self.index_file(path) {
                Ok(FileOutcome::New) => result.new += 1,
                Ok(FileOutcome::Updated) => result.updated += 1,
                Ok(FileOutcome::Unchanged) => result.unchanged += 1,
                Err(CatalogError::StoreUnavailable) => return Err(CatalogError::StoreUnavailable),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    let message = e.to_string();
                    send(
                        progress,
                        ScanProgress::Warning {
                            path: path.clone(),
                            message: message.clone(),
                        },
                    );
                    result.warnings.push(ScanWarning {
                        path: path.clone(),
                        message,
                    });
                }
            }
        }

        send(
            progress,
            ScanProgress::Completed {
                new: result.new,
                updated: result.updated,
                unchanged: result.unchanged,
                warnings: result.warnings.len(),
                cancelled: result.cancelled,
            },
        );

        Ok(result)
    }

    fn index_file(&self, path: &Path) -> Result<FileOutcome> {
        let path_str = path.to_string_lossy().to_string();
        let modified_at = change_detection::file_modified_at(path)?;
        let existing = self.store.find_picture(&path_str)?;

        if !change_detection::needs_reindex(existing.as_ref(), &modified_at) {
            return Ok(FileOutcome::Unchanged);
        }

        let metadata = extract_metadata(path)?;

        let thumbnail_path = match self.thumbnails.provision(path) {
            Ok(thumb) => Some(thumb.to_string_lossy().to_string()),
            Err(e) => {
                warn!("No thumbnail for {}: {}", path.display(), e);
                None
            }
        };

        self.store.upsert_picture(&Picture {
            path: path_str,
            filename: file_name(path),
            size_bytes: metadata.size_bytes,
            width: metadata.width,
            height: metadata.height,
            created_at: metadata.created_at,
            modified_at: metadata.modified_at,
            indexed_at: Utc::now(),
            thumbnail_path,
        })?;

        debug!("Indexed {}", path.display());

        Ok(if existing.is_some() {
            FileOutcome::Updated
        } else {
            FileOutcome::New
        })
    }

    /// Index a registered folder and record when it was indexed and how many
    /// pictures it now holds. A cancelled pass leaves the record untouched.
    pub fn index_watched_folder(
        &self,
        directory: &Path,
        progress: Option<&mpsc::Sender<ScanProgress>>,
    ) -> Result<WatchedIndexOutcome> {
        self.store.ensure_ready()?;

        let key = directory
            .canonicalize()
            .unwrap_or_else(|_| directory.to_path_buf());
        let key = key.to_string_lossy();
        if self.store.find_watched_folder(&key)?.is_none() {
            return Err(CatalogError::NotWatched(directory.to_path_buf()));
        }

        let scan = self.index_folder(directory, progress)?;

        // A cancelled pass saw only part of the folder
        if scan.cancelled {
            return Ok(WatchedIndexOutcome {
                scan,
                stats_error: None,
            });
        }

        let stats_error = match self
            .store
            .record_index_stats(&key, Utc::now(), scan.catalogued() as u64)
        {
            Ok(true) => None,
            Ok(false) => Some(CatalogError::NotWatched(directory.to_path_buf())),
            Err(e) => Some(e),
        };

        if let Some(ref e) = stats_error {
            warn!("Indexed {} but could not save folder stats: {}", key, e);
        }

        Ok(WatchedIndexOutcome { scan, stats_error })
    }

    /// Re-index every registered folder. A folder that fails is logged and
    /// skipped.
    pub fn reindex_all_watched_folders(&self) -> Result<ReindexSummary> {
        self.reindex_folders(|_| true)
    }

    /// Re-index only the folders flagged for automatic re-indexing.
    pub fn reindex_auto_folders(&self) -> Result<ReindexSummary> {
        self.reindex_folders(|folder| folder.auto_reindex)
    }

    fn reindex_folders(&self, include: impl Fn(&WatchedFolder) -> bool) -> Result<ReindexSummary> {
        let folders = self.store.all_watched_folders()?;
        let mut summary = ReindexSummary::default();

        for folder in folders.iter().filter(|f| include(f)) {
            match self.index_watched_folder(Path::new(&folder.path), None) {
                Ok(outcome) => {
                    summary.folders_indexed += 1;
                    summary.pictures_indexed += outcome.scan.indexed();
                }
                Err(CatalogError::StoreUnavailable) => return Err(CatalogError::StoreUnavailable),
                Err(e) => {
                    warn!("Failed to re-index {}: {}", folder.path, e);
                    summary.folders_failed += 1;
                }
            }
        }

        info!(
            "Re-indexed {} folders ({} failed), {} pictures indexed",
            summary.folders_indexed, summary.folders_failed, summary.pictures_indexed
        );

        Ok(summary)
    }
}

/// Absolute form of `directory`, which must exist and be a directory.
pub(crate) fn canonical_dir(directory: &Path) -> Result<PathBuf> {
    if !directory.is_dir() {
        return Err(CatalogError::InvalidPath(directory.to_path_buf()));
    }
    directory
        .canonicalize()
        .map_err(|_| CatalogError::InvalidPath(directory.to_path_buf()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn send(progress: Option<&mpsc::Sender<ScanProgress>>, event: ScanProgress) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}
