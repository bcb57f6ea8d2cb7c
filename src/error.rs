//! Error taxonomy shared by the catalog, the indexer and the tag engine.

use std::path::PathBuf;
use thiserror::Error;

/// Catalog operation result type.
pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Input path is missing or is not a directory
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// Entity absent (picture, tag, watched folder, association)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate creation of a uniquely named entity
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Folder is not registered as a watched folder
    #[error("Folder is not watched: {}", .0.display())]
    NotWatched(PathBuf),

    /// Rejected user input (empty tag name, unknown category, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Pixel dimensions could not be read from the file header
    #[error("Unsupported image format for {}: {reason}", .path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// Pixel data could not be decoded
    #[error("Failed to decode {}: {source}", .path.display())]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Persistence layer not initialised or already closed
    #[error("Catalog store is not available")]
    StoreUnavailable,

    /// Filesystem read/write/delete failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl CatalogError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for errors that mean the entity simply is not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotWatched(_))
    }
}
