//! Metadata Extractor: pixel dimensions plus filesystem size and times.

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    /// The filesystem creation time where the platform records one,
    /// otherwise a copy of `modified_at`.
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Read dimensions from the image header and timestamps from the filesystem.
///
/// Only the header is decoded. The format is sniffed from the content, so a
/// file whose bytes are not an image fails with `UnsupportedFormat` whatever
/// its extension says.
pub fn extract_metadata(path: &Path) -> Result<ImageMetadata> {
    let file = File::open(path)
        .map_err(|e| CatalogError::not_found(format!("{}: {}", path.display(), e)))?;
    let file_metadata = file.metadata()?;

    let reader = image::ImageReader::new(BufReader::new(file)).with_guessed_format()?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CatalogError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let modified_at: DateTime<Utc> = file_metadata.modified()?.into();
    let created_at = file_metadata
        .created()
        .map(DateTime::<Utc>::from)
        .unwrap_or(modified_at);

    Ok(ImageMetadata {
        width,
        height,
        size_bytes: file_metadata.len(),
        created_at,
        modified_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tempfile::tempdir;

    #[test]
    fn test_reads_dimensions_and_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbImage::new(7, 3).save(&path).unwrap();

        let metadata = extract_metadata(&path).unwrap();
        assert_eq!((metadata.width, metadata.height), (7, 3));
        assert_eq!(metadata.size_bytes, std::fs::metadata(&path).unwrap().len());
        assert!(metadata.created_at <= Utc::now());
    }

    #[test]
    fn test_content_wins_over_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("actually_png.jpg");
        RgbImage::new(4, 5).save_with_format(&path, image::ImageFormat::Png).unwrap();

        let metadata = extract_metadata(&path).unwrap();
        assert_eq!((metadata.width, metadata.height), (4, 5));
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let err = extract_metadata(&path).unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = extract_metadata(&dir.path().join("gone.png")).unwrap_err();
        assert!(err.is_not_found());
    }
}
