use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// True when the file extension is in `extensions`, ignoring case.
pub fn is_supported_image(path: &Path, extensions: &[String]) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            extensions.iter().any(|e| e.to_lowercase() == ext_lower)
        }
        None => false,
    }
}

/// Recursively list supported image files under `directory`, sorted by path.
/// Unreadable entries are logged and skipped.
pub fn discover_images(directory: &Path, extensions: &[String], follow_links: bool) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for entry in WalkDir::new(directory).follow_links(follow_links) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", directory.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_supported_image(entry.path(), extensions) {
            images.push(entry.into_path());
        }
    }

    // Sort by path for consistent ordering
    images.sort();

    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        ["jpg", "jpeg", "png", "gif", "bmp", "webp"]
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn test_discover_images() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("photo1.jpg")).unwrap();
        File::create(dir.path().join("photo2.PNG")).unwrap();
        File::create(dir.path().join("document.txt")).unwrap();
        File::create(dir.path().join("no_extension")).unwrap();

        fs::create_dir_all(dir.path().join("subdir/deeper")).unwrap();
        File::create(dir.path().join("subdir/photo3.jpeg")).unwrap();
        File::create(dir.path().join("subdir/deeper/photo4.WebP")).unwrap();
        File::create(dir.path().join("subdir/raw.cr2")).unwrap();

        let images = discover_images(dir.path(), &extensions(), false);

        assert_eq!(images.len(), 4);
        let mut sorted = images.clone();
        sorted.sort();
        assert_eq!(images, sorted);
    }

    #[test]
    fn test_directory_named_like_image_is_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("album.jpg")).unwrap();

        assert!(discover_images(dir.path(), &extensions(), false).is_empty());
    }
}
