use image::{DynamicImage, ImageError, ImageFormat};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ThumbnailConfig;
use crate::error::{CatalogError, Result};

/// Writes downscaled JPEG copies of source images into a thumbnail store.
///
/// Failures are returned to the caller, which logs them and carries on:
/// a picture record is valid without a thumbnail.
#[derive(Debug, Clone)]
pub struct ThumbnailProvisioner {
    root: PathBuf,
    size: u32,
}

impl ThumbnailProvisioner {
    pub fn new(config: &ThumbnailConfig) -> Self {
        Self::with_root(config.path.clone(), config.size)
    }

    pub fn with_root(root: PathBuf, size: u32) -> Self {
        Self {
            root,
            size: size.max(1),
        }
    }

    /// Artifact location for `source`, named after a SHA-256 of the full
    /// source path so same-named files in different folders never collide.
    pub fn thumbnail_path(&self, source: &Path) -> PathBuf {
        let digest = Sha256::digest(source.to_string_lossy().as_bytes());
        let name: String = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();
        self.root.join(format!("{}.jpg", name))
    }

    /// Render the thumbnail for `source` and return its path. Any earlier
    /// artifact is overwritten, whatever its mtime.
    pub fn provision(&self, source: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;

        let target = self.thumbnail_path(source);
        let img = image::open(source).map_err(|e| decode_error(source, e))?;
        let thumbnail = img.thumbnail(self.size, self.size);

        // JPEG has no alpha channel
        DynamicImage::ImageRgb8(thumbnail.to_rgb8())
            .save_with_format(&target, ImageFormat::Jpeg)
            .map_err(|e| decode_error(source, e))?;

        Ok(target)
    }

    /// Delete the artifact for `source` if there is one.
    pub fn remove(&self, source: &Path) -> Result<()> {
        let target = self.thumbnail_path(source);
        match fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn decode_error(source: &Path, error: ImageError) -> CatalogError {
    match error {
        ImageError::IoError(e) => CatalogError::Io(e),
        other => CatalogError::DecodeFailure {
            path: source.to_path_buf(),
            source: other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, RgbaImage};
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn test_same_filename_in_different_folders_does_not_collide() {
        let provisioner = ThumbnailProvisioner::with_root(PathBuf::from("/thumbs"), 64);
        let a = provisioner.thumbnail_path(Path::new("/photos/2023/IMG_0001.jpg"));
        let b = provisioner.thumbnail_path(Path::new("/photos/2024/IMG_0001.jpg"));

        assert_ne!(a, b);
        assert_eq!(a, provisioner.thumbnail_path(Path::new("/photos/2023/IMG_0001.jpg")));
        assert!(a.starts_with("/thumbs"));
    }

    #[test]
    fn test_provision_creates_root_and_downscales() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("big.png");
        RgbaImage::new(400, 200).save(&source).unwrap();

        let root = dir.path().join("cache/thumbnails");
        let provisioner = ThumbnailProvisioner::with_root(root.clone(), 100);

        let thumb = provisioner.provision(&source).unwrap();
        assert!(root.is_dir());
        assert!(thumb.exists());
        let (w, h) = image::open(&thumb).unwrap().dimensions();
        assert_eq!((w, h), (100, 50));

        // Same source, same artifact path
        assert_eq!(provisioner.provision(&source).unwrap(), thumb);

        provisioner.remove(&source).unwrap();
        assert!(!thumb.exists());
        provisioner.remove(&source).unwrap();
    }

    #[test]
    fn test_replaced_source_with_older_mtime_is_rerendered() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("restored.png");
        RgbImage::from_pixel(40, 40, Rgb([255, 0, 0])).save(&source).unwrap();

        let provisioner = ThumbnailProvisioner::with_root(dir.path().join("thumbs"), 32);
        let thumb = provisioner.provision(&source).unwrap();
        assert_eq!(image::open(&thumb).unwrap().dimensions(), (32, 32));

        RgbImage::from_pixel(80, 20, Rgb([0, 0, 255])).save(&source).unwrap();
        let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
        File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(an_hour_ago)
            .unwrap();

        assert_eq!(provisioner.provision(&source).unwrap(), thumb);
        let rendered = image::open(&thumb).unwrap();
        assert_eq!(rendered.dimensions(), (32, 8));
        let pixel = rendered.to_rgb8().get_pixel(16, 4).0;
        assert!(pixel[2] > 200 && pixel[0] < 60, "stale thumbnail: {:?}", pixel);
    }

    #[test]
    fn test_undecodable_source_is_an_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("broken.png");
        std::fs::write(&source, b"nope").unwrap();

        let provisioner = ThumbnailProvisioner::with_root(dir.path().join("thumbs"), 64);
        assert!(matches!(
            provisioner.provision(&source),
            Err(CatalogError::DecodeFailure { .. })
        ));
    }
}
