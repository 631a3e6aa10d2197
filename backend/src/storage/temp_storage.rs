use image::{GrayImage, Luma, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::files::is_plain_file_name;

const MASK_PREFIX: &str = "mask_";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("File too large: {size} bytes (limit {max})")]
    FileTooLarge { size: usize, max: usize },
    #[error("Invalid file name: {0}")]
    InvalidName(String),
    #[error("File {0} not found")]
    NotFound(String),
}

/// A file written into the scratch directory.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub path: PathBuf,
}

impl StoredFile {
    pub fn url(&self) -> String {
        TempStorage::temp_url(&self.file_name)
    }
}

/// Scratch directory for uploads and generated masks. Files are never
/// cleaned up.
#[derive(Debug, Clone)]
pub struct TempStorage {
    root: PathBuf,
    max_upload_bytes: usize,
}

impl TempStorage {
    pub fn new(root: impl Into<PathBuf>, max_upload_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_upload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn ensure_root(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn validate_size(&self, size: usize) -> Result<(), StorageError> {
        if size > self.max_upload_bytes {
            return Err(StorageError::FileTooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    pub fn unique_name(original: &str) -> String {
        format!("{}_{}", Uuid::new_v4(), original)
    }

    pub fn mask_name(file_name: &str) -> String {
        format!("{}{}", MASK_PREFIX, file_name)
    }

    pub fn temp_url(file_name: &str) -> String {
        format!("/api/temp_file/{}", urlencoding::encode(file_name))
    }

    /// Reduces a client-supplied file name to its last path component.
    pub fn sanitize_client_name(raw: &str) -> Result<String, StorageError> {
        let name = raw
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if !is_plain_file_name(&name) {
            return Err(StorageError::InvalidName(raw.to_string()));
        }
        Ok(name)
    }

    pub fn save_upload(&self, original_name: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        self.validate_size(data.len())?;
        self.ensure_root()?;

        let file_name = Self::unique_name(original_name);
        let path = self.root.join(&file_name);
        std::fs::write(&path, data)?;
        log::info!("Stored upload {} ({} bytes)", file_name, data.len());
        Ok(StoredFile { file_name, path })
    }

    /// Writes the rectangle placeholder mask for an upload next to it.
    pub fn write_placeholder_mask(&self, upload: &StoredFile) -> Result<StoredFile, StorageError> {
        let gray = image::open(&upload.path)?.to_luma8();
        let mask = centered_rectangle_mask(gray.width(), gray.height());

        let file_name = Self::mask_name(&upload.file_name);
        let path = self.root.join(&file_name);
        mask.save(&path)?;
        Ok(StoredFile { file_name, path })
    }

    pub fn resolve(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_file_name(file_name) {
            return Err(StorageError::InvalidName(file_name.to_string()));
        }
        let path = self.root.join(file_name);
        if !path.is_file() {
            return Err(StorageError::NotFound(file_name.to_string()));
        }
        Ok(path)
    }
}

/// Black image with the central 60% (rows and columns 20%..80%) set to 255.
pub fn centered_rectangle_mask(width: u32, height: u32) -> GrayImage {
    let top = (height as f64 * 0.2) as u32;
    let bottom = (height as f64 * 0.8) as u32;
    let left = (width as f64 * 0.2) as u32;
    let right = (width as f64 * 0.8) as u32;

    GrayImage::from_fn(width, height, |x, y| {
        if (top..bottom).contains(&y) && (left..right).contains(&x) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// All-white stand-in used when an image has no segmentation mask.
pub fn blank_mask(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, TempStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = TempStorage::new(dir.path().join("temp_uploads"), 1024 * 1024);
        (dir, storage)
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn mask_geometry() {
        let mask = centered_rectangle_mask(10, 20);
        assert_eq!(mask.dimensions(), (10, 20));
        assert_eq!(mask.get_pixel(0, 0).0, [0]);
        assert_eq!(mask.get_pixel(2, 4).0, [255]);
        assert_eq!(mask.get_pixel(7, 15).0, [255]);
        assert_eq!(mask.get_pixel(8, 15).0, [0]);
        assert_eq!(mask.get_pixel(5, 16).0, [0]);
    }

    #[test]
    fn upload_and_mask_round_trip() {
        let (_dir, storage) = storage();
        let upload = storage.save_upload("COVID-5.png", &png_bytes(40, 30)).unwrap();
        assert!(upload.file_name.ends_with("_COVID-5.png"));
        assert!(upload.path.is_file());

        let mask = storage.write_placeholder_mask(&upload).unwrap();
        assert_eq!(mask.file_name, format!("mask_{}", upload.file_name));
        let decoded = image::open(&mask.path).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (40, 30));
        assert_eq!(decoded.get_pixel(20, 15).0, [255]);

        assert_eq!(storage.resolve(&mask.file_name).unwrap(), mask.path);
    }

    #[test]
    fn rejects_oversized_and_traversal() {
        let (_dir, storage) = storage();
        let big = vec![0u8; 1024 * 1024 + 1];
        assert!(matches!(
            storage.save_upload("big.png", &big),
            Err(StorageError::FileTooLarge { .. })
        ));
        assert!(matches!(
            storage.resolve("../secret.txt"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            storage.resolve("nothing.png"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn client_names_lose_directories() {
        assert_eq!(
            TempStorage::sanitize_client_name("C:\\scans\\Normal-1.png").unwrap(),
            "Normal-1.png"
        );
        assert_eq!(
            TempStorage::sanitize_client_name("/tmp/x/COVID 2.jpg").unwrap(),
            "COVID 2.jpg"
        );
        assert!(TempStorage::sanitize_client_name("dir/").is_err());
    }

    #[test]
    fn urls_are_encoded() {
        assert_eq!(
            TempStorage::temp_url("ab_Viral Pneumonia-1.png"),
            "/api/temp_file/ab_Viral%20Pneumonia-1.png"
        );
    }
}
