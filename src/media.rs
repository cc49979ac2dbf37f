//! Uploaded post images.

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use file_format::{FileFormat, Kind};
use tracing::info;
use uuid::Uuid;

pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A file submitted with a form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            bytes: bytes.into(),
        }
    }
}

/// Detect the format of `upload` from its content, accepting images only.
pub fn validate_image(upload: &ImageUpload) -> Result<FileFormat, &'static str> {
    let format = FileFormat::from_bytes(&upload.bytes);
    match format.kind() {
        Kind::Image => Ok(format),
        _ => Err(INVALID_IMAGE),
    }
}

/// Directory tree holding uploaded files.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a validated post image and return its path relative to the root.
    pub async fn save_post_image(
        &self,
        upload: &ImageUpload,
        format: FileFormat,
    ) -> std::io::Result<String> {
        let relative = format!("posts/{}.{}", Uuid::new_v4().simple(), format.extension());
        let path = self.root.join(&relative);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, &upload.bytes).await?;
        info!(
            "stored image {:?} as {relative}",
            upload.file_name.as_deref().unwrap_or("<unnamed>")
        );

        Ok(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    #[test]
    fn accepts_gif() {
        let format = validate_image(&ImageUpload::new("small.gif", SMALL_GIF)).unwrap();
        assert_eq!(format.extension(), "gif");
    }

    #[test]
    fn rejects_text() {
        let upload = ImageUpload::new("notes.gif", &b"definitely not a picture"[..]);
        assert_eq!(validate_image(&upload).unwrap_err(), INVALID_IMAGE);
    }

    #[tokio::test]
    async fn saves_under_posts() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let upload = ImageUpload::new("small.gif", SMALL_GIF);
        let format = validate_image(&upload).unwrap();

        let relative = store.save_post_image(&upload, format).await.unwrap();
        assert!(relative.starts_with("posts/"));
        assert!(relative.ends_with(".gif"));
        assert_eq!(std::fs::read(dir.path().join(&relative)).unwrap(), SMALL_GIF);
    }
}
