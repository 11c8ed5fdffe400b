//! On-disk store for uploaded photos.
//!
//! Files are named `<unix millis>-<random><ext>` so two uploads of the same
//! original file never collide. Only images are accepted, up to
//! [`MAX_UPLOAD_BYTES`].

use chrono::Utc;
use rand::Rng;
use regex::Regex;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, instrument};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const IMAGE_TYPES: &str = r"jpeg|jpg|png|gif|heic";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only images are allowed")]
    NotAnImage,
    #[error("File too large")]
    TooLarge,
    #[error("Invalid file name")]
    InvalidName,
    #[error("upload io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Both the extension and the declared MIME type must name an image format.
pub fn is_image(original_name: &str, content_type: Option<&str>) -> bool {
    let Ok(re) = Regex::new(IMAGE_TYPES) else {
        return false;
    };
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    re.is_match(&extension) && content_type.is_some_and(|mime| re.is_match(mime))
}

/// Build a fresh file name that keeps the original (lowercased) extension.
pub fn generate_filename(original_name: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..=1_000_000_000);
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default();

    format!("{}-{suffix}{extension}", Utc::now().timestamp_millis())
}

#[derive(Debug)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Open the store, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate and persist an image, returning the generated file name.
    ///
    /// # Errors
    /// Returns an error if the file is not an image, too large, or cannot be written
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge);
        }
        if !is_image(original_name, content_type) {
            return Err(UploadError::NotAnImage);
        }

        let filename = generate_filename(original_name);
        tokio::fs::write(self.dir.join(&filename), bytes).await?;
        debug!("Stored upload as {}", filename);

        Ok(filename)
    }

    /// Delete a stored file. Missing files are not an error.
    ///
    /// # Errors
    /// Returns an error if the name is not a bare file name or removal fails
    pub async fn remove(&self, filename: &str) -> Result<(), UploadError> {
        if Path::new(filename).file_name().and_then(|name| name.to_str()) != Some(filename) {
            return Err(UploadError::InvalidName);
        }

        match tokio::fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
