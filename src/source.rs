//! Photo ingestion: the collaborator that supplies the photos to process.
//!
//! The pipeline consumes an ordered, finite sequence of [`Photo`] values —
//! source identifier plus raw encoded bytes. Decoding is deliberately *not*
//! done here: a corrupt file should surface as an isolated per-photo
//! `InvalidImage` outcome inside the run report, not as a source error that
//! kills ingestion for everything else.
//!
//! [`DirectorySource`] is the built-in implementation: a deterministic,
//! name-sorted listing of the image files in one local directory. Album-style
//! cloud sources plug in through the same [`PhotoSource`] trait.

use crate::error::CookbookError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One photo as supplied by the ingestion collaborator.
#[derive(Debug, Clone)]
pub struct Photo {
    /// Stable source identifier (file name for directory sources). Used to
    /// tag every downstream result and error for diagnosis.
    pub id: String,
    /// Raw encoded image bytes (JPEG/PNG).
    pub bytes: Vec<u8>,
}

/// The ingestion collaborator seam.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Produce the ordered sequence of photos for this run.
    ///
    /// Must be restartable: calling twice yields the same sequence.
    async fn photos(&self) -> Result<Vec<Photo>, CookbookError>;

    /// Human-readable description used in the `NoPhotos` error.
    fn describe(&self) -> String;
}

/// Extensions accepted by [`DirectorySource`]. Matches the formats the
/// `image` crate is built with.
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// A local directory of recipe photos, listed in file-name order.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn is_image_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl PhotoSource for DirectorySource {
    async fn photos(&self) -> Result<Vec<Photo>, CookbookError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            CookbookError::SourceReadFailed {
                path: self.dir.clone(),
                source: e,
            }
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| CookbookError::SourceReadFailed {
                    path: self.dir.clone(),
                    source: e,
                })?
        {
            let path = entry.path();
            if path.is_file() && Self::is_image_file(&path) {
                paths.push(path);
            }
        }

        // Name-sorted for a deterministic, reproducible run order.
        paths.sort();

        let mut photos = Vec::with_capacity(paths.len());
        for path in paths {
            let id = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    debug!("Loaded photo '{}' ({} bytes)", id, bytes.len());
                    photos.push(Photo { id, bytes });
                }
                Err(e) => {
                    // An unreadable file should not take the whole listing
                    // down with it.
                    warn!("Skipping unreadable photo '{}': {}", id, e);
                }
            }
        }
        Ok(photos)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_images_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"fake-jpeg").unwrap();
        std::fs::write(dir.path().join("a.png"), b"fake-png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();
        std::fs::write(dir.path().join("c.JPEG"), b"fake-jpeg-2").unwrap();

        let source = DirectorySource::new(dir.path());
        let photos = source.photos().await.unwrap();

        let ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a.png", "b.jpg", "c.JPEG"]);
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let source = DirectorySource::new("/definitely/not/here");
        let err = source.photos().await.unwrap_err();
        assert!(matches!(err, CookbookError::SourceReadFailed { .. }));
    }

    #[tokio::test]
    async fn empty_directory_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        assert!(source.photos().await.unwrap().is_empty());
    }
}
