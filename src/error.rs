//! Error types for the photos2cookbook library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CookbookError`] — **Fatal**: the run cannot proceed at all (no
//!   reference style and no default, no photos supplied, invalid
//!   configuration, provider not configured). Returned as
//!   `Err(CookbookError)` from the top-level `run*` functions.
//!
//! * [`UnitError`] — **Non-fatal**: a single photo or split region failed
//!   (unreadable image, schema-violating extraction, generation failure) but
//!   every other unit is fine. Stored inside
//!   [`crate::output::RegionResult`] so callers can inspect partial success
//!   rather than losing the whole cookbook to one bad photo.
//!
//! The separation is the crate's core design property: per-unit errors are
//! caught at the orchestrator boundary, logged with the originating photo and
//! region identifiers, and folded into the run report. Only configuration
//! preconditions that would make every subsequent unit fail identically abort
//! the run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the photos2cookbook library.
///
/// Photo- and region-level failures use [`UnitError`] and are stored in
/// [`crate::output::RegionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum CookbookError {
    // ── Run preconditions ─────────────────────────────────────────────────
    /// The reference style directory yielded no usable images and no default
    /// style is configured. No recipe can be illustrated without a style.
    #[error(
        "No reference style images found{} and no default style configured.\n\
         Point --reference-style-dir at a directory of style images, or set a default style.",
        dir.as_ref().map(|d| format!(" in '{}'", d.display())).unwrap_or_default()
    )]
    EmptyStyleSet { dir: Option<PathBuf> },

    /// The photo source produced no photos; there is nothing to process.
    #[error("Photo source '{description}' supplied no photos")]
    NoPhotos { description: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// Neither a pre-built adapter nor the settings to construct one were
    /// supplied (missing API endpoint / key etc.).
    #[error("Extraction/illustration provider is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output document or illustration asset.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read the photo input directory.
    #[error("Failed to read photo directory '{path}': {source}")]
    SourceReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single photo or split region.
///
/// Stored alongside [`crate::output::RegionResult`] when a unit fails.
/// The overall run continues regardless of how many units fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The source photo could not be decoded or has degenerate dimensions.
    /// Terminal for the whole photo; siblings and other photos continue.
    #[error("Photo '{photo}': unusable image: {detail}")]
    InvalidImage { photo: String, detail: String },

    /// The extraction response did not satisfy the recipe schema.
    /// Never retried: a schema-violating answer from a deterministic-enough
    /// model rarely improves without changing the prompt.
    #[error("Photo '{photo}' region {region}: extraction response rejected: {detail}")]
    ExtractionValidation {
        photo: String,
        region: usize,
        detail: String,
    },

    /// The extraction call failed after all retries.
    #[error("Photo '{photo}' region {region}: extraction failed after {retries} retries: {detail}")]
    ExtractionFailed {
        photo: String,
        region: usize,
        retries: u32,
        detail: String,
    },

    /// The illustration call failed after all retries.
    #[error("Photo '{photo}' region {region}: illustration failed after {retries} retries: {detail}")]
    IllustrationFailed {
        photo: String,
        region: usize,
        retries: u32,
        detail: String,
    },

    /// Writing the assembled output failed for this unit.
    #[error("Photo '{photo}' region {region}: output write failed: {detail}")]
    WriteFailed {
        photo: String,
        region: usize,
        detail: String,
    },
}

impl UnitError {
    /// Identifier of the photo this error originated from.
    pub fn photo(&self) -> &str {
        match self {
            UnitError::InvalidImage { photo, .. }
            | UnitError::ExtractionValidation { photo, .. }
            | UnitError::ExtractionFailed { photo, .. }
            | UnitError::IllustrationFailed { photo, .. }
            | UnitError::WriteFailed { photo, .. } => photo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_style_set_display_with_dir() {
        let e = CookbookError::EmptyStyleSet {
            dir: Some(PathBuf::from("styles")),
        };
        let msg = e.to_string();
        assert!(msg.contains("styles"), "got: {msg}");
    }

    #[test]
    fn empty_style_set_display_without_dir() {
        let e = CookbookError::EmptyStyleSet { dir: None };
        assert!(e.to_string().contains("No reference style images"));
    }

    #[test]
    fn extraction_validation_display() {
        let e = UnitError::ExtractionValidation {
            photo: "IMG_0001.jpg".into(),
            region: 1,
            detail: "missing field `ingredients`".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("IMG_0001.jpg"));
        assert!(msg.contains("region 1"));
        assert!(msg.contains("ingredients"));
    }

    #[test]
    fn extraction_failed_display() {
        let e = UnitError::ExtractionFailed {
            photo: "IMG_0002.jpg".into(),
            region: 0,
            retries: 3,
            detail: "HTTP 503".into(),
        };
        assert!(e.to_string().contains("after 3 retries"));
    }

    #[test]
    fn photo_accessor() {
        let e = UnitError::InvalidImage {
            photo: "bad.png".into(),
            detail: "zero height".into(),
        };
        assert_eq!(e.photo(), "bad.png");
    }
}
