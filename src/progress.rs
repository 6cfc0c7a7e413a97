//! Progress-callback trait for per-unit pipeline events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each photo region.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a WebSocket, a database
//! record, or a terminal progress bar — without the library knowing anything
//! about how the host application communicates. The trait is `Send + Sync`
//! so it works correctly when units are processed concurrently.

use std::sync::Arc;

/// Called by the pipeline as it processes each photo and region.
///
/// Implementations must be `Send + Sync` (units are processed concurrently).
/// All methods have default no-op implementations so callers only override
/// what they care about, and region events may arrive from different threads
/// — protect shared mutable state accordingly.
pub trait RunProgressCallback: Send + Sync {
    /// Called once before any photo is preprocessed.
    fn on_run_start(&self, total_photos: usize) {
        let _ = total_photos;
    }

    /// Called when a photo finishes preprocessing, with the number of
    /// regions the splitter produced for it.
    fn on_photo_split(&self, photo_id: &str, regions: usize) {
        let _ = (photo_id, regions);
    }

    /// Called just before a region's extraction request is sent.
    fn on_region_start(&self, photo_id: &str, region_index: usize) {
        let _ = (photo_id, region_index);
    }

    /// Called when a region is fully assembled, with the extracted dish name.
    fn on_region_complete(&self, photo_id: &str, region_index: usize, dish_name: &str) {
        let _ = (photo_id, region_index, dish_name);
    }

    /// Called when a region fails terminally (after any retries).
    fn on_region_error(&self, photo_id: &str, region_index: usize, error: &str) {
        let _ = (photo_id, region_index, error);
    }

    /// Called once after every unit has been attempted or skipped.
    fn on_run_complete(&self, total_regions: usize, assembled: usize) {
        let _ = (total_regions, assembled);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
