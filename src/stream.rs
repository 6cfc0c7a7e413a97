//! Streaming run API: emit unit results as they complete.
//!
//! ## Why stream?
//!
//! A large photo album takes minutes. A stream-based API lets callers show
//! recipes the moment they are assembled, wire up progress UIs, or persist
//! results incrementally instead of waiting for the whole run.
//!
//! Unlike the eager [`crate::run::run`] which returns only after every unit
//! finishes, [`run_stream`] yields each [`RegionResult`] as its unit
//! completes. Units may finish out of order (concurrent mode) — sort by
//! `(photo_index, region_index)` if order matters. Results already decided
//! during preprocessing (invalid photos) are emitted first.

use crate::config::RunConfig;
use crate::error::CookbookError;
use crate::output::RegionResult;
use crate::run::{prepare, process_unit, skipped_result};
use crate::source::PhotoSource;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-unit results.
pub type RegionResultStream = Pin<Box<dyn Stream<Item = RegionResult> + Send>>;

/// Run the pipeline, streaming unit results as they are ready.
///
/// # Returns
/// - `Ok(RegionResultStream)` — one [`RegionResult`] per unit
/// - `Err(CookbookError)` — fatal precondition failure (empty style set,
///   no photos, unconfigured provider); nothing was scheduled
pub async fn run_stream(
    source: &dyn PhotoSource,
    config: &RunConfig,
) -> Result<RegionResultStream, CookbookError> {
    let (ctx, preprocessed, units, total_photos) = prepare(source, config).await?;
    info!(
        "Streaming {} unit(s) from {} photo(s)",
        preprocessed.len() + units.len(),
        total_photos
    );

    let ctx = Arc::new(ctx);
    let concurrency = config.concurrency;
    let config = config.clone();
    let unit_stream = stream::iter(units.into_iter().map(move |unit| {
        let ctx = Arc::clone(&ctx);
        let config = config.clone();
        async move {
            if config.cancel.is_cancelled() {
                skipped_result(unit)
            } else {
                process_unit(unit, &ctx, &config).await
            }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(stream::iter(preprocessed).chain(unit_stream)))
}
