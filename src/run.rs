//! Eager (full-run) pipeline entry point.
//!
//! ## Flow
//!
//! ```text
//! preconditions ──▶ preprocess ──▶ fan-out ──▶ report
//! (style, photos)   (normalize,    (extract,    (counts +
//!                    split, encode) illustrate,   per-unit
//!                    spawn_blocking  write;        outcomes)
//!                    per photo)      bounded pool)
//! ```
//!
//! Failure isolation is the core property: every photo region is an
//! independent unit, a failed unit is folded into the report and never
//! blocks siblings or other photos. The run aborts only on preconditions
//! that would make every unit fail identically — no style, no photos, or an
//! unconfigured provider.
//!
//! Use [`crate::stream::run_stream`] instead when results should surface as
//! soon as each unit completes.

use crate::adapters::{EncodedImage, Illustrator, RecipeExtractor};
use crate::adapters::openai::{OpenAiIllustrator, OpenAiRecipeExtractor};
use crate::config::RunConfig;
use crate::error::{CookbookError, UnitError};
use crate::markdown::{MarkdownWriter, OutputWriter};
use crate::output::{RegionResult, RunReport, RunStats, UnitState};
use crate::pipeline::encode::encode_region;
use crate::pipeline::extract::extract_recipe;
use crate::pipeline::illustrate::generate_illustration;
use crate::pipeline::normalize::{decode_photo, normalize_aspect, NormalizedPhoto};
use crate::pipeline::split::{crop_region, split_regions, SplitRegion};
use crate::source::{Photo, PhotoSource};
use crate::style::{build_style_profile, StyleProfile};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// API base used when only an API key is configured.
const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
/// Extraction model used when none is configured.
const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o-mini";
/// Illustration model used when none is configured.
const DEFAULT_ILLUSTRATION_MODEL: &str = "gpt-image-1";

/// Resolved collaborators shared by all units of one run.
pub(crate) struct RunContext {
    pub extractor: Arc<dyn RecipeExtractor>,
    pub illustrator: Arc<dyn Illustrator>,
    pub writer: Arc<dyn OutputWriter>,
    /// Built once before any illustration call; read-only thereafter.
    pub style: Arc<StyleProfile>,
}

/// One schedulable unit of work: a preprocessed, encoded photo region.
pub(crate) struct RegionUnit {
    pub photo_index: usize,
    pub photo_id: String,
    pub region_index: usize,
    pub region: SplitRegion,
    pub image: EncodedImage,
}

/// Convert a photo collection into an illustrated Markdown cookbook.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunReport)` whenever the run could start at all — even if every unit
/// failed (check `report.stats`). The report carries one entry per photo
/// region, tagged with the originating identifiers.
///
/// # Errors
/// Returns `Err(CookbookError)` only for run-level preconditions:
/// - no reference style images and no default style
/// - the source supplied no photos
/// - no extraction/illustration provider configured
pub async fn run(
    source: &dyn PhotoSource,
    config: &RunConfig,
) -> Result<RunReport, CookbookError> {
    let total_start = Instant::now();

    let preprocess_start = Instant::now();
    let (ctx, mut results, units, total_photos) = prepare(source, config).await?;
    let preprocess_duration_ms = preprocess_start.elapsed().as_millis() as u64;

    let pipeline_start = Instant::now();
    let ctx = Arc::new(ctx);
    let unit_results: Vec<RegionResult> = stream::iter(units.into_iter().map(|unit| {
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
    .buffer_unordered(config.concurrency)
    .collect()
    .await;
    let pipeline_duration_ms = pipeline_start.elapsed().as_millis() as u64;

    results.extend(unit_results);
    // Stable report order regardless of completion order.
    results.sort_by(|a, b| {
        (a.photo_index, a.region_index).cmp(&(b.photo_index, b.region_index))
    });

    let mut stats = RunStats::tally(&results, total_photos);
    stats.preprocess_duration_ms = preprocess_duration_ms;
    stats.pipeline_duration_ms = pipeline_duration_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(stats.total_regions, stats.assembled);
    }
    info!(
        "Run complete: {} assembled, {} extract-failed, {} illustrate-failed, \
         {} invalid, {} skipped ({}ms)",
        stats.assembled,
        stats.extract_failed,
        stats.illustrate_failed,
        stats.invalid_photos,
        stats.skipped,
        stats.total_duration_ms
    );

    Ok(RunReport { results, stats })
}

// ── Shared run plumbing (also used by the streaming API) ─────────────────

/// Resolve collaborators, build the style profile, ingest photos, and
/// preprocess them into schedulable units.
///
/// Returns the resolved context, the results already decided during
/// preprocessing (invalid photos, cancellation placeholders), the units to
/// schedule, and the total photo count.
pub(crate) async fn prepare(
    source: &dyn PhotoSource,
    config: &RunConfig,
) -> Result<(RunContext, Vec<RegionResult>, Vec<RegionUnit>, usize), CookbookError> {
    info!("Starting cookbook run");

    let extractor = resolve_extractor(config)?;
    let illustrator = resolve_illustrator(config)?;
    let writer = config
        .writer
        .clone()
        .unwrap_or_else(|| Arc::new(MarkdownWriter::new(config.output_dir.clone())) as Arc<dyn OutputWriter>);

    // The style profile is a run-level precondition: built once, before any
    // unit is scheduled, then shared read-only.
    let style = {
        let dir = config.reference_style_dir.clone();
        let default_style = config.default_style.clone();
        tokio::task::spawn_blocking(move || {
            build_style_profile(dir.as_deref(), default_style.as_deref())
        })
        .await
        .map_err(|e| CookbookError::Internal(format!("style task panicked: {e}")))??
    };
    info!(
        "Style profile ready ({} reference images)",
        style.reference_names.len()
    );

    let photos = source.photos().await?;
    if photos.is_empty() {
        return Err(CookbookError::NoPhotos {
            description: source.describe(),
        });
    }
    let total_photos = photos.len();
    info!("Processing {} photos", total_photos);
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_photos);
    }

    let mut results: Vec<RegionResult> = Vec::new();
    let mut units: Vec<RegionUnit> = Vec::new();

    for (photo_index, photo) in photos.into_iter().enumerate() {
        if config.cancel.is_cancelled() {
            results.push(RegionResult {
                photo_index,
                photo_id: photo.id,
                region_index: 0,
                region: None,
                state: UnitState::Ingested,
                record: None,
                output: None,
                error: None,
                duration_ms: 0,
            });
            continue;
        }

        let photo_id = photo.id.clone();
        let ratio = config.target_aspect_ratio;
        let margin = config.split_margin_ratio;
        // Pixel work is CPU-bound; keep it off the async workers.
        let prep = tokio::task::spawn_blocking(move || preprocess_photo(&photo, ratio, margin))
            .await
            .map_err(|e| CookbookError::Internal(format!("preprocess task panicked: {e}")))?;

        match prep {
            Ok(regions) => {
                debug!("Photo '{}' → {} region(s)", photo_id, regions.len());
                if let Some(ref cb) = config.progress_callback {
                    cb.on_photo_split(&photo_id, regions.len());
                }
                for (region_index, (region, image)) in regions.into_iter().enumerate() {
                    units.push(RegionUnit {
                        photo_index,
                        photo_id: photo_id.clone(),
                        region_index,
                        region,
                        image,
                    });
                }
            }
            Err(e) => {
                warn!("Photo '{}' rejected: {}", photo_id, e);
                results.push(RegionResult {
                    photo_index,
                    photo_id,
                    region_index: 0,
                    region: None,
                    state: UnitState::Ingested,
                    record: None,
                    output: None,
                    error: Some(e),
                    duration_ms: 0,
                });
            }
        }
    }

    Ok((
        RunContext {
            extractor,
            illustrator,
            writer,
            style: Arc::new(style),
        },
        results,
        units,
        total_photos,
    ))
}

/// Decode, normalize, split, and encode one photo.
///
/// When the splitter finds more than one region, each crop is normalized to
/// the target ratio again before encoding, so every extraction request sees
/// the same geometry.
pub(crate) fn preprocess_photo(
    photo: &Photo,
    target_ratio: f32,
    split_margin_ratio: f32,
) -> Result<Vec<(SplitRegion, EncodedImage)>, UnitError> {
    let invalid = |detail: String| UnitError::InvalidImage {
        photo: photo.id.clone(),
        detail,
    };

    let image = decode_photo(photo)?;
    let normalized = NormalizedPhoto {
        id: photo.id.clone(),
        image: normalize_aspect(&image, target_ratio).map_err(invalid)?,
    };
    let regions = split_regions(&normalized.image, split_margin_ratio);
    let composite = regions.len() > 1;

    let mut out = Vec::with_capacity(regions.len());
    for region in regions {
        let view = if composite {
            let crop = crop_region(&normalized.image, &region);
            normalize_aspect(&crop, target_ratio).map_err(invalid)?
        } else {
            normalized.image.clone()
        };
        let encoded = encode_region(&view).map_err(|e| invalid(format!("encode: {e}")))?;
        out.push((region, encoded));
    }
    Ok(out)
}

/// Drive one unit through extract → illustrate → write.
///
/// Always returns a `RegionResult` — never propagates an error upward, so a
/// single bad region doesn't abort the run.
pub(crate) async fn process_unit(
    unit: RegionUnit,
    ctx: &RunContext,
    config: &RunConfig,
) -> RegionResult {
    let started = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_region_start(&unit.photo_id, unit.region_index);
    }

    let mut result = RegionResult {
        photo_index: unit.photo_index,
        photo_id: unit.photo_id.clone(),
        region_index: unit.region_index,
        region: Some(unit.region),
        state: UnitState::Extracting,
        record: None,
        output: None,
        error: None,
        duration_ms: 0,
    };

    let record = match extract_recipe(
        &ctx.extractor,
        &unit.photo_id,
        unit.region_index,
        unit.image.clone(),
        config,
    )
    .await
    {
        Ok(record) => record,
        Err(e) => {
            warn!("{}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_region_error(&unit.photo_id, unit.region_index, &e.to_string());
            }
            result.state = UnitState::ExtractFailed;
            result.error = Some(e);
            result.duration_ms = started.elapsed().as_millis() as u64;
            return result;
        }
    };
    result.state = UnitState::Illustrating;
    result.record = Some(record.clone());

    let reference = config.photo_as_reference.then(|| unit.image.clone());
    let illustration = match generate_illustration(
        &ctx.illustrator,
        &unit.photo_id,
        unit.region_index,
        &record,
        &ctx.style,
        reference,
        config,
    )
    .await
    {
        Ok(illustration) => illustration,
        Err(e) => {
            warn!("{}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_region_error(&unit.photo_id, unit.region_index, &e.to_string());
            }
            result.state = UnitState::IllustrateFailed;
            result.error = Some(e);
            result.duration_ms = started.elapsed().as_millis() as u64;
            return result;
        }
    };

    match ctx.writer.write(&record, &illustration).await {
        Ok(output) => {
            info!(
                "Assembled '{}' from '{}' region {}",
                record.dish_name, unit.photo_id, unit.region_index
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_region_complete(&unit.photo_id, unit.region_index, &record.dish_name);
            }
            result.state = UnitState::Assembled;
            result.output = Some(output);
        }
        Err(e) => {
            let err = UnitError::WriteFailed {
                photo: unit.photo_id.clone(),
                region: unit.region_index,
                detail: e.to_string(),
            };
            warn!("{}", err);
            if let Some(ref cb) = config.progress_callback {
                cb.on_region_error(&unit.photo_id, unit.region_index, &err.to_string());
            }
            // Illustration succeeded; the unit stays at its last good state.
            result.error = Some(err);
        }
    }
    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}

/// Result for a unit that was preprocessed but never scheduled (cancelled):
/// it stays in its last successful state with no error.
pub(crate) fn skipped_result(unit: RegionUnit) -> RegionResult {
    RegionResult {
        photo_index: unit.photo_index,
        photo_id: unit.photo_id,
        region_index: unit.region_index,
        region: Some(unit.region),
        state: UnitState::Split,
        record: None,
        output: None,
        error: None,
        duration_ms: 0,
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Resolve the extraction adapter, most-specific first:
/// a pre-built adapter, then configured endpoint/key, then `OPENAI_API_KEY`
/// from the environment.
fn resolve_extractor(config: &RunConfig) -> Result<Arc<dyn RecipeExtractor>, CookbookError> {
    if let Some(ref extractor) = config.extractor {
        return Ok(Arc::clone(extractor));
    }
    let (endpoint, key) = resolve_credentials(config)?;
    let model = config
        .extraction_model
        .as_deref()
        .unwrap_or(DEFAULT_EXTRACTION_MODEL);
    let mut adapter = OpenAiRecipeExtractor::new(endpoint, key, model, config.api_timeout_secs)?;
    if let Some(ref prompt) = config.extraction_prompt {
        adapter = adapter.with_system_prompt(prompt.clone());
    }
    Ok(Arc::new(adapter))
}

/// Resolve the illustration adapter with the same fallback chain.
fn resolve_illustrator(config: &RunConfig) -> Result<Arc<dyn Illustrator>, CookbookError> {
    if let Some(ref illustrator) = config.illustrator {
        return Ok(Arc::clone(illustrator));
    }
    let (endpoint, key) = resolve_credentials(config)?;
    let model = config
        .illustration_model
        .as_deref()
        .unwrap_or(DEFAULT_ILLUSTRATION_MODEL);
    Ok(Arc::new(OpenAiIllustrator::new(
        endpoint,
        key,
        model,
        config.api_timeout_secs,
    )?))
}

fn resolve_credentials(config: &RunConfig) -> Result<(String, String), CookbookError> {
    let key = config
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()));
    let Some(key) = key else {
        return Err(CookbookError::ProviderNotConfigured {
            hint: "Set an API key (--api-key or OPENAI_API_KEY), or inject \
                   extractor/illustrator adapters on the config."
                .into(),
        });
    };
    let endpoint = config
        .api_endpoint
        .clone()
        .or_else(|| {
            std::env::var("COOKBOOK_API_ENDPOINT")
                .ok()
                .filter(|e| !e.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());
    Ok((endpoint, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn preprocess_plain_photo_yields_one_region() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            240,
            300,
            Rgba([120, 40, 40, 255]),
        ));
        let photo = Photo {
            id: "plain.png".into(),
            bytes: png_bytes(&img),
        };
        let regions = preprocess_photo(&photo, 0.8, 0.08).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].0.width, 240);
        assert_eq!(regions[0].1.mime_type, "image/png");
    }

    #[test]
    fn preprocess_composite_photo_yields_all_regions() {
        // Two blocks separated by a white gutter, already at 0.8 ratio
        // (240×300): gutter columns are white over the full height.
        let mut img = RgbaImage::new(240, 300);
        for x in 0..240u32 {
            for y in 0..300u32 {
                let color = if (105..135).contains(&x) {
                    Rgba([255, 255, 255, 255])
                } else if x < 105 {
                    Rgba([120, 40, 40, 255])
                } else {
                    Rgba([40, 40, 160, 255])
                };
                img.put_pixel(x, y, color);
            }
        }
        let photo = Photo {
            id: "sheet.png".into(),
            bytes: png_bytes(&DynamicImage::ImageRgba8(img)),
        };
        let regions = preprocess_photo(&photo, 0.8, 0.08).unwrap();
        assert_eq!(regions.len(), 2);
        // Regions are re-normalized: both payloads target the 0.8 ratio.
        assert_eq!(regions[0].0.x, 0);
        assert_eq!(regions[1].0.x, 135);
    }

    #[test]
    fn preprocess_rejects_undecodable_photo() {
        let photo = Photo {
            id: "broken.jpg".into(),
            bytes: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let err = preprocess_photo(&photo, 0.8, 0.08).unwrap_err();
        assert!(matches!(err, UnitError::InvalidImage { .. }));
    }
}
