//! Result types: per-unit outcomes and the run-level report.
//!
//! The pipeline never throws away partial progress. Every photo region
//! produces exactly one [`RegionResult`] carrying the explicit
//! [`UnitState`] it reached, the record/output when it got that far, and the
//! [`UnitError`] when it did not. The [`RunReport`] aggregates them with
//! counts so callers (and the CLI summary) can see at a glance what was
//! assembled and what failed where.

use crate::error::UnitError;
use crate::pipeline::split::SplitRegion;
use crate::recipe::RecipeRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Explicit per-unit pipeline state.
///
/// A result's `state` is the last state the unit successfully reached (or
/// the failure state that terminated it), which makes each transition
/// testable in isolation and keeps cancelled units distinguishable: a unit
/// never scheduled after preprocessing stays at `Split` with no error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    /// Photo received from the source; nothing validated yet.
    Ingested,
    /// Decoded and reshaped to the target aspect ratio.
    Normalized,
    /// Region boundaries decided (possibly just the whole image).
    Split,
    /// Extraction call in flight.
    Extracting,
    /// Extraction failed (validation or retries exhausted); terminal.
    ExtractFailed,
    /// Recipe extracted; illustration call in flight or completed.
    Illustrating,
    /// Illustration failed after retries; terminal.
    IllustrateFailed,
    /// Output document written; terminal success.
    Assembled,
}

/// A generated illustration: raw image bytes plus their MIME type.
///
/// Created once per successfully extracted recipe and never mutated; the
/// writer persists it and only paths travel further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Illustration {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// The terminal bundle for one assembled recipe.
///
/// Fully populated before it is handed to the output writer; written once
/// and not revisited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeOutput {
    pub record: RecipeRecord,
    /// The written Markdown document.
    pub document_path: PathBuf,
    /// The written illustration asset, referenced relatively from the document.
    pub illustration_path: PathBuf,
}

/// Outcome of one photo region (or of a photo that failed before splitting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionResult {
    /// Position of the photo in the source sequence; used for stable report
    /// ordering when units complete out of order.
    pub photo_index: usize,
    /// Source identifier of the originating photo.
    pub photo_id: String,
    /// Index of the region within its photo (0 for unsplit photos and for
    /// photo-level failures).
    pub region_index: usize,
    /// Region bounds within the normalized photo, when splitting happened.
    pub region: Option<SplitRegion>,
    /// Last state the unit reached.
    pub state: UnitState,
    /// The extracted record, when extraction succeeded.
    pub record: Option<RecipeRecord>,
    /// The assembled output, when the unit completed.
    pub output: Option<RecipeOutput>,
    /// The error that terminated the unit, when it failed.
    pub error: Option<UnitError>,
    /// Wall-clock time spent on this unit's extract/illustrate/write chain.
    pub duration_ms: u64,
}

impl RegionResult {
    /// True when the unit produced a written recipe.
    pub fn is_assembled(&self) -> bool {
        self.state == UnitState::Assembled
    }

    /// True when the unit was never scheduled (run cancelled) — it remains
    /// in its last successful state with no error.
    pub fn is_incomplete(&self) -> bool {
        self.error.is_none() && self.state != UnitState::Assembled
    }
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Photos supplied by the source.
    pub total_photos: usize,
    /// Region units produced by preprocessing (photo-level failures count 1).
    pub total_regions: usize,
    /// Units that produced a written recipe.
    pub assembled: usize,
    /// Units whose extraction failed (validation or retries exhausted).
    pub extract_failed: usize,
    /// Units whose illustration failed after retries.
    pub illustrate_failed: usize,
    /// Photos rejected as unusable images.
    pub invalid_photos: usize,
    /// Units left incomplete by cancellation (no error, not assembled).
    pub skipped: usize,
    /// Time spent decoding/normalizing/splitting/encoding.
    pub preprocess_duration_ms: u64,
    /// Time spent in the extract/illustrate/write fan-out.
    pub pipeline_duration_ms: u64,
    /// Whole-run wall-clock time.
    pub total_duration_ms: u64,
}

impl RunStats {
    /// Derive the counters from a result set.
    pub fn tally(results: &[RegionResult], total_photos: usize) -> Self {
        let mut stats = RunStats {
            total_photos,
            total_regions: results.len(),
            ..Default::default()
        };
        for r in results {
            match (&r.state, &r.error) {
                (UnitState::Assembled, _) => stats.assembled += 1,
                (UnitState::ExtractFailed, _) => stats.extract_failed += 1,
                (UnitState::IllustrateFailed, _) => stats.illustrate_failed += 1,
                (_, Some(UnitError::InvalidImage { .. })) => stats.invalid_photos += 1,
                (_, None) => stats.skipped += 1,
                (_, Some(_)) => {}
            }
        }
        stats
    }
}

/// The run-level manifest: every unit outcome plus the aggregate counters.
///
/// A run that reaches the report always "succeeded" in the fatal-error
/// sense — inspect the counts to decide how happy to be about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// One entry per unit, ordered by photo then region.
    pub results: Vec<RegionResult>,
    pub stats: RunStats,
}

impl RunReport {
    /// Iterate the successfully assembled outputs.
    pub fn outputs(&self) -> impl Iterator<Item = &RecipeOutput> {
        self.results.iter().filter_map(|r| r.output.as_ref())
    }

    /// Iterate the per-unit failures with their originating identifiers.
    pub fn failures(&self) -> impl Iterator<Item = &RegionResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(state: UnitState, error: Option<UnitError>) -> RegionResult {
        RegionResult {
            photo_index: 0,
            photo_id: "p.jpg".into(),
            region_index: 0,
            region: None,
            state,
            record: None,
            output: None,
            error,
            duration_ms: 0,
        }
    }

    #[test]
    fn tally_counts_outcomes() {
        let results = vec![
            result(UnitState::Assembled, None),
            result(
                UnitState::ExtractFailed,
                Some(UnitError::ExtractionValidation {
                    photo: "p.jpg".into(),
                    region: 1,
                    detail: "missing ingredients".into(),
                }),
            ),
            result(
                UnitState::Ingested,
                Some(UnitError::InvalidImage {
                    photo: "bad.jpg".into(),
                    detail: "not an image".into(),
                }),
            ),
            result(UnitState::Split, None),
        ];
        let stats = RunStats::tally(&results, 3);
        assert_eq!(stats.total_photos, 3);
        assert_eq!(stats.total_regions, 4);
        assert_eq!(stats.assembled, 1);
        assert_eq!(stats.extract_failed, 1);
        assert_eq!(stats.invalid_photos, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.illustrate_failed, 0);
    }

    #[test]
    fn incomplete_detection() {
        assert!(result(UnitState::Split, None).is_incomplete());
        assert!(!result(UnitState::Assembled, None).is_incomplete());
        let failed = result(
            UnitState::ExtractFailed,
            Some(UnitError::ExtractionFailed {
                photo: "p".into(),
                region: 0,
                retries: 3,
                detail: "503".into(),
            }),
        );
        assert!(!failed.is_incomplete());
    }
}
