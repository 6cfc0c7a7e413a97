//! Composite splitting: cut a photo of several dishes into per-dish regions.
//!
//! Photographed contact sheets and multi-shot layouts separate their shots
//! with gutter bands — strips of scanner background or paper margin that are
//! flat in tone and near-white or near-black. The splitter looks for exactly
//! those: a **seam** is a maximal run of flat scan lines (per-line luma
//! spread within [`FLAT_TOLERANCE`]) whose band color is gutter-like, whose
//! width is at least `split_margin_ratio × min(width, height)`, and which
//! does not touch an image edge (edge bands are border trim, not
//! separators).
//!
//! Accepted seams on the vertical and horizontal axes partition the image
//! into a grid of regions, ordered left-to-right then top-to-bottom.
//! Candidate seams are applied widest-first and kept only while every
//! resulting segment stays above the sliver threshold, which yields the
//! fewest, most equally-sized regions for a given seam set and is fully
//! deterministic.
//!
//! Finding no seam is the normal case, not an error: the result is a single
//! region covering the whole image.

use image::{DynamicImage, GenericImageView, GrayImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum luma spread within a scan line (and between adjacent line means)
/// for the line to count as part of a flat band.
pub const FLAT_TOLERANCE: u8 = 12;

/// Minimum size of a split segment along its axis, as a fraction of that
/// axis. Rejects near-empty slivers next to a seam.
pub const MIN_SEGMENT_FRACTION: f32 = 0.10;

/// Band mean luma at or above this counts as a light gutter.
const GUTTER_LIGHT: u8 = 230;
/// Band mean luma at or below this counts as a dark gutter.
const GUTTER_DARK: u8 = 25;

/// One candidate dish photo inside a composite image.
///
/// Invariants: lies within the source bounds; never overlaps a sibling;
/// ordering is row-major (left-to-right, top-to-bottom) and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Margin score: narrowest bounding seam width relative to the required
    /// minimum (≥ 1.0 for any accepted seam; 1.0 for an unsplit image).
    pub confidence: f32,
}

/// A detected seam band along one axis, `[start, end)` in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeamBand {
    start: u32,
    end: u32,
}

impl SeamBand {
    fn width(&self) -> u32 {
        self.end - self.start
    }
}

/// Per-scan-line statistics used for seam detection.
#[derive(Debug, Clone, Copy)]
struct LineStat {
    flat: bool,
    mean: u8,
}

/// Split a normalized photo into candidate dish regions.
///
/// Deterministic: the same image and margin ratio always yield identical
/// region boundaries.
pub fn split_regions(image: &DynamicImage, split_margin_ratio: f32) -> Vec<SplitRegion> {
    let (w, h) = image.dimensions();
    let whole = SplitRegion {
        x: 0,
        y: 0,
        width: w,
        height: h,
        confidence: 1.0,
    };
    if w == 0 || h == 0 || !(split_margin_ratio > 0.0 && split_margin_ratio < 1.0) {
        return vec![whole];
    }

    let required = ((split_margin_ratio * w.min(h) as f32).ceil() as u32).max(1);
    let gray = image.to_luma8();

    let col_stats = column_stats(&gray);
    let row_stats = row_stats(&gray);

    let v_seams = accept_seams(
        candidate_bands(&col_stats, required),
        w,
        min_segment(w),
    );
    let h_seams = accept_seams(
        candidate_bands(&row_stats, required),
        h,
        min_segment(h),
    );

    if v_seams.is_empty() && h_seams.is_empty() {
        return vec![whole];
    }

    let x_segments = segments(w, &v_seams);
    let y_segments = segments(h, &h_seams);
    debug!(
        "Split into {}x{} grid ({} vertical, {} horizontal seams)",
        x_segments.len(),
        y_segments.len(),
        v_seams.len(),
        h_seams.len()
    );

    let mut regions = Vec::with_capacity(x_segments.len() * y_segments.len());
    for &(y0, y1) in &y_segments {
        for &(x0, x1) in &x_segments {
            let conf = region_confidence(&v_seams, &h_seams, (x0, x1), (y0, y1), required);
            regions.push(SplitRegion {
                x: x0,
                y: y0,
                width: x1 - x0,
                height: y1 - y0,
                confidence: conf,
            });
        }
    }
    regions
}

/// Cut one region out of the source image.
pub fn crop_region(image: &DynamicImage, region: &SplitRegion) -> DynamicImage {
    image.crop_imm(region.x, region.y, region.width, region.height)
}

fn min_segment(extent: u32) -> u32 {
    ((MIN_SEGMENT_FRACTION * extent as f32).ceil() as u32).max(1)
}

fn column_stats(gray: &GrayImage) -> Vec<LineStat> {
    let (w, h) = gray.dimensions();
    (0..w)
        .map(|x| {
            let mut min = u8::MAX;
            let mut max = u8::MIN;
            let mut sum = 0u64;
            for y in 0..h {
                let v = gray.get_pixel(x, y).0[0];
                min = min.min(v);
                max = max.max(v);
                sum += u64::from(v);
            }
            LineStat {
                flat: max - min <= FLAT_TOLERANCE,
                mean: (sum / u64::from(h.max(1))) as u8,
            }
        })
        .collect()
}

fn row_stats(gray: &GrayImage) -> Vec<LineStat> {
    let (w, h) = gray.dimensions();
    (0..h)
        .map(|y| {
            let mut min = u8::MAX;
            let mut max = u8::MIN;
            let mut sum = 0u64;
            for x in 0..w {
                let v = gray.get_pixel(x, y).0[0];
                min = min.min(v);
                max = max.max(v);
                sum += u64::from(v);
            }
            LineStat {
                flat: max - min <= FLAT_TOLERANCE,
                mean: (sum / u64::from(w.max(1))) as u8,
            }
        })
        .collect()
}

/// Maximal runs of flat, tone-consistent lines that qualify as gutter bands:
/// wide enough, gutter-colored, and strictly interior.
fn candidate_bands(stats: &[LineStat], required: u32) -> Vec<SeamBand> {
    let extent = stats.len() as u32;
    let mut bands = Vec::new();
    let mut run_start: Option<usize> = None;

    let close_run = |start: usize, end: usize, bands: &mut Vec<SeamBand>| {
        let band = SeamBand {
            start: start as u32,
            end: end as u32,
        };
        if band.width() < required || band.start == 0 || band.end == extent {
            return;
        }
        let mean_sum: u64 = stats[start..end].iter().map(|s| u64::from(s.mean)).sum();
        let band_mean = (mean_sum / u64::from(band.width())) as u8;
        if band_mean >= GUTTER_LIGHT || band_mean <= GUTTER_DARK {
            bands.push(band);
        }
    };

    for i in 0..stats.len() {
        let continues_run = stats[i].flat
            && match run_start {
                Some(_) if i > 0 => stats[i].mean.abs_diff(stats[i - 1].mean) <= FLAT_TOLERANCE,
                _ => true,
            };
        match (run_start, continues_run, stats[i].flat) {
            (Some(s), false, flat) => {
                close_run(s, i, &mut bands);
                run_start = flat.then_some(i);
            }
            (None, _, true) => run_start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = run_start {
        close_run(s, stats.len(), &mut bands);
    }
    bands
}

/// Apply candidate seams widest-first, keeping each only while every
/// resulting segment stays at or above `min_seg`.
fn accept_seams(mut candidates: Vec<SeamBand>, extent: u32, min_seg: u32) -> Vec<SeamBand> {
    candidates.sort_by(|a, b| b.width().cmp(&a.width()).then(a.start.cmp(&b.start)));

    let mut accepted: Vec<SeamBand> = Vec::new();
    for cand in candidates {
        let mut tentative = accepted.clone();
        tentative.push(cand);
        tentative.sort_by_key(|s| s.start);
        if segments(extent, &tentative)
            .iter()
            .all(|(s, e)| e - s >= min_seg)
        {
            accepted = tentative;
        }
    }
    accepted
}

/// The content intervals between accepted seams (and the image edges).
fn segments(extent: u32, seams: &[SeamBand]) -> Vec<(u32, u32)> {
    if seams.is_empty() {
        return vec![(0, extent)];
    }
    let mut out = Vec::with_capacity(seams.len() + 1);
    let mut cursor = 0;
    for seam in seams {
        out.push((cursor, seam.start));
        cursor = seam.end;
    }
    out.push((cursor, extent));
    out
}

/// Margin score for one cell: narrowest adjacent seam relative to `required`.
fn region_confidence(
    v_seams: &[SeamBand],
    h_seams: &[SeamBand],
    (x0, x1): (u32, u32),
    (y0, y1): (u32, u32),
    required: u32,
) -> f32 {
    let narrowest = v_seams
        .iter()
        .filter(|s| s.end == x0 || s.start == x1)
        .chain(h_seams.iter().filter(|s| s.end == y0 || s.start == y1))
        .map(SeamBand::width)
        .min();
    match narrowest {
        Some(w) => w as f32 / required as f32,
        None => 1.0,
    }
}
