//! Style profile: one reusable style descriptor per run.
//!
//! Building the profile is the only stage allowed to look at the reference
//! images, and it happens exactly once — every illustration call in the run
//! then shares the resulting [`StyleProfile`] read-only (via `Arc`), so all
//! generated artwork stays visually consistent and no illustration task ever
//! rebuilds or mutates it.
//!
//! The profile captures shared characteristics two ways: a textual base
//! phrase (configurable, watercolor by default) and a palette sampled from
//! the reference images (mean color per image). Both feed directly into the
//! illustration prompt.

use crate::error::CookbookError;
use crate::prompts;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An immutable style descriptor shared by all illustration requests.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleProfile {
    /// Prompt-ready description of the style.
    pub descriptor: String,
    /// Mean RGB color of each reference image, in reference order.
    pub palette: Vec<[u8; 3]>,
    /// File names of the reference images the profile was built from.
    pub reference_names: Vec<String>,
}

impl StyleProfile {
    /// Palette rendered as `#rrggbb` hex codes.
    pub fn palette_hex(&self) -> Vec<String> {
        self.palette
            .iter()
            .map(|[r, g, b]| format!("#{r:02x}{g:02x}{b:02x}"))
            .collect()
    }
}

/// Build the run's style profile from a reference-image directory.
///
/// Expensive (decodes every reference image) and therefore called once per
/// run, before any illustration work is scheduled. Fails with
/// [`CookbookError::EmptyStyleSet`] when no usable reference image exists and
/// no default style phrase is configured — without a style, every
/// illustration in the run would fail identically, so this is a run-level
/// precondition.
pub fn build_style_profile(
    reference_dir: Option<&Path>,
    default_style: Option<&str>,
) -> Result<StyleProfile, CookbookError> {
    let references = reference_dir.map(collect_references).unwrap_or_default();

    if references.is_empty() {
        return match default_style {
            Some(style) => Ok(StyleProfile {
                descriptor: style.to_string(),
                palette: Vec::new(),
                reference_names: Vec::new(),
            }),
            None => Err(CookbookError::EmptyStyleSet {
                dir: reference_dir.map(Path::to_path_buf),
            }),
        };
    }

    let mut palette = Vec::with_capacity(references.len());
    let mut names = Vec::with_capacity(references.len());
    for path in &references {
        match image::open(path) {
            Ok(img) => {
                palette.push(mean_color(&img));
                names.push(
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string()),
                );
            }
            Err(e) => warn!("Skipping undecodable reference '{}': {}", path.display(), e),
        }
    }

    if palette.is_empty() {
        // Directory had files but none decoded.
        return match default_style {
            Some(style) => Ok(StyleProfile {
                descriptor: style.to_string(),
                palette: Vec::new(),
                reference_names: Vec::new(),
            }),
            None => Err(CookbookError::EmptyStyleSet {
                dir: reference_dir.map(Path::to_path_buf),
            }),
        };
    }

    let base = default_style.unwrap_or(prompts::DEFAULT_STYLE_PHRASE);
    let profile = StyleProfile {
        descriptor: base.to_string(),
        palette,
        reference_names: names,
    };
    debug!(
        "Style profile built from {} references, palette {:?}",
        profile.reference_names.len(),
        profile.palette_hex()
    );
    Ok(profile)
}

/// Name-sorted listing of candidate reference images.
fn collect_references(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    paths
}

/// Mean RGB over a downscaled copy — a cheap, deterministic palette sample.
fn mean_color(img: &image::DynamicImage) -> [u8; 3] {
    // Thumbnail keeps the cost flat regardless of reference resolution.
    let small = img.thumbnail(64, 64).to_rgb8();
    let (w, h) = small.dimensions();
    let count = u64::from(w) * u64::from(h);
    if count == 0 {
        return [0, 0, 0];
    }
    let mut sums = [0u64; 3];
    for pixel in small.pixels() {
        sums[0] += u64::from(pixel.0[0]);
        sums[1] += u64::from(pixel.0[1]);
        sums[2] += u64::from(pixel.0[2]);
    }
    [
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
    ]
}
