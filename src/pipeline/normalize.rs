//! Aspect normalization: reshape a photo to the target width/height ratio.
//!
//! Two strategies, chosen by how far the photo is from target:
//!
//! * **Small divergence** (≤ [`CROP_DIVERGENCE`]) — crop the over-long
//!   dimension symmetrically. The trimmed strip is a few percent per edge, so
//!   no meaningful subject matter is lost and the result has no borders.
//! * **Large divergence** — letterbox: pad the short dimension with a neutral
//!   border. Cropping here would cut real content (half a recipe card), so
//!   padding preserves everything at the cost of visible margins.
//!
//! Decoding also lives here so that a corrupt or zero-sized photo surfaces as
//! a per-photo [`UnitError::InvalidImage`] and never aborts the run.

use crate::error::UnitError;
use crate::source::Photo;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use tracing::debug;

/// Tolerance for "already at target ratio" — matches the behaviour of
/// treating a 0.01 ratio difference as visually identical.
pub const RATIO_EPSILON: f32 = 0.01;

/// Largest ratio divergence fixed by symmetric cropping; anything beyond is
/// letterboxed instead.
pub const CROP_DIVERGENCE: f32 = 0.05;

/// Letterbox border color: near-white, like the paper margin of a recipe card.
const PAD_COLOR: Rgba<u8> = Rgba([250, 250, 250, 255]);

/// A photo reshaped to the target aspect ratio.
///
/// Invariant: `|width/height − target| ≤ RATIO_EPSILON`.
#[derive(Debug, Clone)]
pub struct NormalizedPhoto {
    /// Source identifier carried through from the [`Photo`].
    pub id: String,
    pub image: DynamicImage,
}

/// Decode a photo's raw bytes, rejecting unusable input.
pub fn decode_photo(photo: &Photo) -> Result<DynamicImage, UnitError> {
    let image = image::load_from_memory(&photo.bytes).map_err(|e| UnitError::InvalidImage {
        photo: photo.id.clone(),
        detail: e.to_string(),
    })?;
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(UnitError::InvalidImage {
            photo: photo.id.clone(),
            detail: format!("degenerate dimensions {w}x{h}"),
        });
    }
    Ok(image)
}

/// Reshape `image` to `target_ratio` (width/height) by symmetric crop or
/// letterbox pad.
///
/// Idempotent: an image already within [`RATIO_EPSILON`] of target is
/// returned unchanged.
pub fn normalize_aspect(image: &DynamicImage, target_ratio: f32) -> Result<DynamicImage, String> {
    if !(target_ratio > 0.0) || !target_ratio.is_finite() {
        return Err(format!("target ratio must be positive, got {target_ratio}"));
    }
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(format!("degenerate dimensions {w}x{h}"));
    }

    let ratio = w as f32 / h as f32;
    let divergence = (ratio - target_ratio).abs();
    if divergence <= RATIO_EPSILON {
        return Ok(image.clone());
    }

    let result = if divergence <= CROP_DIVERGENCE {
        crop_to_ratio(image, w, h, ratio, target_ratio)
    } else {
        pad_to_ratio(image, w, h, ratio, target_ratio)
    };

    let (nw, nh) = result.dimensions();
    debug!(
        "Normalized {}x{} (ratio {:.3}) → {}x{} (target {:.3})",
        w, h, ratio, nw, nh, target_ratio
    );
    Ok(result)
}

/// Symmetric center crop of the over-long dimension.
fn crop_to_ratio(
    image: &DynamicImage,
    w: u32,
    h: u32,
    ratio: f32,
    target_ratio: f32,
) -> DynamicImage {
    if ratio > target_ratio {
        // Wider than target: trim width equally from both sides.
        let new_w = ((h as f32 * target_ratio).round() as u32).clamp(1, w);
        let x = (w - new_w) / 2;
        image.crop_imm(x, 0, new_w, h)
    } else {
        // Taller than target: trim height equally from top and bottom.
        let new_h = ((w as f32 / target_ratio).round() as u32).clamp(1, h);
        let y = (h - new_h) / 2;
        image.crop_imm(0, y, w, new_h)
    }
}

/// Letterbox: center the image on a neutral canvas extended along the short
/// dimension.
fn pad_to_ratio(
    image: &DynamicImage,
    w: u32,
    h: u32,
    ratio: f32,
    target_ratio: f32,
) -> DynamicImage {
    let (canvas_w, canvas_h) = if ratio > target_ratio {
        // Wider than target: extend height.
        (w, ((w as f32 / target_ratio).round() as u32).max(h))
    } else {
        // Taller than target: extend width.
        (((h as f32 * target_ratio).round() as u32).max(w), h)
    };

    let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, PAD_COLOR);
    let x = i64::from((canvas_w - w) / 2);
    let y = i64::from((canvas_h - h) / 2);
    image::imageops::overlay(&mut canvas, &image.to_rgba8(), x, y);
    DynamicImage::ImageRgba8(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([90, 120, 60, 255])))
    }

    fn ratio_of(img: &DynamicImage) -> f32 {
        let (w, h) = img.dimensions();
        w as f32 / h as f32
    }

    #[test]
    fn ratio_invariant_holds_for_various_targets() {
        let img = solid(400, 300);
        for target in [0.5, 0.8, 1.0, 1.5, 2.0] {
            let out = normalize_aspect(&img, target).unwrap();
            assert!(
                (ratio_of(&out) - target).abs() <= RATIO_EPSILON,
                "target {target}: got ratio {}",
                ratio_of(&out)
            );
        }
    }

    #[test]
    fn within_epsilon_returns_unchanged() {
        let img = solid(400, 500); // exactly 0.8
        let out = normalize_aspect(&img, 0.8).unwrap();
        assert_eq!(out.dimensions(), (400, 500));
    }

    #[test]
    fn normalization_is_idempotent() {
        let img = solid(640, 480);
        let once = normalize_aspect(&img, 0.8).unwrap();
        let twice = normalize_aspect(&once, 0.8).unwrap();
        assert!((ratio_of(&once) - ratio_of(&twice)).abs() <= RATIO_EPSILON);
        assert_eq!(once.dimensions(), twice.dimensions());
    }

    #[test]
    fn small_divergence_crops_instead_of_padding() {
        // 420/500 = 0.84, divergence 0.04 → symmetric width crop.
        let img = solid(420, 500);
        let out = normalize_aspect(&img, 0.8).unwrap();
        assert_eq!(out.dimensions(), (400, 500));
    }

    #[test]
    fn large_divergence_pads_wide_image_taller() {
        // 400/300 ≈ 1.333 vs 0.8 → pad height, never cut content.
        let img = solid(400, 300);
        let out = normalize_aspect(&img, 0.8).unwrap();
        assert_eq!(out.dimensions(), (400, 500));
    }

    #[test]
    fn large_divergence_pads_tall_image_wider() {
        // 300/600 = 0.5 vs 0.8 → pad width.
        let img = solid(300, 600);
        let out = normalize_aspect(&img, 0.8).unwrap();
        assert_eq!(out.dimensions(), (480, 600));
    }

    #[test]
    fn degenerate_dimensions_rejected() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 10));
        assert!(normalize_aspect(&img, 0.8).is_err());
    }

    #[test]
    fn nonpositive_target_rejected() {
        let img = solid(100, 100);
        assert!(normalize_aspect(&img, 0.0).is_err());
        assert!(normalize_aspect(&img, -1.0).is_err());
    }

    #[test]
    fn decode_rejects_garbage_bytes() {
        let photo = Photo {
            id: "junk.jpg".into(),
            bytes: vec![0u8; 64],
        };
        let err = decode_photo(&photo).unwrap_err();
        assert!(matches!(err, UnitError::InvalidImage { .. }));
        assert_eq!(err.photo(), "junk.jpg");
    }

    #[test]
    fn decode_accepts_png_bytes() {
        let mut buf = Vec::new();
        solid(20, 20)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let photo = Photo {
            id: "ok.png".into(),
            bytes: buf,
        };
        let img = decode_photo(&photo).unwrap();
        assert_eq!(img.dimensions(), (20, 20));
    }
}
