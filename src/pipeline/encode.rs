//! Image encoding: `DynamicImage` → base64 PNG wrapped in [`EncodedImage`].
//!
//! Multimodal APIs accept images as base64 data-URIs embedded in the JSON
//! request body. PNG is chosen over JPEG because it is lossless — the crisp
//! edges of handwriting and printed text matter far more than file size for
//! extraction accuracy, and regions have already been bounded by the
//! normalizer.

use crate::adapters::EncodedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a normalized region as a base64 PNG ready for the extraction API.
pub fn encode_region(img: &DynamicImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded region → {} bytes base64", b64.len());

    Ok(EncodedImage {
        data: b64,
        mime_type: "image/png".to_string(),
    })
}
