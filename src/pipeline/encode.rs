//! Image encoding: `DynamicImage` → compressed bytes ready for embedding.
//!
//! Every raster page is stored as a JPEG at the configured quality while
//! page units accumulate. A 50-page HTML document rendered at 2× would hold
//! several hundred megabytes of RGBA strips otherwise; JPEG keeps the
//! in-flight set small and is what ends up in the PDF anyway.
//!
//! DOCX media are turned into `data:` URIs so they can travel through the
//! HTML stage like any other `<img>`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// A compressed raster plus its pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Decode back to pixels (at the PDF sink).
    pub fn decode(&self) -> Result<DynamicImage, image::ImageError> {
        image::load_from_memory_with_format(&self.data, self.format)
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// `data:<mime>;base64,<payload>` form for inline HTML.
    pub fn to_data_uri(&self) -> String {
        data_uri(self.mime_type(), &self.data)
    }
}

/// Map a `(0, 1]` quality fraction to the JPEG encoder's 1–100 scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode as JPEG, flattening any alpha channel onto white.
///
/// JPEG has no alpha; without flattening, transparent PNG regions would come
/// out black.
pub fn encode_jpeg(img: &DynamicImage, quality: f32) -> Result<EncodedImage, image::ImageError> {
    let rgb = if img.color().has_alpha() {
        flatten_on_white(img)
    } else {
        img.to_rgb8()
    };

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality));
    encoder.encode_image(&rgb)?;
    debug!(
        "Encoded {}x{} raster → {} bytes JPEG",
        rgb.width(),
        rgb.height(),
        buf.len()
    );

    Ok(EncodedImage {
        data: buf,
        format: ImageFormat::Jpeg,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Encode losslessly as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(EncodedImage {
        data: buf,
        format: ImageFormat::Png,
        width: img.width(),
        height: img.height(),
    })
}

/// Base64 `data:` URI for arbitrary bytes.
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Decode a `data:<mime>;base64,<payload>` URI. Returns `None` for anything
/// else (remote URLs, relative paths, non-base64 payloads).
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    STANDARD.decode(payload.trim()).ok()
}

fn flatten_on_white(img: &DynamicImage) -> image::RgbImage {
    let rgba: RgbaImage = img.to_rgba8();
    let mut out = image::RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        out.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}
