//! Image placement: one page per input image.
//!
//! Images are scaled to touch the content box on one axis and centred on
//! both; aspect ratio is always preserved. With [`PageSize::Fit`] the page
//! is cut to the image instead (pixels at 96 dpi plus the margins), so the
//! image fills the content box exactly.
//!
//! Anything larger than [`MAX_IMAGE_DIMENSION`] on either side is resampled
//! down first; smaller images are never upscaled.

use crate::config::{ConversionOptions, PageSize, MAX_IMAGE_DIMENSION};
use crate::error::ConvertError;
use crate::pipeline::assemble::PageUnit;
use crate::pipeline::encode::encode_jpeg;
use crate::pipeline::geometry::{px_to_mm, PageGeometry, Rect};
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Shrink so the longer side is at most [`MAX_IMAGE_DIMENSION`].
pub fn downscale(img: DynamicImage) -> DynamicImage {
    if img.width() <= MAX_IMAGE_DIMENSION && img.height() <= MAX_IMAGE_DIMENSION {
        return img;
    }
    let resized = img.resize(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, FilterType::Lanczos3);
    debug!(
        "Downscaled {}x{} → {}x{}",
        img.width(),
        img.height(),
        resized.width(),
        resized.height()
    );
    resized
}

/// Largest centred rectangle with the image's aspect ratio inside the
/// content box.
pub fn place(img_width: u32, img_height: u32, page: &PageGeometry) -> Rect {
    let content = page.content_box();
    let img_ratio = img_width.max(1) as f32 / img_height.max(1) as f32;
    let box_ratio = content.width / content.height;

    let (width, height) = if img_ratio > box_ratio {
        (content.width, content.width / img_ratio)
    } else {
        (content.height * img_ratio, content.height)
    };

    Rect {
        x: content.x + (content.width - width) / 2.0,
        y: content.y + (content.height - height) / 2.0,
        width,
        height,
    }
}

/// Page sized to the image: pixel size at 96 dpi plus `margin_mm` per side.
pub fn fit_page(img_width: u32, img_height: u32, margin_mm: f32) -> PageGeometry {
    PageGeometry::new(
        px_to_mm(img_width as f32) + 2.0 * margin_mm,
        px_to_mm(img_height as f32) + 2.0 * margin_mm,
        margin_mm,
    )
}

/// Decode, downscale, place and re-encode one image input.
pub fn image_page(
    name: &str,
    bytes: &[u8],
    options: &ConversionOptions,
) -> Result<PageUnit, ConvertError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ConvertError::ImageDecodeFailed {
        name: name.to_string(),
        detail: e.to_string(),
    })?;
    let img = downscale(decoded);

    let page = match options.page_size {
        PageSize::Fit => fit_page(img.width(), img.height(), options.margin_mm),
        fixed => PageGeometry::for_flowing(fixed, options.margin_mm),
    };
    let rect = place(img.width(), img.height(), &page);
    let image = encode_jpeg(&img, options.quality).map_err(|e| ConvertError::ImageDecodeFailed {
        name: name.to_string(),
        detail: format!("re-encoding failed: {e}"),
    })?;

    debug!(
        "Placed '{}' ({}x{} px) at {:.1},{:.1} mm, {:.1}x{:.1} mm on {:?} page",
        name,
        img.width(),
        img.height(),
        rect.x,
        rect.y,
        rect.width,
        rect.height,
        page.orientation()
    );
    Ok(PageUnit::Raster { image, page, rect })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::encode_png;
    use crate::pipeline::geometry::Orientation;
    use image::{Rgba, RgbaImage};

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn a4() -> PageGeometry {
        PageGeometry::new(210.0, 297.0, 10.0)
    }

    #[test]
    fn wide_image_uses_full_width() {
        let r = place(2000, 1000, &a4());
        assert!(close(r.width, 190.0));
        assert!(close(r.height, 95.0));
        assert!(close(r.x, 10.0));
        // Vertically centred in the 277 mm content box.
        assert!(close(r.y, 10.0 + (277.0 - 95.0) / 2.0));
    }

    #[test]
    fn tall_image_uses_full_height() {
        let r = place(1000, 4000, &a4());
        assert!(close(r.height, 277.0));
        assert!(close(r.width, 69.25));
        assert!(close(r.x + r.width / 2.0, 105.0));
        assert!(close(r.y, 10.0));
    }

    #[test]
    fn placement_preserves_ratio_and_stays_inside() {
        let page = a4();
        for (w, h) in [(1, 1), (3, 7), (640, 480), (4096, 10), (10, 4096)] {
            let r = place(w, h, &page);
            let content = page.content_box();
            assert!(close(r.width / r.height, w as f32 / h as f32), "{w}x{h}");
            assert!(r.x >= content.x - 1e-3 && r.right() <= content.right() + 1e-3);
            assert!(r.y >= content.y - 1e-3 && r.bottom() <= content.bottom() + 1e-3);
            assert!(close(r.width, content.width) || close(r.height, content.height));
        }
    }

    #[test]
    fn fit_page_fills_exactly() {
        let page = fit_page(960, 480, 5.0);
        assert!(close(page.width_mm, 254.0 + 10.0));
        assert!(close(page.height_mm, 127.0 + 10.0));
        assert_eq!(page.orientation(), Orientation::Landscape);
        let r = place(960, 480, &page);
        assert!(close(r.width, 254.0) && close(r.height, 127.0));
        assert!(close(r.x, 5.0) && close(r.y, 5.0));
    }

    #[test]
    fn downscale_caps_longer_side() {
        let big = DynamicImage::ImageRgba8(RgbaImage::new(8192, 2048));
        let out = downscale(big);
        assert_eq!((out.width(), out.height()), (4096, 1024));

        let small = DynamicImage::ImageRgba8(RgbaImage::new(300, 200));
        let out = downscale(small);
        assert_eq!((out.width(), out.height()), (300, 200));
    }

    #[test]
    fn image_page_reencodes_as_jpeg() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 20, Rgba([9, 9, 9, 128])));
        let png = encode_png(&img).unwrap();
        let unit = image_page("logo.png", &png.data, &ConversionOptions::default()).unwrap();
        match unit {
            PageUnit::Raster { image, page, rect } => {
                assert_eq!(image.mime_type(), "image/jpeg");
                assert_eq!((page.width_mm, page.height_mm), (210.0, 297.0));
                assert!(close(rect.width, 190.0));
            }
            other => panic!("expected raster, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_image_is_an_error() {
        let err = image_page("broken.png", b"not an image", &ConversionOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::ImageDecodeFailed { ref name, .. } if name == "broken.png"));
    }
}
