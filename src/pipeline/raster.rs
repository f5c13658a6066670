//! Rasterised-page paginator: HTML → one tall bitmap → page-height strips.
//!
//! The whole document is laid out at the content width and rasterised once
//! at `render_scale`. The bitmap is then cut into strips exactly one content
//! box tall, each becoming a page. Text is therefore not selectable in the
//! output; layout fidelity wins over file size for formatted inputs.
//!
//! ## Surface lifetime
//!
//! The [`RenderSurface`] passed in is a guard obtained from
//! [`crate::pipeline::render::RenderSession::open_surface`]. Dropping it
//! releases the off-screen resources, so every early return through `?`
//! below (layout failure, rasterisation failure, encoding failure) releases
//! it too. No partial page list ever escapes this function.

use crate::config::ConversionOptions;
use crate::error::ConvertError;
use crate::pipeline::assemble::PageUnit;
use crate::pipeline::encode::encode_jpeg;
use crate::pipeline::geometry::{mm_to_px, PageGeometry, Rect};
use crate::pipeline::layout::{layout_html, LayoutNode};
use image::DynamicImage;
use tracing::debug;

/// An off-screen 2-D surface that can lay out and rasterise HTML.
pub trait RenderSurface {
    /// Lay out `html` at `width_px` CSS pixels with the base stylesheet.
    fn layout(&self, html: &str, width_px: f32) -> Result<LayoutNode, ConvertError> {
        Ok(layout_html(html, width_px))
    }

    /// Rasterise `node` at `scale` device pixels per CSS pixel.
    fn rasterize(&self, node: &LayoutNode, scale: f32) -> Result<DynamicImage, ConvertError>;
}

/// Paginate one HTML fragment.
///
/// `progress` receives local percentages: 10 after layout, 40 after
/// rasterisation, then evenly up to 100 as strips are encoded.
pub fn paginate_html(
    html: &str,
    geometry: &PageGeometry,
    options: &ConversionOptions,
    surface: &dyn RenderSurface,
    progress: &mut dyn FnMut(f32),
) -> Result<Vec<PageUnit>, ConvertError> {
    let content_width_mm = geometry.content_width_mm();
    let width_px = mm_to_px(content_width_mm);
    let scale = options.render_scale;

    let node = surface.layout(html, width_px)?;
    progress(10.0);

    let bitmap = surface.rasterize(&node, scale)?;
    progress(40.0);

    let (bitmap_w, bitmap_h) = (bitmap.width(), bitmap.height());
    if bitmap_w == 0 || bitmap_h == 0 {
        return Err(ConvertError::raster(format!(
            "surface produced an empty {bitmap_w}x{bitmap_h} bitmap"
        )));
    }

    let strip_px = mm_to_px(geometry.content_height_mm()) * scale;
    let page_count = ((bitmap_h as f32 / strip_px).ceil() as usize).max(1);
    debug!(
        "Slicing {}x{} bitmap into {} pages of {:.0}px",
        bitmap_w, bitmap_h, page_count, strip_px
    );

    let mut units = Vec::with_capacity(page_count);
    for i in 0..page_count {
        let top = ((i as f32 * strip_px).floor() as u32).min(bitmap_h - 1);
        let bottom = if i + 1 == page_count {
            bitmap_h
        } else {
            (((i + 1) as f32 * strip_px).floor() as u32).clamp(top + 1, bitmap_h)
        };
        let strip_h = bottom - top;

        let strip = bitmap.crop_imm(0, top, bitmap_w, strip_h);
        let image = encode_jpeg(&strip, options.quality).map_err(ConvertError::raster)?;

        units.push(PageUnit::Raster {
            image,
            page: *geometry,
            rect: Rect {
                x: geometry.margin_mm,
                y: geometry.margin_mm,
                width: content_width_mm,
                height: strip_h as f32 / bitmap_w as f32 * content_width_mm,
            },
        });
        progress(40.0 + 60.0 * (i + 1) as f32 / page_count as f32);
    }

    Ok(units)
}
