//! In-process render backend for dry runs and tests.
//!
//! [`MemoryBackend`] needs no native library. Its surface paints a low-fidelity
//! preview (fills and images at their real positions, text "greeked" as grey
//! bars) and its sink records every drawing operation instead of writing PDF
//! syntax. Page counts, geometry and placement are therefore identical to a
//! pdfium run; only the bytes differ.

use crate::error::ConvertError;
use crate::pipeline::assemble::{DocumentSink, TextLine};
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::geometry::{PageGeometry, Rect};
use crate::pipeline::layout::{LayoutItem, LayoutNode, PxRect};
use crate::pipeline::raster::RenderSurface;
use crate::pipeline::render::{RenderBackend, RenderSession};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One recorded [`DocumentSink`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    AddPage(PageGeometry),
    DrawImage { rect: Rect, width: u32, height: u32 },
    DrawText(TextLine),
}

pub type SinkLog = Arc<Mutex<Vec<SinkOp>>>;

#[derive(Debug, Default)]
struct Counters {
    surfaces_open: AtomicUsize,
    surfaces_acquired: AtomicUsize,
    fail_rasterize: AtomicBool,
}

/// Backend that renders previews and records sink operations.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    counters: Arc<Counters>,
    log: SinkLog,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose surfaces fail every rasterisation.
    pub fn failing_rasterization() -> Self {
        let backend = Self::default();
        backend.counters.fail_rasterize.store(true, Ordering::SeqCst);
        backend
    }

    /// Operations recorded by every document opened from this backend.
    pub fn operations(&self) -> Vec<SinkOp> {
        self.log.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    /// Surfaces currently held (acquired and not yet dropped).
    pub fn surfaces_open(&self) -> usize {
        self.counters.surfaces_open.load(Ordering::SeqCst)
    }

    /// Surfaces acquired over the backend's lifetime.
    pub fn surfaces_acquired(&self) -> usize {
        self.counters.surfaces_acquired.load(Ordering::SeqCst)
    }
}

impl RenderBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self) -> Result<Box<dyn RenderSession>, ConvertError> {
        Ok(Box::new(self.clone()))
    }
}

impl RenderSession for MemoryBackend {
    fn open_document(&self) -> Result<Box<dyn DocumentSink + '_>, ConvertError> {
        Ok(Box::new(MemorySink::with_log(Arc::clone(&self.log))))
    }

    fn open_surface(&self) -> Result<Box<dyn RenderSurface + '_>, ConvertError> {
        self.counters.surfaces_open.fetch_add(1, Ordering::SeqCst);
        self.counters.surfaces_acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySurface {
            counters: &self.counters,
        }))
    }
}

struct MemorySurface<'a> {
    counters: &'a Counters,
}

impl RenderSurface for MemorySurface<'_> {
    fn rasterize(&self, node: &LayoutNode, scale: f32) -> Result<DynamicImage, ConvertError> {
        if self.counters.fail_rasterize.load(Ordering::SeqCst) {
            return Err(ConvertError::raster("memory surface configured to fail"));
        }
        Ok(DynamicImage::ImageRgb8(paint_preview(node, scale)))
    }
}

impl Drop for MemorySurface<'_> {
    fn drop(&mut self) {
        self.counters.surfaces_open.fetch_sub(1, Ordering::SeqCst);
        debug!("Released memory render surface");
    }
}

/// Paint `node` without a font rasteriser.
pub fn paint_preview(node: &LayoutNode, scale: f32) -> RgbImage {
    let width = (node.width_px * scale).ceil().max(1.0) as u32;
    let height = (node.height_px * scale).ceil().max(1.0) as u32;
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    for item in &node.items {
        match item {
            LayoutItem::Fill { rect, color } => fill(&mut canvas, rect, scale, Rgb(*color)),
            LayoutItem::Image { rect, image } => {
                let w = (rect.width * scale).round().max(1.0) as u32;
                let h = (rect.height * scale).round().max(1.0) as u32;
                let scaled = image.resize_exact(w, h, FilterType::Triangle).to_rgb8();
                imageops::replace(
                    &mut canvas,
                    &scaled,
                    (rect.x * scale).round() as i64,
                    (rect.y * scale).round() as i64,
                );
            }
            LayoutItem::Text {
                x,
                baseline,
                text,
                style,
            } => {
                let bar = PxRect {
                    x: *x,
                    y: baseline - style.size_px * 0.5,
                    width: style.face.measure(text, style.size_px),
                    height: style.size_px * 0.4,
                };
                fill(&mut canvas, &bar, scale, Rgb([160, 160, 160]));
            }
        }
    }
    canvas
}

fn fill(canvas: &mut RgbImage, rect: &PxRect, scale: f32, color: Rgb<u8>) {
    let x0 = (rect.x * scale).max(0.0) as u32;
    let y0 = (rect.y * scale).max(0.0) as u32;
    let x1 = ((rect.x + rect.width) * scale).max(0.0).ceil() as u32;
    let y1 = ((rect.y + rect.height) * scale).max(0.0).ceil() as u32;
    for y in y0..y1.min(canvas.height()) {
        for x in x0..x1.min(canvas.width()) {
            canvas.put_pixel(x, y, color);
        }
    }
}

/// A [`DocumentSink`] that records operations.
///
/// `finish` returns a plain-text transcript, one operation per line.
pub struct MemorySink {
    log: SinkLog,
    start: usize,
}

impl MemorySink {
    /// A sink with its own log.
    pub fn new() -> (Self, SinkLog) {
        let log = SinkLog::default();
        (Self::with_log(Arc::clone(&log)), log)
    }

    fn with_log(log: SinkLog) -> Self {
        let start = log.lock().map(|ops| ops.len()).unwrap_or(0);
        Self { log, start }
    }

    fn record(&self, op: SinkOp) -> Result<(), ConvertError> {
        self.log
            .lock()
            .map_err(|_| ConvertError::Internal("sink log poisoned".to_string()))?
            .push(op);
        Ok(())
    }
}

impl DocumentSink for MemorySink {
    fn add_page(&mut self, page: &PageGeometry) -> Result<(), ConvertError> {
        self.record(SinkOp::AddPage(*page))
    }

    fn draw_image(&mut self, image: &EncodedImage, rect: Rect) -> Result<(), ConvertError> {
        self.record(SinkOp::DrawImage {
            rect,
            width: image.width,
            height: image.height,
        })
    }

    fn draw_text(&mut self, line: &TextLine) -> Result<(), ConvertError> {
        self.record(SinkOp::DrawText(line.clone()))
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, ConvertError> {
        let ops = self
            .log
            .lock()
            .map_err(|_| ConvertError::Internal("sink log poisoned".to_string()))?;
        let mut out = String::from("%memory-sink\n");
        for op in ops.iter().skip(self.start) {
            // Writing to a String cannot fail.
            let _ = match op {
                SinkOp::AddPage(p) => {
                    writeln!(out, "page {:.2}x{:.2}mm margin {:.2}", p.width_mm, p.height_mm, p.margin_mm)
                }
                SinkOp::DrawImage {
                    rect,
                    width,
                    height,
                } => writeln!(
                    out,
                    "image {width}x{height}px at {:.2},{:.2} size {:.2}x{:.2}mm",
                    rect.x, rect.y, rect.width, rect.height
                ),
                SinkOp::DrawText(line) => writeln!(
                    out,
                    "text {:?} {:.2}pt at {:.2},{:.2} {:?}",
                    line.face, line.size_pt, line.x_mm, line.baseline_mm, line.text
                ),
            };
        }
        Ok(out.into_bytes())
    }
}
