//! pdfium-backed rendering: PDF emission and off-screen rasterisation.
//!
//! ## Why sessions?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which keeps
//! thread-local state and must not be driven from async tasks. A
//! [`RenderBackend`] is the `Send + Sync` handle the converter keeps; inside
//! the batch's `spawn_blocking` closure it opens a [`RenderSession`] that
//! binds the library and hands out documents and surfaces borrowed from it.
//!
//! ## Why rasterise through a PDF page?
//!
//! pdfium already carries the base-14 fonts and an anti-aliasing renderer.
//! A laid-out HTML document is drawn as text, path and image objects onto a
//! scratch page in a throwaway document, and that page is rendered to a
//! bitmap. Very tall layouts are split into bands so no scratch page exceeds
//! the PDF page-size limit; the bands are stitched back together.

use crate::config::ConversionOptions;
use crate::error::ConvertError;
use crate::pipeline::assemble::{DocumentSink, TextLine};
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::fonts::FontFace;
use crate::pipeline::geometry::{mm_to_pt, px_to_pt, PageGeometry, Rect};
use crate::pipeline::layout::{LayoutItem, LayoutNode};
use crate::pipeline::raster::RenderSurface;
use image::{imageops, DynamicImage, ImageFormat, Rgb, RgbImage};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the pdfium library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Tallest scratch page, in CSS pixels (well under the 14 400 pt PDF limit).
const MAX_BAND_PX: f32 = 8192.0;

/// Factory the converter holds across batches.
pub trait RenderBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Bind whatever native resources a batch needs.
    fn open(&self) -> Result<Box<dyn RenderSession>, ConvertError>;
}

/// Per-batch handle; documents and surfaces borrow from it.
pub trait RenderSession {
    fn open_document(&self) -> Result<Box<dyn DocumentSink + '_>, ConvertError>;

    /// Acquire an off-screen surface. Dropping the box releases it.
    fn open_surface(&self) -> Result<Box<dyn RenderSurface + '_>, ConvertError>;
}

// ── Backend ──────────────────────────────────────────────────────────────────

/// Backend bound to the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Use `path` (a library file or the directory holding it), falling back
    /// to the system library.
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    /// Library path from the options, then `PDFIUM_LIB_PATH`.
    pub fn from_options(options: &ConversionOptions) -> Self {
        let path = options
            .pdfium_library_path
            .clone()
            .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));
        Self::new(path)
    }

    pub fn library_path(&self) -> Option<&Path> {
        self.library_path.as_deref()
    }

    /// Load the library. Any failure means no surface is available.
    pub fn bind(&self) -> Result<Pdfium, ConvertError> {
        let bindings = match &self.library_path {
            Some(path) => {
                let library = if path.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(path)
                } else {
                    path.clone()
                };
                Pdfium::bind_to_library(&library).or_else(|e| {
                    debug!("Binding {} failed ({:?}); trying system library", library.display(), e);
                    Pdfium::bind_to_system_library()
                })
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ConvertError::RenderSurfaceUnavailable(format!("{e:?}")))?;

        Ok(Pdfium::new(bindings))
    }
}

impl RenderBackend for PdfiumBackend {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn open(&self) -> Result<Box<dyn RenderSession>, ConvertError> {
        let pdfium = self.bind()?;
        info!("pdfium bound");
        Ok(Box::new(PdfiumSession { pdfium }))
    }
}

struct PdfiumSession {
    pdfium: Pdfium,
}

impl RenderSession for PdfiumSession {
    fn open_document(&self) -> Result<Box<dyn DocumentSink + '_>, ConvertError> {
        Ok(Box::new(PdfiumSink::new(&self.pdfium)?))
    }

    fn open_surface(&self) -> Result<Box<dyn RenderSurface + '_>, ConvertError> {
        debug!("Acquired pdfium render surface");
        Ok(Box::new(PdfiumSurface {
            pdfium: &self.pdfium,
        }))
    }
}

// ── Fonts ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct FontSet {
    helvetica: PdfFontToken,
    helvetica_bold: PdfFontToken,
    helvetica_oblique: PdfFontToken,
    helvetica_bold_oblique: PdfFontToken,
    courier: PdfFontToken,
    courier_bold: PdfFontToken,
}

impl FontSet {
    fn load(document: &mut PdfDocument<'_>) -> Self {
        let fonts = document.fonts_mut();
        Self {
            helvetica: fonts.helvetica(),
            helvetica_bold: fonts.helvetica_bold(),
            helvetica_oblique: fonts.helvetica_oblique(),
            helvetica_bold_oblique: fonts.helvetica_bold_oblique(),
            courier: fonts.courier(),
            courier_bold: fonts.courier_bold(),
        }
    }

    fn token(&self, face: FontFace) -> PdfFontToken {
        match face {
            FontFace::Helvetica => self.helvetica,
            FontFace::HelveticaBold => self.helvetica_bold,
            FontFace::HelveticaOblique => self.helvetica_oblique,
            FontFace::HelveticaBoldOblique => self.helvetica_bold_oblique,
            FontFace::Courier => self.courier,
            FontFace::CourierBold => self.courier_bold,
        }
    }
}

fn pdf_err(context: &str) -> impl Fn(PdfiumError) -> ConvertError + '_ {
    move |e| ConvertError::raster(format!("{context}: {e:?}"))
}

// ── Sink ─────────────────────────────────────────────────────────────────────

/// Writes the output PDF.
pub struct PdfiumSink<'a> {
    document: PdfDocument<'a>,
    fonts: FontSet,
    page: Option<(PdfPage<'a>, PageGeometry)>,
}

impl<'a> PdfiumSink<'a> {
    pub fn new(pdfium: &'a Pdfium) -> Result<Self, ConvertError> {
        let mut document = pdfium
            .create_new_pdf()
            .map_err(pdf_err("cannot create document"))?;
        let fonts = FontSet::load(&mut document);
        Ok(Self {
            document,
            fonts,
            page: None,
        })
    }

    fn current(&mut self) -> Result<&mut (PdfPage<'a>, PageGeometry), ConvertError> {
        self.page
            .as_mut()
            .ok_or_else(|| ConvertError::Internal("drawing before the first page".to_string()))
    }
}

impl DocumentSink for PdfiumSink<'_> {
    fn add_page(&mut self, geometry: &PageGeometry) -> Result<(), ConvertError> {
        // Dropping the previous page regenerates its content stream.
        self.page = None;
        let size = PdfPagePaperSize::Custom(
            PdfPoints::new(mm_to_pt(geometry.width_mm)),
            PdfPoints::new(mm_to_pt(geometry.height_mm)),
        );
        let page = self
            .document
            .pages_mut()
            .create_page_at_end(size)
            .map_err(pdf_err("cannot add page"))?;
        self.page = Some((page, *geometry));
        Ok(())
    }

    fn draw_image(&mut self, image: &EncodedImage, rect: Rect) -> Result<(), ConvertError> {
        let page_h = self.current()?.1.height_mm;

        // JPEG data is embedded as-is (DCTDecode); anything else goes in as pixels.
        let mut object = match image.format {
            ImageFormat::Jpeg => PdfPageImageObject::new_from_jpeg_reader(
                &self.document,
                Cursor::new(image.data.as_slice()),
            ),
            _ => {
                let pixels = image.decode().map_err(ConvertError::raster)?;
                PdfPageImageObject::new(&self.document, &pixels)
            }
        }
        .map_err(pdf_err("cannot load image"))?;

        // New image objects are one point square.
        object
            .scale(mm_to_pt(rect.width), mm_to_pt(rect.height))
            .map_err(pdf_err("cannot size image"))?;
        object
            .translate(
                PdfPoints::new(mm_to_pt(rect.x)),
                PdfPoints::new(mm_to_pt(page_h - rect.bottom())),
            )
            .map_err(pdf_err("cannot position image"))?;

        let (page, _) = self.current()?;
        page.objects_mut()
            .add_image_object(object)
            .map_err(pdf_err("cannot place image"))?;
        Ok(())
    }

    fn draw_text(&mut self, line: &TextLine) -> Result<(), ConvertError> {
        let font = self.fonts.token(line.face);
        let (page, geometry) = self.current()?;
        let page_h = geometry.height_mm;
        page.objects_mut()
            .create_text_object(
                PdfPoints::new(mm_to_pt(line.x_mm)),
                PdfPoints::new(mm_to_pt(page_h - line.baseline_mm)),
                &line.text,
                font,
                PdfPoints::new(line.size_pt),
            )
            .map_err(pdf_err("cannot place text"))?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>, ConvertError> {
        self.page = None;
        self.document
            .save_to_bytes()
            .map_err(pdf_err("cannot serialise document"))
    }
}

// ── Surface ──────────────────────────────────────────────────────────────────

/// Rasterises layouts through scratch documents.
pub struct PdfiumSurface<'a> {
    pdfium: &'a Pdfium,
}

impl RenderSurface for PdfiumSurface<'_> {
    fn rasterize(&self, node: &LayoutNode, scale: f32) -> Result<DynamicImage, ConvertError> {
        let width = (node.width_px * scale).ceil().max(1.0) as u32;
        let height = (node.height_px * scale).ceil().max(1.0) as u32;
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

        let mut band_top = 0.0f32;
        while band_top < node.height_px {
            let band_h = (node.height_px - band_top).min(MAX_BAND_PX);
            let band = self.render_band(node, band_top, band_h, width)?;
            imageops::replace(&mut canvas, &band, 0, (band_top * scale).round() as i64);
            band_top += band_h;
        }

        debug!("Rasterised layout → {}x{} px", width, height);
        Ok(DynamicImage::ImageRgb8(canvas))
    }
}

impl PdfiumSurface<'_> {
    fn render_band(
        &self,
        node: &LayoutNode,
        top: f32,
        height: f32,
        target_width: u32,
    ) -> Result<RgbImage, ConvertError> {
        let mut scratch = self
            .pdfium
            .create_new_pdf()
            .map_err(pdf_err("cannot create scratch document"))?;
        let fonts = FontSet::load(&mut scratch);

        let page_w = px_to_pt(node.width_px);
        let page_h = px_to_pt(height);
        let mut page = scratch
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                PdfPoints::new(page_w),
                PdfPoints::new(page_h),
            ))
            .map_err(pdf_err("cannot create scratch page"))?;

        for item in &node.items {
            let (item_top, item_bottom) = item.vertical_extent();
            if item_bottom < top || item_top > top + height {
                continue;
            }
            // Flip to pdfium's bottom-left origin within this band.
            let flip = |y_px: f32| page_h - px_to_pt(y_px - top);
            let objects = page.objects_mut();
            match item {
                LayoutItem::Fill { rect, color } => {
                    objects
                        .create_path_object_rect(
                            PdfRect::new_from_values(
                                flip(rect.bottom()),
                                px_to_pt(rect.x),
                                flip(rect.y),
                                px_to_pt(rect.x + rect.width),
                            ),
                            None,
                            None,
                            Some(PdfColor::new(color[0], color[1], color[2], 255)),
                        )
                        .map_err(pdf_err("cannot draw fill"))?;
                }
                LayoutItem::Image { rect, image } => {
                    objects
                        .create_image_object(
                            PdfPoints::new(px_to_pt(rect.x)),
                            PdfPoints::new(flip(rect.bottom())),
                            image,
                            Some(PdfPoints::new(px_to_pt(rect.width))),
                            Some(PdfPoints::new(px_to_pt(rect.height))),
                        )
                        .map_err(pdf_err("cannot draw image"))?;
                }
                LayoutItem::Text {
                    x,
                    baseline,
                    text,
                    style,
                } => {
                    let mut object = objects
                        .create_text_object(
                            PdfPoints::new(px_to_pt(*x)),
                            PdfPoints::new(flip(*baseline)),
                            text,
                            fonts.token(style.face),
                            PdfPoints::new(px_to_pt(style.size_px)),
                        )
                        .map_err(pdf_err("cannot draw text"))?;
                    let [r, g, b] = style.color;
                    object
                        .set_fill_color(PdfColor::new(r, g, b, 255))
                        .map_err(pdf_err("cannot colour text"))?;
                }
            }
        }

        page.regenerate_content()
            .map_err(pdf_err("cannot finalise scratch page"))?;
        let bitmap = page
            .render_with_config(&PdfRenderConfig::new().set_target_width(target_width as i32))
            .map_err(pdf_err("cannot render scratch page"))?;
        Ok(bitmap.as_image().to_rgb8())
    }
}

impl Drop for PdfiumSurface<'_> {
    fn drop(&mut self) {
        debug!("Released pdfium render surface");
    }
}
