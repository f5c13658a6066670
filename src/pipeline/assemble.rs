//! Page units and the assembler that turns them into one document.
//!
//! Paginators never talk to the PDF library. They return plain
//! [`PageUnit`] values, which [`PdfAssembler`] replays, in order, onto a
//! [`DocumentSink`]. The production sink is pdfium
//! ([`crate::pipeline::render::PdfiumSink`]); tests and dry runs use
//! [`crate::pipeline::memory::MemorySink`].

use crate::config::COMBINED_FILENAME;
use crate::error::ConvertError;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::fonts::FontFace;
use crate::pipeline::geometry::{PageGeometry, Rect};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One line of vector text, positioned in millimetres from the top-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub x_mm: f32,
    pub baseline_mm: f32,
    pub face: FontFace,
    pub size_pt: f32,
}

/// Everything needed to emit one output page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageUnit {
    /// A raster image placed in `rect`.
    Raster {
        image: EncodedImage,
        page: PageGeometry,
        rect: Rect,
    },
    /// Monospaced text lines.
    Text {
        page: PageGeometry,
        lines: Vec<TextLine>,
    },
}

impl PageUnit {
    pub fn page(&self) -> &PageGeometry {
        match self {
            PageUnit::Raster { page, .. } | PageUnit::Text { page, .. } => page,
        }
    }
}

/// A PDF writer, one page at a time.
///
/// Pages are append-only: drawing calls always target the page added last.
pub trait DocumentSink {
    fn add_page(&mut self, page: &PageGeometry) -> Result<(), ConvertError>;

    fn draw_image(&mut self, image: &EncodedImage, rect: Rect) -> Result<(), ConvertError>;

    fn draw_text(&mut self, line: &TextLine) -> Result<(), ConvertError>;

    /// Serialise the finished document.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, ConvertError>;
}

/// Appends page units to a sink and counts pages.
pub struct PdfAssembler<'a> {
    sink: Box<dyn DocumentSink + 'a>,
    page_count: usize,
}

impl<'a> PdfAssembler<'a> {
    pub fn new(sink: Box<dyn DocumentSink + 'a>) -> Self {
        Self {
            sink,
            page_count: 0,
        }
    }

    /// Add one page for `unit` and draw its content.
    pub fn push(&mut self, unit: &PageUnit) -> Result<(), ConvertError> {
        self.sink.add_page(unit.page())?;
        match unit {
            PageUnit::Raster { image, rect, .. } => self.sink.draw_image(image, *rect)?,
            PageUnit::Text { lines, .. } => {
                for line in lines {
                    self.sink.draw_text(line)?;
                }
            }
        }
        self.page_count += 1;
        Ok(())
    }

    pub fn extend<'u>(
        &mut self,
        units: impl IntoIterator<Item = &'u PageUnit>,
    ) -> Result<(), ConvertError> {
        for unit in units {
            self.push(unit)?;
        }
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Close the document: `(bytes, page_count)`.
    pub fn finish(self) -> Result<(Vec<u8>, usize), ConvertError> {
        let pages = self.page_count;
        let bytes = self.sink.finish()?;
        debug!("Assembled {} pages → {} bytes", pages, bytes.len());
        Ok((bytes, pages))
    }
}

/// Output filename: the input's stem with `.pdf`, or
/// [`COMBINED_FILENAME`] when several inputs were merged.
pub fn output_filename(inputs: &[&str]) -> String {
    match inputs {
        [single] => {
            let stem = Path::new(single)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "document".to_string());
            format!("{stem}.pdf")
        }
        _ => COMBINED_FILENAME.to_string(),
    }
}
