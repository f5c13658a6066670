//! Configuration types for document-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionOptions`], built
//! via its [`ConversionOptionsBuilder`]. One options value is shared by every
//! file in a batch and never changes during a run.
//!
//! # Builder validates, it does not clamp
//! A margin that eats the whole page or a JPEG quality of zero is a caller
//! error. [`ConversionOptionsBuilder::build`] rejects both with
//! [`ConvertError::InvalidConfig`] instead of silently producing a degenerate
//! layout.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Per-file size ceiling: 10 MiB.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Aggregate batch size ceiling: 50 MiB.
pub const MAX_BATCH_BYTES: u64 = 50 * 1024 * 1024;

/// Longest raster edge kept before downscaling.
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

/// Filename used when several inputs are merged into one document.
pub const COMBINED_FILENAME: &str = "combined.pdf";

/// Paper size of the output pages.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// ISO A4, 210 × 297 mm. (default)
    #[default]
    A4,
    /// US Letter, 215.9 × 279.4 mm.
    Letter,
    /// Page sized from the content (images only; other inputs fall back to A4).
    Fit,
}

impl PageSize {
    /// Portrait `(width, height)` in millimetres, `None` for [`PageSize::Fit`].
    pub fn dimensions_mm(self) -> Option<(f32, f32)> {
        match self {
            PageSize::A4 => Some((210.0, 297.0)),
            PageSize::Letter => Some((215.9, 279.4)),
            PageSize::Fit => None,
        }
    }

    /// Dimensions used for content that cannot size its own page.
    pub fn fixed_or_a4_mm(self) -> (f32, f32) {
        self.dimensions_mm()
            .unwrap_or_else(|| PageSize::A4.dimensions_mm().unwrap_or((210.0, 297.0)))
    }
}

/// Configuration for one conversion run.
///
/// Built via [`ConversionOptions::builder()`] or using
/// [`ConversionOptions::default()`].
///
/// # Example
/// ```rust
/// use edgequake_doc2pdf::{ConversionOptions, PageSize};
///
/// let options = ConversionOptions::builder()
///     .page_size(PageSize::Letter)
///     .quality(0.85)
///     .margin_mm(15.0)
///     .build()
///     .unwrap();
/// assert_eq!(options.page_size, PageSize::Letter);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Output paper size. Default: A4.
    pub page_size: PageSize,

    /// JPEG quality for every raster page, in `(0, 1]`. Default: 0.92.
    pub quality: f32,

    /// Margin on all four sides in millimetres. Default: 10.
    ///
    /// Must be strictly less than half of the page's shorter side.
    pub margin_mm: f32,

    /// Rasterisation scale for HTML/Markdown/DOCX pages. Default: 2.0.
    ///
    /// 2× CSS pixels keeps body text crisp when the page is printed without
    /// inflating JPEG sizes much.
    pub render_scale: f32,

    /// Explicit path to the pdfium shared library. Falls back to
    /// `PDFIUM_LIB_PATH`, then the system library search path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Receives progress events during the run.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            quality: 0.92,
            margin_mm: 10.0,
            render_scale: 2.0,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionOptions")
            .field("page_size", &self.page_size)
            .field("quality", &self.quality)
            .field("margin_mm", &self.margin_mm)
            .field("render_scale", &self.render_scale)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionOptions {
    /// Create a new builder for `ConversionOptions`.
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Check the quality and margin invariants.
    ///
    /// Called by the builder and again by the converter, since deserialised
    /// options bypass the builder.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(ConvertError::InvalidConfig(format!(
                "quality must be in (0, 1], got {}",
                self.quality
            )));
        }
        if !(self.margin_mm >= 0.0) || !self.margin_mm.is_finite() {
            return Err(ConvertError::InvalidConfig(format!(
                "margin must be a non-negative length, got {} mm",
                self.margin_mm
            )));
        }
        // Fit still lays out flowing content on A4.
        let (w, h) = self.page_size.fixed_or_a4_mm();
        let limit = w.min(h) / 2.0;
        if self.margin_mm >= limit {
            return Err(ConvertError::InvalidConfig(format!(
                "margin {} mm leaves no content area on {:?} (must be < {} mm)",
                self.margin_mm, self.page_size, limit
            )));
        }
        if !(self.render_scale > 0.0) || !self.render_scale.is_finite() {
            return Err(ConvertError::InvalidConfig(format!(
                "render scale must be positive, got {}",
                self.render_scale
            )));
        }
        Ok(())
    }
}

/// Builder for [`ConversionOptions`].
#[derive(Debug)]
pub struct ConversionOptionsBuilder {
    options: ConversionOptions,
}

impl ConversionOptionsBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.options.page_size = size;
        self
    }

    pub fn quality(mut self, quality: f32) -> Self {
        self.options.quality = quality;
        self
    }

    pub fn margin_mm(mut self, margin: f32) -> Self {
        self.options.margin_mm = margin;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.options.render_scale = scale;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.options.progress_callback = Some(callback);
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<ConversionOptions, ConvertError> {
        self.options.validate()?;
        Ok(self.options)
    }
}
