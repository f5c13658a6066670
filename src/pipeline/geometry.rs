//! Page geometry and unit conversions shared by every paginator.
//!
//! Layout happens in millimetres with a top-left origin; CSS pixels are used
//! for HTML layout (96 per inch) and PDF points (72 per inch) only at the
//! pdfium boundary.

use crate::config::PageSize;
use serde::{Deserialize, Serialize};

pub const MM_PER_INCH: f32 = 25.4;
pub const CSS_PX_PER_INCH: f32 = 96.0;
pub const PT_PER_INCH: f32 = 72.0;

pub fn mm_to_px(mm: f32) -> f32 {
    mm * CSS_PX_PER_INCH / MM_PER_INCH
}

pub fn px_to_mm(px: f32) -> f32 {
    px * MM_PER_INCH / CSS_PX_PER_INCH
}

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * PT_PER_INCH / MM_PER_INCH
}

pub fn px_to_pt(px: f32) -> f32 {
    px * PT_PER_INCH / CSS_PX_PER_INCH
}

/// A rectangle in millimetres, origin at the page's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Orientation of a page, derived from its dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Physical page size plus the uniform margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
}

impl PageGeometry {
    pub fn new(width_mm: f32, height_mm: f32, margin_mm: f32) -> Self {
        Self {
            width_mm,
            height_mm,
            margin_mm,
        }
    }

    /// Geometry for fixed-size content (text, rasterised HTML).
    ///
    /// [`PageSize::Fit`] has no meaning for flowing content and uses A4.
    pub fn for_flowing(size: PageSize, margin_mm: f32) -> Self {
        let (w, h) = size.fixed_or_a4_mm();
        Self::new(w, h, margin_mm)
    }

    pub fn content_width_mm(&self) -> f32 {
        self.width_mm - 2.0 * self.margin_mm
    }

    pub fn content_height_mm(&self) -> f32 {
        self.height_mm - 2.0 * self.margin_mm
    }

    /// The area inside the margins.
    pub fn content_box(&self) -> Rect {
        Rect {
            x: self.margin_mm,
            y: self.margin_mm,
            width: self.content_width_mm(),
            height: self.content_height_mm(),
        }
    }

    /// Lowest baseline a line may be drawn at.
    pub fn bottom_limit_mm(&self) -> f32 {
        self.height_mm - self.margin_mm
    }

    pub fn orientation(&self) -> Orientation {
        if self.width_mm > self.height_mm {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}
