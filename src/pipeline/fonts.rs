//! Font metrics for the standard PDF base fonts used by the layout engines.
//!
//! Layout must be reproducible without a rendering library, so glyph
//! advances come from the published AFM metrics of the base-14 fonts that
//! pdfium ships built in. Widths are in 1/1000 em for printable ASCII;
//! anything outside that range uses the font's average advance.

use serde::{Deserialize, Serialize};

/// A base-14 face the pipeline draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontFace {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    Courier,
    CourierBold,
}

impl FontFace {
    pub fn is_monospace(self) -> bool {
        matches!(self, FontFace::Courier | FontFace::CourierBold)
    }

    pub fn bold(self) -> Self {
        match self {
            FontFace::Helvetica => FontFace::HelveticaBold,
            FontFace::HelveticaOblique => FontFace::HelveticaBoldOblique,
            FontFace::Courier => FontFace::CourierBold,
            other => other,
        }
    }

    pub fn italic(self) -> Self {
        match self {
            FontFace::Helvetica => FontFace::HelveticaOblique,
            FontFace::HelveticaBold => FontFace::HelveticaBoldOblique,
            other => other,
        }
    }

    /// Advance of one character in 1/1000 em.
    pub fn advance(self, ch: char) -> u16 {
        if self.is_monospace() {
            return COURIER_ADVANCE;
        }
        let table = match self {
            FontFace::HelveticaBold | FontFace::HelveticaBoldOblique => &HELVETICA_BOLD,
            _ => &HELVETICA,
        };
        match ch {
            ' '..='~' => table[(ch as usize) - 0x20],
            '\u{A0}' => table[0],
            _ => 556,
        }
    }

    /// Width of `text` at `size` (any unit; the result is in the same unit).
    pub fn measure(self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.advance(c) as u32).sum();
        units as f32 * size / 1000.0
    }
}

/// Courier advance for every glyph.
pub const COURIER_ADVANCE: u16 = 600;

#[rustfmt::skip]
static HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,                               // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015,                                             // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,                // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,                // 'N'..'Z'
    278, 278, 278, 469, 556, 333,                                                   // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,                // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,                // 'n'..'z'
    334, 260, 334, 584,                                                             // '{'..'~'
];

#[rustfmt::skip]
static HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn courier_is_fixed_pitch() {
        assert_eq!(FontFace::Courier.measure("iiii", 10.0), 24.0);
        assert_eq!(FontFace::Courier.measure("WWWW", 10.0), 24.0);
        assert_eq!(FontFace::CourierBold.measure("é", 10.0), 6.0);
    }

    #[test]
    fn helvetica_uses_afm_widths() {
        assert_eq!(FontFace::Helvetica.advance('i'), 222);
        assert_eq!(FontFace::Helvetica.advance('W'), 944);
        assert_eq!(FontFace::Helvetica.advance('~'), 584);
        assert_eq!(FontFace::HelveticaBold.advance('i'), 278);
        assert_eq!(FontFace::HelveticaOblique.advance('m'), 833);
        assert!((FontFace::Helvetica.measure("Hello", 16.0) - 35.584).abs() < 1e-3);
    }

    #[test]
    fn style_composition() {
        assert_eq!(FontFace::Helvetica.bold().italic(), FontFace::HelveticaBoldOblique);
        assert_eq!(FontFace::Courier.italic(), FontFace::Courier);
    }
}
