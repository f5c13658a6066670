//! Text paginator: plain text → monospaced vector text pages.
//!
//! Courier 10pt on a 5 mm line pitch. Every glyph advances 0.6 em, so the
//! number of columns is a fixed function of the content width and wrapping
//! needs no font metrics at all.
//!
//! Line `i` of a page sits on baseline `margin + (i + 1) × 5 mm`; a line that
//! would fall below `page_height - margin` starts the next page.

use crate::pipeline::assemble::{PageUnit, TextLine};
use crate::pipeline::fonts::{FontFace, COURIER_ADVANCE};
use crate::pipeline::geometry::{PageGeometry, MM_PER_INCH, PT_PER_INCH};

pub const FONT_SIZE_PT: f32 = 10.0;
pub const LINE_HEIGHT_MM: f32 = 5.0;
pub const TAB_WIDTH: usize = 4;

const EPSILON_MM: f32 = 1e-3;

/// Horizontal advance of one Courier glyph, in millimetres.
pub fn char_advance_mm() -> f32 {
    FONT_SIZE_PT * (COURIER_ADVANCE as f32 / 1000.0) * MM_PER_INCH / PT_PER_INCH
}

/// Characters per line for `geometry`.
pub fn columns(geometry: &PageGeometry) -> usize {
    ((geometry.content_width_mm() / char_advance_mm()).floor() as usize).max(1)
}

/// Lines that fit on one page for `geometry`.
pub fn lines_per_page(geometry: &PageGeometry) -> usize {
    ((geometry.content_height_mm() / LINE_HEIGHT_MM + EPSILON_MM).floor() as usize).max(1)
}

/// Greedy word wrap of one logical line to `cols` characters.
///
/// Tabs expand to four spaces; runs of spaces are kept; a word longer than
/// `cols` is split at character boundaries.
pub fn wrap_line(line: &str, cols: usize) -> Vec<String> {
    let cols = cols.max(1);
    let line = line.replace('\t', &" ".repeat(TAB_WIDTH));
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for (i, word) in line.split(' ').enumerate() {
        let word_len = word.chars().count();
        if i > 0 {
            if current_len + 1 + word_len <= cols {
                current.push(' ');
                current.push_str(word);
                current_len += 1 + word_len;
                continue;
            }
            out.push(std::mem::take(&mut current));
        }

        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > cols {
            out.push(chars.drain(..cols).collect());
        }
        current = chars.iter().collect();
        current_len = chars.len();
    }
    out.push(current);
    out
}

/// Paginate one or more text documents.
///
/// A document with a name gets a bold header line and a blank line before its
/// content. Every document after the first starts on a new page. The result
/// always contains at least one page.
pub fn paginate_text(docs: &[(Option<&str>, &str)], geometry: &PageGeometry) -> Vec<PageUnit> {
    let cols = columns(geometry);
    let mut writer = PageWriter::new(*geometry);

    for (index, (name, text)) in docs.iter().enumerate() {
        if index > 0 {
            writer.break_page();
        }
        if let Some(name) = name {
            for header in wrap_line(name, cols) {
                writer.line(header, FontFace::CourierBold);
            }
            writer.line(String::new(), FontFace::Courier);
        }
        let normalised = text.replace("\r\n", "\n").replace('\r', "\n");
        // A final newline terminates the last line; it does not open another.
        let body = normalised.strip_suffix('\n').unwrap_or(&normalised);
        for logical in body.split('\n') {
            for line in wrap_line(logical, cols) {
                writer.line(line, FontFace::Courier);
            }
        }
    }

    writer.finish()
}

struct PageWriter {
    geometry: PageGeometry,
    pages: Vec<PageUnit>,
    current: Option<Vec<TextLine>>,
    row: usize,
}

impl PageWriter {
    fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: Vec::new(),
            current: None,
            row: 0,
        }
    }

    fn break_page(&mut self) {
        if let Some(lines) = self.current.take() {
            self.pages.push(PageUnit::Text {
                page: self.geometry,
                lines,
            });
        }
        self.row = 0;
    }

    fn line(&mut self, text: String, face: FontFace) {
        let mut baseline = self.baseline(self.row);
        if self.current.is_some() && baseline > self.geometry.bottom_limit_mm() + EPSILON_MM {
            self.break_page();
            baseline = self.baseline(0);
        }
        let lines = self.current.get_or_insert_with(Vec::new);
        self.row += 1;
        if text.trim().is_empty() {
            return;
        }
        lines.push(TextLine {
            text,
            x_mm: self.geometry.margin_mm,
            baseline_mm: baseline,
            face,
            size_pt: FONT_SIZE_PT,
        });
    }

    fn baseline(&self, row: usize) -> f32 {
        self.geometry.margin_mm + (row + 1) as f32 * LINE_HEIGHT_MM
    }

    fn finish(mut self) -> Vec<PageUnit> {
        if self.current.is_none() && self.pages.is_empty() {
            self.current = Some(Vec::new());
        }
        self.break_page();
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a4() -> PageGeometry {
        PageGeometry::new(210.0, 297.0, 10.0)
    }

    fn lines(unit: &PageUnit) -> &[TextLine] {
        match unit {
            PageUnit::Text { lines, .. } => lines,
            other => panic!("expected text page, got {other:?}"),
        }
    }

    #[test]
    fn a4_grid() {
        assert!((char_advance_mm() - 2.1167).abs() < 1e-3);
        assert_eq!(columns(&a4()), 89);
        assert_eq!(lines_per_page(&a4()), 55);
    }

    #[test]
    fn wrap_is_greedy_and_splits_long_words() {
        assert_eq!(wrap_line("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap_line("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_line("x abcdefgh", 4), vec!["x", "abcd", "efgh"]);
        assert_eq!(wrap_line("", 10), vec![""]);
        assert_eq!(wrap_line("\tx", 10), vec!["    x"]);
    }

    #[test]
    fn page_count_is_ceiling_of_lines() {
        let g = a4();
        let per_page = lines_per_page(&g);
        for n in [1, per_page - 1, per_page, per_page + 1, 3 * per_page + 7] {
            let text = vec!["line"; n].join("\n");
            let pages = paginate_text(&[(None, text.as_str())], &g);
            assert_eq!(pages.len(), n.div_ceil(per_page), "n = {n}");
            let drawn: usize = pages.iter().map(|p| lines(p).len()).sum();
            assert_eq!(drawn, n);
        }
    }

    #[test]
    fn baselines_start_one_line_below_margin() {
        let pages = paginate_text(&[(None, "a\nb")], &a4());
        let l = lines(&pages[0]);
        assert_eq!(l[0].baseline_mm, 15.0);
        assert_eq!(l[1].baseline_mm, 20.0);
        assert_eq!(l[0].x_mm, 10.0);
        assert!(l.iter().all(|l| l.baseline_mm <= 287.0));
    }

    #[test]
    fn letter_pages_fill_without_crossing_bottom_margin() {
        let g = PageGeometry::new(215.9, 279.4, 12.5);
        let per_page = lines_per_page(&g);
        assert_eq!(per_page, 50);

        // Some lines wrap, so the drawn count differs from the logical count.
        let text: String = (0..203)
            .map(|n| format!("{n:03} {}\n", "word ".repeat(n % 30)))
            .collect();
        let drawn_expected: usize = text
            .lines()
            .map(|l| wrap_line(l, columns(&g)).len())
            .sum();

        let pages = paginate_text(&[(None, text.as_str())], &g);
        let (last, full) = pages.split_last().unwrap();
        for page in full {
            assert_eq!(lines(page).len(), per_page);
        }
        assert!(!lines(last).is_empty() && lines(last).len() <= per_page);
        assert_eq!(pages.len(), drawn_expected.div_ceil(per_page));

        for page in &pages {
            assert_eq!(*page.page(), g);
            for line in lines(page) {
                assert!(
                    line.baseline_mm <= g.bottom_limit_mm(),
                    "baseline {} below {}",
                    line.baseline_mm,
                    g.bottom_limit_mm()
                );
            }
        }
    }

    #[test]
    fn empty_document_yields_one_blank_page() {
        let pages = paginate_text(&[(None, "")], &a4());
        assert_eq!(pages.len(), 1);
        assert!(lines(&pages[0]).is_empty());

        assert_eq!(paginate_text(&[], &a4()).len(), 1);
    }

    #[test]
    fn crlf_is_normalised() {
        let pages = paginate_text(&[(None, "a\r\nb\rc")], &a4());
        let texts: Vec<_> = lines(&pages[0]).iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["a", "b", "c"]);
    }

    #[test]
    fn multi_file_headers_and_page_breaks() {
        let pages = paginate_text(&[(Some("one.txt"), "x"), (Some("two.txt"), "y")], &a4());
        assert_eq!(pages.len(), 2);

        let first = lines(&pages[0]);
        assert_eq!(first[0].text, "one.txt");
        assert_eq!(first[0].face, FontFace::CourierBold);
        // Header, blank line, content.
        assert_eq!(first[1].text, "x");
        assert_eq!(first[1].baseline_mm, 25.0);

        let second = lines(&pages[1]);
        assert_eq!(second[0].text, "two.txt");
        assert_eq!(second[0].baseline_mm, 15.0);
    }

    #[test]
    fn trailing_newline_opens_no_line() {
        let g = a4();
        let per_page = lines_per_page(&g);
        let text = "line\n".repeat(per_page);
        assert_eq!(paginate_text(&[(None, text.as_str())], &g).len(), 1);
        let pages = paginate_text(&[(None, "a\n\n")], &g);
        assert_eq!(lines(&pages[0]).len(), 1);
    }

    #[test]
    fn blank_lines_take_space() {
        let pages = paginate_text(&[(None, "a\n\nb")], &a4());
        let l = lines(&pages[0]);
        assert_eq!(l.len(), 2);
        assert_eq!(l[1].baseline_mm, 25.0);
    }
}
