//! Headless HTML layout: an HTML fragment → positioned lines, fills and
//! images at a fixed width.
//!
//! This stands in for a browser's off-screen DOM. The fragment is parsed with
//! `scraper` (html5ever), then walked once with a fixed base stylesheet:
//!
//! | Element              | Style                                              |
//! |----------------------|----------------------------------------------------|
//! | body                 | Helvetica 16px, line height 1.5                    |
//! | `h1` / `h2` / `h3`   | bold 32 / 24 / 19px                                |
//! | `p`                  | 12px bottom spacing                                |
//! | `ul` / `ol`          | indented 24px, bullet or number markers            |
//! | `code` / `pre`       | Courier 14px on a light grey background            |
//! | `a`                  | blue                                               |
//! | `blockquote`         | indented 16px with a grey left rule                |
//!
//! Images are block-level, never upscaled, and shrunk to the available width.
//! Only `data:` URIs are loaded; the pipeline never touches the network.
//!
//! All coordinates are CSS pixels with a top-left origin.

use crate::pipeline::encode::decode_data_uri;
use crate::pipeline::fonts::FontFace;
use image::DynamicImage;
use scraper::{ElementRef, Html, Node};
use std::sync::Arc;
use tracing::{debug, warn};

pub type Color = [u8; 3];

pub const BASE_FONT_PX: f32 = 16.0;
pub const LINE_HEIGHT: f32 = 1.5;
pub const PARAGRAPH_SPACING_PX: f32 = 12.0;
pub const LIST_INDENT_PX: f32 = 24.0;
pub const CODE_FONT_PX: f32 = 14.0;

const ASCENT: f32 = 0.8;
const BLOCKQUOTE_INDENT_PX: f32 = 16.0;
const BLOCKQUOTE_RULE_PX: f32 = 4.0;
const PRE_PADDING_PX: f32 = 8.0;
const MARKER_GAP_PX: f32 = 6.0;

const TEXT_COLOR: Color = [17, 17, 17];
const LINK_COLOR: Color = [0, 0, 238];
const QUOTE_COLOR: Color = [85, 85, 85];
const CODE_BACKGROUND: Color = [240, 240, 240];
const RULE_COLOR: Color = [204, 204, 204];

/// Font, size and colours of a run of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub face: FontFace,
    pub size_px: f32,
    pub color: Color,
    pub background: Option<Color>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            face: FontFace::Helvetica,
            size_px: BASE_FONT_PX,
            color: TEXT_COLOR,
            background: None,
        }
    }
}

impl TextStyle {
    fn width_of(&self, text: &str) -> f32 {
        self.face.measure(text, self.size_px)
    }
}

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PxRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PxRect {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// One drawable element of a laid-out document.
#[derive(Debug, Clone)]
pub enum LayoutItem {
    Text {
        x: f32,
        baseline: f32,
        text: String,
        style: TextStyle,
    },
    Fill {
        rect: PxRect,
        color: Color,
    },
    Image {
        rect: PxRect,
        image: Arc<DynamicImage>,
    },
}

impl LayoutItem {
    /// Vertical extent `(top, bottom)`.
    pub fn vertical_extent(&self) -> (f32, f32) {
        match self {
            LayoutItem::Text {
                baseline, style, ..
            } => (
                baseline - style.size_px * ASCENT,
                baseline + style.size_px * (1.0 - ASCENT),
            ),
            LayoutItem::Fill { rect, .. } | LayoutItem::Image { rect, .. } => {
                (rect.y, rect.bottom())
            }
        }
    }
}

/// A fully sized layout, ready to rasterise.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub width_px: f32,
    pub height_px: f32,
    /// Items in paint order.
    pub items: Vec<LayoutItem>,
}

impl LayoutNode {
    /// Text content with one `\n` per laid-out line.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut last_baseline: Option<f32> = None;
        for item in &self.items {
            if let LayoutItem::Text { baseline, text, .. } = item {
                match last_baseline {
                    Some(b) if (b - baseline).abs() < 0.01 => {}
                    Some(_) => out.push('\n'),
                    None => {}
                }
                out.push_str(text);
                last_baseline = Some(*baseline);
            }
        }
        out
    }

    pub fn image_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, LayoutItem::Image { .. }))
            .count()
    }
}

/// Lay out `html` at `width_px` CSS pixels.
pub fn layout_html(html: &str, width_px: f32) -> LayoutNode {
    let document = Html::parse_fragment(html);
    let root = document.root_element();

    let ctx = BlockContext {
        left: 0.0,
        width: width_px,
        style: TextStyle::default(),
        preformatted: false,
    };
    let mut engine = Engine::default();
    engine.walk_children(root, &ctx);
    engine.flush(&ctx);

    // An empty document still occupies one line so it yields a blank page.
    let height_px = engine.y.max(BASE_FONT_PX * LINE_HEIGHT);
    debug!(
        "Laid out {} items at {:.0}px wide → {:.0}px tall",
        engine.items.len(),
        width_px,
        height_px
    );
    LayoutNode {
        width_px,
        height_px,
        items: engine.items,
    }
}

// ── Walk ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct BlockContext {
    left: f32,
    width: f32,
    style: TextStyle,
    preformatted: bool,
}

impl BlockContext {
    fn indented(&self, by: f32) -> Self {
        Self {
            left: self.left + by,
            width: (self.width - by).max(1.0),
            ..self.clone()
        }
    }

    fn with_style(&self, f: impl FnOnce(&mut TextStyle)) -> Self {
        let mut next = self.clone();
        f(&mut next.style);
        next
    }
}

enum Inline {
    Text(String, TextStyle, bool),
    Break(TextStyle),
}

#[derive(Default)]
struct Engine {
    items: Vec<LayoutItem>,
    y: f32,
    pending: Vec<Inline>,
    marker: Option<(String, TextStyle)>,
}

const SKIPPED: &[&str] = &["head", "style", "script", "title", "meta", "link", "template"];
const GENERIC_BLOCKS: &[&str] = &[
    "html", "body", "div", "section", "article", "header", "footer", "main", "nav", "aside",
    "figure", "figcaption", "table", "thead", "tbody", "tfoot", "tr", "td", "th", "dl", "dt",
    "dd", "address",
];

impl Engine {
    fn walk_children(&mut self, el: ElementRef<'_>, ctx: &BlockContext) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    let text: &str = text;
                    self.pending
                        .push(Inline::Text(text.to_string(), ctx.style, ctx.preformatted));
                }
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.element(el, ctx);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>, ctx: &BlockContext) {
        let tag = el.value().name();
        match tag {
            t if SKIPPED.contains(&t) => {}
            "br" => self.pending.push(Inline::Break(ctx.style)),
            "img" => self.image(el, ctx),
            "hr" => {
                self.flush(ctx);
                self.y += PARAGRAPH_SPACING_PX / 2.0;
                self.items.push(LayoutItem::Fill {
                    rect: PxRect {
                        x: ctx.left,
                        y: self.y,
                        width: ctx.width,
                        height: 1.0,
                    },
                    color: RULE_COLOR,
                });
                self.y += 1.0 + PARAGRAPH_SPACING_PX / 2.0;
            }
            "p" => self.block(el, ctx, ctx.clone(), 0.0, PARAGRAPH_SPACING_PX),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let size = heading_size(tag);
                let inner = ctx.with_style(|s| {
                    s.face = s.face.bold();
                    s.size_px = size;
                });
                self.block(el, ctx, inner, size * 0.4, size * 0.4);
            }
            "ul" | "ol" => self.list(el, ctx, tag == "ol"),
            "li" => {
                self.flush(ctx);
                self.marker = Some(("\u{2022}".to_string(), ctx.style));
                self.block(el, ctx, ctx.clone(), 0.0, 0.0);
            }
            "pre" => self.preformatted(el, ctx),
            "blockquote" => self.blockquote(el, ctx),
            t if GENERIC_BLOCKS.contains(&t) => self.block(el, ctx, ctx.clone(), 0.0, 0.0),
            _ => {
                let inner = inline_style(tag, ctx);
                self.walk_children(el, &inner);
            }
        }
    }

    /// Lay out a block box. Nothing (not even margins) is emitted for a
    /// block without content.
    fn block(
        &mut self,
        el: ElementRef<'_>,
        outer: &BlockContext,
        inner: BlockContext,
        margin_top: f32,
        margin_bottom: f32,
    ) {
        self.flush(outer);
        let start_y = self.y;

        self.y += margin_top;
        self.walk_children(el, &inner);
        self.flush(&inner);

        if self.y <= start_y + margin_top {
            self.y = start_y;
            return;
        }
        self.y += margin_bottom;
    }

    fn list(&mut self, el: ElementRef<'_>, ctx: &BlockContext, ordered: bool) {
        self.flush(ctx);
        let start_y = self.y;
        let inner = ctx.indented(LIST_INDENT_PX);

        let mut number = 0;
        for child in el.children() {
            match ElementRef::wrap(child) {
                Some(item) if item.value().name() == "li" => {
                    number += 1;
                    let marker = if ordered {
                        format!("{number}.")
                    } else {
                        "\u{2022}".to_string()
                    };
                    self.flush(&inner);
                    self.marker = Some((marker, inner.style));
                    self.block(item, &inner, inner.clone(), 0.0, 0.0);
                }
                Some(other) => self.element(other, &inner),
                None => {
                    if let Node::Text(text) = child.value() {
                        let text: &str = text;
                        self.pending
                            .push(Inline::Text(text.to_string(), inner.style, false));
                    }
                }
            }
        }
        self.flush(&inner);
        self.marker = None;

        if self.y > start_y {
            self.y += PARAGRAPH_SPACING_PX;
        }
    }

    fn preformatted(&mut self, el: ElementRef<'_>, ctx: &BlockContext) {
        self.flush(ctx);
        let start_y = self.y;
        let start_items = self.items.len();

        let mut inner = ctx.indented(PRE_PADDING_PX).with_style(|s| {
            s.face = FontFace::Courier;
            s.size_px = CODE_FONT_PX;
        });
        inner.width = (inner.width - PRE_PADDING_PX).max(1.0);
        inner.preformatted = true;

        self.y += PRE_PADDING_PX;
        self.walk_children(el, &inner);
        self.flush(&inner);
        self.y += PRE_PADDING_PX;

        self.items.insert(
            start_items,
            LayoutItem::Fill {
                rect: PxRect {
                    x: ctx.left,
                    y: start_y,
                    width: ctx.width,
                    height: self.y - start_y,
                },
                color: CODE_BACKGROUND,
            },
        );
        self.y += PARAGRAPH_SPACING_PX;
    }

    fn blockquote(&mut self, el: ElementRef<'_>, ctx: &BlockContext) {
        self.flush(ctx);
        let start_y = self.y;
        let start_items = self.items.len();
        let inner = ctx
            .indented(BLOCKQUOTE_INDENT_PX)
            .with_style(|s| s.color = QUOTE_COLOR);

        self.walk_children(el, &inner);
        self.flush(&inner);

        if self.y <= start_y {
            return;
        }
        self.items.insert(
            start_items,
            LayoutItem::Fill {
                rect: PxRect {
                    x: ctx.left,
                    y: start_y,
                    width: BLOCKQUOTE_RULE_PX,
                    height: self.y - start_y,
                },
                color: RULE_COLOR,
            },
        );
        self.y += PARAGRAPH_SPACING_PX;
    }

    fn image(&mut self, el: ElementRef<'_>, ctx: &BlockContext) {
        let Some(src) = el.value().attr("src") else {
            return;
        };
        let Some(bytes) = decode_data_uri(src) else {
            debug!("Ignoring <img> without an inline data URI");
            return;
        };
        let image = match image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                warn!("Skipping undecodable inline image: {}", e);
                return;
            }
        };

        self.flush(ctx);
        let (w, h) = (image.width() as f32, image.height() as f32);
        let scale = (ctx.width / w).min(1.0);
        let rect = PxRect {
            x: ctx.left,
            y: self.y,
            width: w * scale,
            height: h * scale,
        };
        self.y += rect.height;
        self.items.push(LayoutItem::Image {
            rect,
            image: Arc::new(image),
        });
    }

    // ── Line breaking ────────────────────────────────────────────────────────

    fn flush(&mut self, ctx: &BlockContext) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        let mut lines = LineBreaker::new(ctx.width);

        for inline in pending {
            match inline {
                Inline::Break(style) => lines.hard_break(style),
                Inline::Text(text, style, true) => {
                    for (i, segment) in text.replace("\r\n", "\n").split('\n').enumerate() {
                        if i > 0 {
                            lines.hard_break(style);
                        }
                        let segment = segment.replace('\t', "    ");
                        if !segment.is_empty() {
                            lines.word(&segment, style);
                        }
                    }
                }
                Inline::Text(text, style, false) => {
                    let mut word = String::new();
                    for ch in text.chars() {
                        if is_collapsible_space(ch) {
                            if !word.is_empty() {
                                lines.word(&std::mem::take(&mut word), style);
                            }
                            lines.space(style);
                        } else {
                            word.push(ch);
                        }
                    }
                    if !word.is_empty() {
                        lines.word(&word, style);
                    }
                }
            }
        }

        for line in lines.finish() {
            self.emit_line(line, ctx);
        }
    }

    fn emit_line(&mut self, line: Line, ctx: &BlockContext) {
        let size = if line.max_size > 0.0 {
            line.max_size
        } else {
            ctx.style.size_px
        };
        let line_height = size * LINE_HEIGHT;
        let baseline = self.y + (line_height - size) / 2.0 + size * ASCENT;

        if let Some((marker, style)) = self.marker.take() {
            let width = style.width_of(&marker);
            self.items.push(LayoutItem::Text {
                x: ctx.left - width - MARKER_GAP_PX,
                baseline,
                text: marker,
                style,
            });
        }

        let mut x = ctx.left;
        let mut runs: Vec<(String, TextStyle, f32)> = Vec::new();
        for frag in line.frags {
            match runs.last_mut() {
                Some((text, style, width)) if *style == frag.style => {
                    text.push_str(&frag.text);
                    *width += frag.width;
                }
                _ => runs.push((frag.text, frag.style, frag.width)),
            }
        }
        for (text, style, width) in runs {
            if let Some(color) = style.background {
                self.items.push(LayoutItem::Fill {
                    rect: PxRect {
                        x,
                        y: baseline - style.size_px * ASCENT - 1.0,
                        width,
                        height: style.size_px + 2.0,
                    },
                    color,
                });
            }
            if !text.trim().is_empty() {
                self.items.push(LayoutItem::Text {
                    x,
                    baseline,
                    text: text.replace('\u{A0}', " "),
                    style,
                });
            }
            x += width;
        }

        self.y += line_height;
    }
}

fn is_collapsible_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\u{0C}')
}

fn heading_size(tag: &str) -> f32 {
    match tag {
        "h1" => 32.0,
        "h2" => 24.0,
        "h3" => 19.0,
        "h4" => 16.0,
        "h5" => 13.0,
        _ => 11.0,
    }
}

fn inline_style(tag: &str, ctx: &BlockContext) -> BlockContext {
    match tag {
        "strong" | "b" => ctx.with_style(|s| s.face = s.face.bold()),
        "em" | "i" | "cite" => ctx.with_style(|s| s.face = s.face.italic()),
        "a" => ctx.with_style(|s| s.color = LINK_COLOR),
        "code" | "kbd" | "samp" | "tt" => {
            let preformatted = ctx.preformatted;
            ctx.with_style(|s| {
                s.face = FontFace::Courier;
                s.size_px = CODE_FONT_PX;
                if !preformatted {
                    s.background = Some(CODE_BACKGROUND);
                }
            })
        }
        _ => ctx.clone(),
    }
}

// ── Greedy line breaker ──────────────────────────────────────────────────────

struct Frag {
    text: String,
    style: TextStyle,
    width: f32,
    space: bool,
}

#[derive(Default)]
struct Line {
    frags: Vec<Frag>,
    width: f32,
    max_size: f32,
}

impl Line {
    fn has_words(&self) -> bool {
        self.frags.iter().any(|f| !f.space)
    }

    fn push(&mut self, frag: Frag) {
        self.width += frag.width;
        self.max_size = self.max_size.max(frag.style.size_px);
        self.frags.push(frag);
    }

    fn trim_end(&mut self) {
        while self.frags.last().is_some_and(|f| f.space) {
            if let Some(f) = self.frags.pop() {
                self.width -= f.width;
            }
        }
    }
}

struct LineBreaker {
    width: f32,
    lines: Vec<Line>,
    current: Line,
}

impl LineBreaker {
    fn new(width: f32) -> Self {
        Self {
            width,
            lines: Vec::new(),
            current: Line::default(),
        }
    }

    fn space(&mut self, style: TextStyle) {
        let collapsed = self.current.frags.last().is_none_or(|f| f.space);
        if collapsed {
            return;
        }
        self.current.push(Frag {
            text: " ".to_string(),
            style,
            width: style.width_of(" "),
            space: true,
        });
    }

    fn word(&mut self, word: &str, style: TextStyle) {
        let width = style.width_of(word);
        if self.current.width + width > self.width && self.current.has_words() {
            self.wrap();
        }
        if width <= self.width {
            self.current.push(Frag {
                text: word.to_string(),
                style,
                width,
                space: false,
            });
            return;
        }

        // Wider than the whole line: split at character boundaries.
        let mut chunk = String::new();
        let mut chunk_width = 0.0;
        for ch in word.chars() {
            let w = style.face.advance(ch) as f32 * style.size_px / 1000.0;
            if chunk_width + w > self.width - self.current.width && !chunk.is_empty() {
                self.current.push(Frag {
                    text: std::mem::take(&mut chunk),
                    style,
                    width: chunk_width,
                    space: false,
                });
                self.wrap();
                chunk_width = 0.0;
            }
            chunk.push(ch);
            chunk_width += w;
        }
        if !chunk.is_empty() {
            self.current.push(Frag {
                text: chunk,
                style,
                width: chunk_width,
                space: false,
            });
        }
    }

    fn wrap(&mut self) {
        self.current.trim_end();
        self.lines.push(std::mem::take(&mut self.current));
    }

    fn hard_break(&mut self, style: TextStyle) {
        self.current.max_size = self.current.max_size.max(style.size_px);
        self.wrap();
    }

    fn finish(mut self) -> Vec<Line> {
        self.current.trim_end();
        if self.current.has_words() {
            self.lines.push(self.current);
        }
        self.lines
    }
}
