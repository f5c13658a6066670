//! Markdown → HTML transpiler for a documented subset.
//!
//! This is not a Markdown grammar. It is a fixed sequence of regex passes,
//! each a pure `&str → String` function, applied in this order:
//!
//! 1. Headings `#`, `##`, `###`
//! 2. Bold+italic `***x***`
//! 3. Bold `**x**` / `__x__`
//! 4. Italic `*x*`
//! 5. Fenced code blocks
//! 6. Inline code
//! 7. Links `[text](url)`
//! 8. Unordered list items `- x` / `* x` / `+ x`
//! 9. Paragraph breaks (blank line)
//! 10. Remaining line breaks
//! 11. Consecutive list items wrapped in `<ul>`
//!
//! Code is lifted out into placeholders before any pass runs, so emphasis and
//! link markers inside code are never interpreted; passes 5 and 6 render the
//! stashed code and the placeholders are swapped back in last. Line-break
//! substitution runs after every inline pass so it cannot split a tag the
//! earlier passes produced.
//!
//! Anything else (tables, ordered lists, images, nested lists) passes
//! through literally.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

/// Convert Markdown text to an HTML fragment.
pub fn markdown_to_html(input: &str) -> String {
    let text = input.replace("\r\n", "\n").replace('\r', "\n");
    let mut stash = CodeStash::default();

    let s = stash.protect(&text);
    let s = headings(&s);
    let s = bold_italic(&s);
    let s = bold(&s);
    let s = italic(&s);
    stash.render_blocks();
    stash.render_spans();
    let s = links(&s);
    let s = list_items(&s);
    let s = paragraph_breaks(s.trim_matches('\n'));
    let s = line_breaks(&s);
    let s = wrap_lists(&s);
    let s = stash.restore(&s);

    format!("<p>{s}</p>")
}

// ── Code protection ──────────────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^```[^\n]*\n(.*?)^```[ \t]*$").unwrap());
static RE_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([BI])(\\d+)\u{E001}").unwrap());

#[derive(Default)]
struct CodeStash {
    blocks: Vec<String>,
    spans: Vec<String>,
}

impl CodeStash {
    fn protect(&mut self, text: &str) -> String {
        let s = RE_FENCE.replace_all(text, |caps: &Captures| {
            self.blocks.push(caps[1].trim_end_matches('\n').to_string());
            format!("{OPEN}B{}{CLOSE}", self.blocks.len() - 1)
        });
        RE_INLINE_CODE
            .replace_all(&s, |caps: &Captures| {
                self.spans.push(caps[1].to_string());
                format!("{OPEN}I{}{CLOSE}", self.spans.len() - 1)
            })
            .into_owned()
    }

    fn render_blocks(&mut self) {
        for block in &mut self.blocks {
            *block = format!("<pre><code>{}</code></pre>", escape(block));
        }
    }

    fn render_spans(&mut self) {
        for span in &mut self.spans {
            *span = format!("<code>{}</code>", escape(span));
        }
    }

    fn restore(&self, text: &str) -> String {
        RE_PLACEHOLDER
            .replace_all(text, |caps: &Captures| {
                let idx: usize = caps[2].parse().unwrap_or(usize::MAX);
                let pool = if &caps[1] == "B" { &self.blocks } else { &self.spans };
                pool.get(idx).cloned().unwrap_or_default()
            })
            .into_owned()
    }
}

fn escape(code: &str) -> String {
    code.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ── Inline passes ────────────────────────────────────────────────────────────

static RE_H3: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^### +(.*?)[ \t]*$").unwrap());
static RE_H2: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^## +(.*?)[ \t]*$").unwrap());
static RE_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^# +(.*?)[ \t]*$").unwrap());

fn headings(input: &str) -> String {
    let s = RE_H3.replace_all(input, "<h3>$1</h3>");
    let s = RE_H2.replace_all(&s, "<h2>$1</h2>");
    RE_H1.replace_all(&s, "<h1>$1</h1>").into_owned()
}

static RE_BOLD_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*\*(.+?)\*\*\*").unwrap());

fn bold_italic(input: &str) -> String {
    RE_BOLD_ITALIC
        .replace_all(input, "<strong><em>$1</em></strong>")
        .into_owned()
}

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());

fn bold(input: &str) -> String {
    RE_BOLD
        .replace_all(input, |caps: &Captures| {
            let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            format!("<strong>{inner}</strong>")
        })
        .into_owned()
}

// The opening and closing `*` must hug the text, so list bullets and
// arithmetic like `2 * 3 * 4` are left alone.
static RE_ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^\s*](?:[^*\n]*[^\s*])?)\*").unwrap());

fn italic(input: &str) -> String {
    RE_ITALIC.replace_all(input, "<em>$1</em>").into_owned()
}

static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").unwrap());

fn links(input: &str) -> String {
    RE_LINK.replace_all(input, r#"<a href="$2">$1</a>"#).into_owned()
}

static RE_LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*+] +(.*?)[ \t]*$").unwrap());

fn list_items(input: &str) -> String {
    RE_LIST_ITEM.replace_all(input, "<li>$1</li>").into_owned()
}

// ── Block passes ─────────────────────────────────────────────────────────────

static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n\s*").unwrap());

fn paragraph_breaks(input: &str) -> String {
    RE_PARAGRAPH_BREAK.replace_all(input, "</p><p>").into_owned()
}

// Newlines that only separate block elements carry no line break.
static RE_BLOCK_NEWLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new("(</h[1-3]>|</li>|\u{E000}B\\d+\u{E001})\n|\n(<h[1-3]>|<li>|\u{E000}B\\d+\u{E001})").unwrap()
});

fn line_breaks(input: &str) -> String {
    let s = RE_BLOCK_NEWLINE.replace_all(input, "$1$2");
    s.replace('\n', "<br>")
}

static RE_LIST_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:<li>.*?</li>)+").unwrap());

fn wrap_lists(input: &str) -> String {
    RE_LIST_RUN.replace_all(input, "<ul>$0</ul>").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_levels_one_to_three() {
        assert_eq!(markdown_to_html("# A"), "<p><h1>A</h1></p>");
        assert_eq!(markdown_to_html("## B"), "<p><h2>B</h2></p>");
        assert_eq!(markdown_to_html("### C"), "<p><h3>C</h3></p>");
        // Level four is not in the subset.
        assert_eq!(markdown_to_html("#### D"), "<p>#### D</p>");
    }

    #[test]
    fn emphasis_precedence() {
        assert_eq!(
            markdown_to_html("***both*** **bold** *it*"),
            "<p><strong><em>both</em></strong> <strong>bold</strong> <em>it</em></p>"
        );
    }

    #[test]
    fn code_is_protected_from_emphasis_and_links() {
        assert_eq!(
            markdown_to_html("use `a*b*c` and `[x](y)`"),
            "<p>use <code>a*b*c</code> and <code>[x](y)</code></p>"
        );
    }

    #[test]
    fn fenced_block_keeps_newlines_and_escapes() {
        let md = "before\n\n```rust\nlet x = 1 < 2;\n**not bold**\n```\n\nafter";
        assert_eq!(
            markdown_to_html(md),
            "<p>before</p><p><pre><code>let x = 1 &lt; 2;\n**not bold**</code></pre></p><p>after</p>"
        );
    }

    #[test]
    fn links() {
        assert_eq!(
            markdown_to_html("see [docs](https://example.com)"),
            r#"<p>see <a href="https://example.com">docs</a></p>"#
        );
    }

    #[test]
    fn list_items_are_wrapped() {
        assert_eq!(
            markdown_to_html("- one\n- two\n* three"),
            "<p><ul><li>one</li><li>two</li><li>three</li></ul></p>"
        );
    }

    #[test]
    fn separate_lists_stay_separate() {
        assert_eq!(
            markdown_to_html("- a\n\n- b"),
            "<p><ul><li>a</li></ul></p><p><ul><li>b</li></ul></p>"
        );
    }

    #[test]
    fn paragraphs_and_line_breaks() {
        assert_eq!(
            markdown_to_html("line one\nline two\n\nnext para"),
            "<p>line one<br>line two</p><p>next para</p>"
        );
    }

    #[test]
    fn heading_followed_by_text_has_no_stray_break() {
        assert_eq!(
            markdown_to_html("# Title\nBody"),
            "<p><h1>Title</h1>Body</p>"
        );
    }

    #[test]
    fn bullets_and_arithmetic_are_not_italic() {
        assert_eq!(markdown_to_html("2 * 3 * 4"), "<p>2 * 3 * 4</p>");
    }

    #[test]
    fn unsupported_constructs_pass_through() {
        assert_eq!(
            markdown_to_html("| a | b |\n1. first"),
            "<p>| a | b |<br>1. first</p>"
        );
    }
}
