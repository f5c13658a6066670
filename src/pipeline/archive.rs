//! DOCX extraction: paragraph text and embedded raster images.
//!
//! Formatting is discarded on purpose: the output of this stage is plain
//! paragraphs plus inline images, which the HTML stage then lays out with
//! the fixed base stylesheet.
//!
//! ## Why strip namespace prefixes?
//!
//! Producers disagree on prefixes: Word writes `<w:p>`, some generators write
//! `<ns0:p>` or bind the WordprocessingML namespace as the default. Removing
//! every `prefix:` right after `<` or `</` lets one set of patterns match all
//! of them.
//!
//! ## Failure policy
//!
//! Only a container that is not a zip, or one without `word/document.xml`,
//! is fatal. A media entry that cannot be read or decoded is skipped with a
//! warning.

use crate::config::MAX_FILE_BYTES;
use crate::error::ConvertError;
use crate::pipeline::encode::data_uri;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// Path of the main content part inside the archive.
pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

/// Directory holding embedded media.
pub const MEDIA_DIR: &str = "word/media/";

/// Largest inflated size accepted for any single archive entry.
pub const MAX_PART_BYTES: u64 = 8 * MAX_FILE_BYTES;

/// Raster extensions extracted from [`MEDIA_DIR`].
pub const MEDIA_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// An embedded image ready to inline into HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime: &'static str,
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

/// Text and images pulled out of one archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    /// Paragraph texts in document order; `""` is a blank line.
    pub paragraphs: Vec<String>,
    /// Archive path → inline image.
    pub images: BTreeMap<String, InlineImage>,
}

impl ExtractedContent {
    /// Render as an HTML fragment: one `<p>` per paragraph, then the images.
    pub fn to_html(&self) -> String {
        let mut html = String::with_capacity(self.paragraphs.iter().map(String::len).sum::<usize>() * 2);
        for para in &self.paragraphs {
            if para.trim().is_empty() {
                html.push_str("<p><br></p>\n");
            } else {
                html.push_str("<p>");
                html.push_str(&paragraph_html(para));
                html.push_str("</p>\n");
            }
        }
        for image in self.images.values() {
            html.push_str("<p><img src=\"");
            html.push_str(&image.data_uri);
            html.push_str("\"></p>\n");
        }
        html
    }
}

/// Open a DOCX archive and extract its paragraphs and media.
///
/// `name` is only used in error messages.
pub fn extract_docx(name: &str, bytes: &[u8]) -> Result<ExtractedContent, ConvertError> {
    let malformed = |detail: String| ConvertError::MalformedArchive {
        name: name.to_string(),
        detail,
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| malformed(format!("not a zip container ({e})")))?;

    let xml = {
        let mut entry = archive.by_name(MAIN_DOCUMENT_PART).map_err(|e| match e {
            ZipError::FileNotFound => malformed(format!("missing {MAIN_DOCUMENT_PART}")),
            other => malformed(format!("cannot open {MAIN_DOCUMENT_PART} ({other})")),
        })?;
        let data = read_capped(&mut entry, MAX_PART_BYTES)
            .map_err(|e| malformed(format!("cannot read {MAIN_DOCUMENT_PART} ({e})")))?;
        String::from_utf8(data)
            .map_err(|e| malformed(format!("{MAIN_DOCUMENT_PART} is not UTF-8 ({e})")))?
    };

    let paragraphs = extract_paragraphs(&xml);
    let images = extract_media(name, &mut archive);
    debug!(
        "Extracted '{}': {} paragraphs, {} images",
        name,
        paragraphs.len(),
        images.len()
    );

    Ok(ExtractedContent { paragraphs, images })
}

// ── Markup normalisation ─────────────────────────────────────────────────────

static RE_NS_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)[A-Za-z_][A-Za-z0-9_.\-]*:").unwrap());

/// Remove `prefix:` from every element name.
pub fn strip_namespace_prefixes(xml: &str) -> String {
    RE_NS_PREFIX.replace_all(xml, "<$1").into_owned()
}

// Paragraph properties can hold `<tabs><tab .../></tabs>` tab-stop
// definitions; they must not turn into tab characters.
static RE_PARAGRAPH_PROPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<pPr(?:\s[^>]*)?/>|<pPr(?:\s[^>]*)?>.*?</pPr>").unwrap());

static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<p(?:\s[^>]*)?/>|<p(?:\s[^>]*)?>(.*?)</p>").unwrap());

static RE_RUN_PIECE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>|<(tab)(?:\s[^>]*)?/>|<(br|cr)(?:\s[^>]*)?/>").unwrap()
});

/// Segment the main document part into paragraph strings.
pub fn extract_paragraphs(xml: &str) -> Vec<String> {
    let normalized = strip_namespace_prefixes(xml);
    let normalized = RE_PARAGRAPH_PROPS.replace_all(&normalized, "");

    RE_PARAGRAPH
        .captures_iter(&normalized)
        .map(|caps| match caps.get(1) {
            Some(body) => paragraph_text(body.as_str()),
            None => String::new(),
        })
        .collect()
}

fn paragraph_text(body: &str) -> String {
    let mut text = String::new();
    for piece in RE_RUN_PIECE.captures_iter(body) {
        if let Some(t) = piece.get(1) {
            text.push_str(&decode_entities(t.as_str()));
        } else if piece.get(2).is_some() {
            text.push('\t');
        } else if piece.get(3).is_some() {
            text.push('\n');
        }
    }
    text
}

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[A-Za-z]+);").unwrap());

/// Decode the predefined XML entities and numeric character references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    RE_ENTITY
        .replace_all(s, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if name.starts_with("#x") || name.starts_with("#X") => {
                    u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
                }
                _ if name.starts_with('#') => name[1..].parse::<u32>().ok().and_then(char::from_u32),
                _ => None,
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

// ── Media ────────────────────────────────────────────────────────────────────

fn extract_media(name: &str, archive: &mut ZipArchive<Cursor<&[u8]>>) -> BTreeMap<String, InlineImage> {
    let media_paths: Vec<String> = archive
        .file_names()
        .filter(|path| is_supported_media(path))
        .map(str::to_string)
        .collect();

    let mut images = BTreeMap::new();
    for path in media_paths {
        match read_media(archive, &path) {
            Ok(image) => {
                images.insert(path, image);
            }
            Err(reason) => warn!("Skipping image '{}' in '{}': {}", path, name, reason),
        }
    }
    images
}

fn is_supported_media(path: &str) -> bool {
    let Some(rest) = path.strip_prefix(MEDIA_DIR) else {
        return false;
    };
    rest.rsplit_once('.')
        .map(|(_, ext)| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_media(archive: &mut ZipArchive<Cursor<&[u8]>>, path: &str) -> Result<InlineImage, String> {
    let mut entry = archive.by_name(path).map_err(|e| e.to_string())?;
    let data = read_capped(&mut entry, MAX_PART_BYTES)?;

    let format = image::guess_format(&data).map_err(|e| e.to_string())?;
    let decoded = image::load_from_memory_with_format(&data, format).map_err(|e| e.to_string())?;
    let mime = format.to_mime_type();

    Ok(InlineImage {
        mime,
        data_uri: data_uri(mime, &data),
        width: decoded.width(),
        height: decoded.height(),
    })
}

/// Read an entry, refusing to inflate more than `limit` bytes. The size an
/// entry declares in its header is not trusted.
fn read_capped(entry: &mut impl Read, limit: u64) -> Result<Vec<u8>, String> {
    let mut data = Vec::new();
    entry
        .by_ref()
        .take(limit + 1)
        .read_to_end(&mut data)
        .map_err(|e| e.to_string())?;
    if data.len() as u64 > limit {
        return Err(format!("entry inflates past {limit} bytes"));
    }
    Ok(data)
}

// ── HTML rendering ───────────────────────────────────────────────────────────

/// Escape a paragraph for HTML; tabs become four non-breaking spaces and
/// soft line breaks become `<br>`.
fn paragraph_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&nbsp;&nbsp;&nbsp;&nbsp;"),
            '\n' => out.push_str("<br>"),
            c => out.push(c),
        }
    }
    out
}
