//! Format classification: declared MIME type first, extension second.
//!
//! Browsers and file pickers often send `application/octet-stream` or an
//! empty type for Markdown and DOCX files, so the MIME table alone is not
//! enough. The extension table is consulted only when the MIME lookup misses,
//! which keeps an explicit, correct MIME hint authoritative.

use crate::pipeline::input::InputFile;
use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of content a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Text,
    Html,
    Markdown,
    Docx,
    Unknown,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileType::Image => "image",
            FileType::Text => "text",
            FileType::Html => "html",
            FileType::Markdown => "markdown",
            FileType::Docx => "docx",
            FileType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Declared MIME type → file type.
pub static MIME_TYPES: phf::Map<&'static str, FileType> = phf_map! {
    "image/png" => FileType::Image,
    "image/jpeg" => FileType::Image,
    "image/jpg" => FileType::Image,
    "image/gif" => FileType::Image,
    "image/tiff" => FileType::Image,
    "image/webp" => FileType::Image,
    "text/plain" => FileType::Text,
    "text/html" => FileType::Html,
    "text/markdown" => FileType::Markdown,
    "text/x-markdown" => FileType::Markdown,
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => FileType::Docx,
};

/// Lowercase extension → file type.
pub static EXTENSIONS: phf::Map<&'static str, FileType> = phf_map! {
    "png" => FileType::Image,
    "jpg" => FileType::Image,
    "jpeg" => FileType::Image,
    "gif" => FileType::Image,
    "tiff" => FileType::Image,
    "tif" => FileType::Image,
    "webp" => FileType::Image,
    "txt" => FileType::Text,
    "html" => FileType::Html,
    "htm" => FileType::Html,
    "md" => FileType::Markdown,
    "markdown" => FileType::Markdown,
    "docx" => FileType::Docx,
};

/// Classify a batch member.
pub fn classify(file: &InputFile) -> FileType {
    classify_parts(file.name(), file.mime())
}

/// Classify from a name and an optional declared MIME type. Never fails.
pub fn classify_parts(name: &str, mime: Option<&str>) -> FileType {
    if let Some(mime) = mime {
        // "text/plain; charset=utf-8" → "text/plain"
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if let Some(ft) = MIME_TYPES.get(essence.as_str()) {
            return *ft;
        }
    }

    extension(name)
        .and_then(|ext| EXTENSIONS.get(ext.as_str()).copied())
        .unwrap_or(FileType::Unknown)
}

/// Lowercase suffix after the last `.`, if any.
fn extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mime_entry_maps() {
        for (mime, expected) in MIME_TYPES.entries() {
            assert_eq!(classify_parts("noext", Some(*mime)), *expected, "mime {mime}");
        }
    }

    #[test]
    fn every_extension_entry_maps() {
        for (ext, expected) in EXTENSIONS.entries() {
            let name = format!("file.{ext}");
            assert_eq!(classify_parts(&name, None), *expected, "ext {ext}");
            let upper = format!("FILE.{}", ext.to_uppercase());
            assert_eq!(classify_parts(&upper, None), *expected, "ext {ext} upper");
        }
    }

    #[test]
    fn unmapped_mime_and_extension_is_unknown() {
        assert_eq!(
            classify_parts("archive.rar", Some("application/x-rar")),
            FileType::Unknown
        );
        assert_eq!(classify_parts("README", None), FileType::Unknown);
        assert_eq!(classify_parts("trailing.", None), FileType::Unknown);
    }

    #[test]
    fn mime_wins_over_extension() {
        assert_eq!(classify_parts("page.txt", Some("text/html")), FileType::Html);
    }

    #[test]
    fn unmapped_mime_falls_back_to_extension() {
        assert_eq!(
            classify_parts("notes.md", Some("application/octet-stream")),
            FileType::Markdown
        );
        assert_eq!(
            classify_parts("report.docx", Some("")),
            FileType::Docx
        );
    }

    #[test]
    fn mime_parameters_are_ignored() {
        assert_eq!(
            classify_parts("x", Some("Text/Plain; charset=utf-8")),
            FileType::Text
        );
    }

    #[test]
    fn last_dot_wins() {
        assert_eq!(classify_parts("archive.tar.md", None), FileType::Markdown);
        assert_eq!(classify_parts("photo.png.txt", None), FileType::Text);
    }

    #[test]
    fn classify_uses_file_name_and_mime() {
        let file = InputFile::from_bytes("scan.TIF", None, Vec::new());
        assert_eq!(classify(&file), FileType::Image);
    }
}
