//! Error types for the edgequake-doc2pdf library.
//!
//! Two layers reflect two distinct moments of failure:
//!
//! * [`ValidationError`]: the batch was rejected **before** any conversion
//!   work started (too large, unsupported type). Nothing was read beyond the
//!   file sizes and names.
//!
//! * [`ConvertError`]: **fatal** for the whole run. Returned as
//!   `Err(ConvertError)` from the top-level `convert*` functions; any pages
//!   already produced are discarded.
//!
//! Embedded DOCX images that fail to decode are the one failure recovered
//! locally: they are skipped with a `warn!` and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// A batch rejected by [`crate::pipeline::validate::validate_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No files were supplied.
    #[error("No files to convert")]
    EmptyBatch,

    /// Sum of all file sizes exceeds the aggregate ceiling.
    #[error(
        "Batch is too large: {total} bytes across all files exceeds the {limit} byte limit\n\
Remove some files and try again."
    )]
    BatchTooLarge { total: u64, limit: u64 },

    /// A single file exceeds the per-file ceiling.
    #[error("File '{name}' is too large: {size} bytes exceeds the {limit} byte per-file limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// Neither the MIME type nor the extension is recognised.
    #[error(
        "File '{name}' has an unsupported type\n\
Supported: png, jpg, jpeg, gif, tiff, tif, webp, txt, html, htm, md, markdown, docx"
    )]
    UnsupportedType { name: String },
}

/// All fatal errors returned by the edgequake-doc2pdf library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Validation ────────────────────────────────────────────────────────
    /// The batch failed validation; no conversion was attempted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The file's bytes could not be read.
    #[error("Could not read '{name}': {source}")]
    Unreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// An image input could not be decoded.
    #[error("Could not decode image '{name}': {detail}")]
    ImageDecodeFailed { name: String, detail: String },

    /// The DOCX container is not a zip or has no main document part.
    #[error("'{name}' is not a valid DOCX archive: {detail}")]
    MalformedArchive { name: String, detail: String },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// No 2-D drawing surface is available (pdfium could not be bound).
    #[error(
        "No render surface available: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install libpdfium system-wide."
    )]
    RenderSurfaceUnavailable(String),

    /// Layout, rasterisation or PDF emission failed.
    #[error("Rasterisation failed: {detail}")]
    RasterizationFailed { detail: String },

    // ── Control errors ────────────────────────────────────────────────────
    /// A batch is already being converted by this converter.
    #[error("A conversion is already in progress; wait for it to finish")]
    BatchInProgress,

    /// Options violate an invariant (quality, margin).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub(crate) fn raster(detail: impl std::fmt::Display) -> Self {
        ConvertError::RasterizationFailed {
            detail: detail.to_string(),
        }
    }

    /// Whether the error was raised before any conversion work started.
    pub fn is_validation(&self) -> bool {
        matches!(self, ConvertError::Validation(_))
    }
}
