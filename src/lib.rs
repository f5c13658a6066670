//! # edgequake-doc2pdf
//!
//! Convert images, plain text, HTML, Markdown and DOCX files into a single
//! paginated PDF, entirely on the local machine.
//!
//! ## Why this crate?
//!
//! Browser print dialogs and office suites each handle one input type and
//! need a UI. This crate takes a batch of heterogeneous files, picks the
//! group it can convert, and produces one document with predictable page
//! geometry: images scaled onto their own pages, text set in a monospace
//! face, and flowing documents rasterised and sliced into page strips.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files
//!  │
//!  ├─ 1. Validate  size limits, supported types (nothing is read yet)
//!  ├─ 2. Classify  MIME type, then extension; one group wins per batch
//!  ├─ 3. Convert   image placement │ text pagination │ HTML rasterisation
//!  │               (DOCX → HTML and Markdown → HTML feed the rasteriser)
//!  ├─ 4. Assemble  pages appended in order via pdfium (spawn_blocking)
//!  └─ 5. Output    PDF bytes + filename + page count + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2pdf::{convert, ConversionOptions, InputFile, PageSize};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ConversionOptions::builder()
//!         .page_size(PageSize::Letter)
//!         .margin_mm(15.0)
//!         .build()?;
//!     let files = vec![
//!         InputFile::from_path("scan-1.jpg").await?,
//!         InputFile::from_path("scan-2.jpg").await?,
//!     ];
//!     let result = convert(files, &options).await?;
//!     result.write_to(&result.filename)?;
//!     eprintln!("{} pages → {}", result.page_count, result.filename);
//!     Ok(())
//! }
//! ```
//!
//! ## Mixed batches
//!
//! Only one type group is converted per batch, in the priority order
//! image > text > HTML/Markdown > DOCX. Files of other groups are reported
//! as skipped in [`ConversionStats`] and the [`RunState`] snapshot.
//!
//! ## pdfium
//!
//! PDF emission and rasterisation use the pdfium shared library. It is
//! looked up at [`ConversionOptions::pdfium_library_path`], then at
//! `$PDFIUM_LIB_PATH`, then on the system library path. Tests and embedders
//! without pdfium can use [`MemoryBackend`] via [`Converter::with_backend`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod state;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionOptions, ConversionOptionsBuilder, PageSize};
pub use convert::{convert, convert_sync, convert_to_file, Converter};
pub use error::{ConvertError, ValidationError};
pub use output::{ConversionResult, ConversionStats};
pub use pipeline::classify::FileType;
pub use pipeline::input::InputFile;
pub use pipeline::memory::MemoryBackend;
pub use pipeline::render::{PdfiumBackend, RenderBackend, RenderSession};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, ProgressSpan};
pub use state::{FileState, FileStatus, Phase, RunState};
pub use stream::{convert_stream, convert_stream_with_backend, ConversionHandle};
