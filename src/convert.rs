//! Batch conversion entry points and the pipeline orchestrator.
//!
//! ## Flow
//!
//! ```text
//! files ──▶ validate ──▶ classify ──▶ pick group ──▶ read ──▶ [spawn_blocking]
//!  (0%)        (5%)                    (DISPATCH)            convert ─▶ assemble
//!                                                           (5–95%)    (95–100%)
//! ```
//!
//! ## One type group per batch
//!
//! A batch is partitioned by [`FileType`] and only the highest-priority group
//! present is converted: image > text > html/markdown > docx. Lower groups are
//! dropped with a `warn!`, reported through
//! [`ConversionProgressCallback::on_file_skipped`](crate::ConversionProgressCallback::on_file_skipped)
//! and listed in [`ConversionStats::skipped_files`].
//!
//! ## Why one blocking task per batch?
//!
//! Layout, rasterisation and PDF emission are CPU-bound and pdfium is not
//! async-safe, so everything after the file reads runs inside a single
//! `tokio::task::spawn_blocking` closure. Files are converted strictly in
//! input order, so progress events are deterministic.

use crate::config::{ConversionOptions, MAX_BATCH_BYTES};
use crate::error::{ConvertError, ValidationError};
use crate::output::{ConversionResult, ConversionStats};
use crate::pipeline::assemble::{output_filename, PdfAssembler};
use crate::pipeline::archive::extract_docx;
use crate::pipeline::classify::{classify, FileType};
use crate::pipeline::geometry::PageGeometry;
use crate::pipeline::input::{InputFile, LoadedFile};
use crate::pipeline::markdown::markdown_to_html;
use crate::pipeline::placement::image_page;
use crate::pipeline::raster::paginate_html;
use crate::pipeline::render::{PdfiumBackend, RenderBackend, RenderSession};
use crate::pipeline::text::paginate_text;
use crate::pipeline::validate::validate_batch;
use crate::progress::{ProgressCallback, ProgressSpan};
use crate::state::RunState;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const VALIDATION_SPAN: ProgressSpan = ProgressSpan::new(0.0, 5.0);
const CONVERSION_SPAN: ProgressSpan = ProgressSpan::new(5.0, 95.0);
const ASSEMBLY_SPAN: ProgressSpan = ProgressSpan::new(95.0, 100.0);

/// Share of a multi-archive run spent extracting; rasterising takes the rest.
const DOCX_EXTRACTION_SHARE: f32 = 60.0;

// ── Dispatch table ───────────────────────────────────────────────────────────

type Handler = fn(&mut Batch<'_>, &[Loaded]) -> Result<(), ConvertError>;

struct Route {
    label: &'static str,
    accepts: fn(FileType) -> bool,
    handler: Handler,
}

/// Priority order: the first route with at least one matching file wins.
static DISPATCH: [Route; 4] = [
    Route {
        label: "image",
        accepts: is_image,
        handler: convert_images,
    },
    Route {
        label: "text",
        accepts: is_text,
        handler: convert_text,
    },
    Route {
        label: "html/markdown",
        accepts: is_flowing,
        handler: convert_flowing,
    },
    Route {
        label: "docx",
        accepts: is_docx,
        handler: convert_docx,
    },
];

fn is_image(t: FileType) -> bool {
    t == FileType::Image
}

fn is_text(t: FileType) -> bool {
    t == FileType::Text
}

fn is_flowing(t: FileType) -> bool {
    matches!(t, FileType::Html | FileType::Markdown)
}

fn is_docx(t: FileType) -> bool {
    t == FileType::Docx
}

fn route_for(types: &[FileType]) -> Option<&'static Route> {
    DISPATCH
        .iter()
        .find(|route| types.iter().any(|t| (route.accepts)(*t)))
}

// ── Converter ────────────────────────────────────────────────────────────────

/// Converts batches of files into one PDF each.
///
/// A converter runs one batch at a time; starting a second batch while one
/// is in flight fails with [`ConvertError::BatchInProgress`].
pub struct Converter {
    options: ConversionOptions,
    backend: Arc<dyn RenderBackend>,
    busy: AtomicBool,
}

impl Converter {
    /// A converter rendering through pdfium.
    pub fn new(options: ConversionOptions) -> Result<Self, ConvertError> {
        let backend = Arc::new(PdfiumBackend::from_options(&options));
        Self::with_backend(options, backend)
    }

    /// A converter rendering through `backend`.
    pub fn with_backend(
        options: ConversionOptions,
        backend: Arc<dyn RenderBackend>,
    ) -> Result<Self, ConvertError> {
        options.validate()?;
        Ok(Self {
            options,
            backend,
            busy: AtomicBool::new(false),
        })
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Whether a batch is currently being converted.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Convert `files` into one document.
    ///
    /// # Errors
    /// Any error is fatal for the whole batch and no partial document is
    /// returned. Validation errors are raised before any file is read.
    pub async fn convert(&self, files: Vec<InputFile>) -> Result<ConversionResult, ConvertError> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        let started = Instant::now();
        info!(
            "Starting conversion of {} file(s) via {}",
            files.len(),
            self.backend.name()
        );

        let mut tracker = Tracker::new(
            self.options.progress_callback.clone(),
            RunState::idle(&files),
        );

        // ── Validate ─────────────────────────────────────────────────────
        tracker.update(RunState::validating);
        tracker.progress(VALIDATION_SPAN.start, "validating");
        if let Err(e) = validate_batch(&files) {
            let err = ConvertError::from(e);
            warn!("Batch rejected: {}", err);
            tracker.fail(&err, None);
            return Err(err);
        }
        tracker.progress(VALIDATION_SPAN.end, "validated");
        if let Some(cb) = &self.options.progress_callback {
            cb.on_batch_start(files.len());
        }

        // ── Classify and pick the winning group ──────────────────────────
        let types: Vec<FileType> = files.iter().map(classify).collect();
        let Some(route) = route_for(&types) else {
            let err = ConvertError::Internal("validated batch has no convertible files".into());
            tracker.fail(&err, None);
            return Err(err);
        };

        let mut stats = ConversionStats::default();
        let mut selected = Vec::new();
        for (index, (file, file_type)) in files.iter().zip(&types).enumerate() {
            if (route.accepts)(*file_type) {
                selected.push(index);
            } else {
                let reason = format!("{} file dropped: batch contains {} files", file_type, route.label);
                warn!("Skipping '{}': {}", file.name(), reason);
                tracker.skip(index, file.name(), &reason);
                stats.files_skipped += 1;
                stats.skipped_files.push(file.name().to_string());
            }
        }
        debug!("Dispatching {} {} file(s)", selected.len(), route.label);
        tracker.update(RunState::converting);

        // ── Read bytes (async I/O) ───────────────────────────────────────
        let mut loaded = Vec::with_capacity(selected.len());
        for &index in &selected {
            let file = &files[index];
            match file.read().await {
                Ok(bytes) => loaded.push(Loaded {
                    index,
                    file_type: types[index],
                    file: LoadedFile {
                        name: file.name().to_string(),
                        bytes,
                    },
                }),
                Err(err) => {
                    tracker.fail(&err, Some(file.name()));
                    return Err(err);
                }
            }
        }
        // Files on disk may have grown since validation.
        let total: u64 = loaded.iter().map(|l| l.file.bytes.len() as u64).sum();
        if total > MAX_BATCH_BYTES {
            let err = ConvertError::from(ValidationError::BatchTooLarge {
                total,
                limit: MAX_BATCH_BYTES,
            });
            warn!("Batch rejected after reading: {}", err);
            tracker.fail(&err, None);
            return Err(err);
        }

        // ── Convert and assemble (blocking) ──────────────────────────────
        let backend = Arc::clone(&self.backend);
        let options = self.options.clone();
        let (outcome, mut tracker) = tokio::task::spawn_blocking(move || {
            // A panic in a backend or surface still has to end the run as Failed,
            // so it is caught here while the tracker is in reach.
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                run_batch(backend.as_ref(), &options, route, &loaded, &mut tracker, stats)
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                Err((
                    ConvertError::Internal(format!("Conversion task panicked: {}", message)),
                    tracker.state.in_progress().map(str::to_string),
                ))
            });
            (outcome, tracker)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("Conversion task failed: {}", e)))?;

        match outcome {
            Ok((bytes, page_count, mut stats)) => {
                stats.duration_ms = started.elapsed().as_millis() as u64;
                let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
                let result = ConversionResult {
                    bytes,
                    filename: output_filename(&names),
                    page_count,
                    stats,
                };
                tracker.progress(ASSEMBLY_SPAN.end, "done");
                tracker.update(|s| s.done(&result));
                if let Some(cb) = &self.options.progress_callback {
                    cb.on_batch_complete(page_count);
                }
                info!(
                    "Conversion complete: {} → {} pages, {} bytes, {}ms",
                    result.filename,
                    result.page_count,
                    result.bytes.len(),
                    result.stats.duration_ms
                );
                Ok(result)
            }
            Err((err, file)) => {
                warn!("Conversion failed: {}", err);
                tracker.fail(&err, file.as_deref());
                Err(err)
            }
        }
    }

    /// Blocking wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from
    /// inside an async context.
    pub fn convert_sync(&self, files: Vec<InputFile>) -> Result<ConversionResult, ConvertError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert(files))
    }
}

/// Convert a batch with a pdfium-backed [`Converter`].
///
/// # Example
/// ```rust,no_run
/// use edgequake_doc2pdf::{convert, ConversionOptions, InputFile};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let files = vec![
///     InputFile::from_path("notes.md").await?,
///     InputFile::from_bytes("todo.md", Some("text/markdown"), b"- ship it".to_vec()),
/// ];
/// let result = convert(files, &ConversionOptions::default()).await?;
/// result.write_to(&result.filename)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    files: Vec<InputFile>,
    options: &ConversionOptions,
) -> Result<ConversionResult, ConvertError> {
    Converter::new(options.clone())?.convert(files).await
}

/// Synchronous wrapper around [`convert`].
pub fn convert_sync(
    files: Vec<InputFile>,
    options: &ConversionOptions,
) -> Result<ConversionResult, ConvertError> {
    Converter::new(options.clone())?.convert_sync(files)
}

/// Convert and write the PDF to `output_path` atomically.
pub async fn convert_to_file(
    files: Vec<InputFile>,
    output_path: impl AsRef<Path>,
    options: &ConversionOptions,
) -> Result<ConversionResult, ConvertError> {
    let result = convert(files, options).await?;
    result.write_to(output_path)?;
    Ok(result)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ConvertError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ConvertError::BatchInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the run state and forwards every change to the callback.
struct Tracker {
    state: RunState,
    callback: Option<ProgressCallback>,
}

impl Tracker {
    fn new(callback: Option<ProgressCallback>, state: RunState) -> Self {
        let tracker = Self { state, callback };
        if let Some(cb) = &tracker.callback {
            cb.on_state_change(&tracker.state);
        }
        tracker
    }

    fn update(&mut self, transition: impl FnOnce(RunState) -> RunState) {
        let current = std::mem::take(&mut self.state);
        self.state = transition(current);
        if let Some(cb) = &self.callback {
            cb.on_state_change(&self.state);
        }
    }

    fn progress(&mut self, percent: f32, stage: &str) {
        let before = self.state.progress();
        self.update(|s| s.with_progress(percent, stage));
        if let Some(cb) = &self.callback {
            if self.state.progress() > before || percent <= 0.0 {
                cb.on_progress(self.state.progress(), stage);
            }
        }
    }

    fn start(&mut self, index: usize, position: usize, total: usize, name: &str) {
        self.update(|s| s.file_started(index));
        if let Some(cb) = &self.callback {
            cb.on_file_start(position, total, name);
        }
    }

    fn complete(&mut self, index: usize, position: usize, total: usize, name: &str) {
        self.update(|s| s.file_converted(index));
        if let Some(cb) = &self.callback {
            cb.on_file_complete(position, total, name);
        }
    }

    fn skip(&mut self, index: usize, name: &str, reason: &str) {
        self.update(|s| s.file_skipped(index, reason));
        if let Some(cb) = &self.callback {
            cb.on_file_skipped(name, reason);
        }
    }

    fn fail(&mut self, error: &ConvertError, file: Option<&str>) {
        self.update(|s| s.failed(error, file));
    }
}

/// A file of the winning group with its bytes.
struct Loaded {
    /// Position in the original batch.
    index: usize,
    file_type: FileType,
    file: LoadedFile,
}

/// Everything a handler needs inside the blocking task.
struct Batch<'a> {
    options: &'a ConversionOptions,
    session: &'a dyn RenderSession,
    assembler: PdfAssembler<'a>,
    tracker: &'a mut Tracker,
    stats: ConversionStats,
    /// Name of the file being converted, for error reporting.
    current: Option<String>,
}

impl Batch<'_> {
    fn geometry(&self) -> PageGeometry {
        PageGeometry::for_flowing(self.options.page_size, self.options.margin_mm)
    }

    fn begin(&mut self, loaded: &Loaded, position: usize, total: usize) {
        debug!("Converting '{}' as {}", loaded.file.name, loaded.file_type);
        self.current = Some(loaded.file.name.clone());
        self.tracker
            .start(loaded.index, position, total, &loaded.file.name);
    }

    fn complete(&mut self, loaded: &Loaded, position: usize, total: usize) {
        self.tracker
            .complete(loaded.index, position, total, &loaded.file.name);
        self.stats.files_converted += 1;
        self.current = None;
    }

    fn skip(&mut self, loaded: &Loaded, reason: &str) {
        self.tracker.skip(loaded.index, &loaded.file.name, reason);
        self.stats.files_skipped += 1;
        self.stats.skipped_files.push(loaded.file.name.clone());
        self.current = None;
    }
}

type BatchOutcome = Result<(Vec<u8>, usize, ConversionStats), (ConvertError, Option<String>)>;

fn run_batch(
    backend: &dyn RenderBackend,
    options: &ConversionOptions,
    route: &Route,
    files: &[Loaded],
    tracker: &mut Tracker,
    stats: ConversionStats,
) -> BatchOutcome {
    let session = backend.open().map_err(|e| (e, None))?;
    let sink = session.open_document().map_err(|e| (e, None))?;

    let mut batch = Batch {
        options,
        session: session.as_ref(),
        assembler: PdfAssembler::new(sink),
        tracker,
        stats,
        current: None,
    };
    if let Err(e) = (route.handler)(&mut batch, files) {
        return Err((e, batch.current.take()));
    }

    batch.tracker.progress(ASSEMBLY_SPAN.start, "assembling");
    let Batch {
        assembler, stats, ..
    } = batch;
    let (bytes, pages) = assembler.finish().map_err(|e| (e, None))?;
    Ok((bytes, pages, stats))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// One page per image, in input order.
fn convert_images(batch: &mut Batch<'_>, files: &[Loaded]) -> Result<(), ConvertError> {
    let total = files.len();
    for (position, loaded) in files.iter().enumerate() {
        batch.begin(loaded, position, total);
        let unit = image_page(&loaded.file.name, &loaded.file.bytes, batch.options)?;
        batch.assembler.push(&unit)?;
        batch.complete(loaded, position, total);
        batch.tracker.progress(
            CONVERSION_SPAN.part(position, total).end,
            &format!("placed {}", loaded.file.name),
        );
    }
    Ok(())
}

/// All text files paginated as one stream; a header per file when several.
fn convert_text(batch: &mut Batch<'_>, files: &[Loaded]) -> Result<(), ConvertError> {
    let total = files.len();
    let texts: Vec<String> = files.iter().map(|l| l.file.text()).collect();
    let docs: Vec<(Option<&str>, &str)> = files
        .iter()
        .zip(&texts)
        .map(|(l, text)| {
            let header = (total > 1).then_some(l.file.name.as_str());
            (header, text.as_str())
        })
        .collect();

    for (position, loaded) in files.iter().enumerate() {
        batch.begin(loaded, position, total);
    }
    let units = paginate_text(&docs, &batch.geometry());
    batch.tracker.progress(CONVERSION_SPAN.at(50.0), "paginated text");

    batch.assembler.extend(&units)?;
    for (position, loaded) in files.iter().enumerate() {
        batch.complete(loaded, position, total);
    }
    batch.tracker.progress(CONVERSION_SPAN.end, "text placed");
    Ok(())
}

/// HTML and Markdown: each file rasterised on its own run of pages.
fn convert_flowing(batch: &mut Batch<'_>, files: &[Loaded]) -> Result<(), ConvertError> {
    let total = files.len();
    for (position, loaded) in files.iter().enumerate() {
        batch.begin(loaded, position, total);
        let text = loaded.file.text();
        let html = match loaded.file_type {
            FileType::Markdown => markdown_to_html(&text),
            _ => text,
        };
        let span = CONVERSION_SPAN.part(position, total);
        rasterize_into(batch, &html, span, &loaded.file.name)?;
        batch.complete(loaded, position, total);
    }
    Ok(())
}

/// DOCX archives. A single archive that cannot be read fails the batch;
/// with several, malformed archives are skipped and the rest are merged
/// into one flowing document.
fn convert_docx(batch: &mut Batch<'_>, files: &[Loaded]) -> Result<(), ConvertError> {
    let total = files.len();
    let extraction = CONVERSION_SPAN.sub(0.0, DOCX_EXTRACTION_SHARE);
    let rendering = CONVERSION_SPAN.sub(DOCX_EXTRACTION_SHARE, 100.0);

    let mut html = String::new();
    let mut extracted = Vec::with_capacity(total);
    let mut first_error = None;

    for (position, loaded) in files.iter().enumerate() {
        batch.begin(loaded, position, total);
        match extract_docx(&loaded.file.name, &loaded.file.bytes) {
            Ok(content) => {
                html.push_str(&content.to_html());
                extracted.push((position, loaded));
            }
            Err(e) if total > 1 => {
                warn!("Skipping '{}': {}", loaded.file.name, e);
                batch.skip(loaded, &e.to_string());
                first_error.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
        batch.tracker.progress(
            extraction.part(position, total).end,
            &format!("extracted {}", loaded.file.name),
        );
    }

    if extracted.is_empty() {
        return Err(first_error.unwrap_or_else(|| {
            ConvertError::Internal("no archives to convert".to_string())
        }));
    }

    let label = match extracted.as_slice() {
        [(_, only)] => only.file.name.clone(),
        many => format!("{} documents", many.len()),
    };
    batch.current = Some(label.clone());
    rasterize_into(batch, &html, rendering, &label)?;
    for (position, loaded) in extracted {
        batch.complete(loaded, position, total);
    }
    Ok(())
}

/// Rasterise `html` onto new pages, reporting progress inside `span`.
///
/// The render surface lives only for this call and is released on every
/// exit path when the guard is dropped.
fn rasterize_into(
    batch: &mut Batch<'_>,
    html: &str,
    span: ProgressSpan,
    name: &str,
) -> Result<(), ConvertError> {
    let geometry = batch.geometry();
    let stage = format!("rasterising {name}");
    let units = {
        let surface = batch.session.open_surface()?;
        let tracker = &mut *batch.tracker;
        paginate_html(html, &geometry, batch.options, surface.as_ref(), &mut |p| {
            tracker.progress(span.at(p), &stage)
        })?
    };
    batch.assembler.extend(&units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::memory::MemoryBackend;

    #[test]
    fn priority_order() {
        use FileType::*;
        assert_eq!(route_for(&[Docx, Text, Image]).map(|r| r.label), Some("image"));
        assert_eq!(route_for(&[Docx, Text]).map(|r| r.label), Some("text"));
        assert_eq!(route_for(&[Docx, Markdown]).map(|r| r.label), Some("html/markdown"));
        assert_eq!(route_for(&[Html, Markdown]).map(|r| r.label), Some("html/markdown"));
        assert_eq!(route_for(&[Docx]).map(|r| r.label), Some("docx"));
        assert!(route_for(&[Unknown]).is_none());
        assert!(route_for(&[]).is_none());
    }

    #[test]
    fn busy_guard_rejects_second_batch() {
        let flag = AtomicBool::new(false);
        let guard = BusyGuard::acquire(&flag).unwrap();
        assert!(matches!(
            BusyGuard::acquire(&flag),
            Err(ConvertError::BatchInProgress)
        ));
        drop(guard);
        assert!(BusyGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn invalid_options_are_rejected_up_front() {
        let mut options = ConversionOptions::default();
        options.quality = 0.0;
        let err = Converter::with_backend(options, Arc::new(MemoryBackend::new()))
            .err()
            .unwrap();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn unsupported_batch_fails_before_reading() {
        let converter =
            Converter::with_backend(ConversionOptions::default(), Arc::new(MemoryBackend::new()))
                .unwrap();
        let files = vec![InputFile::from_bytes("a.exe", None, vec![0u8; 4])];
        let err = tokio_test::block_on(converter.convert(files)).unwrap_err();
        assert!(err.is_validation());
        assert!(!converter.is_busy());
    }

    #[tokio::test]
    async fn busy_flag_is_cleared_after_a_batch() {
        let converter =
            Converter::with_backend(ConversionOptions::default(), Arc::new(MemoryBackend::new()))
                .unwrap();
        let files = vec![InputFile::from_bytes("a.txt", None, b"hello".to_vec())];
        converter.convert(files).await.unwrap();
        assert!(!converter.is_busy());

        let err = converter.convert(vec![]).await.unwrap_err();
        assert!(err.is_validation());
        assert!(!converter.is_busy());
    }
}
