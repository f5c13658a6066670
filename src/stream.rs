//! Streaming conversion API: observe run-state snapshots as the batch moves.
//!
//! ## Why stream?
//!
//! UIs want to redraw on every transition without implementing
//! [`ConversionProgressCallback`] themselves. [`convert_stream`] spawns the
//! batch onto the current tokio runtime and returns a [`ConversionHandle`]:
//! a `Stream` of [`RunState`] snapshots plus a join handle for the result.
//!
//! The stream ends once the batch reaches a terminal phase and the task has
//! dropped its sender. Any callback already configured in the options still
//! receives every event.

use crate::config::ConversionOptions;
use crate::convert::Converter;
use crate::error::ConvertError;
use crate::output::ConversionResult;
use crate::pipeline::input::InputFile;
use crate::pipeline::render::{PdfiumBackend, RenderBackend};
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use crate::state::RunState;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// A boxed stream of run-state snapshots.
pub type StateStream = BoxStream<'static, RunState>;

/// A batch running in the background.
pub struct ConversionHandle {
    /// Every snapshot, in transition order, ending with `Done` or `Failed`.
    pub states: StateStream,
    /// Resolves to the conversion outcome.
    pub result: JoinHandle<Result<ConversionResult, ConvertError>>,
}

impl ConversionHandle {
    /// Drain the state stream, then await the result.
    pub async fn finish(mut self) -> Result<(Vec<RunState>, ConversionResult), ConvertError> {
        let mut states = Vec::new();
        while let Some(state) = self.states.next().await {
            states.push(state);
        }
        let result = self
            .result
            .await
            .map_err(|e| ConvertError::Internal(format!("Conversion task failed: {}", e)))??;
        Ok((states, result))
    }
}

/// Convert `files` with pdfium in a spawned task, streaming state snapshots.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
/// Only invalid options are reported here; everything else arrives through
/// the stream's final `Failed` snapshot and the join handle.
pub fn convert_stream(
    files: Vec<InputFile>,
    options: &ConversionOptions,
) -> Result<ConversionHandle, ConvertError> {
    let backend = Arc::new(PdfiumBackend::from_options(options));
    convert_stream_with_backend(files, options, backend)
}

/// [`convert_stream`] with an explicit render backend.
pub fn convert_stream_with_backend(
    files: Vec<InputFile>,
    options: &ConversionOptions,
    backend: Arc<dyn RenderBackend>,
) -> Result<ConversionHandle, ConvertError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let forwarding = ForwardingCallback {
        inner: options.progress_callback.clone(),
        states: tx,
    };

    let mut options = options.clone();
    options.progress_callback = Some(Arc::new(forwarding));
    let converter = Converter::with_backend(options, backend)?;

    debug!("Spawning streamed conversion of {} file(s)", files.len());
    let result = tokio::spawn(async move { converter.convert(files).await });

    Ok(ConversionHandle {
        states: UnboundedReceiverStream::new(rx).boxed(),
        result,
    })
}

/// Sends each snapshot to the stream and forwards every event to the
/// caller's own callback.
struct ForwardingCallback {
    inner: Option<ProgressCallback>,
    states: mpsc::UnboundedSender<RunState>,
}

impl ConversionProgressCallback for ForwardingCallback {
    fn on_batch_start(&self, total_files: usize) {
        if let Some(cb) = &self.inner {
            cb.on_batch_start(total_files);
        }
    }

    fn on_progress(&self, percent: f32, stage: &str) {
        if let Some(cb) = &self.inner {
            cb.on_progress(percent, stage);
        }
    }

    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        if let Some(cb) = &self.inner {
            cb.on_file_start(index, total, name);
        }
    }

    fn on_file_complete(&self, index: usize, total: usize, name: &str) {
        if let Some(cb) = &self.inner {
            cb.on_file_complete(index, total, name);
        }
    }

    fn on_file_skipped(&self, name: &str, reason: &str) {
        if let Some(cb) = &self.inner {
            cb.on_file_skipped(name, reason);
        }
    }

    fn on_state_change(&self, state: &RunState) {
        // A dropped receiver only means nobody is watching.
        let _ = self.states.send(state.clone());
        if let Some(cb) = &self.inner {
            cb.on_state_change(state);
        }
    }

    fn on_batch_complete(&self, page_count: usize) {
        if let Some(cb) = &self.inner {
            cb.on_batch_complete(page_count);
        }
    }
}
