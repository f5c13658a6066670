//! Progress-callback trait for batch conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionOptionsBuilder::progress_callback`] to receive
//! events as the pipeline works through a batch.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a UI progress bar or a log without the library
//! knowing how the host communicates. [`crate::stream::convert_stream`] is
//! itself built on this trait.
//!
//! # Percentages
//!
//! `on_progress` always receives a whole-batch percentage in `[0, 100]` that
//! never decreases. Stages report in their own `0..100` range and a
//! [`ProgressSpan`] rescales them into the slice of the batch they own.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2pdf::{ConversionOptions, ConversionProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! struct LastPercent(Mutex<f32>);
//!
//! impl ConversionProgressCallback for LastPercent {
//!     fn on_progress(&self, percent: f32, stage: &str) {
//!         *self.0.lock().unwrap() = percent;
//!         eprintln!("{percent:>5.1}% {stage}");
//!     }
//! }
//!
//! let options = ConversionOptions::builder()
//!     .progress_callback(Arc::new(LastPercent(Mutex::new(0.0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::state::RunState;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive in order from a single thread.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once validation passed, before any file is converted.
    ///
    /// # Arguments
    /// * `total_files`: files in the batch, including ones that will be skipped
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Whole-batch progress.
    ///
    /// # Arguments
    /// * `percent`: in `[0, 100]`, monotonically non-decreasing
    /// * `stage`: short human-readable label ("validating", "rasterising report.docx", …)
    fn on_progress(&self, percent: f32, stage: &str) {
        let _ = (percent, stage);
    }

    /// Called before a file's content is converted.
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called after a file's pages were produced.
    fn on_file_complete(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a file is left out of the output.
    ///
    /// # Arguments
    /// * `reason`: why ("lower-priority type in a mixed batch", "malformed archive: …")
    fn on_file_skipped(&self, name: &str, reason: &str) {
        let _ = (name, reason);
    }

    /// Called after every state transition with the new snapshot.
    fn on_state_change(&self, state: &RunState) {
        let _ = state;
    }

    /// Called once after the document was assembled.
    fn on_batch_complete(&self, page_count: usize) {
        let _ = page_count;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionOptions`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// The slice `[start, end]` of the batch percentage owned by one stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSpan {
    pub start: f32,
    pub end: f32,
}

impl ProgressSpan {
    /// The whole batch.
    pub const FULL: ProgressSpan = ProgressSpan {
        start: 0.0,
        end: 100.0,
    };

    pub const fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Map a local `0..100` percentage into this span.
    pub fn at(&self, local: f32) -> f32 {
        self.start + (self.end - self.start) * local.clamp(0.0, 100.0) / 100.0
    }

    /// The part of this span covering local `from..to`.
    pub fn sub(&self, from: f32, to: f32) -> ProgressSpan {
        ProgressSpan::new(self.at(from), self.at(to))
    }

    /// The `index`-th of `count` equal parts.
    pub fn part(&self, index: usize, count: usize) -> ProgressSpan {
        let count = count.max(1) as f32;
        self.sub(
            100.0 * index as f32 / count,
            100.0 * (index + 1) as f32 / count,
        )
    }
}
