//! Run state: an immutable snapshot of one batch's progress.
//!
//! ```text
//! Idle ──▶ Validating ──▶ Converting ──▶ Done
//!               │              │
//!               └──────────────┴───────▶ Failed
//! ```
//!
//! Every transition consumes the current value and returns the next one, so
//! a snapshot handed to a callback or sent over a channel can never change
//! underneath its reader.

use crate::error::ConvertError;
use crate::output::ConversionResult;
use crate::pipeline::classify::{classify, FileType};
use crate::pipeline::input::InputFile;
use serde::{Deserialize, Serialize};

/// Phase of the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Validating,
    Converting,
    Done {
        filename: String,
        page_count: usize,
    },
    Failed {
        message: String,
        /// The file being converted when the error occurred, if any.
        file: Option<String>,
    },
}

/// Per-file outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FileState {
    Pending,
    Converting,
    Converted,
    Skipped { reason: String },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStatus {
    pub name: String,
    pub file_type: FileType,
    pub state: FileState,
}

/// Snapshot of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    phase: Phase,
    progress: f32,
    stage: String,
    files: Vec<FileStatus>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            progress: 0.0,
            stage: String::new(),
            files: Vec::new(),
        }
    }
}

impl RunState {
    /// A fresh batch: every file pending.
    pub fn idle(files: &[InputFile]) -> Self {
        Self {
            files: files
                .iter()
                .map(|f| FileStatus {
                    name: f.name().to_string(),
                    file_type: classify(f),
                    state: FileState::Pending,
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Batch percentage in `[0, 100]`.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn files(&self) -> &[FileStatus] {
        &self.files
    }

    /// Name of the file currently being converted.
    pub fn in_progress(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.state == FileState::Converting)
            .map(|f| f.name.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Done { .. } | Phase::Failed { .. })
    }

    // ── Transitions ──────────────────────────────────────────────────────

    pub fn validating(self) -> Self {
        Self {
            phase: Phase::Validating,
            stage: "validating".to_string(),
            ..self
        }
    }

    pub fn converting(self) -> Self {
        Self {
            phase: Phase::Converting,
            stage: "converting".to_string(),
            ..self
        }
    }

    /// Raise progress. Lower values are ignored; the result is clamped to 100.
    pub fn with_progress(self, percent: f32, stage: impl Into<String>) -> Self {
        Self {
            progress: self.progress.max(percent.clamp(0.0, 100.0)),
            stage: stage.into(),
            ..self
        }
    }

    pub fn file_started(self, index: usize) -> Self {
        self.with_file_state(index, FileState::Converting)
    }

    pub fn file_converted(self, index: usize) -> Self {
        self.with_file_state(index, FileState::Converted)
    }

    pub fn file_skipped(self, index: usize, reason: impl Into<String>) -> Self {
        self.with_file_state(
            index,
            FileState::Skipped {
                reason: reason.into(),
            },
        )
    }

    pub fn done(self, result: &ConversionResult) -> Self {
        Self {
            phase: Phase::Done {
                filename: result.filename.clone(),
                page_count: result.page_count,
            },
            progress: 100.0,
            stage: "done".to_string(),
            ..self
        }
    }

    /// Record a fatal error. Every file that was not skipped is marked failed:
    /// a failed run produces no output for any of them.
    pub fn failed(self, error: &ConvertError, file: Option<&str>) -> Self {
        let files = self
            .files
            .into_iter()
            .map(|f| match f.state {
                FileState::Skipped { .. } => f,
                _ => FileStatus {
                    state: FileState::Failed,
                    ..f
                },
            })
            .collect();
        Self {
            phase: Phase::Failed {
                message: error.to_string(),
                file: file.map(str::to_string),
            },
            stage: "failed".to_string(),
            files,
            ..self
        }
    }

    fn with_file_state(mut self, index: usize, state: FileState) -> Self {
        if let Some(file) = self.files.get_mut(index) {
            file.state = state;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ConversionStats;

    fn batch() -> Vec<InputFile> {
        vec![
            InputFile::from_bytes("a.png", Some("image/png"), vec![1, 2, 3]),
            InputFile::from_bytes("b.txt", None, b"hi".to_vec()),
        ]
    }

    #[test]
    fn idle_classifies_files() {
        let s = RunState::idle(&batch());
        assert_eq!(*s.phase(), Phase::Idle);
        assert_eq!(s.progress(), 0.0);
        assert_eq!(s.files()[0].file_type, FileType::Image);
        assert_eq!(s.files()[1].file_type, FileType::Text);
        assert!(s.files().iter().all(|f| f.state == FileState::Pending));
    }

    #[test]
    fn progress_is_monotonic_and_clamped() {
        let s = RunState::idle(&batch())
            .validating()
            .with_progress(40.0, "a")
            .with_progress(20.0, "b");
        assert_eq!(s.progress(), 40.0);
        assert_eq!(s.stage(), "b");
        assert_eq!(s.with_progress(250.0, "c").progress(), 100.0);
    }

    #[test]
    fn done_carries_result_summary() {
        let result = ConversionResult {
            bytes: vec![],
            filename: "a.pdf".into(),
            page_count: 3,
            stats: ConversionStats::default(),
        };
        let s = RunState::idle(&batch()).validating().converting().done(&result);
        assert!(s.is_terminal());
        assert_eq!(
            *s.phase(),
            Phase::Done {
                filename: "a.pdf".into(),
                page_count: 3
            }
        );
        assert_eq!(s.progress(), 100.0);
    }

    #[test]
    fn in_progress_names_the_converting_file() {
        let s = RunState::idle(&batch()).converting();
        assert_eq!(s.in_progress(), None);
        let s = s.file_started(1);
        assert_eq!(s.in_progress(), Some("b.txt"));
        assert_eq!(s.file_converted(1).in_progress(), None);
    }

    #[test]
    fn failure_marks_every_unskipped_file() {
        let err = ConvertError::raster("boom");
        let s = RunState::idle(&batch())
            .converting()
            .file_skipped(1, "lower priority")
            .file_started(0)
            .failed(&err, Some("a.png"));
        match s.phase() {
            Phase::Failed { message, file } => {
                assert!(message.contains("boom"));
                assert_eq!(file.as_deref(), Some("a.png"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(s.files()[0].state, FileState::Failed);
        assert!(matches!(s.files()[1].state, FileState::Skipped { .. }));
    }
}
