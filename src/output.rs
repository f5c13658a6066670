//! Conversion result types.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// The assembled document. Owned by the caller once returned.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// The PDF bytes.
    pub bytes: Vec<u8>,
    /// `<stem>.pdf` for a single input, `combined.pdf` otherwise.
    pub filename: String,
    pub page_count: usize,
    pub stats: ConversionStats,
}

/// Aggregate statistics for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Files whose content reached the output.
    pub files_converted: usize,
    /// Files left out (lower-priority type, malformed archive).
    pub files_skipped: usize,
    /// Names of the files left out, in input order.
    pub skipped_files: Vec<String>,
    /// Wall-clock time from validation to assembly.
    pub duration_ms: u64,
}

impl ConversionResult {
    /// Write the PDF to `path` atomically (temp file in the same directory,
    /// then rename), creating parent directories as needed.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ConvertError> {
        let path = path.as_ref();
        let fail = |source: std::io::Error| ConvertError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(fail)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(fail)?;
        tmp.write_all(&self.bytes).map_err(fail)?;
        tmp.persist(path).map_err(|e| fail(e.error))?;

        info!("Wrote {} ({} pages, {} bytes)", path.display(), self.page_count, self.bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> ConversionResult {
        ConversionResult {
            bytes: b"%PDF-1.7\n".to_vec(),
            filename: "notes.pdf".into(),
            page_count: 1,
            stats: ConversionStats::default(),
        }
    }

    #[test]
    fn write_to_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/notes.pdf");
        result().write_to(&target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7\n");
    }

    #[test]
    fn write_to_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("notes.pdf");
        std::fs::write(&target, b"old").unwrap();
        result().write_to(&target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7\n");
    }

    #[test]
    fn write_failure_names_path() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be replaced by a file.
        let target = dir.path().join("taken");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("child"), b"x").unwrap();
        let err = result().write_to(&target).unwrap_err();
        assert!(matches!(err, ConvertError::OutputWriteFailed { .. }));
        assert!(err.to_string().contains("taken"));
    }

    #[test]
    fn stats_serialise() {
        let stats = ConversionStats {
            files_converted: 2,
            files_skipped: 1,
            skipped_files: vec!["c.txt".into()],
            duration_ms: 40,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"skipped_files\":[\"c.txt\"]"));
    }
}
