//! Batch validation: size ceilings and supported types, before any work.
//!
//! Checks run in a fixed order (aggregate size, per-file size, type) and the
//! first violation wins, so the message a user sees for a given batch is
//! stable no matter how many problems it has.

use crate::config::{MAX_BATCH_BYTES, MAX_FILE_BYTES};
use crate::error::ValidationError;
use crate::pipeline::classify::{classify, FileType};
use crate::pipeline::input::InputFile;
use tracing::debug;

/// Validate a batch against the default ceilings.
pub fn validate_batch(files: &[InputFile]) -> Result<(), ValidationError> {
    validate_with_limits(files, MAX_FILE_BYTES, MAX_BATCH_BYTES)
}

/// Validate a batch against explicit ceilings.
pub fn validate_with_limits(
    files: &[InputFile],
    max_file: u64,
    max_batch: u64,
) -> Result<(), ValidationError> {
    if files.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    let total: u64 = files.iter().map(InputFile::size).sum();
    if total > max_batch {
        return Err(ValidationError::BatchTooLarge {
            total,
            limit: max_batch,
        });
    }

    if let Some(file) = files.iter().find(|f| f.size() > max_file) {
        return Err(ValidationError::FileTooLarge {
            name: file.name().to_string(),
            size: file.size(),
            limit: max_file,
        });
    }

    if let Some(file) = files.iter().find(|f| classify(f) == FileType::Unknown) {
        return Err(ValidationError::UnsupportedType {
            name: file.name().to_string(),
        });
    }

    debug!("Validated {} files, {} bytes total", files.len(), total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(name: &str, size: usize) -> InputFile {
        InputFile::from_bytes(name, None, vec![0u8; size])
    }

    #[test]
    fn exactly_at_aggregate_limit_passes() {
        // 5 files of exactly 10 MiB each = 50 MiB.
        let files: Vec<_> = (0..5)
            .map(|i| sized(&format!("f{i}.txt"), MAX_FILE_BYTES as usize))
            .collect();
        assert!(validate_batch(&files).is_ok());
    }

    #[test]
    fn one_byte_over_aggregate_fails() {
        let mut files: Vec<_> = (0..5)
            .map(|i| sized(&format!("f{i}.txt"), MAX_FILE_BYTES as usize))
            .collect();
        files.push(sized("extra.txt", 1));
        let err = validate_batch(&files).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BatchTooLarge {
                total: MAX_BATCH_BYTES + 1,
                limit: MAX_BATCH_BYTES
            }
        );
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn single_file_over_per_file_limit_fails() {
        let files = vec![sized("small.txt", 10), sized("big.png", MAX_FILE_BYTES as usize + 1)];
        match validate_batch(&files).unwrap_err() {
            ValidationError::FileTooLarge { name, size, limit } => {
                assert_eq!(name, "big.png");
                assert_eq!(size, MAX_FILE_BYTES + 1);
                assert_eq!(limit, MAX_FILE_BYTES);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_fails_after_size_checks() {
        let files = vec![sized("a.txt", 1), sized("b.exe", 1)];
        assert_eq!(
            validate_batch(&files).unwrap_err(),
            ValidationError::UnsupportedType { name: "b.exe".into() }
        );
    }

    #[test]
    fn aggregate_is_checked_before_type() {
        let files = vec![sized("a.bin", 8), sized("b.txt", 8)];
        let err = validate_with_limits(&files, 10, 15).unwrap_err();
        assert!(matches!(err, ValidationError::BatchTooLarge { total: 16, .. }));
    }

    #[test]
    fn empty_batch_rejected() {
        assert_eq!(validate_batch(&[]).unwrap_err(), ValidationError::EmptyBatch);
    }
}
