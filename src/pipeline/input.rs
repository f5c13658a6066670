//! Input files: an immutable byte source plus a declared name and MIME hint.
//!
//! ## Why two sources?
//!
//! Hosts that already hold the bytes (an upload buffer, a database blob)
//! hand them over as [`bytes::Bytes`] so no copy is made. Hosts working with
//! the file system pass a path; the size comes from metadata at ingestion so
//! the validator can reject an oversized batch before a single byte is read.

use crate::config::MAX_FILE_BYTES;
use crate::error::{ConvertError, ValidationError};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Where an [`InputFile`]'s bytes live.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Bytes already in memory.
    Memory(Bytes),
    /// A local file read lazily with `tokio::fs`.
    Path(PathBuf),
}

/// One file of a conversion batch. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct InputFile {
    name: String,
    mime: Option<String>,
    size: u64,
    source: FileSource,
}

impl InputFile {
    /// Wrap in-memory bytes.
    pub fn from_bytes(
        name: impl Into<String>,
        mime: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            mime: mime.map(str::to_string),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Reference a local file. Only metadata is read here.
    ///
    /// The declared name is the file name component of `path`; no MIME hint
    /// is attached, so classification falls back to the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| ConvertError::Unreadable {
                name: name.clone(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(ConvertError::Unreadable {
                name,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        debug!("Resolved local input: {} ({} bytes)", path.display(), metadata.len());
        Ok(Self {
            name,
            mime: None,
            size: metadata.len(),
            source: FileSource::Path(path),
        })
    }

    /// Attach or replace the declared MIME type.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    /// Size in bytes as known at ingestion.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Read the full contents.
    ///
    /// In-memory sources are a cheap reference-count bump. A path is read
    /// with the per-file ceiling applied again, since the file may have grown
    /// after its size was validated.
    pub async fn read(&self) -> Result<Bytes, ConvertError> {
        let path = match &self.source {
            FileSource::Memory(bytes) => return Ok(bytes.clone()),
            FileSource::Path(path) => path,
        };
        let unreadable = |source| ConvertError::Unreadable {
            name: self.name.clone(),
            source,
        };

        let mut file = tokio::fs::File::open(path).await.map_err(unreadable)?;
        let mut buf = Vec::with_capacity(self.size.min(MAX_FILE_BYTES) as usize);
        (&mut file)
            .take(MAX_FILE_BYTES + 1)
            .read_to_end(&mut buf)
            .await
            .map_err(unreadable)?;

        if buf.len() as u64 > MAX_FILE_BYTES {
            let size = match file.metadata().await {
                Ok(metadata) => metadata.len(),
                Err(_) => buf.len() as u64,
            };
            warn!("'{}' grew to {} bytes after validation", self.name, size);
            return Err(ValidationError::FileTooLarge {
                name: self.name.clone(),
                size,
                limit: MAX_FILE_BYTES,
            }
            .into());
        }
        Ok(Bytes::from(buf))
    }
}

/// A file whose bytes have been read, ready for the blocking stages.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub name: String,
    pub bytes: Bytes,
}

impl LoadedFile {
    /// Decode the contents as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        text.strip_prefix('\u{FEFF}').unwrap_or(&text).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn memory_source_reads_back() {
        let file = InputFile::from_bytes("a.txt", Some("text/plain"), b"hello".to_vec());
        assert_eq!(file.size(), 5);
        assert_eq!(file.mime(), Some("text/plain"));
        assert_eq!(&file.read().await.unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn path_source_reads_lazily() {
        let mut tmp = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        tmp.write_all(b"# Title").unwrap();

        let file = InputFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(file.size(), 7);
        assert!(file.name().ends_with(".md"));
        assert!(file.mime().is_none());
        assert_eq!(&file.read().await.unwrap()[..], b"# Title");
    }

    #[tokio::test]
    async fn file_grown_past_ceiling_is_rejected_on_read() {
        let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        tmp.write_all(b"tiny").unwrap();
        let file = InputFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(file.size(), 4);

        std::fs::write(tmp.path(), vec![b'x'; MAX_FILE_BYTES as usize + 1]).unwrap();
        let err = file.read().await.unwrap_err();
        match err {
            ConvertError::Validation(ValidationError::FileTooLarge { size, limit, .. }) => {
                assert_eq!(limit, MAX_FILE_BYTES);
                assert_eq!(size, MAX_FILE_BYTES + 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_at_ceiling_still_reads() {
        let tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        std::fs::write(tmp.path(), vec![b'x'; MAX_FILE_BYTES as usize]).unwrap();
        let file = InputFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(file.read().await.unwrap().len() as u64, MAX_FILE_BYTES);
    }

    #[tokio::test]
    async fn missing_path_is_unreadable() {
        let err = InputFile::from_path("/definitely/not/here.txt")
            .await
            .unwrap_err();
        match err {
            ConvertError::Unreadable { name, .. } => assert_eq!(name, "here.txt"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn loaded_text_strips_bom_and_repairs_utf8() {
        let file = LoadedFile {
            name: "x.txt".into(),
            bytes: Bytes::from_static(b"\xEF\xBB\xBFhi \xFF"),
        };
        assert_eq!(file.text(), "hi \u{FFFD}");
    }
}
