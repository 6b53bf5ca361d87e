//! Upload handle capability.
//!
//! The pipeline never touches the web layer; it consumes pending uploads
//! through this trait. Any temp-file abstraction can satisfy it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub trait UploadHandle: Send + Sync {
    /// Filesystem path of the raw upload.
    fn real_path(&self) -> &Path;
    /// MIME type reported for the upload.
    fn mime_type(&self) -> &str;
    /// Size of the upload in bytes.
    fn byte_size(&self) -> u64;
    /// File name the client supplied.
    fn original_client_name(&self) -> &str;
}

/// File-backed upload handle.
#[derive(Debug, Clone)]
pub struct TempUpload {
    path: PathBuf,
    mime_type: String,
    byte_size: u64,
    original_name: String,
}

impl TempUpload {
    /// Open an existing file as an upload handle, reading its size from the
    /// filesystem.
    pub fn open(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> io::Result<Self> {
        let path = path.into();
        let byte_size = fs::metadata(&path)?.len();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(TempUpload {
            path,
            mime_type: mime_type.into(),
            byte_size,
            original_name,
        })
    }

    /// Build a handle with explicit attributes, for callers that already
    /// know them (e.g. a multipart layer).
    pub fn with_attributes(
        path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
        byte_size: u64,
        original_name: impl Into<String>,
    ) -> Self {
        TempUpload {
            path: path.into(),
            mime_type: mime_type.into(),
            byte_size,
            original_name: original_name.into(),
        }
    }
}

impl UploadHandle for TempUpload {
    fn real_path(&self) -> &Path {
        &self.path
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn byte_size(&self) -> u64 {
        self.byte_size
    }

    fn original_client_name(&self) -> &str {
        &self.original_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_reads_size_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"not really a video").unwrap();

        let upload = TempUpload::open(&path, "video/mp4").unwrap();
        assert_eq!(upload.byte_size(), 18);
        assert_eq!(upload.original_client_name(), "clip.mp4");
        assert_eq!(upload.mime_type(), "video/mp4");
        assert_eq!(upload.real_path(), path);
    }

    #[test]
    fn open_missing_file_fails() {
        assert!(TempUpload::open("/does/not/exist.mp4", "video/mp4").is_err());
    }

    #[test]
    fn with_attributes_preserves_values() {
        let upload = TempUpload::with_attributes("/tmp/u", "video/webm", 0, "empty.webm");
        assert_eq!(upload.byte_size(), 0);
        assert_eq!(upload.original_client_name(), "empty.webm");
    }
}
