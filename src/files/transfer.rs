use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// An open file being streamed to one client.
///
/// Owns the descriptor exclusively; it is closed when the transfer is
/// dropped, whichever way the request ended (completion, client gone,
/// error, or the connection timing out mid-stream).
#[derive(Debug)]
pub struct FileTransfer {
    file: File,
    path: PathBuf,
    size: u64,
    offset: u64,
    remaining: u64,
}

impl FileTransfer {
    /// Open `path` for a transfer of `size` bytes, the length seen at stat time.
    pub async fn open(path: &Path, size: u64) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?.into_std().await;
        tracing::debug!(path = %path.display(), fd = ?file, "opened file");
        Ok(Self::from_file(file, path, size))
    }

    pub fn from_file(file: File, path: &Path, size: u64) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
            size,
            offset: 0,
            remaining: size,
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Record `written` bytes as delivered.
    pub fn advance(&mut self, written: usize) {
        let written = (written as u64).min(self.remaining);
        self.offset += written;
        self.remaining -= written;
    }
}

impl Drop for FileTransfer {
    fn drop(&mut self) {
        tracing::debug!(
            path = %self.path.display(),
            sent = self.offset,
            size = self.size,
            "closed fd"
        );
    }
}
