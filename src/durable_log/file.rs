use super::{encode_line, LogError, LogWriter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Local filesystem log using `std::fs::File`
pub struct FileLog {
    path: PathBuf,
    out: BufWriter<File>,
    line: Vec<u8>,
    written: u64,
}

impl FileLog {
    /// Create (or truncate) the log at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| LogError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(FileLog {
            path,
            out: BufWriter::new(file),
            line: Vec::with_capacity(16),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogWriter for FileLog {
    fn append(&mut self, value: u64) -> Result<(), LogError> {
        encode_line(value, &mut self.line);
        self.out
            .write_all(&self.line)
            .and_then(|()| self.out.flush())
            .map_err(|source| LogError::Write { value, source })?;
        self.written = self.written.saturating_add(1);
        Ok(())
    }

    fn written(&self) -> u64 {
        self.written
    }

    fn close(mut self: Box<Self>) -> Result<(), LogError> {
        let path = self.path.clone();
        self.out
            .flush()
            .and_then(|()| self.out.get_ref().sync_all())
            .map_err(|source| LogError::Close { path, source })
    }
}
