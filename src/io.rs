//! Byte-addressed storage backends underneath the page file

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// I/O backend trait
pub trait IoBackend {
    /// Current size in bytes
    fn len(&self) -> Result<u64>;

    /// Whether the backend holds no bytes yet
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fill `buf` with the bytes at `offset`
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` at `offset`, extending the backend if needed
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;

    /// Flush written data to durable storage
    fn sync(&mut self) -> Result<()>;
}

/// Standard file-backed I/O
#[derive(Debug)]
pub struct FileBackend {
    file: File,
    path: PathBuf,
}

impl FileBackend {
    /// Open or create the file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        Ok(Self { file, path })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IoBackend for FileBackend {
    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        // `&File` implements Read and Seek, so shared access is enough
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

/// In-memory backend; clones share the same bytes so a tree can be reopened
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored bytes
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl IoBackend for MemoryBackend {
    fn len(&self) -> Result<u64> {
        Ok(self.data.lock().len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let data = self.data.lock();
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            return Err(Error::Io(format!(
                "read of {} bytes at {} past end of {} byte buffer",
                buf.len(),
                offset,
                data.len()
            )));
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut data = self.data.lock();
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_backend_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let mut backend = FileBackend::open(dir.path().join("pages.db"))?;
        assert!(backend.is_empty()?);

        backend.write_at(4, b"page")?;
        backend.sync()?;
        assert_eq!(backend.len()?, 8);

        let mut buf = [0u8; 8];
        backend.read_at(0, &mut buf)?;
        assert_eq!(&buf, b"\0\0\0\0page");
        Ok(())
    }

    #[test]
    fn test_file_backend_short_read() -> Result<()> {
        let dir = TempDir::new()?;
        let mut backend = FileBackend::open(dir.path().join("pages.db"))?;
        backend.write_at(0, &[1, 2, 3])?;
        let mut buf = [0u8; 8];
        assert!(matches!(backend.read_at(0, &mut buf), Err(Error::Io(_))));
        Ok(())
    }

    #[test]
    fn test_memory_backend_shared_between_clones() -> Result<()> {
        let mut backend = MemoryBackend::new();
        let reopened = backend.clone();
        backend.write_at(2, &[7, 8])?;

        assert_eq!(reopened.len()?, 4);
        assert_eq!(reopened.to_vec(), vec![0, 0, 7, 8]);
        let mut buf = [0u8; 4];
        assert!(reopened.read_at(1, &mut buf).is_err());
        Ok(())
    }
}
