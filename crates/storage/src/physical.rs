//! File backed by the operating system.

use crate::file::File;
use atlas_core::{Error, Result};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Page size used when the filesystem does not report one.
pub const DEFAULT_PAGE_SIZE_LOG2: u32 = 12;

/// An OS file.
///
/// `persist` syncs data and metadata to disk. `discard` is not supported:
/// rollback has to be provided by a durable file layered on top.
#[derive(Debug)]
pub struct PhysicalFile {
    file: Mutex<fs::File>,
    current_size: u64,
}

impl PhysicalFile {
    /// Open (or create) the file at `path`, creating parent directories.
    ///
    /// With `clear` set, existing content is truncated.
    pub fn open(path: impl AsRef<Path>, clear: bool) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let current_size = file.metadata()?.len();
        let mut physical = PhysicalFile {
            file: Mutex::new(file),
            current_size,
        };
        if clear {
            physical.resize(0)?;
        }
        Ok(physical)
    }

    /// Preferred page size (as a power of two) of the underlying filesystem.
    pub fn hint(&self) -> Result<u32> {
        let metadata = self.file.lock().metadata()?;
        Ok(block_size_log2(&metadata))
    }
}

#[cfg(unix)]
fn block_size_log2(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    let blksize = metadata.blksize();
    if blksize.is_power_of_two() {
        blksize.trailing_zeros()
    } else {
        DEFAULT_PAGE_SIZE_LOG2
    }
}

#[cfg(not(unix))]
fn block_size_log2(_metadata: &fs::Metadata) -> u32 {
    DEFAULT_PAGE_SIZE_LOG2
}

impl File for PhysicalFile {
    fn read(&self, buffer: &mut [u8], offset: u64) -> Result<()> {
        if offset + buffer.len() as u64 > self.current_size {
            return Err(Error::InvalidOperation(format!(
                "expected to read {} bytes at offset {} from a total of {}",
                buffer.len(),
                offset,
                self.current_size
            )));
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buffer)?;
        Ok(())
    }

    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<()> {
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buffer)?;
        self.current_size = self.current_size.max(offset + buffer.len() as u64);
        Ok(())
    }

    fn resize(&mut self, size: u64) -> Result<()> {
        self.file.get_mut().set_len(size)?;
        self.current_size = size;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.current_size
    }

    fn persist(&mut self) -> Result<()> {
        self.file.get_mut().sync_all()?;
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        Err(Error::InvalidOperation(
            "discard must be delegated to a durable file".to_string(),
        ))
    }
}
