//! Byte-addressable files
//!
//! Every layer of the storage stack talks to the layer below through the
//! [`File`] trait: the block manager writes into a durable file, the durable
//! file writes into two plain files (data and log), and those end at either a
//! [`VirtualFile`] (memory) or a [`PhysicalFile`](crate::PhysicalFile) (OS file).
//!
//! ## Contract
//!
//! - `read` fills the whole buffer or fails; reading past `size()` fails
//! - `write` grows the file when it extends past the end
//! - `persist` makes the current content durable
//! - `discard` reverts to the last persisted content, if the medium can

use atlas_core::{Error, Result};

/// Minimal random-access file abstraction.
pub trait File: Send + Sync {
    /// Fill `buffer` with the bytes at `offset`.
    fn read(&self, buffer: &mut [u8], offset: u64) -> Result<()>;

    /// Write `buffer` at `offset`, growing the file if needed.
    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<()>;

    /// Truncate or zero-extend the file to `size` bytes.
    fn resize(&mut self, size: u64) -> Result<()>;

    /// Current size in bytes.
    fn size(&self) -> u64;

    /// Make the current content durable.
    fn persist(&mut self) -> Result<()>;

    /// Revert to the last persisted content.
    fn discard(&mut self) -> Result<()>;
}

impl<F: File + ?Sized> File for Box<F> {
    fn read(&self, buffer: &mut [u8], offset: u64) -> Result<()> {
        (**self).read(buffer, offset)
    }

    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<()> {
        (**self).write(buffer, offset)
    }

    fn resize(&mut self, size: u64) -> Result<()> {
        (**self).resize(size)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn persist(&mut self) -> Result<()> {
        (**self).persist()
    }

    fn discard(&mut self) -> Result<()> {
        (**self).discard()
    }
}

/// In-memory file with a persisted backup copy.
///
/// `discard` restores the content present at the last `persist`.
#[derive(Debug, Clone, Default)]
pub struct VirtualFile {
    buffer: Vec<u8>,
    backup: Vec<u8>,
}

impl VirtualFile {
    /// Create a zero-filled file of `size` bytes.
    pub fn new(size: usize) -> Self {
        VirtualFile {
            buffer: vec![0; size],
            backup: vec![0; size],
        }
    }

    /// Current (unpersisted) content
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl File for VirtualFile {
    fn read(&self, buffer: &mut [u8], offset: u64) -> Result<()> {
        let start = offset as usize;
        let end = start + buffer.len();
        if end > self.buffer.len() {
            return Err(Error::InvalidOperation(format!(
                "expected to read {} bytes at offset {} from a total of {}",
                buffer.len(),
                offset,
                self.buffer.len()
            )));
        }
        buffer.copy_from_slice(&self.buffer[start..end]);
        Ok(())
    }

    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<()> {
        let start = offset as usize;
        let end = start + buffer.len();
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[start..end].copy_from_slice(buffer);
        Ok(())
    }

    fn resize(&mut self, size: u64) -> Result<()> {
        self.buffer.resize(size as usize, 0);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn persist(&mut self) -> Result<()> {
        self.backup.clone_from(&self.buffer);
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        self.buffer.clone_from(&self.backup);
        Ok(())
    }
}
