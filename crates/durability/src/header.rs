//! Log file headers
//!
//! ## Log Header (32 bytes)
//!
//! ```text
//! 0        8                  18          24    26          32
//! +--------+------------------+-----------+-----+-----------+
//! |"atlaslog"|   reserved     | redo u48  | res | undo u48  |
//! +--------+------------------+-----------+-----+-----------+
//! ```
//!
//! ## Delta Header (16 bytes)
//!
//! ```text
//! 0     2            8     10           16
//! +-----+------------+-----+------------+-------------+-------------+
//! | res | offset u48 | res | length u48 | redo[length]| undo[length]|
//! +-----+------------+-----+------------+-------------+-------------+
//! ```
//!
//! All integers are big-endian.

use atlas_core::binary::{self, Endian};
use atlas_core::{Error, Result};
use atlas_storage::File;

/// Header at the start of every log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogHeader {
    buffer: [u8; LogHeader::LENGTH as usize],
}

impl LogHeader {
    /// Magic identifier
    pub const IDENTIFIER: &'static str = "atlaslog";
    /// Encoded length in bytes
    pub const LENGTH: u64 = 32;

    /// Header with both sizes set to `size`.
    pub fn new(size: u64) -> Result<Self> {
        let mut header = LogHeader {
            buffer: [0; Self::LENGTH as usize],
        };
        binary::set_string(&mut header.buffer, 0, 8, Self::IDENTIFIER)?;
        header.set_redo_size(size)?;
        header.set_undo_size(size)?;
        Ok(header)
    }

    /// Parse and validate a header.
    pub fn decode(buffer: &[u8]) -> Result<Self> {
        let buffer: [u8; Self::LENGTH as usize] = buffer.try_into().map_err(|_| {
            Error::Corruption(format!("log header must be {} bytes", Self::LENGTH))
        })?;
        let identifier = binary::string(&buffer, 0, 8)?;
        if identifier != Self::IDENTIFIER {
            return Err(Error::Corruption(format!(
                "expected log identifier {:?}, found {:?}",
                Self::IDENTIFIER,
                identifier
            )));
        }
        Ok(LogHeader { buffer })
    }

    /// Read the header at `offset` of `file`.
    pub fn read(file: &dyn File, offset: u64) -> Result<Self> {
        let mut buffer = [0u8; Self::LENGTH as usize];
        file.read(&mut buffer, offset)?;
        Self::decode(&buffer)
    }

    /// Write the header at `offset` of `file`.
    pub fn write(&self, file: &mut dyn File, offset: u64) -> Result<()> {
        file.write(&self.buffer, offset)
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Size of the data file once the logged transaction is applied.
    pub fn redo_size(&self) -> u64 {
        read_u48(&self.buffer, 18)
    }

    /// Set the redo size.
    pub fn set_redo_size(&mut self, size: u64) -> Result<()> {
        binary::set_unsigned(&mut self.buffer, 18, 6, size, Endian::Big)
    }

    /// Size of the data file before the logged transaction began.
    pub fn undo_size(&self) -> u64 {
        read_u48(&self.buffer, 26)
    }

    /// Set the undo size.
    pub fn set_undo_size(&mut self, size: u64) -> Result<()> {
        binary::set_unsigned(&mut self.buffer, 26, 6, size, Endian::Big)
    }
}

/// Header preceding the redo and undo images of one logged range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogDeltaHeader {
    buffer: [u8; LogDeltaHeader::LENGTH as usize],
}

impl LogDeltaHeader {
    /// Encoded length in bytes
    pub const LENGTH: u64 = 16;

    /// Header for `length` bytes at data file `offset`.
    pub fn new(offset: u64, length: u64) -> Result<Self> {
        let mut buffer = [0u8; Self::LENGTH as usize];
        binary::set_unsigned(&mut buffer, 2, 6, offset, Endian::Big)?;
        binary::set_unsigned(&mut buffer, 10, 6, length, Endian::Big)?;
        Ok(LogDeltaHeader { buffer })
    }

    /// Read the delta header at `offset` of `file`.
    pub fn read(file: &dyn File, offset: u64) -> Result<Self> {
        let mut buffer = [0u8; Self::LENGTH as usize];
        file.read(&mut buffer, offset)?;
        Ok(LogDeltaHeader { buffer })
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Data file offset of the range
    pub fn offset(&self) -> u64 {
        read_u48(&self.buffer, 2)
    }

    /// Length of the range
    pub fn length(&self) -> u64 {
        read_u48(&self.buffer, 10)
    }

    /// Log bytes taken by this delta including both images.
    pub fn span(&self) -> u64 {
        Self::LENGTH + 2 * self.length()
    }
}

fn read_u48(buffer: &[u8], offset: usize) -> u64 {
    u64::from(buffer[offset]) << 40
        | u64::from(buffer[offset + 1]) << 32
        | u64::from(buffer[offset + 2]) << 24
        | u64::from(buffer[offset + 3]) << 16
        | u64::from(buffer[offset + 4]) << 8
        | u64::from(buffer[offset + 5])
}
