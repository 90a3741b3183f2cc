//! Fixed-width field packing for on-disk headers.
//!
//! Every header in the system (log header, delta header, block table entries,
//! tree nodes) is a plain byte array with fields at fixed offsets. These helpers
//! read and write such fields with bounds checks, so a header type is just a
//! buffer plus a handful of accessors.
//!
//! Integers are 1 to 6 bytes wide, which keeps every value within the range
//! that round-trips exactly through a `u64`/`i64`.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order of a packed integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Most significant byte first (all log and record headers)
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

fn check_width(length: usize) -> Result<()> {
    if (1..=6).contains(&length) {
        Ok(())
    } else {
        Err(Error::InvalidOperation(format!(
            "expected integer width between 1 and 6 bytes, got {}",
            length
        )))
    }
}

fn check_range(buffer: &[u8], offset: usize, length: usize) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= buffer.len() => Ok(()),
        _ => Err(Error::InvalidOperation(format!(
            "range {}+{} is outside buffer of {} bytes",
            offset,
            length,
            buffer.len()
        ))),
    }
}

/// Read an unsigned integer of `length` bytes at `offset`.
pub fn unsigned(buffer: &[u8], offset: usize, length: usize, endian: Endian) -> Result<u64> {
    check_width(length)?;
    check_range(buffer, offset, length)?;
    let slice = &buffer[offset..offset + length];
    Ok(match endian {
        Endian::Big => BigEndian::read_uint(slice, length),
        Endian::Little => LittleEndian::read_uint(slice, length),
    })
}

/// Write an unsigned integer of `length` bytes at `offset`.
///
/// Fails when `value` does not fit in `length` bytes.
pub fn set_unsigned(
    buffer: &mut [u8],
    offset: usize,
    length: usize,
    value: u64,
    endian: Endian,
) -> Result<()> {
    check_width(length)?;
    check_range(buffer, offset, length)?;
    if value >> (length * 8) != 0 {
        return Err(Error::InvalidOperation(format!(
            "value {} does not fit in {} bytes",
            value, length
        )));
    }
    let slice = &mut buffer[offset..offset + length];
    match endian {
        Endian::Big => BigEndian::write_uint(slice, value, length),
        Endian::Little => LittleEndian::write_uint(slice, value, length),
    }
    Ok(())
}

/// Read a two's complement integer of `length` bytes at `offset`.
pub fn signed(buffer: &[u8], offset: usize, length: usize, endian: Endian) -> Result<i64> {
    let raw = unsigned(buffer, offset, length, endian)?;
    let bits = (length * 8) as u32;
    // Sign-extend from the top bit of the field.
    let shift = 64 - bits;
    Ok(((raw << shift) as i64) >> shift)
}

/// Write a two's complement integer of `length` bytes at `offset`.
pub fn set_signed(
    buffer: &mut [u8],
    offset: usize,
    length: usize,
    value: i64,
    endian: Endian,
) -> Result<()> {
    check_width(length)?;
    let bias = 1i64 << (length * 8 - 1);
    if value < -bias || value >= bias {
        return Err(Error::InvalidOperation(format!(
            "value {} does not fit in {} signed bytes",
            value, length
        )));
    }
    let mask = (1u64 << (length * 8)) - 1;
    set_unsigned(buffer, offset, length, (value as u64) & mask, endian)
}

/// Read a zero-padded UTF-8 string stored in `length` bytes at `offset`.
pub fn string(buffer: &[u8], offset: usize, length: usize) -> Result<String> {
    check_range(buffer, offset, length)?;
    let slice = &buffer[offset..offset + length];
    let end = slice.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8(slice[..end].to_vec())
        .map_err(|e| Error::Corruption(format!("invalid UTF-8 in string field: {}", e)))
}

/// Write `value` into `length` bytes at `offset`, zero-padding the remainder.
pub fn set_string(buffer: &mut [u8], offset: usize, length: usize, value: &str) -> Result<()> {
    check_range(buffer, offset, length)?;
    let encoded = value.as_bytes();
    if encoded.len() > length {
        return Err(Error::InvalidOperation(format!(
            "string of {} bytes does not fit in {} bytes",
            encoded.len(),
            length
        )));
    }
    buffer[offset..offset + encoded.len()].copy_from_slice(encoded);
    buffer[offset + encoded.len()..offset + length].fill(0);
    Ok(())
}

/// Read bit `bit` (0 = least significant) of the byte at `offset`.
pub fn boolean(buffer: &[u8], offset: usize, bit: u8) -> Result<bool> {
    if bit > 7 {
        return Err(Error::InvalidOperation(format!("bit {} out of range", bit)));
    }
    check_range(buffer, offset, 1)?;
    Ok((buffer[offset] >> bit) & 1 == 1)
}

/// Set bit `bit` of the byte at `offset`.
pub fn set_boolean(buffer: &mut [u8], offset: usize, bit: u8, value: bool) -> Result<()> {
    if bit > 7 {
        return Err(Error::InvalidOperation(format!("bit {} out of range", bit)));
    }
    check_range(buffer, offset, 1)?;
    let byte = buffer[offset] & !(1 << bit);
    buffer[offset] = byte | ((value as u8) << bit);
    Ok(())
}
