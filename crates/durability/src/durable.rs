//! Write-ahead logged file
//!
//! A [`DurableFile`] pairs a data file (`bin`) with a log file. Writes never
//! touch `bin` directly: each written range becomes a delta appended to the
//! log, holding the new bytes (redo) and the bytes `bin` had there (undo).
//! Reads overlay the logged ranges on top of `bin`.
//!
//! ## Commit
//!
//! `persist` first makes the log durable, then replays every redo image into
//! `bin`, trims `bin` to the logged size, makes `bin` durable and clears the
//! log. Until the log is cleared a crash leaves a complete log behind.
//!
//! ## Recovery
//!
//! Opening a non-empty log restores `bin` from the undo images, so a
//! transaction is either fully applied (log cleared) or not at all. A log that
//! cannot be parsed was being written when the process stopped; since `bin`
//! had not been touched yet, it is dropped.

use crate::header::{LogDeltaHeader, LogHeader};
use atlas_core::{Error, Result};
use atlas_storage::File;
use std::collections::BTreeMap;
use std::ops::Bound::Excluded;
use tracing::{debug, info, warn};

/// Position of one logged range inside the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Delta {
    position: u64,
    length: u64,
}

impl Delta {
    fn redo_position(&self) -> u64 {
        self.position + LogDeltaHeader::LENGTH
    }
}

/// Data file guarded by a redo/undo log.
pub struct DurableFile<B: File, L: File> {
    bin: B,
    log: L,
    header: LogHeader,
    deltas: BTreeMap<u64, Delta>,
}

impl<B: File, L: File> DurableFile<B, L> {
    /// Open `bin` guarded by `log`, recovering from an unfinished transaction.
    pub fn open(bin: B, log: L) -> Result<Self> {
        let header = LogHeader::new(bin.size())?;
        let mut file = DurableFile {
            bin,
            log,
            header,
            deltas: BTreeMap::new(),
        };
        if file.log.size() == 0 {
            file.header.write(&mut file.log, 0)?;
            return Ok(file);
        }
        match scan_log(&file.log) {
            Ok((header, deltas)) => {
                if !deltas.is_empty() {
                    info!(
                        deltas = deltas.len(),
                        undo_size = header.undo_size(),
                        "Undoing unfinished transaction"
                    );
                }
                file.header = header;
                file.undo(&deltas)?;
            }
            Err(e) => {
                warn!("Discarding unreadable log: {}", e);
                file.reset_log()?;
            }
        }
        Ok(file)
    }

    /// Number of ranges logged by the current transaction.
    pub fn pending_deltas(&self) -> usize {
        self.deltas.len()
    }

    /// Release the underlying files.
    pub fn into_inner(self) -> (B, L) {
        (self.bin, self.log)
    }

    fn append_delta(&mut self, redo: &[u8], offset: u64) -> Result<()> {
        let length = redo.len() as u64;
        let mut undo = vec![0u8; redo.len()];
        read_existing(&self.bin, &mut undo, offset)?;
        let position = self.log.size();
        write_delta(&mut self.log, position, offset, redo, &undo)?;
        self.deltas.insert(offset, Delta { position, length });
        let end = offset + length;
        if end > self.header.redo_size() {
            self.header.set_redo_size(end)?;
        }
        Ok(())
    }

    fn read_redo(&self, delta: &Delta, buffer: &mut [u8], skip: u64) -> Result<()> {
        self.log.read(buffer, delta.redo_position() + skip)
    }

    fn redo(&mut self) -> Result<()> {
        let redo_size = self.header.redo_size();
        let deltas: Vec<(u64, Delta)> = self
            .deltas
            .range(..redo_size)
            .map(|(offset, delta)| (*offset, *delta))
            .collect();
        debug!(deltas = deltas.len(), redo_size, "Replaying log");
        for (offset, delta) in deltas {
            let mut redo = vec![0u8; delta.length as usize];
            self.read_redo(&delta, &mut redo, 0)?;
            self.bin.write(&redo, offset)?;
        }
        self.bin.resize(redo_size)?;
        self.bin.persist()?;
        self.discard()
    }

    fn undo(&mut self, deltas: &[LogDeltaHeaderAt]) -> Result<()> {
        let undo_size = self.header.undo_size();
        for (delta, position) in deltas {
            if delta.offset() >= undo_size {
                continue;
            }
            let mut undo = vec![0u8; delta.length() as usize];
            self.log
                .read(&mut undo, position + LogDeltaHeader::LENGTH + delta.length())?;
            self.bin.write(&undo, delta.offset())?;
        }
        self.bin.resize(undo_size)?;
        self.bin.persist()?;
        self.reset_log()
    }

    fn reset_log(&mut self) -> Result<()> {
        let size = self.bin.size();
        self.header = LogHeader::new(size)?;
        self.log.resize(0)?;
        self.header.write(&mut self.log, 0)?;
        self.log.persist()?;
        self.deltas.clear();
        Ok(())
    }
}

/// A delta header with its position in the log.
pub(crate) type LogDeltaHeaderAt = (LogDeltaHeader, u64);

/// Parse the log header and every delta header that follows it.
pub(crate) fn scan_log(log: &dyn File) -> Result<(LogHeader, Vec<LogDeltaHeaderAt>)> {
    let size = log.size();
    if size < LogHeader::LENGTH {
        return Err(Error::Corruption(format!(
            "log of {} bytes is shorter than its header",
            size
        )));
    }
    let header = LogHeader::read(log, 0)?;
    let mut deltas = Vec::new();
    let mut position = LogHeader::LENGTH;
    while position < size {
        if size - position < LogDeltaHeader::LENGTH {
            return Err(Error::Corruption(format!(
                "truncated delta header at log offset {}",
                position
            )));
        }
        let delta = LogDeltaHeader::read(log, position)?;
        if size - position < delta.span() {
            return Err(Error::Corruption(format!(
                "truncated delta of {} bytes at log offset {}",
                delta.length(),
                position
            )));
        }
        deltas.push((delta, position));
        position += delta.span();
    }
    Ok((header, deltas))
}

/// Append-style write of one delta at `position` of the log.
pub(crate) fn write_delta(
    log: &mut dyn File,
    position: u64,
    offset: u64,
    redo: &[u8],
    undo: &[u8],
) -> Result<()> {
    let header = LogDeltaHeader::new(offset, redo.len() as u64)?;
    let mut buffer = Vec::with_capacity(header.span() as usize);
    buffer.extend_from_slice(header.as_bytes());
    buffer.extend_from_slice(redo);
    buffer.extend_from_slice(undo);
    log.write(&buffer, position)
}

/// Fill `buffer` from `file` at `offset`, zeroing what lies past its end.
pub(crate) fn read_existing(file: &dyn File, buffer: &mut [u8], offset: u64) -> Result<()> {
    buffer.fill(0);
    let available = file.size().saturating_sub(offset).min(buffer.len() as u64) as usize;
    if available > 0 {
        file.read(&mut buffer[..available], offset)?;
    }
    Ok(())
}

impl<B: File, L: File> File for DurableFile<B, L> {
    fn read(&self, buffer: &mut [u8], offset: u64) -> Result<()> {
        let end = offset + buffer.len() as u64;
        if end > self.size() {
            return Err(Error::InvalidOperation(format!(
                "read of {} bytes at offset {} exceeds file size {}",
                buffer.len(),
                offset,
                self.size()
            )));
        }
        if buffer.is_empty() {
            return Ok(());
        }
        let mut current = offset;
        if let Some((start, delta)) = self.deltas.range(..=offset).next_back() {
            let skip = offset - start;
            if skip < delta.length {
                let overlap = (delta.length - skip).min(buffer.len() as u64);
                self.read_redo(delta, &mut buffer[..overlap as usize], skip)?;
                current += overlap;
            }
        }
        for (start, delta) in self.deltas.range((Excluded(offset), Excluded(end))) {
            if current >= end {
                break;
            }
            let at = (current - offset) as usize;
            if *start > current {
                let gap = (*start - current) as usize;
                read_existing(&self.bin, &mut buffer[at..at + gap], current)?;
                current = *start;
            }
            let at = (current - offset) as usize;
            let overlap = delta.length.min(end - current) as usize;
            self.read_redo(delta, &mut buffer[at..at + overlap], 0)?;
            current += overlap as u64;
        }
        if current < end {
            let at = (current - offset) as usize;
            read_existing(&self.bin, &mut buffer[at..], current)?;
        }
        Ok(())
    }

    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<()> {
        if offset > self.size() {
            self.resize(offset)?;
        }
        if buffer.is_empty() {
            return Ok(());
        }
        let end = offset + buffer.len() as u64;
        let mut current = offset;
        if let Some((start, delta)) = self.deltas.range(..=offset).next_back() {
            let skip = offset - start;
            if skip < delta.length {
                let overlap = (delta.length - skip).min(buffer.len() as u64);
                self.log
                    .write(&buffer[..overlap as usize], delta.redo_position() + skip)?;
                current += overlap;
            }
        }
        let following: Vec<(u64, Delta)> = self
            .deltas
            .range((Excluded(offset), Excluded(end)))
            .map(|(start, delta)| (*start, *delta))
            .collect();
        for (start, delta) in following {
            if current >= end {
                break;
            }
            if start > current {
                let at = (current - offset) as usize;
                let gap = (start - current) as usize;
                self.append_delta(&buffer[at..at + gap], current)?;
                current = start;
            }
            let at = (current - offset) as usize;
            let overlap = delta.length.min(end - current) as usize;
            self.log
                .write(&buffer[at..at + overlap], delta.redo_position())?;
            current += overlap as u64;
        }
        if current < end {
            let at = (current - offset) as usize;
            self.append_delta(&buffer[at..], current)?;
        }
        Ok(())
    }

    fn resize(&mut self, size: u64) -> Result<()> {
        let current = self.size();
        if size > current {
            let zeros = vec![0u8; (size - current) as usize];
            self.append_delta(&zeros, current)?;
        } else if size < current {
            if let Some((start, delta)) = self.deltas.range(..size).next_back() {
                let (start, delta) = (*start, *delta);
                if start + delta.length > size {
                    let mut kept = vec![0u8; (size - start) as usize];
                    self.read_redo(&delta, &mut kept, 0)?;
                    self.deltas.remove(&start);
                    self.append_delta(&kept, start)?;
                }
            }
            self.deltas.retain(|start, _| *start < size);
            // The tail of bin is only recorded for undo; replay never writes it.
            let bin_size = self.bin.size();
            if size < bin_size {
                let mut undo = vec![0u8; (bin_size - size) as usize];
                self.bin.read(&mut undo, size)?;
                let zeros = vec![0u8; undo.len()];
                let position = self.log.size();
                write_delta(&mut self.log, position, size, &zeros, &undo)?;
            }
        }
        self.header.set_redo_size(size)
    }

    fn size(&self) -> u64 {
        self.header.redo_size()
    }

    fn persist(&mut self) -> Result<()> {
        if self.log.size() > LogHeader::LENGTH || self.bin.size() != self.header.redo_size() {
            self.header.write(&mut self.log, 0)?;
            self.log.persist()?;
            self.redo()?;
        }
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        if self.log.size() > LogHeader::LENGTH {
            self.reset_log()
        } else {
            self.header = LogHeader::new(self.bin.size())?;
            self.deltas.clear();
            Ok(())
        }
    }
}

impl<B: File, L: File> std::fmt::Debug for DurableFile<B, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableFile")
            .field("bin_size", &self.bin.size())
            .field("log_size", &self.log.size())
            .field("redo_size", &self.header.redo_size())
            .field("undo_size", &self.header.undo_size())
            .field("deltas", &self.deltas.len())
            .finish()
    }
}
