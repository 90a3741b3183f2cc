//! Page-granular write-ahead logged file
//!
//! Same log format and commit protocol as [`DurableFile`](crate::DurableFile),
//! but every delta covers exactly one aligned page. The first write to a page
//! logs the whole page; later writes to it patch the logged redo image in
//! place, so the log holds at most one delta per page and the index is a plain
//! hash map.

use crate::durable::{read_existing, scan_log, write_delta, LogDeltaHeaderAt};
use crate::header::{LogDeltaHeader, LogHeader};
use atlas_core::{Error, Result};
use atlas_storage::File;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

/// Largest supported page size (1 GiB).
pub const MAX_PAGE_SIZE_LOG2: u32 = 30;

/// Data file guarded by a page-granular redo/undo log.
pub struct PagedDurableFile<B: File, L: File> {
    bin: B,
    log: L,
    header: LogHeader,
    page_size_log2: u32,
    /// Page offset in `bin` to delta position in `log`.
    pages: FxHashMap<u64, u64>,
}

impl<B: File, L: File> PagedDurableFile<B, L> {
    /// Open `bin` guarded by `log` with pages of `2^page_size_log2` bytes.
    pub fn open(bin: B, log: L, page_size_log2: u32) -> Result<Self> {
        if page_size_log2 > MAX_PAGE_SIZE_LOG2 {
            return Err(Error::InvalidOperation(format!(
                "page size 2^{} exceeds the maximum of 2^{}",
                page_size_log2, MAX_PAGE_SIZE_LOG2
            )));
        }
        let header = LogHeader::new(bin.size())?;
        let mut file = PagedDurableFile {
            bin,
            log,
            header,
            page_size_log2,
            pages: FxHashMap::default(),
        };
        if file.log.size() == 0 {
            file.header.write(&mut file.log, 0)?;
            return Ok(file);
        }
        match scan_log(&file.log) {
            Ok((header, deltas)) => {
                if !deltas.is_empty() {
                    info!(
                        pages = deltas.len(),
                        undo_size = header.undo_size(),
                        "Undoing unfinished paged transaction"
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

    /// Page size in bytes
    pub fn page_size(&self) -> u64 {
        1 << self.page_size_log2
    }

    /// Number of pages logged by the current transaction.
    pub fn pending_pages(&self) -> usize {
        self.pages.len()
    }

    /// Release the underlying files.
    pub fn into_inner(self) -> (B, L) {
        (self.bin, self.log)
    }

    /// Visit the pages touched by `[first, end)` as
    /// `(page offset, offset within page, length, offset within range)`.
    fn for_each_page(
        &mut self,
        first: u64,
        end: u64,
        mut visit: impl FnMut(&mut Self, u64, u64, u64, u64) -> Result<()>,
    ) -> Result<()> {
        if end <= first {
            return Ok(());
        }
        let mask = self.page_size() - 1;
        let mut current = first;
        while current < end {
            let page = current & !mask;
            let within = current - page;
            let length = (self.page_size() - within).min(end - current);
            visit(self, page, within, length, current - first)?;
            current += length;
        }
        Ok(())
    }

    /// Log a fresh copy of `page`, taking `bin`'s content for both images.
    fn append_page(&mut self, page: u64) -> Result<u64> {
        let mut undo = vec![0u8; self.page_size() as usize];
        read_existing(&self.bin, &mut undo, page)?;
        // Bytes of bin past the logical end are stale after a shrink.
        let mut redo = undo.clone();
        let live = self.size().saturating_sub(page).min(redo.len() as u64) as usize;
        redo[live..].fill(0);
        let position = self.log.size();
        write_delta(&mut self.log, position, page, &redo, &undo)?;
        self.pages.insert(page, position);
        Ok(position)
    }

    fn page_position(&mut self, page: u64) -> Result<u64> {
        match self.pages.get(&page) {
            Some(position) => Ok(*position),
            None => self.append_page(page),
        }
    }

    fn redo(&mut self) -> Result<()> {
        let redo_size = self.header.redo_size();
        let mut pages: Vec<(u64, u64)> = self
            .pages
            .iter()
            .filter(|(page, _)| **page < redo_size)
            .map(|(page, position)| (*page, *position))
            .collect();
        pages.sort_unstable();
        debug!(pages = pages.len(), redo_size, "Replaying paged log");
        let mut redo = vec![0u8; self.page_size() as usize];
        for (page, position) in pages {
            self.log.read(&mut redo, position + LogDeltaHeader::LENGTH)?;
            self.bin.write(&redo, page)?;
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
        self.header = LogHeader::new(self.bin.size())?;
        self.log.resize(0)?;
        self.header.write(&mut self.log, 0)?;
        self.log.persist()?;
        self.pages.clear();
        Ok(())
    }
}

impl<B: File, L: File> File for PagedDurableFile<B, L> {
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
        let mask = self.page_size() - 1;
        let mut current = offset;
        while current < end {
            let page = current & !mask;
            let within = current - page;
            let length = (self.page_size() - within).min(end - current);
            let at = (current - offset) as usize;
            let target = &mut buffer[at..at + length as usize];
            match self.pages.get(&page) {
                Some(position) => {
                    self.log
                        .read(target, position + LogDeltaHeader::LENGTH + within)?;
                }
                None => read_existing(&self.bin, target, current)?,
            }
            current += length;
        }
        Ok(())
    }

    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<()> {
        if offset > self.size() {
            self.resize(offset)?;
        }
        let end = offset + buffer.len() as u64;
        self.for_each_page(offset, end, |file, page, within, length, at| {
            let position = file.page_position(page)?;
            let at = at as usize;
            file.log.write(
                &buffer[at..at + length as usize],
                position + LogDeltaHeader::LENGTH + within,
            )
        })?;
        if end > self.header.redo_size() {
            self.header.set_redo_size(end)?;
        }
        Ok(())
    }

    fn resize(&mut self, size: u64) -> Result<()> {
        let current = self.size();
        if size == current {
            return Ok(());
        }
        let (first, end) = (size.min(current), size.max(current));
        // Every page in between is logged with the affected range zeroed, so a
        // shrink can be undone and a later growth reads zeros.
        self.for_each_page(first, end, |file, page, within, length, _| {
            let position = file.page_position(page)?;
            let zeros = vec![0u8; length as usize];
            file.log
                .write(&zeros, position + LogDeltaHeader::LENGTH + within)
        })?;
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
            self.pages.clear();
            Ok(())
        }
    }
}

impl<B: File, L: File> std::fmt::Debug for PagedDurableFile<B, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedDurableFile")
            .field("page_size", &self.page_size())
            .field("bin_size", &self.bin.size())
            .field("redo_size", &self.header.redo_size())
            .field("pages", &self.pages.len())
            .finish()
    }
}
