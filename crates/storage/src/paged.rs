//! Page cache over another file.
//!
//! Reads are served from whole cached pages. Writes go straight through to
//! the wrapped file and update pages that are already cached. The cache holds
//! at most `max_pages` pages and evicts the least recently used one.

use crate::file::File;
use atlas_core::Result;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Default number of cached pages.
pub const DEFAULT_MAX_PAGES: usize = 1024;

#[derive(Debug, Default)]
struct PageCache {
    pages: FxHashMap<u64, (Vec<u8>, u64)>,
    clock: u64,
    max_pages: usize,
}

impl PageCache {
    fn lookup(&mut self, index: u64) -> Option<&mut Vec<u8>> {
        self.clock += 1;
        let clock = self.clock;
        self.pages.get_mut(&index).map(|(page, used)| {
            *used = clock;
            page
        })
    }

    fn insert(&mut self, index: u64, page: Vec<u8>) {
        self.clock += 1;
        self.pages.insert(index, (page, self.clock));
        if self.pages.len() > self.max_pages {
            let oldest = self
                .pages
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(index, _)| *index);
            if let Some(oldest) = oldest {
                self.pages.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, index: u64) {
        self.pages.remove(&index);
    }

    fn clear(&mut self) {
        self.pages.clear();
    }
}

/// Read cache of fixed power-of-two pages.
pub struct PagedFile<F: File> {
    file: F,
    page_size_log2: u32,
    cache: Mutex<PageCache>,
}

impl<F: File> PagedFile<F> {
    /// Wrap `file` with pages of `2^page_size_log2` bytes.
    pub fn new(file: F, page_size_log2: u32, max_pages: usize) -> Self {
        PagedFile {
            file,
            page_size_log2,
            cache: Mutex::new(PageCache {
                max_pages: max_pages.max(1),
                ..PageCache::default()
            }),
        }
    }

    fn page_size(&self) -> u64 {
        1 << self.page_size_log2
    }

    /// Number of pages currently cached
    pub fn cached_pages(&self) -> usize {
        self.cache.lock().pages.len()
    }

    /// Visit every page touched by `length` bytes at `offset` as
    /// `(page index, offset in page, length in page, offset in buffer)`.
    fn for_each_page(
        &self,
        offset: u64,
        length: usize,
        mut visit: impl FnMut(u64, usize, usize, usize) -> Result<()>,
    ) -> Result<()> {
        if length == 0 {
            return Ok(());
        }
        let mask = self.page_size() - 1;
        let first_byte = offset;
        let last_byte = offset + length as u64 - 1;
        let first_index = first_byte >> self.page_size_log2;
        let last_index = last_byte >> self.page_size_log2;
        let mut bytes = 0;
        for index in first_index..=last_index {
            let page_offset = if index == first_index { first_byte & mask } else { 0 };
            let page_end = if index == last_index {
                (last_byte & mask) + 1
            } else {
                self.page_size()
            };
            let page_length = (page_end - page_offset) as usize;
            visit(index, page_offset as usize, page_length, bytes)?;
            bytes += page_length;
        }
        Ok(())
    }

    fn load_page(&self, index: u64) -> Result<Vec<u8>> {
        let start = index << self.page_size_log2;
        let length = self.file.size().saturating_sub(start).min(self.page_size());
        let mut page = vec![0u8; length as usize];
        self.file.read(&mut page, start)?;
        Ok(page)
    }
}

impl<F: File> File for PagedFile<F> {
    fn read(&self, buffer: &mut [u8], offset: u64) -> Result<()> {
        if offset + buffer.len() as u64 > self.size() {
            // Let the wrapped file report the out-of-bounds read.
            return self.file.read(buffer, offset);
        }
        let mut cache = self.cache.lock();
        self.for_each_page(offset, buffer.len(), |index, page_offset, length, bytes| {
            if cache.lookup(index).is_none() {
                let page = self.load_page(index)?;
                cache.insert(index, page);
            }
            if let Some(page) = cache.lookup(index) {
                buffer[bytes..bytes + length]
                    .copy_from_slice(&page[page_offset..page_offset + length]);
            }
            Ok(())
        })
    }

    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        self.file.write(buffer, offset)?;
        let page_size = self.page_size();
        let size = self.file.size();
        let mut cache = self.cache.lock();
        self.for_each_page(offset, buffer.len(), |index, page_offset, length, bytes| {
            let expected = size.saturating_sub(index << self.page_size_log2).min(page_size);
            let stale = match cache.lookup(index) {
                None => return Ok(()),
                Some(page) if page.len() as u64 == expected => {
                    page[page_offset..page_offset + length]
                        .copy_from_slice(&buffer[bytes..bytes + length]);
                    false
                }
                Some(_) => true,
            };
            if stale {
                // The page grew, reload it from the wrapped file.
                let page = self.load_page(index)?;
                cache.insert(index, page);
            }
            Ok(())
        })
    }

    fn resize(&mut self, size: u64) -> Result<()> {
        let current = self.file.size();
        if size == current {
            return Ok(());
        }
        self.file.resize(size)?;
        let mut cache = self.cache.lock();
        if size == 0 {
            cache.clear();
            return Ok(());
        }
        let first = size.min(current) >> self.page_size_log2;
        let last = (size.max(current) - 1) >> self.page_size_log2;
        for index in first..=last {
            cache.remove(index);
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.file.size()
    }

    fn persist(&mut self) -> Result<()> {
        self.file.persist()
    }

    fn discard(&mut self) -> Result<()> {
        self.cache.get_mut().clear();
        self.file.discard()
    }
}
