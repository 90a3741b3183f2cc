//! Block manager
//!
//! Carves one file into variable-length blocks addressed by stable ids.
//!
//! ## File Layout
//!
//! ```text
//! +----------------------+  0
//! | header               |  identifier, table location, id counters,
//! |                      |  one free-chunk list head per size category
//! +----------------------+  HEADER_LENGTH
//! | chunks ...           |  power-of-two regions holding block payloads,
//! |                      |  the block table, or free-list links
//! +----------------------+
//! ```
//!
//! The block table is itself stored in a chunk. Entry `id` (16 bytes) holds
//! the payload offset, the logical length, the size category of the chunk
//! and a live flag. Deleted ids are chained through the offset field of their
//! entry and reused before new ids are handed out. Id 0 is never allocated.
//!
//! Every piece of metadata lives in the file, so a `discard` of the
//! underlying durable file rolls back allocations together with content.

use crate::file::File;
use atlas_core::binary::{self, Endian};
use atlas_core::{Error, Result};
use tracing::debug;

/// Identifier of a block. `0` is the null id.
pub type BlockId = u64;

const IDENTIFIER: &str = "atlasblk";
const CATEGORY_COUNT: usize = 48;
const MIN_CATEGORY: u32 = 4;
const HEADER_LENGTH: usize = 40 + CATEGORY_COUNT * 8;
const ENTRY_LENGTH: u64 = 16;
const INITIAL_TABLE_CAPACITY: u64 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockHeader {
    table_offset: u64,
    table_capacity: u64,
    next_id: u64,
    free_id_head: u64,
    free_chunks: [u64; CATEGORY_COUNT],
}

impl BlockHeader {
    fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; HEADER_LENGTH];
        binary::set_string(&mut buffer, 0, 8, IDENTIFIER)?;
        binary::set_unsigned(&mut buffer, 10, 6, self.table_offset, Endian::Big)?;
        binary::set_unsigned(&mut buffer, 18, 6, self.table_capacity, Endian::Big)?;
        binary::set_unsigned(&mut buffer, 26, 6, self.next_id, Endian::Big)?;
        binary::set_unsigned(&mut buffer, 34, 6, self.free_id_head, Endian::Big)?;
        for (index, head) in self.free_chunks.iter().enumerate() {
            binary::set_unsigned(&mut buffer, 40 + index * 8 + 2, 6, *head, Endian::Big)?;
        }
        Ok(buffer)
    }

    fn decode(buffer: &[u8]) -> Result<Self> {
        if binary::string(buffer, 0, 8).ok().as_deref() != Some(IDENTIFIER) {
            return Err(Error::Corruption(
                "expected block manager identifier".to_string(),
            ));
        }
        let mut free_chunks = [0u64; CATEGORY_COUNT];
        for (index, head) in free_chunks.iter_mut().enumerate() {
            *head = binary::unsigned(buffer, 40 + index * 8 + 2, 6, Endian::Big)?;
        }
        Ok(BlockHeader {
            table_offset: binary::unsigned(buffer, 10, 6, Endian::Big)?,
            table_capacity: binary::unsigned(buffer, 18, 6, Endian::Big)?,
            next_id: binary::unsigned(buffer, 26, 6, Endian::Big)?,
            free_id_head: binary::unsigned(buffer, 34, 6, Endian::Big)?,
            free_chunks,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    live: bool,
    category: u32,
    offset: u64,
    length: u64,
}

impl Entry {
    fn encode(&self) -> Result<[u8; ENTRY_LENGTH as usize]> {
        let mut buffer = [0u8; ENTRY_LENGTH as usize];
        binary::set_boolean(&mut buffer, 0, 0, self.live)?;
        buffer[1] = self.category as u8;
        binary::set_unsigned(&mut buffer, 2, 6, self.offset, Endian::Big)?;
        binary::set_unsigned(&mut buffer, 10, 6, self.length, Endian::Big)?;
        Ok(buffer)
    }

    fn decode(buffer: &[u8]) -> Result<Self> {
        Ok(Entry {
            live: binary::boolean(buffer, 0, 0)?,
            category: u32::from(buffer[1]),
            offset: binary::unsigned(buffer, 2, 6, Endian::Big)?,
            length: binary::unsigned(buffer, 10, 6, Endian::Big)?,
        })
    }
}

/// Smallest category whose chunk holds `length` bytes.
fn category_for(length: u64) -> u32 {
    let bits = 64 - length.saturating_sub(1).leading_zeros();
    bits.max(MIN_CATEGORY)
}

/// Allocates variable-length blocks inside a file.
pub struct BlockManager {
    file: Box<dyn File>,
    header: BlockHeader,
}

impl BlockManager {
    /// Open the block manager stored in `file`, initializing an empty file.
    pub fn open(file: Box<dyn File>) -> Result<Self> {
        if file.size() == 0 {
            return Self::initialize(file);
        }
        let mut buffer = vec![0u8; HEADER_LENGTH];
        file.read(&mut buffer, 0)
            .map_err(|_| Error::Corruption("truncated block manager header".to_string()))?;
        let header = BlockHeader::decode(&buffer)?;
        Ok(BlockManager { file, header })
    }

    fn initialize(file: Box<dyn File>) -> Result<Self> {
        let table_category = category_for(INITIAL_TABLE_CAPACITY * ENTRY_LENGTH);
        let mut manager = BlockManager {
            file,
            header: BlockHeader {
                table_offset: 0,
                table_capacity: INITIAL_TABLE_CAPACITY,
                next_id: 1,
                free_id_head: 0,
                free_chunks: [0; CATEGORY_COUNT],
            },
        };
        manager.file.resize(HEADER_LENGTH as u64)?;
        manager.header.table_offset = manager.allocate_chunk(table_category)?;
        manager.write_header()?;
        Ok(manager)
    }

    fn write_header(&mut self) -> Result<()> {
        let buffer = self.header.encode()?;
        self.file.write(&buffer, 0)
    }

    // =========================================================================
    // Chunks
    // =========================================================================

    fn allocate_chunk(&mut self, category: u32) -> Result<u64> {
        if category as usize >= CATEGORY_COUNT {
            return Err(Error::InvalidOperation(format!(
                "chunk category {} exceeds the maximum block size",
                category
            )));
        }
        let head = self.header.free_chunks[category as usize];
        if head != 0 {
            let mut link = [0u8; 8];
            self.file.read(&mut link, head)?;
            self.header.free_chunks[category as usize] =
                binary::unsigned(&link, 2, 6, Endian::Big)?;
            return Ok(head);
        }
        let offset = self.file.size();
        self.file.resize(offset + (1u64 << category))?;
        Ok(offset)
    }

    fn free_chunk(&mut self, offset: u64, category: u32) -> Result<()> {
        let mut link = [0u8; 8];
        let head = self.header.free_chunks[category as usize];
        binary::set_unsigned(&mut link, 2, 6, head, Endian::Big)?;
        self.file.write(&link, offset)?;
        self.header.free_chunks[category as usize] = offset;
        Ok(())
    }

    // =========================================================================
    // Table
    // =========================================================================

    fn read_entry(&self, id: BlockId) -> Result<Entry> {
        if id == 0 || id >= self.header.next_id {
            return Err(Error::InvalidOperation(format!(
                "block {} was never allocated",
                id
            )));
        }
        let mut buffer = [0u8; ENTRY_LENGTH as usize];
        self.file
            .read(&mut buffer, self.header.table_offset + id * ENTRY_LENGTH)?;
        Entry::decode(&buffer)
    }

    fn read_live_entry(&self, id: BlockId) -> Result<Entry> {
        let entry = self.read_entry(id)?;
        if !entry.live {
            return Err(Error::InvalidOperation(format!(
                "block {} has been deleted",
                id
            )));
        }
        Ok(entry)
    }

    fn write_entry(&mut self, id: BlockId, entry: &Entry) -> Result<()> {
        let buffer = entry.encode()?;
        self.file
            .write(&buffer, self.header.table_offset + id * ENTRY_LENGTH)
    }

    fn grow_table(&mut self) -> Result<()> {
        let old_capacity = self.header.table_capacity;
        let old_offset = self.header.table_offset;
        let new_capacity = old_capacity * 2;
        let mut table = vec![0u8; (old_capacity * ENTRY_LENGTH) as usize];
        self.file.read(&mut table, old_offset)?;
        let new_offset = self.allocate_chunk(category_for(new_capacity * ENTRY_LENGTH))?;
        table.resize((new_capacity * ENTRY_LENGTH) as usize, 0);
        self.file.write(&table, new_offset)?;
        self.free_chunk(old_offset, category_for(old_capacity * ENTRY_LENGTH))?;
        self.header.table_offset = new_offset;
        self.header.table_capacity = new_capacity;
        debug!(capacity = new_capacity, "Grew block table");
        Ok(())
    }

    fn allocate_id(&mut self) -> Result<BlockId> {
        let head = self.header.free_id_head;
        if head != 0 {
            let entry = self.read_entry(head)?;
            self.header.free_id_head = entry.offset;
            return Ok(head);
        }
        if self.header.next_id >= self.header.table_capacity {
            self.grow_table()?;
        }
        let id = self.header.next_id;
        self.header.next_id += 1;
        Ok(id)
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Allocate a zero-filled block of exactly `min_length` bytes.
    pub fn create_block(&mut self, min_length: u64) -> Result<BlockId> {
        let category = category_for(min_length);
        let offset = self.allocate_chunk(category)?;
        let id = self.allocate_id()?;
        self.file.write(&vec![0u8; min_length as usize], offset)?;
        self.write_entry(
            id,
            &Entry {
                live: true,
                category,
                offset,
                length: min_length,
            },
        )?;
        self.write_header()?;
        Ok(id)
    }

    /// Read the whole payload of block `id`.
    pub fn read_block(&self, id: BlockId) -> Result<Vec<u8>> {
        let entry = self.read_live_entry(id)?;
        let mut buffer = vec![0u8; entry.length as usize];
        self.file.read(&mut buffer, entry.offset)?;
        Ok(buffer)
    }

    /// Overwrite the payload of block `id`; `buffer` must match its length.
    pub fn write_block(&mut self, id: BlockId, buffer: &[u8]) -> Result<()> {
        let entry = self.read_live_entry(id)?;
        if buffer.len() as u64 != entry.length {
            return Err(Error::InvalidOperation(format!(
                "expected {} bytes for block {}, got {}",
                entry.length,
                id,
                buffer.len()
            )));
        }
        self.file.write(buffer, entry.offset)
    }

    /// Change the length of block `id`, keeping its id and leading content.
    ///
    /// Bytes added at the end are zero. The payload moves to a new chunk
    /// only when the current chunk is too small.
    pub fn resize_block(&mut self, id: BlockId, new_length: u64) -> Result<()> {
        let mut entry = self.read_live_entry(id)?;
        if new_length == entry.length {
            return Ok(());
        }
        if new_length <= 1u64 << entry.category {
            if new_length > entry.length {
                let zeros = vec![0u8; (new_length - entry.length) as usize];
                self.file.write(&zeros, entry.offset + entry.length)?;
            }
            entry.length = new_length;
            return self.write_entry(id, &entry);
        }
        let mut payload = vec![0u8; entry.length as usize];
        self.file.read(&mut payload, entry.offset)?;
        payload.resize(new_length as usize, 0);
        let category = category_for(new_length);
        let offset = self.allocate_chunk(category)?;
        self.file.write(&payload, offset)?;
        self.free_chunk(entry.offset, entry.category)?;
        self.write_entry(
            id,
            &Entry {
                live: true,
                category,
                offset,
                length: new_length,
            },
        )?;
        self.write_header()
    }

    /// Release block `id`. The id may be handed out again later.
    pub fn delete_block(&mut self, id: BlockId) -> Result<()> {
        let entry = self.read_live_entry(id)?;
        self.free_chunk(entry.offset, entry.category)?;
        self.write_entry(
            id,
            &Entry {
                live: false,
                category: 0,
                offset: self.header.free_id_head,
                length: 0,
            },
        )?;
        self.header.free_id_head = id;
        self.write_header()
    }

    /// Current length of block `id`.
    pub fn block_length(&self, id: BlockId) -> Result<u64> {
        Ok(self.read_live_entry(id)?.length)
    }

    /// Check whether `id` refers to a live block.
    pub fn is_live(&self, id: BlockId) -> bool {
        self.read_entry(id).map_or(false, |entry| entry.live)
    }

    /// Number of ids handed out so far (live or deleted).
    pub fn allocated_ids(&self) -> u64 {
        self.header.next_id - 1
    }

    /// Size of the underlying file.
    pub fn file_size(&self) -> u64 {
        self.file.size()
    }

    /// Make every change since the last persist durable.
    pub fn persist(&mut self) -> Result<()> {
        self.file.persist()
    }

    /// Roll back every change since the last persist.
    pub fn discard(&mut self) -> Result<()> {
        self.file.discard()?;
        let mut buffer = vec![0u8; HEADER_LENGTH];
        self.file.read(&mut buffer, 0)?;
        self.header = BlockHeader::decode(&buffer)?;
        Ok(())
    }
}

impl std::fmt::Debug for BlockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockManager")
            .field("header", &self.header)
            .field("file_size", &self.file.size())
            .finish()
    }
}
