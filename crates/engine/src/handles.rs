//! Store and link handles
//!
//! Handles bind a manager to the block manager of its engine for the length
//! of a transaction. Readable handles borrow both immutably and may coexist;
//! a writable handle borrows both mutably.

use crate::link::LinkManager;
use crate::store::StoreManager;
use atlas_core::{Filters, Orders, Record, Result};
use atlas_search::SearchResult;
use atlas_storage::BlockManager;

// =============================================================================
// Stores
// =============================================================================

/// Read access to one store.
#[derive(Debug, Clone, Copy)]
pub struct ReadableStore<'a> {
    store: &'a StoreManager,
    blocks: &'a BlockManager,
}

impl<'a> ReadableStore<'a> {
    pub(crate) fn new(store: &'a StoreManager, blocks: &'a BlockManager) -> Self {
        ReadableStore { store, blocks }
    }

    /// Records matching `filters`, see [`StoreManager::filter`].
    pub fn filter(
        &self,
        filters: &Filters,
        orders: Option<&Orders>,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        self.store.filter(self.blocks, filters, orders, anchor, limit)
    }

    /// Number of records stored.
    pub fn length(&self) -> Result<u64> {
        self.store.length(self.blocks)
    }

    /// The record with the primary keys of `keys_record`.
    pub fn lookup(&self, keys_record: &Record) -> Result<Record> {
        self.store.lookup(self.blocks, keys_record)
    }

    /// Records matching `query`, best match first.
    pub fn search(
        &self,
        query: &str,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        self.store.search(self.blocks, query, anchor, limit)
    }
}

/// Read and write access to one store.
#[derive(Debug)]
pub struct WritableStore<'a> {
    store: &'a mut StoreManager,
    blocks: &'a mut BlockManager,
}

impl<'a> WritableStore<'a> {
    pub(crate) fn new(store: &'a mut StoreManager, blocks: &'a mut BlockManager) -> Self {
        WritableStore { store, blocks }
    }

    /// Reborrow as a readable handle.
    pub fn readable(&self) -> ReadableStore<'_> {
        ReadableStore::new(self.store, self.blocks)
    }

    /// Records matching `filters`, see [`StoreManager::filter`].
    pub fn filter(
        &self,
        filters: &Filters,
        orders: Option<&Orders>,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        self.readable().filter(filters, orders, anchor, limit)
    }

    /// Number of records stored.
    pub fn length(&self) -> Result<u64> {
        self.readable().length()
    }

    /// The record with the primary keys of `keys_record`.
    pub fn lookup(&self, keys_record: &Record) -> Result<Record> {
        self.readable().lookup(keys_record)
    }

    /// Records matching `query`, best match first.
    pub fn search(
        &self,
        query: &str,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        self.readable().search(query, anchor, limit)
    }

    /// Insert or replace `record`. Returns `false` when nothing changed.
    pub fn insert(&mut self, record: &Record) -> Result<bool> {
        self.store.insert(self.blocks, record)
    }

    /// Remove the record with the primary keys of `keys_record`, if any.
    pub fn remove(&mut self, keys_record: &Record) -> Result<()> {
        self.store.remove(self.blocks, keys_record)
    }

    /// Merge `record` into the stored record with the same primary keys.
    pub fn update(&mut self, record: &Record) -> Result<bool> {
        self.store.update(self.blocks, record)
    }

    /// Remove every record.
    pub fn vacate(&mut self) -> Result<()> {
        self.store.vacate(self.blocks)
    }
}

// =============================================================================
// Links
// =============================================================================

/// Read access to one link.
#[derive(Debug, Clone, Copy)]
pub struct ReadableLink<'a> {
    link: &'a LinkManager,
    parent: &'a StoreManager,
    child: &'a StoreManager,
    blocks: &'a BlockManager,
}

impl<'a> ReadableLink<'a> {
    pub(crate) fn new(
        link: &'a LinkManager,
        parent: &'a StoreManager,
        child: &'a StoreManager,
        blocks: &'a BlockManager,
    ) -> Self {
        ReadableLink {
            link,
            parent,
            child,
            blocks,
        }
    }

    /// Children of the parent with the keys of `parent_keys`, or the
    /// children without parent.
    pub fn filter(
        &self,
        parent_keys: Option<&Record>,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        self.link
            .filter(self.child, self.blocks, parent_keys, anchor, limit)
    }

    /// Parent of `child_record`, or `None` when it has none.
    pub fn lookup(&self, child_record: &Record) -> Result<Option<Record>> {
        self.link.lookup(self.parent, self.blocks, child_record)
    }
}
