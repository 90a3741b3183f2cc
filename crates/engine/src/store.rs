//! Store manager: records, indices and query planning
//!
//! A store keeps each record in its own block. The table, a radix tree keyed
//! by the encoded primary keys, maps every record to its block. Secondary
//! indices and search indices are updated within the same call as the
//! table, so no caller ever observes a partially indexed record.
//!
//! ## Filtering
//!
//! ```text
//! filter(filters, orders, anchor, limit)
//!   |
//!   +-- complete orders with the primary keys (increasing)
//!   +-- resolve the anchor keys to the stored record
//!   +-- start from the table scan
//!   +-- ask every index for a FilteredStore -- None => empty result
//!   +-- take the optimal FilteredStore and materialize it
//! ```
//!
//! Every candidate yields the same records; they differ only in how much
//! filtering and sorting is left to do after reading the blocks.

use crate::filtered::FilteredStore;
use crate::index::IndexManager;
use crate::schema::{Index, SearchIndex};
use atlas_core::{Direction, Error, Fields, Filters, Orders, Record, RecordManager, Result};
use atlas_search::{search_all, SearchIndexManager, SearchResult};
use atlas_storage::{BlockId, BlockManager, RadixTree};
use tracing::{debug, info};

/// Owns the table and indices of one store.
#[derive(Debug, Clone)]
pub struct StoreManager {
    record_manager: RecordManager,
    keys: Vec<String>,
    orders: Orders,
    table: RadixTree,
    indices: Vec<IndexManager>,
    search_indices: Vec<SearchIndexManager>,
}

impl StoreManager {
    /// Create an empty store without indices.
    pub fn create(
        blocks: &mut BlockManager,
        fields: Fields,
        keys: Vec<String>,
        orders: Orders,
    ) -> Result<Self> {
        let table = RadixTree::create(blocks)?;
        Ok(Self::open(fields, keys, orders, table.root(), Vec::new(), Vec::new()))
    }

    /// Open a store from the roots of its trees.
    pub fn open(
        fields: Fields,
        keys: Vec<String>,
        orders: Orders,
        table: BlockId,
        indices: Vec<IndexManager>,
        search_indices: Vec<SearchIndexManager>,
    ) -> Self {
        StoreManager {
            record_manager: RecordManager::new(fields),
            keys,
            orders,
            table: RadixTree::open(table),
            indices,
            search_indices,
        }
    }

    /// Codec of the records of this store
    pub fn record_manager(&self) -> &RecordManager {
        &self.record_manager
    }

    /// Primary keys
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Default orders
    pub fn orders(&self) -> &Orders {
        &self.orders
    }

    /// Root block of the table
    pub fn table_root(&self) -> BlockId {
        self.table.root()
    }

    /// Secondary indices
    pub fn indices(&self) -> &[IndexManager] {
        &self.indices
    }

    /// Search indices
    pub fn search_indices(&self) -> &[SearchIndexManager] {
        &self.search_indices
    }

    fn lookup_bid(&self, blocks: &BlockManager, keys_record: &Record) -> Result<Option<BlockId>> {
        let key = self.record_manager.encode_keys(&self.keys, keys_record)?;
        self.table.lookup(blocks, &key)
    }

    fn read_record(&self, blocks: &BlockManager, bid: BlockId) -> Result<Record> {
        let buffer = blocks.read_block(bid)?;
        self.record_manager.decode(&buffer)
    }

    fn table_bids(&self, blocks: &BlockManager) -> Result<Vec<BlockId>> {
        self.table.iter(blocks)?.collect()
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Insert `record`, replacing the record with the same primary keys.
    ///
    /// Returns `false` when an identical record was already stored, in which
    /// case nothing is written.
    pub fn insert(&mut self, blocks: &mut BlockManager, record: &Record) -> Result<bool> {
        let key = self.record_manager.encode_keys(&self.keys, record)?;
        let encoded = self.record_manager.encode(record)?;
        match self.table.lookup(blocks, &key)? {
            None => {
                let bid = blocks.create_block(encoded.len() as u64)?;
                blocks.write_block(bid, &encoded)?;
                self.table.insert(blocks, &key, bid)?;
                for index in &mut self.indices {
                    index.insert(blocks, record, bid)?;
                }
                for index in &mut self.search_indices {
                    index.insert(blocks, record, bid)?;
                }
            }
            Some(bid) => {
                let buffer = blocks.read_block(bid)?;
                // Encoded records are length prefixed, so a matching prefix is a matching record.
                if buffer.starts_with(&encoded) {
                    return Ok(false);
                }
                let old = self.record_manager.decode(&buffer)?;
                blocks.resize_block(bid, encoded.len() as u64)?;
                blocks.write_block(bid, &encoded)?;
                for index in &mut self.indices {
                    index.update(blocks, &old, record, bid)?;
                }
                for index in &mut self.search_indices {
                    index.update(blocks, &old, record, bid)?;
                }
            }
        }
        Ok(true)
    }

    /// Remove the record with the primary keys of `keys_record`, if any.
    pub fn remove(&mut self, blocks: &mut BlockManager, keys_record: &Record) -> Result<()> {
        let key = self.record_manager.encode_keys(&self.keys, keys_record)?;
        let Some(bid) = self.table.lookup(blocks, &key)? else {
            return Ok(());
        };
        let old = self.read_record(blocks, bid)?;
        self.table.remove(blocks, &key)?;
        blocks.delete_block(bid)?;
        for index in &mut self.indices {
            index.remove(blocks, &old)?;
        }
        for index in &mut self.search_indices {
            index.remove(blocks, &old, bid)?;
        }
        Ok(())
    }

    /// Merge `record` into the stored record with the same primary keys.
    ///
    /// Fields missing from `record` keep their stored value, or their default
    /// value when no record is stored yet.
    pub fn update(&mut self, blocks: &mut BlockManager, record: &Record) -> Result<bool> {
        let mut merged = match self.lookup(blocks, record) {
            Ok(existing) => existing,
            Err(e) if e.is_not_found() => self.record_manager.default_record(),
            Err(e) => return Err(e),
        };
        merged.merge(record);
        self.insert(blocks, &merged)
    }

    /// The record with the primary keys of `keys_record`.
    pub fn lookup(&self, blocks: &BlockManager, keys_record: &Record) -> Result<Record> {
        match self.lookup_bid(blocks, keys_record)? {
            Some(bid) => self.read_record(blocks, bid),
            None => Err(Error::NotFound(format!(
                "no matching record for key {}",
                self.describe_keys(keys_record)
            ))),
        }
    }

    fn describe_keys(&self, keys_record: &Record) -> String {
        self.keys
            .iter()
            .map(|key| match keys_record.get(key) {
                Some(value) => format!("{:?}", value),
                None => "?".to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Number of records stored.
    pub fn length(&self, blocks: &BlockManager) -> Result<u64> {
        self.table.length(blocks)
    }

    /// Records matching `filters` in `orders`, following `anchor`.
    ///
    /// Without `orders` the default orders of the store apply. Ties are
    /// broken by the primary keys, increasing unless ordered otherwise. An
    /// anchor that is not stored yields an empty result.
    pub fn filter(
        &self,
        blocks: &BlockManager,
        filters: &Filters,
        orders: Option<&Orders>,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let mut orders = orders.unwrap_or(&self.orders).clone();
        for key in &self.keys {
            if !orders.contains(key) {
                orders.set(key.clone(), Direction::Increasing);
            }
        }
        let anchor = match anchor {
            Some(keys_record) => match self.lookup_bid(blocks, keys_record)? {
                Some(bid) => Some(self.read_record(blocks, bid)?),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        // The table scan goes first so that declared indices win ties.
        let mut candidates = Vec::with_capacity(self.indices.len() + 1);
        candidates.push(FilteredStore::new(
            &self.record_manager,
            blocks,
            Box::new(self.table.iter(blocks)?),
            filters.clone(),
            orders.clone(),
            anchor.clone(),
        ));
        for index in &self.indices {
            match index.filter(blocks, filters, &orders, anchor.as_ref())? {
                Some(candidate) => candidates.push(candidate),
                None => {
                    debug!(index = ?index.keys(), "Index proves filter empty");
                    return Ok(Vec::new());
                }
            }
        }
        let chosen = FilteredStore::optimal(&candidates).unwrap_or(0);
        let optimal = candidates.swap_remove(chosen);
        let index = chosen.checked_sub(1).and_then(|i| self.indices.get(i));
        debug!(
            index = ?index.map(IndexManager::keys),
            remaining_filters = optimal.filters().len(),
            remaining_orders = optimal.orders().len(),
            "Selected filtered store"
        );
        optimal.materialize(limit)
    }

    /// Records whose searchable fields match `query`, best match first.
    ///
    /// An anchor that is not stored yields an empty result.
    pub fn search(
        &self,
        blocks: &BlockManager,
        query: &str,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let anchor = match anchor {
            Some(keys_record) => match self.lookup_bid(blocks, keys_record)? {
                Some(bid) => Some(bid),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        search_all(&self.search_indices, blocks, query, anchor)?
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Remove every record, keeping the store usable.
    pub fn vacate(&mut self, blocks: &mut BlockManager) -> Result<()> {
        for bid in self.table_bids(blocks)? {
            blocks.delete_block(bid)?;
        }
        for index in &mut self.indices {
            index.vacate(blocks)?;
        }
        for index in &mut self.search_indices {
            index.vacate(blocks)?;
        }
        self.table.vacate(blocks)
    }

    /// Release every block of the store. The store is unusable afterwards.
    pub fn delete(&mut self, blocks: &mut BlockManager) -> Result<()> {
        for bid in self.table_bids(blocks)? {
            blocks.delete_block(bid)?;
        }
        for index in &mut self.indices {
            index.delete(blocks)?;
        }
        for index in &mut self.search_indices {
            index.delete(blocks)?;
        }
        self.table.delete(blocks)
    }

    // =========================================================================
    // Index maintenance
    // =========================================================================

    /// Add an index and fill it from a table scan.
    ///
    /// Returns `false` when an index over the same keys exists.
    pub fn add_index(&mut self, blocks: &mut BlockManager, index: &Index) -> Result<bool> {
        if self.indices.iter().any(|existing| existing.keys() == index.keys()) {
            return Ok(false);
        }
        let mut manager =
            IndexManager::create(blocks, self.record_manager.clone(), index.keys().to_vec())?;
        let bids = self.table_bids(blocks)?;
        for &bid in &bids {
            let record = self.read_record(blocks, bid)?;
            manager.insert(blocks, &record, bid)?;
        }
        info!(keys = ?index.keys(), records = bids.len(), "Rebuilt index from table scan");
        self.indices.push(manager);
        Ok(true)
    }

    /// Drop the index over `keys`, releasing its blocks.
    ///
    /// Returns `false` when there is no such index.
    pub fn drop_index(&mut self, blocks: &mut BlockManager, keys: &[String]) -> Result<bool> {
        let Some(position) = self.indices.iter().position(|index| index.keys() == keys) else {
            return Ok(false);
        };
        let mut manager = self.indices.remove(position);
        manager.delete(blocks)?;
        info!(keys = ?keys, "Dropped index");
        Ok(true)
    }

    /// Add a search index and fill it from a table scan.
    ///
    /// Returns `false` when the field is already indexed with the same layout.
    pub fn add_search_index(&mut self, blocks: &mut BlockManager, index: &SearchIndex) -> Result<bool> {
        if let Some(existing) = self.search_indices.iter().find(|m| m.key() == index.key()) {
            if existing.version() == index.layout() {
                return Ok(false);
            }
            self.drop_search_index(blocks, index.key())?;
        }
        let mut manager = SearchIndexManager::create(
            blocks,
            self.record_manager.clone(),
            index.key(),
            index.layout(),
        )?;
        let bids = self.table_bids(blocks)?;
        for &bid in &bids {
            let record = self.read_record(blocks, bid)?;
            manager.insert(blocks, &record, bid)?;
        }
        info!(
            key = index.key(),
            version = ?index.layout(),
            records = bids.len(),
            "Rebuilt search index from table scan"
        );
        self.search_indices.push(manager);
        Ok(true)
    }

    /// Drop the search index over `key`, releasing its blocks.
    ///
    /// Returns `false` when there is no such index.
    pub fn drop_search_index(&mut self, blocks: &mut BlockManager, key: &str) -> Result<bool> {
        let Some(position) = self.search_indices.iter().position(|index| index.key() == key) else {
            return Ok(false);
        };
        let mut manager = self.search_indices.remove(position);
        manager.delete(blocks)?;
        info!(key = key, "Dropped search index");
        Ok(true)
    }
}
