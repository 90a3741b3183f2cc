//! Secondary index managers
//!
//! An index is a radix tree keyed by the encoded values of its fields, in
//! declared order, holding the block id of each record.
//!
//! ## Serving a Filter
//!
//! ```text
//! keys     [ a    , b    , c    , id ]
//!            ^^^^   ^^^^
//!            equality filters: follow branches, consume
//!                          ^^^^^^^^^^^
//!                          remaining orders: consume when they align,
//!                          walk each level in its direction
//! ```
//!
//! 1. Leading keys with an equality filter narrow the tree to one branch
//!    each. A missing branch proves that nothing matches.
//! 2. The orders left after that are served by the tree when they are
//!    exactly the next index keys, in the same positions.
//! 3. One tree filter yields the candidates: `^=` without an anchor. When
//!    the tree serves every order the anchor bounds the walk: `>` its keys
//!    when every level increases, `<` when every level decreases. Mixed
//!    walks skip up to the anchor instead.

use crate::filtered::{BidStream, FilteredStore};
use atlas_core::{Direction, Filter, Filters, Orders, Record, RecordManager, Result};
use atlas_storage::{BlockId, BlockManager, RadixTree, Relationship};

/// Maintains one index tree of a store.
#[derive(Debug, Clone)]
pub struct IndexManager {
    record_manager: RecordManager,
    keys: Vec<String>,
    tree: RadixTree,
}

impl IndexManager {
    /// Create an empty index over `keys`.
    pub fn create(
        blocks: &mut BlockManager,
        record_manager: RecordManager,
        keys: Vec<String>,
    ) -> Result<Self> {
        Ok(IndexManager {
            record_manager,
            keys,
            tree: RadixTree::create(blocks)?,
        })
    }

    /// Open the index over `keys` rooted at block `root`.
    pub fn open(record_manager: RecordManager, keys: Vec<String>, root: BlockId) -> Self {
        IndexManager {
            record_manager,
            keys,
            tree: RadixTree::open(root),
        }
    }

    /// Root block of the index tree
    pub fn root(&self) -> BlockId {
        self.tree.root()
    }

    /// Indexed fields
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Index `record` stored at `bid`.
    pub fn insert(&mut self, blocks: &mut BlockManager, record: &Record, bid: BlockId) -> Result<()> {
        let keys = self.record_manager.encode_keys(&self.keys, record)?;
        self.tree.insert(blocks, &keys, bid)
    }

    /// Unindex `record`.
    pub fn remove(&mut self, blocks: &mut BlockManager, record: &Record) -> Result<()> {
        let keys = self.record_manager.encode_keys(&self.keys, record)?;
        self.tree.remove(blocks, &keys)
    }

    /// Move the entry of the record at `bid` when its indexed fields change.
    pub fn update(
        &mut self,
        blocks: &mut BlockManager,
        old: &Record,
        new: &Record,
        bid: BlockId,
    ) -> Result<()> {
        let old_keys = self.record_manager.encode_keys(&self.keys, old)?;
        let new_keys = self.record_manager.encode_keys(&self.keys, new)?;
        if old_keys == new_keys {
            return Ok(());
        }
        self.tree.remove(blocks, &old_keys)?;
        self.tree.insert(blocks, &new_keys, bid)
    }

    /// Remove every entry.
    pub fn vacate(&mut self, blocks: &mut BlockManager) -> Result<()> {
        self.tree.vacate(blocks)
    }

    /// Release every block of the index tree.
    pub fn delete(&mut self, blocks: &mut BlockManager) -> Result<()> {
        self.tree.delete(blocks)
    }

    /// Number of indexed records.
    pub fn length(&self, blocks: &BlockManager) -> Result<u64> {
        self.tree.length(blocks)
    }

    /// Every indexed record, in index order.
    pub fn iter<'a>(&'a self, blocks: &'a BlockManager) -> Result<FilteredStore<'a>> {
        Ok(FilteredStore::new(
            &self.record_manager,
            blocks,
            Box::new(self.tree.iter(blocks)?),
            Filters::new(),
            Orders::new(),
            None,
        ))
    }

    /// Candidates for `filters`, `orders` and `anchor` served by this index.
    ///
    /// Returns `None` when the index proves that no record matches.
    pub fn filter<'a>(
        &'a self,
        blocks: &'a BlockManager,
        filters: &Filters,
        orders: &Orders,
        anchor: Option<&Record>,
    ) -> Result<Option<FilteredStore<'a>>> {
        let position = orders.clone();
        let mut filters = filters.clone();
        let mut orders = orders.clone();
        let mut remaining: &[String] = &self.keys;
        let mut tree = self.tree.clone();
        while let Some((key, rest)) = remaining.split_first() {
            let Some(Filter::Equal(value)) = filters.get(key) else {
                break;
            };
            let encoded = self.record_manager.encode_value(key, value)?;
            if rest.is_empty() {
                // The whole key is fixed, so at most the resident value matches.
                let Some(bid) = tree.lookup(blocks, &[encoded])? else {
                    return Ok(None);
                };
                filters.remove(key);
                orders.remove(key);
                let bids: BidStream<'a> = Box::new(std::iter::once(Ok(bid)));
                let candidate = self
                    .filtered(blocks, bids, filters, orders, anchor)
                    .anchored_by(position);
                return Ok(Some(candidate));
            }
            let Some(branch) = tree.branch(blocks, &[encoded])? else {
                return Ok(None);
            };
            filters.remove(key);
            orders.remove(key);
            remaining = rest;
            tree = branch;
        }
        let aligned = orders.len() <= remaining.len()
            && orders
                .keys()
                .zip(remaining)
                .all(|(order, key)| order == key.as_str());
        let mut directions = Vec::new();
        if aligned {
            directions = orders.iter().map(|(_, direction)| direction).collect();
            orders = Orders::new();
        }
        let everything = &[] as &[&[u8]];
        let mut skipped = None;
        let bids: BidStream<'a> = match anchor {
            Some(anchor) if orders.is_empty() => {
                let keys = self.record_manager.encode_keys(remaining, anchor)?;
                if directions.iter().all(|d| *d == Direction::Increasing) {
                    Box::new(tree.filter(blocks, Relationship::Greater, &keys, &directions)?)
                } else if directions.iter().all(|d| *d == Direction::Decreasing) {
                    Box::new(tree.filter(blocks, Relationship::Less, &keys, &directions)?)
                } else {
                    // Mixed directions have no single key range past the anchor.
                    skipped = Some(anchor);
                    Box::new(tree.filter(blocks, Relationship::Prefix, everything, &directions)?)
                }
            }
            _ => Box::new(tree.filter(blocks, Relationship::Prefix, everything, &directions)?),
        };
        if orders.is_empty() {
            let candidate = self.filtered(blocks, bids, filters, orders, skipped);
            return Ok(Some(candidate.anchored_by(position)));
        }
        Ok(Some(self.filtered(blocks, bids, filters, orders, anchor)))
    }

    fn filtered<'a>(
        &'a self,
        blocks: &'a BlockManager,
        bids: BidStream<'a>,
        filters: Filters,
        orders: Orders,
        anchor: Option<&Record>,
    ) -> FilteredStore<'a> {
        FilteredStore::new(
            &self.record_manager,
            blocks,
            bids,
            filters,
            orders,
            anchor.cloned(),
        )
    }
}
