//! Candidate record streams and their materialization
//!
//! A [`FilteredStore`] is one way of answering a `filter` call: a stream of
//! block ids plus the filters and orders the stream does not satisfy on its
//! own. Materialization reads and decodes each block, applies the remaining
//! filters, sorts by the remaining orders, skips past the anchor and applies
//! the limit.
//!
//! Streams without remaining orders are consumed lazily, so a limited query
//! served in index order reads only the blocks it returns.

use atlas_core::{Filters, Orders, Record, RecordManager, Result};
use atlas_storage::{BlockId, BlockManager};
use std::cmp::Ordering;

/// Lazy stream of block ids.
pub type BidStream<'a> = Box<dyn Iterator<Item = Result<BlockId>> + 'a>;

/// Block ids of candidate records with the work left to do on them.
pub struct FilteredStore<'a> {
    record_manager: &'a RecordManager,
    blocks: &'a BlockManager,
    bids: BidStream<'a>,
    filters: Filters,
    orders: Orders,
    anchor: Option<Record>,
    position: Orders,
}

impl<'a> FilteredStore<'a> {
    /// Candidates `bids` still subject to `filters`, `orders` and `anchor`.
    pub fn new(
        record_manager: &'a RecordManager,
        blocks: &'a BlockManager,
        bids: BidStream<'a>,
        filters: Filters,
        orders: Orders,
        anchor: Option<Record>,
    ) -> Self {
        let position = orders.clone();
        FilteredStore {
            record_manager,
            blocks,
            bids,
            filters,
            orders,
            anchor,
            position,
        }
    }

    /// Locate the anchor by `orders` instead of the remaining orders.
    ///
    /// Needed when the stream already satisfies orders the anchor must still
    /// be compared by.
    pub fn anchored_by(mut self, orders: Orders) -> Self {
        self.position = orders;
        self
    }

    /// Filters left to apply
    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Orders left to sort by
    pub fn orders(&self) -> &Orders {
        &self.orders
    }

    /// Position of the candidate leaving the least work.
    ///
    /// Fewer remaining orders wins, then fewer remaining filters. On a tie the
    /// candidate listed last is taken.
    pub fn optimal(candidates: &[FilteredStore<'a>]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .rev()
            .min_by_key(|(_, candidate)| (candidate.orders.len(), candidate.filters.len()))
            .map(|(position, _)| position)
    }

    /// Read the matching records, in order, after the anchor, up to `limit`.
    pub fn materialize(self, limit: Option<usize>) -> Result<Vec<Record>> {
        let limit = limit.unwrap_or(usize::MAX);
        let FilteredStore {
            record_manager,
            blocks,
            bids,
            filters,
            orders,
            anchor,
            position,
        } = self;
        let mut collected = Vec::new();
        if limit == 0 {
            return Ok(collected);
        }
        let mut records: Box<dyn Iterator<Item = Result<Record>> + 'a> =
            Box::new(bids.filter_map(move |bid| {
                let record = bid
                    .and_then(|bid| blocks.read_block(bid))
                    .and_then(|buffer| record_manager.decode(&buffer));
                match record {
                    Ok(record) if !filters.matches(&record) => None,
                    other => Some(other),
                }
            }));
        if !orders.is_empty() {
            let mut sorted = records.collect::<Result<Vec<_>>>()?;
            sorted.sort_by(|a, b| orders.compare(a, b));
            records = Box::new(sorted.into_iter().map(Ok));
        }
        let mut skip = AnchorSkip::new(record_manager, &position, anchor.as_ref())?;
        for record in records {
            let record = record?;
            if skip.skips(&record)? {
                continue;
            }
            collected.push(record);
            if collected.len() >= limit {
                break;
            }
        }
        Ok(collected)
    }
}

/// Drops records up to and including the anchor.
///
/// With position orders the anchor is a position: every record sorting at
/// or before it is dropped, whether or not the anchor itself is among the
/// records. Without them the anchor is found by its encoding.
struct AnchorSkip<'a> {
    record_manager: &'a RecordManager,
    orders: &'a Orders,
    anchor: Option<&'a Record>,
    encoded: Option<Vec<u8>>,
    passed: bool,
}

impl<'a> AnchorSkip<'a> {
    fn new(
        record_manager: &'a RecordManager,
        orders: &'a Orders,
        anchor: Option<&'a Record>,
    ) -> Result<Self> {
        let encoded = match anchor {
            Some(anchor) if orders.is_empty() => Some(record_manager.encode(anchor)?),
            _ => None,
        };
        Ok(AnchorSkip {
            record_manager,
            orders,
            anchor,
            encoded,
            passed: anchor.is_none(),
        })
    }

    fn skips(&mut self, record: &Record) -> Result<bool> {
        if self.passed {
            return Ok(false);
        }
        let Some(anchor) = self.anchor else {
            return Ok(false);
        };
        match &self.encoded {
            Some(encoded) => {
                if self.record_manager.encode(record)? == *encoded {
                    self.passed = true;
                }
                Ok(true)
            }
            None => {
                self.passed = self.orders.compare(record, anchor) == Ordering::Greater;
                Ok(!self.passed)
            }
        }
    }
}
