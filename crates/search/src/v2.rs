//! Token-branched search index
//!
//! Every token of a record is stored twice over:
//!
//! ```text
//! [false, token,  category, bid] -> bid     the complete token
//! [true,  prefix, category, bid] -> bid     every prefix of the token,
//!                                           from "" to the token itself
//! ```
//!
//! The branch below `[false, token]` lists the records having `token`, and the
//! branch below `[true, prefix]` lists the records having a token that starts
//! with `prefix`, both in `(category, bid)` order. A search intersects one
//! branch per complete query token with the branch of the query prefix.

use crate::result::{
    boolean_key, compute_rank, integer_from_key, integer_key, rank_tokens, read_result,
    record_tokens, string_key, Query, SearchResult,
};
use atlas_core::{Error, Record, RecordManager, Result};
use atlas_storage::merge::{intersection, Intersection};
use atlas_storage::{BlockId, BlockManager, Entries, RadixTree, Relationship, Seekable};
use std::cmp::Ordering;
use tracing::trace;

/// `(category, bid)` position of a record inside a branch.
type Position = (u64, BlockId);

type Collator = fn(&Position, &Position) -> Ordering;

fn collate(a: &Position, b: &Position) -> Ordering {
    a.cmp(b)
}

/// Search index over one string field with a branch per token and prefix.
#[derive(Debug, Clone)]
pub struct SearchIndexManagerV2 {
    record_manager: RecordManager,
    key: String,
    tree: RadixTree,
}

impl SearchIndexManagerV2 {
    /// Create an empty index over field `key`.
    pub fn create(
        blocks: &mut BlockManager,
        record_manager: RecordManager,
        key: impl Into<String>,
    ) -> Result<Self> {
        Ok(SearchIndexManagerV2 {
            record_manager,
            key: key.into(),
            tree: RadixTree::create(blocks)?,
        })
    }

    /// Open the index rooted at block `root`.
    pub fn open(record_manager: RecordManager, key: impl Into<String>, root: BlockId) -> Self {
        SearchIndexManagerV2 {
            record_manager,
            key: key.into(),
            tree: RadixTree::open(root),
        }
    }

    /// Root block of the index tree
    pub fn root(&self) -> BlockId {
        self.tree.root()
    }

    /// Indexed field
    pub fn key(&self) -> &str {
        &self.key
    }

    fn token_keys(token: &str, category: u64, bid: BlockId) -> Vec<[Vec<u8>; 4]> {
        let (category, bid) = (integer_key(category), integer_key(bid));
        let mut keys = vec![[
            boolean_key(false),
            string_key(token),
            category.clone(),
            bid.clone(),
        ]];
        let ends = token
            .char_indices()
            .map(|(index, _)| index)
            .chain(std::iter::once(token.len()));
        for end in ends {
            keys.push([
                boolean_key(true),
                string_key(&token[..end]),
                category.clone(),
                bid.clone(),
            ]);
        }
        keys
    }

    /// Index the tokens of `record` stored at `bid`.
    pub fn insert(&mut self, blocks: &mut BlockManager, record: &Record, bid: BlockId) -> Result<()> {
        let tokens = record_tokens(record, &self.key);
        for token in &tokens {
            for keys in Self::token_keys(token, tokens.len() as u64, bid) {
                self.tree.insert(blocks, &keys, bid)?;
            }
        }
        Ok(())
    }

    /// Remove the tokens of `record` stored at `bid`.
    pub fn remove(&mut self, blocks: &mut BlockManager, record: &Record, bid: BlockId) -> Result<()> {
        let tokens = record_tokens(record, &self.key);
        for token in &tokens {
            for keys in Self::token_keys(token, tokens.len() as u64, bid) {
                self.tree.remove(blocks, &keys)?;
            }
        }
        Ok(())
    }

    /// Re-index the record at `bid` after it changed from `old` to `new`.
    pub fn update(
        &mut self,
        blocks: &mut BlockManager,
        old: &Record,
        new: &Record,
        bid: BlockId,
    ) -> Result<()> {
        if record_tokens(old, &self.key) == record_tokens(new, &self.key) {
            return Ok(());
        }
        self.remove(blocks, old, bid)?;
        self.insert(blocks, new, bid)
    }

    /// Remove every entry, keeping the index usable.
    pub fn vacate(&mut self, blocks: &mut BlockManager) -> Result<()> {
        self.tree.vacate(blocks)
    }

    /// Release every block of the index.
    pub fn delete(&mut self, blocks: &mut BlockManager) -> Result<()> {
        self.tree.delete(blocks)
    }

    /// Rank of `record` for `query`, or `None` when it does not match.
    pub fn compute_record_rank(&self, record: &Record, query: &str) -> Option<i64> {
        rank_tokens(&record_tokens(record, &self.key), &Query::parse(query))
    }

    /// Records matching `query` in decreasing rank order.
    ///
    /// With an `anchor`, the search resumes after the record stored there.
    pub fn search<'a>(
        &'a self,
        blocks: &'a BlockManager,
        query: &str,
        anchor: Option<BlockId>,
    ) -> Result<SearchV2<'a>> {
        let query = Query::parse(query);
        trace!(tokens = query.tokens.len(), prefix = %query.prefix, "Searching v2 index");
        let mut branch_keys: Vec<[Vec<u8>; 2]> = query
            .tokens
            .iter()
            .map(|token| [boolean_key(false), string_key(token)])
            .collect();
        branch_keys.push([boolean_key(true), string_key(&query.prefix)]);
        let mut branches = Vec::with_capacity(branch_keys.len());
        for keys in &branch_keys {
            match self.tree.branch(blocks, keys)? {
                Some(tree) => branches.push(BranchStream::new(blocks, tree)?),
                None => return Ok(SearchV2::empty(self, blocks, query)),
            }
        }
        let mut merged = intersection(branches, collate as Collator);
        let mut skip = None;
        if let Some(bid) = anchor {
            let previous = read_result(blocks, &self.record_manager, &self.key, bid, 0)?;
            let position = (previous.tokens.len() as u64, bid);
            merged.seek(&position)?;
            skip = Some(position);
        }
        Ok(SearchV2 {
            manager: self,
            blocks,
            query,
            merged: Some(merged),
            skip,
        })
    }
}

/// Records of one branch in `(category, bid)` order, read off the branch keys.
struct BranchStream<'a> {
    blocks: &'a BlockManager,
    tree: RadixTree,
    entries: Entries<'a>,
}

impl<'a> BranchStream<'a> {
    fn new(blocks: &'a BlockManager, tree: RadixTree) -> Result<Self> {
        let entries = tree.entries(blocks, Relationship::Greater, &[] as &[&[u8]], &[])?;
        Ok(BranchStream {
            blocks,
            tree,
            entries,
        })
    }
}

impl Seekable for BranchStream<'_> {
    type Item = Position;

    fn next_item(&mut self) -> Result<Option<Position>> {
        let Some(entry) = self.entries.next() else {
            return Ok(None);
        };
        let (keys, bid) = entry?;
        let category = keys.first().ok_or_else(|| {
            Error::Corruption(format!("search entry for block {} has no category", bid))
        })?;
        Ok(Some((integer_from_key(category)?, bid)))
    }

    fn seek(&mut self, boundary: &Position) -> Result<()> {
        let keys = [integer_key(boundary.0), integer_key(boundary.1)];
        self.entries = self
            .tree
            .entries(self.blocks, Relationship::GreaterOrEqual, &keys, &[])?;
        Ok(())
    }
}

/// Lazy search over a [`SearchIndexManagerV2`].
pub struct SearchV2<'a> {
    manager: &'a SearchIndexManagerV2,
    blocks: &'a BlockManager,
    query: Query,
    merged: Option<Intersection<BranchStream<'a>, Collator>>,
    skip: Option<Position>,
}

impl<'a> SearchV2<'a> {
    fn empty(manager: &'a SearchIndexManagerV2, blocks: &'a BlockManager, query: Query) -> Self {
        SearchV2 {
            manager,
            blocks,
            query,
            merged: None,
            skip: None,
        }
    }

    fn advance(&mut self) -> Result<Option<SearchResult>> {
        let Some(merged) = self.merged.as_mut() else {
            return Ok(None);
        };
        loop {
            let Some(position) = merged.next_item()? else {
                return Ok(None);
            };
            if self.skip.take() == Some(position) {
                continue;
            }
            let manager = self.manager;
            let mut result =
                read_result(self.blocks, &manager.record_manager, &manager.key, position.1, 0)?;
            result.rank = compute_rank(&result.tokens, self.query.token_count());
            return Ok(Some(result));
        }
    }
}

impl Iterator for SearchV2<'_> {
    type Item = Result<SearchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(result)) => Some(Ok(result)),
            Ok(None) => {
                self.merged = None;
                None
            }
            Err(e) => {
                self.merged = None;
                Some(Err(e))
            }
        }
    }
}
