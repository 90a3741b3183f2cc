//! Category-ordered search index
//!
//! Every token of a record is stored under
//!
//! ```text
//! [category, token, bid] -> bid        category = number of record tokens
//! ```
//!
//! Walking the tree visits records with few tokens first, which are the
//! records the query covers best. A search advances one stream of `(category,
//! bid)` positions per complete query token until they agree on a record, and
//! then checks the query prefix against that record's tokens.
//!
//! Prefix-only queries walk the token range of the prefix category by
//! category. A record is reported at the entry of its smallest completing
//! token, so a record with several completions is reported once.

use crate::result::{
    compute_rank, integer_key, rank_tokens, read_result, record_tokens, string_key, Query,
    SearchResult,
};
use crate::tokenizer::first_completion;
use atlas_core::{Record, RecordManager, Result};
use atlas_storage::{BlockId, BlockManager, Cursor, RadixTree, Relationship};
use tracing::trace;

/// Search index over one string field, ordered by token count.
#[derive(Debug, Clone)]
pub struct SearchIndexManagerV1 {
    record_manager: RecordManager,
    key: String,
    tree: RadixTree,
}

impl SearchIndexManagerV1 {
    /// Create an empty index over field `key`.
    pub fn create(
        blocks: &mut BlockManager,
        record_manager: RecordManager,
        key: impl Into<String>,
    ) -> Result<Self> {
        Ok(SearchIndexManagerV1 {
            record_manager,
            key: key.into(),
            tree: RadixTree::create(blocks)?,
        })
    }

    /// Open the index rooted at block `root`.
    pub fn open(record_manager: RecordManager, key: impl Into<String>, root: BlockId) -> Self {
        SearchIndexManagerV1 {
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

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Index the tokens of `record` stored at `bid`.
    pub fn insert(&mut self, blocks: &mut BlockManager, record: &Record, bid: BlockId) -> Result<()> {
        let tokens = record_tokens(record, &self.key);
        let category = integer_key(tokens.len() as u64);
        for token in &tokens {
            let keys = [category.clone(), string_key(token), integer_key(bid)];
            self.tree.insert(blocks, &keys, bid)?;
        }
        Ok(())
    }

    /// Remove the tokens of `record` stored at `bid`.
    pub fn remove(&mut self, blocks: &mut BlockManager, record: &Record, bid: BlockId) -> Result<()> {
        let tokens = record_tokens(record, &self.key);
        let category = integer_key(tokens.len() as u64);
        for token in &tokens {
            let keys = [category.clone(), string_key(token), integer_key(bid)];
            self.tree.remove(blocks, &keys)?;
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

    // =========================================================================
    // Search
    // =========================================================================

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
    ) -> Result<SearchV1<'a>> {
        let previous = match anchor {
            Some(bid) => Some(read_result(blocks, &self.record_manager, &self.key, bid, 0)?),
            None => None,
        };
        let relationship = match previous {
            Some(_) => Relationship::Greater,
            None => Relationship::GreaterOrEqual,
        };
        let query = Query::parse(query);
        trace!(tokens = query.tokens.len(), prefix = %query.prefix, "Searching v1 index");
        Ok(SearchV1 {
            manager: self,
            blocks,
            query,
            previous,
            relationship,
            done: false,
        })
    }

    fn filter<'a>(
        &self,
        blocks: &'a BlockManager,
        relationship: Relationship,
        keys: &[Vec<u8>],
    ) -> Result<Cursor<'a>> {
        self.tree.filter(blocks, relationship, keys, &[])
    }

    fn read(&self, blocks: &BlockManager, bid: BlockId) -> Result<SearchResult> {
        read_result(blocks, &self.record_manager, &self.key, bid, 0)
    }

    /// Next record, in (category, completion, bid) order, having a token that
    /// starts with `prefix`.
    fn next_prefix_match(
        &self,
        blocks: &BlockManager,
        prefix: &str,
        relationship: Relationship,
        previous: Option<&SearchResult>,
    ) -> Result<Option<SearchResult>> {
        let (mut current, mut keys) = (1, vec![integer_key(1), string_key(prefix)]);
        if let Some(previous) = previous {
            let category = previous.tokens.len() as u64;
            (current, keys) = match first_completion(prefix, &previous.tokens) {
                Some(completion) => (
                    category,
                    vec![
                        integer_key(category),
                        string_key(completion),
                        integer_key(previous.bid),
                    ],
                ),
                None => (category + 1, vec![integer_key(category + 1), string_key(prefix)]),
            };
        }
        let mut cursor = self.filter(blocks, relationship, &keys)?;
        while let Some(bid) = cursor.next() {
            let candidate = self.read(blocks, bid?)?;
            let category = candidate.tokens.len() as u64;
            let completion = match first_completion(prefix, &candidate.tokens) {
                Some(completion) if category == current => completion,
                _ => {
                    // Entering a category starts below its prefix range, leaving
                    // the range moves on to the next category.
                    current = if category > current { category } else { category + 1 };
                    keys = vec![integer_key(current), string_key(prefix)];
                    cursor = self.filter(blocks, relationship, &keys)?;
                    continue;
                }
            };
            let position = vec![
                integer_key(category),
                string_key(completion),
                integer_key(candidate.bid),
            ];
            let skip = match relationship {
                Relationship::Greater => position <= keys,
                _ => position < keys,
            };
            if !skip {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Next record, in (category, bid) order, having `token`.
    fn next_token_match(
        &self,
        blocks: &BlockManager,
        token: &str,
        relationship: Relationship,
        previous: Option<&SearchResult>,
    ) -> Result<Option<SearchResult>> {
        let boundary = previous.map(|p| (p.tokens.len() as u64, p.bid));
        let (mut current, mut keys) = match boundary {
            Some((category, bid)) => (
                category,
                vec![integer_key(category), string_key(token), integer_key(bid)],
            ),
            None => (1, vec![integer_key(1), string_key(token)]),
        };
        let mut cursor = self.filter(blocks, relationship, &keys)?;
        while let Some(bid) = cursor.next() {
            let candidate = self.read(blocks, bid?)?;
            let position = (candidate.tokens.len() as u64, candidate.bid);
            // A record having the token that lies below the boundary is
            // listed under a later token of the same category.
            let behind = boundary.map_or(false, |boundary| position < boundary);
            let listed = candidate.tokens.iter().any(|t| t == token);
            if position.0 > current || !listed || behind {
                current = if position.0 > current { position.0 } else { position.0 + 1 };
                keys = vec![integer_key(current), string_key(token)];
                cursor = self.filter(blocks, relationship, &keys)?;
                continue;
            }
            if relationship == Relationship::Greater && Some(position) == boundary {
                continue;
            }
            return Ok(Some(candidate));
        }
        Ok(None)
    }
}

/// Lazy search over a [`SearchIndexManagerV1`].
pub struct SearchV1<'a> {
    manager: &'a SearchIndexManagerV1,
    blocks: &'a BlockManager,
    query: Query,
    previous: Option<SearchResult>,
    relationship: Relationship,
    done: bool,
}

impl SearchV1<'_> {
    fn advance(&mut self) -> Result<Option<SearchResult>> {
        let (manager, blocks) = (self.manager, self.blocks);
        if self.query.tokens.is_empty() {
            let next = manager.next_prefix_match(
                blocks,
                &self.query.prefix,
                Relationship::Greater,
                self.previous.as_ref(),
            )?;
            return Ok(next.map(|mut result| {
                result.rank = compute_rank(&result.tokens, self.query.token_count());
                self.previous = Some(result.clone());
                result
            }));
        }
        loop {
            let mut candidates = Vec::with_capacity(self.query.tokens.len());
            for token in &self.query.tokens {
                let next =
                    manager.next_token_match(blocks, token, self.relationship, self.previous.as_ref())?;
                match next {
                    Some(candidate) => candidates.push(candidate),
                    None => return Ok(None),
                }
            }
            candidates.sort_by_key(|c| (c.tokens.len(), c.bid));
            let Some(minimum) = candidates.first().map(|c| c.bid) else {
                return Ok(None);
            };
            let Some(mut maximum) = candidates.pop() else {
                return Ok(None);
            };
            self.previous = Some(maximum.clone());
            if minimum != maximum.bid {
                self.relationship = Relationship::GreaterOrEqual;
                continue;
            }
            self.relationship = Relationship::Greater;
            if first_completion(&self.query.prefix, &maximum.tokens).is_some() {
                maximum.rank = compute_rank(&maximum.tokens, self.query.token_count());
                return Ok(Some(maximum));
            }
        }
    }
}

impl Iterator for SearchV1<'_> {
    type Item = Result<SearchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(result)) => Some(Ok(result)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
