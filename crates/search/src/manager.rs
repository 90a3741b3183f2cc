//! Version dispatch and multi-index rank merge

use crate::result::SearchResult;
use crate::v1::SearchIndexManagerV1;
use crate::v2::SearchIndexManagerV2;
use atlas_core::{Record, RecordManager, Result};
use atlas_storage::{BlockId, BlockManager};
use serde::{Deserialize, Serialize};

/// Search index layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum SearchVersion {
    /// Category-ordered layout, see [`SearchIndexManagerV1`]
    #[default]
    V1,
    /// Token-branched layout, see [`SearchIndexManagerV2`]
    V2,
}

/// Lazy stream of search results.
pub type SearchStream<'a> = Box<dyn Iterator<Item = Result<SearchResult>> + 'a>;

/// A search index of either layout.
#[derive(Debug, Clone)]
pub enum SearchIndexManager {
    /// Category-ordered layout
    V1(SearchIndexManagerV1),
    /// Token-branched layout
    V2(SearchIndexManagerV2),
}

impl SearchIndexManager {
    /// Create an empty index over field `key`.
    pub fn create(
        blocks: &mut BlockManager,
        record_manager: RecordManager,
        key: impl Into<String>,
        version: SearchVersion,
    ) -> Result<Self> {
        Ok(match version {
            SearchVersion::V1 => {
                SearchIndexManager::V1(SearchIndexManagerV1::create(blocks, record_manager, key)?)
            }
            SearchVersion::V2 => {
                SearchIndexManager::V2(SearchIndexManagerV2::create(blocks, record_manager, key)?)
            }
        })
    }

    /// Open the index rooted at block `root`.
    pub fn open(
        record_manager: RecordManager,
        key: impl Into<String>,
        root: BlockId,
        version: SearchVersion,
    ) -> Self {
        match version {
            SearchVersion::V1 => {
                SearchIndexManager::V1(SearchIndexManagerV1::open(record_manager, key, root))
            }
            SearchVersion::V2 => {
                SearchIndexManager::V2(SearchIndexManagerV2::open(record_manager, key, root))
            }
        }
    }

    /// Layout of this index
    pub fn version(&self) -> SearchVersion {
        match self {
            SearchIndexManager::V1(_) => SearchVersion::V1,
            SearchIndexManager::V2(_) => SearchVersion::V2,
        }
    }

    /// Root block of the index tree
    pub fn root(&self) -> BlockId {
        match self {
            SearchIndexManager::V1(manager) => manager.root(),
            SearchIndexManager::V2(manager) => manager.root(),
        }
    }

    /// Indexed field
    pub fn key(&self) -> &str {
        match self {
            SearchIndexManager::V1(manager) => manager.key(),
            SearchIndexManager::V2(manager) => manager.key(),
        }
    }

    /// Index `record` stored at `bid`.
    pub fn insert(&mut self, blocks: &mut BlockManager, record: &Record, bid: BlockId) -> Result<()> {
        match self {
            SearchIndexManager::V1(manager) => manager.insert(blocks, record, bid),
            SearchIndexManager::V2(manager) => manager.insert(blocks, record, bid),
        }
    }

    /// Unindex `record` stored at `bid`.
    pub fn remove(&mut self, blocks: &mut BlockManager, record: &Record, bid: BlockId) -> Result<()> {
        match self {
            SearchIndexManager::V1(manager) => manager.remove(blocks, record, bid),
            SearchIndexManager::V2(manager) => manager.remove(blocks, record, bid),
        }
    }

    /// Re-index the record at `bid`.
    pub fn update(
        &mut self,
        blocks: &mut BlockManager,
        old: &Record,
        new: &Record,
        bid: BlockId,
    ) -> Result<()> {
        match self {
            SearchIndexManager::V1(manager) => manager.update(blocks, old, new, bid),
            SearchIndexManager::V2(manager) => manager.update(blocks, old, new, bid),
        }
    }

    /// Remove every entry.
    pub fn vacate(&mut self, blocks: &mut BlockManager) -> Result<()> {
        match self {
            SearchIndexManager::V1(manager) => manager.vacate(blocks),
            SearchIndexManager::V2(manager) => manager.vacate(blocks),
        }
    }

    /// Release every block of the index.
    pub fn delete(&mut self, blocks: &mut BlockManager) -> Result<()> {
        match self {
            SearchIndexManager::V1(manager) => manager.delete(blocks),
            SearchIndexManager::V2(manager) => manager.delete(blocks),
        }
    }

    /// Rank of `record` for `query`, or `None` when it does not match.
    pub fn compute_record_rank(&self, record: &Record, query: &str) -> Option<i64> {
        match self {
            SearchIndexManager::V1(manager) => manager.compute_record_rank(record, query),
            SearchIndexManager::V2(manager) => manager.compute_record_rank(record, query),
        }
    }

    /// Records matching `query` in decreasing rank order.
    pub fn search<'a>(
        &'a self,
        blocks: &'a BlockManager,
        query: &str,
        anchor: Option<BlockId>,
    ) -> Result<SearchStream<'a>> {
        Ok(match self {
            SearchIndexManager::V1(manager) => Box::new(manager.search(blocks, query, anchor)?),
            SearchIndexManager::V2(manager) => Box::new(manager.search(blocks, query, anchor)?),
        })
    }
}

// =============================================================================
// Rank merge
// =============================================================================

/// Search several indices of one store at once.
///
/// Results come in decreasing rank order. A record matched by several indices
/// is reported once, by the index ranking it highest; on equal ranks the
/// earliest index wins.
pub fn search_all<'a>(
    managers: &'a [SearchIndexManager],
    blocks: &'a BlockManager,
    query: &str,
    anchor: Option<BlockId>,
) -> Result<RankedSearch<'a>> {
    let mut streams = Vec::with_capacity(managers.len());
    let mut heads = Vec::with_capacity(managers.len());
    for manager in managers {
        let mut stream = manager.search(blocks, query, anchor)?;
        heads.push(stream.next().transpose()?);
        streams.push(stream);
    }
    Ok(RankedSearch {
        managers,
        query: query.to_string(),
        streams,
        heads,
    })
}

/// Lazy merge of the result streams of several indices.
pub struct RankedSearch<'a> {
    managers: &'a [SearchIndexManager],
    query: String,
    streams: Vec<SearchStream<'a>>,
    heads: Vec<Option<SearchResult>>,
}

impl RankedSearch<'_> {
    fn advance(&mut self) -> Result<Option<SearchResult>> {
        loop {
            let best = self
                .heads
                .iter()
                .enumerate()
                .filter_map(|(index, head)| head.as_ref().map(|head| (index, head.rank)))
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));
            let Some((index, _)) = best else {
                return Ok(None);
            };
            let next = self.streams[index].next().transpose()?;
            let Some(candidate) = std::mem::replace(&mut self.heads[index], next) else {
                return Ok(None);
            };
            let shadowed = self.managers.iter().enumerate().any(|(other, manager)| {
                other != index
                    && manager
                        .compute_record_rank(&candidate.record, &self.query)
                        .map_or(false, |rank| {
                            rank > candidate.rank || (rank == candidate.rank && other < index)
                        })
            });
            if !shadowed {
                return Ok(Some(candidate));
            }
        }
    }
}

impl Iterator for RankedSearch<'_> {
    type Item = Result<SearchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(result) => result.map(Ok),
            Err(e) => {
                self.heads.iter_mut().for_each(|head| *head = None);
                Some(Err(e))
            }
        }
    }
}
