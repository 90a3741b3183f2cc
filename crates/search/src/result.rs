//! Search results and ranking shared by both index versions.

use crate::tokenizer::tokenize;
use atlas_core::{encode_key, Error, Record, RecordManager, Result, Value};
use atlas_storage::{BlockId, BlockManager};

/// One record matched by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Block holding the record
    pub bid: BlockId,
    /// The matched record
    pub record: Record,
    /// Tokens of the searched field
    pub tokens: Vec<String>,
    /// Higher is a closer match
    pub rank: i64,
}

/// A query split into its complete tokens and the trailing prefix.
///
/// The last token of a query may still be incomplete, so it only has to be a
/// prefix of some record token. An empty query has an empty prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Tokens that must appear verbatim
    pub tokens: Vec<String>,
    /// Prefix some token must start with
    pub prefix: String,
}

impl Query {
    /// Tokenize `query`.
    pub fn parse(query: &str) -> Self {
        let mut tokens = tokenize(query);
        let prefix = tokens.pop().unwrap_or_default();
        Query { tokens, prefix }
    }

    /// Number of query tokens including the prefix.
    pub fn token_count(&self) -> usize {
        self.tokens.len() + 1
    }

    /// Check whether a record with `tokens` satisfies the query.
    pub fn matches(&self, tokens: &[String]) -> bool {
        self.tokens.iter().all(|token| tokens.contains(token))
            && tokens.iter().any(|token| token.starts_with(&self.prefix))
    }
}

/// Rank of a record with `record_tokens` for a query of `query_length` tokens.
///
/// Records whose tokens are mostly covered by the query rank higher.
pub fn compute_rank(record_tokens: &[String], query_length: usize) -> i64 {
    query_length as i64 - record_tokens.len() as i64
}

/// Rank of `tokens` for `query`, or `None` when they do not match.
pub(crate) fn rank_tokens(tokens: &[String], query: &Query) -> Option<i64> {
    if query.matches(tokens) {
        Some(compute_rank(tokens, query.token_count()))
    } else {
        None
    }
}

/// Tokens of the string field `key` of `record`. Other values have none.
pub(crate) fn record_tokens(record: &Record, key: &str) -> Vec<String> {
    match record.get(key) {
        Some(Value::String(value)) => tokenize(value),
        _ => Vec::new(),
    }
}

/// Read the record at `bid` and tokenize its field `key`.
pub(crate) fn read_result(
    blocks: &BlockManager,
    record_manager: &RecordManager,
    key: &str,
    bid: BlockId,
    rank: i64,
) -> Result<SearchResult> {
    let record = record_manager.decode(&blocks.read_block(bid)?)?;
    let tokens = record_tokens(&record, key);
    Ok(SearchResult {
        bid,
        record,
        tokens,
        rank,
    })
}

pub(crate) fn integer_key(value: u64) -> Vec<u8> {
    encode_key(&Value::Integer(value as i64))
}

/// Inverse of [`integer_key`].
pub(crate) fn integer_from_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| Error::Corruption(format!("integer key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes) ^ (1 << 63))
}

pub(crate) fn string_key(value: &str) -> Vec<u8> {
    encode_key(&Value::String(value.to_string()))
}

pub(crate) fn boolean_key(value: bool) -> Vec<u8> {
    encode_key(&Value::Boolean(value))
}
