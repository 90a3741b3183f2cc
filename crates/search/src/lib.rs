//! Full-text search indices for Atlas
//!
//! This crate indexes string fields of stored records by token:
//! - tokenizer: text normalization and token extraction
//! - SearchIndexManagerV1: category-ordered index
//! - SearchIndexManagerV2: token-branched index built on sorted merges
//! - search_all: rank merge over every index of a store
//!
//! Both layouts return the same records for a query, in decreasing rank
//! order. A record matches when it contains every complete query token and a
//! token starting with the last query token; its rank is the number of query
//! tokens minus the number of record tokens.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod result;
pub mod tokenizer;
pub mod v1;
pub mod v2;

pub use manager::{search_all, RankedSearch, SearchIndexManager, SearchStream, SearchVersion};
pub use result::{compute_rank, Query, SearchResult};
pub use tokenizer::{tokenize, MAX_TOKEN_COUNT};
pub use v1::{SearchIndexManagerV1, SearchV1};
pub use v2::{SearchIndexManagerV2, SearchV2};
