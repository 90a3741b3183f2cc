//! Record stores for Atlas
//!
//! This crate turns trees of blocks into stores of typed records:
//! - Schema objects: stores, indices, search indices and links, declared up front
//! - StoreManager: records with their table, secondary indices and search indices
//! - IndexManager, FilteredStore: query planning over the indices of a store
//! - LinkManager: parent and child records of two stores
//! - Catalog: the persisted roots of every store
//! - Engine: every store and link of one file, with store and link handles
//!
//! # Architecture
//!
//! ```text
//! Engine
//!   |-- Catalog ------------------- block 1
//!   |-- StoreManager (per store)
//!   |     |-- table: RadixTree      primary keys -> record block
//!   |     |-- IndexManager*         index keys   -> record block
//!   |     +-- SearchIndexManager*   tokens       -> record block
//!   |-- LinkManager (per link)
//!   +-- BlockManager
//! ```
//!
//! The engine trusts its caller to serialize writes; wrap it in a
//! [`TransactionManager`](atlas_concurrency::TransactionManager) to get
//! commit and rollback around every writable transaction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod engine;
pub mod filtered;
pub mod handles;
pub mod index;
pub mod link;
pub mod overridable;
pub mod schema;
pub mod store;

pub use catalog::{Catalog, CATALOG_BLOCK};
pub use engine::Engine;
pub use filtered::FilteredStore;
pub use handles::{ReadableLink, ReadableStore, WritableStore};
pub use index::IndexManager;
pub use link::{LinkManager, StoreId};
pub use overridable::{
    LinkOverrides, OverridableReadableLink, OverridableWritableStore, StoreOverrides,
};
pub use schema::{Index, Link, Schema, SearchIndex, Store};
pub use store::StoreManager;
