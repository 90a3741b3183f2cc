//! Transaction coordination for Atlas
//!
//! The storage engine is single-writer: trees, tables and the block manager
//! trust their caller to never overlap mutations. This crate provides that
//! caller:
//! - Transactional: a resource with `persist` and `discard`
//! - TransactionManager: shared readers, serialized writers, commit on
//!   success and rollback on error

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;

pub use manager::{TransactionManager, Transactional};
