//! Storage layer for Atlas
//!
//! This crate implements everything below the record level:
//! - File: the byte-addressable file contract, with in-memory, OS-backed and
//!   page-cached implementations
//! - BlockManager: variable-length blocks addressed by stable ids
//! - RadixTree: ordered multi-component keys over blocks
//! - merge: intersection and union of seekable sorted streams

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blocks;
pub mod file;
pub mod merge;
pub mod paged;
pub mod physical;
pub mod tree;

pub use blocks::{BlockId, BlockManager};
pub use file::{File, VirtualFile};
pub use merge::{intersection, union, Intersection, Seekable, SortedCursor, Union};
pub use paged::PagedFile;
pub use physical::PhysicalFile;
pub use tree::{Cursor, Entries, RadixTree, Relationship};
