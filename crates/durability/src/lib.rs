//! Durability layer for Atlas
//!
//! This crate makes a plain [`File`](atlas_storage::File) transactional by
//! routing every change through a redo/undo log:
//! - LogHeader, LogDeltaHeader: the bit-exact log format
//! - DurableFile: byte-range deltas indexed by an ordered map
//! - PagedDurableFile: one delta per aligned page
//!
//! Both implement `File`, so the block manager runs on top of either one and
//! `persist`/`discard` become commit/rollback of everything written since the
//! previous call.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod durable;
pub mod header;
pub mod paged;

pub use durable::DurableFile;
pub use header::{LogDeltaHeader, LogHeader};
pub use paged::PagedDurableFile;
