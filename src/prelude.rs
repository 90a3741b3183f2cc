//! Convenient imports for Atlas.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use atlasdb::prelude::*;
//!
//! let db = Database::ephemeral(schema)?;
//! db.read(|tx| tx.store("users")?.length())?;
//! ```

// Main entry point
pub use crate::database::{Database, DatabaseBuilder, DatabaseConfig};

// Error handling
pub use crate::error::{Error, Result};

// Schema
pub use atlas_engine::{Index, Link, Schema, SearchIndex, Store};

// Records and queries
pub use atlas_core::{Direction, Field, FieldKind, Fields, Filter, Filters, Orders, Record, Value};

// Search
pub use atlas_search::{SearchResult, SearchVersion};

// Transactions
pub use atlas_engine::{Engine, ReadableLink, ReadableStore, WritableStore};
