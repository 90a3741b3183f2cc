//! # Atlas
//!
//! Embedded, transactional, ordered-record database.
//!
//! Atlas stores typed records in named stores. Each store keeps its records
//! sorted by primary keys and by any number of secondary indices, answers
//! equality filters in any order, and runs prefix full-text search over its
//! searchable fields. Links relate the records of two stores.
//!
//! ## Quick Start
//!
//! ```ignore
//! use atlasdb::prelude::*;
//!
//! let schema = Schema::new()
//!     .store("users", Store::new(user_fields, ["user_id"], Orders::new()))
//!     .store("posts", Store::new(post_fields, ["post_id"], Orders::new()))
//!     .link("user_posts", Link::new("users", "posts", [("user_id", "user_id")]));
//!
//! let db = Database::open("./my-db", schema)?;
//!
//! db.write(|tx| {
//!     tx.store_mut("users")?.insert(&Record::new().with("user_id", "u1").with("name", "Ada"))?;
//!     Ok(())
//! })?;
//!
//! let posts = db.read(|tx| {
//!     tx.link("user_posts")?.filter(Some(&Record::new().with("user_id", "u1")), None, Some(20))
//! })?;
//!
//! db.close()?;
//! ```
//!
//! ## Durability
//!
//! Every writable transaction commits through a redo/undo log. A crash
//! leaves the database as of the last committed transaction; the next open
//! undoes whatever the interrupted transaction had written.
//!
//! ## Crates
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `atlas-core` | errors, values, records, codec, orders, filters |
//! | `atlas-storage` | files, block manager, radix tree, sorted merge |
//! | `atlas-durability` | durable files and their log format |
//! | `atlas-search` | tokenizer and search indices |
//! | `atlas-concurrency` | transaction manager |
//! | `atlas-engine` | schema, stores, links, catalog |

#![warn(missing_docs)]

mod database;
mod error;

pub mod prelude;

// Re-export main entry points
pub use database::{Database, DatabaseBuilder, DatabaseConfig, DatabaseMetrics, DATA_FILE, LOG_FILE};
pub use error::{Error, Result};

