//! Main database entry point for Atlas.
//!
//! This module provides the `Database` struct, the primary entry point for
//! all database operations, and its builder.
//!
//! ## File Stack
//!
//! ```text
//! BlockManager
//!   +-- PagedFile (optional read cache)
//!         +-- DurableFile | PagedDurableFile
//!               |-- atlas.bin   (PhysicalFile, or VirtualFile when ephemeral)
//!               +-- atlas.log   (PhysicalFile, or VirtualFile when ephemeral)
//! ```

use crate::error::Result;
use atlas_concurrency::TransactionManager;
use atlas_durability::{DurableFile, PagedDurableFile};
use atlas_engine::{Engine, Schema};
use atlas_storage::physical::DEFAULT_PAGE_SIZE_LOG2;
use atlas_storage::{File, PagedFile, PhysicalFile, VirtualFile};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the data file inside a database directory.
pub const DATA_FILE: &str = "atlas.bin";

/// Name of the log file inside a database directory.
pub const LOG_FILE: &str = "atlas.log";

/// The Atlas database.
///
/// Every access happens inside a transaction: [`Database::read`] runs
/// concurrently with other readers, [`Database::write`] runs alone and
/// commits when its closure succeeds or rolls back when it fails.
///
/// # Example
///
/// ```ignore
/// use atlasdb::prelude::*;
///
/// let schema = Schema::new().store(
///     "users",
///     Store::new(
///         Fields::new().with("user_id", Field::string("")).with("name", Field::string("")),
///         ["user_id"],
///         Orders::new(),
///     ),
/// );
/// let db = Database::open("./my-db", schema)?;
///
/// db.write(|tx| {
///     tx.store_mut("users")?
///         .insert(&Record::new().with("user_id", "u1").with("name", "Ada"))?;
///     Ok(())
/// })?;
/// let ada = db.read(|tx| tx.store("users")?.lookup(&Record::new().with("user_id", "u1")))?;
///
/// db.close()?;
/// ```
pub struct Database {
    manager: TransactionManager<Engine>,
    config: DatabaseConfig,
}

impl Database {
    /// Open the database in directory `path` with the stores and links of
    /// `schema`.
    pub fn open(path: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        Self::builder().path(path).schema(schema).open()
    }

    /// Create an in-memory database with no disk I/O.
    ///
    /// Transactions still commit and roll back, but all data is lost when
    /// the database is dropped.
    pub fn ephemeral(schema: Schema) -> Result<Self> {
        Self::builder().schema(schema).open()
    }

    /// Create a builder for database configuration.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Run a readable transaction.
    pub fn read<R>(&self, f: impl FnOnce(&Engine) -> atlas_core::Result<R>) -> Result<R> {
        self.manager.read(f).map_err(Into::into)
    }

    /// Run a writable transaction.
    ///
    /// Changes are committed when `f` succeeds. When `f` fails, every change
    /// it made is rolled back and its error is returned.
    pub fn write<R>(&self, f: impl FnOnce(&mut Engine) -> atlas_core::Result<R>) -> Result<R> {
        self.manager.write(f).map_err(Into::into)
    }

    /// Configuration the database was opened with
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Check if this is an ephemeral (no-disk) database.
    pub fn is_ephemeral(&self) -> bool {
        self.config.path.is_none()
    }

    /// Get transaction counters.
    pub fn metrics(&self) -> DatabaseMetrics {
        DatabaseMetrics {
            transactions_committed: self.manager.committed(),
            transactions_rolled_back: self.manager.rolled_back(),
        }
    }

    /// Close the database, releasing its files.
    ///
    /// Every writable transaction is committed when it returns, so there is
    /// nothing left to flush.
    pub fn close(self) -> Result<()> {
        let metrics = self.metrics();
        drop(self.manager.into_inner());
        info!(
            committed = metrics.transactions_committed,
            rolled_back = metrics.transactions_rolled_back,
            "Closed database"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("manager", &self.manager)
            .finish()
    }
}

/// Database metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseMetrics {
    /// Total committed writable transactions
    pub transactions_committed: u64,
    /// Total rolled back writable transactions
    pub transactions_rolled_back: u64,
}

// =============================================================================
// Configuration
// =============================================================================

/// File layout options of a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Directory holding the data and log files, `None` for an in-memory database
    pub path: Option<PathBuf>,
    /// Log whole pages of `2^n` bytes instead of byte ranges
    pub page_size_log2: Option<u32>,
    /// Cache up to this many pages of the data file in memory
    pub max_cached_pages: Option<usize>,
}

/// Builder for database configuration.
///
/// # Example
///
/// ```ignore
/// // Disk-backed, page-granular log and a read cache
/// let db = Database::builder()
///     .path("./my-db")
///     .paged(12)
///     .page_cache(256)
///     .schema(schema)
///     .open()?;
///
/// // Unit testing: no disk at all
/// let db = Database::ephemeral(schema)?;
/// ```
#[derive(Debug, Default)]
pub struct DatabaseBuilder {
    config: DatabaseConfig,
    schema: Schema,
}

impl DatabaseBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: DatabaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the database directory path.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Log whole pages of `2^page_size_log2` bytes.
    pub fn paged(mut self, page_size_log2: u32) -> Self {
        self.config.page_size_log2 = Some(page_size_log2);
        self
    }

    /// Cache up to `max_pages` pages of the data file.
    ///
    /// Pages are as large as the logged pages, or as the filesystem blocks
    /// when the log is not paged.
    pub fn page_cache(mut self, max_pages: usize) -> Self {
        self.config.max_cached_pages = Some(max_pages);
        self
    }

    /// Declare the stores and links of the database.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Open the database.
    pub fn open(self) -> Result<Database> {
        let DatabaseBuilder { config, schema } = self;
        let file = match &config.path {
            Some(path) => {
                let bin = PhysicalFile::open(path.join(DATA_FILE), false)?;
                let log = PhysicalFile::open(path.join(LOG_FILE), false)?;
                let hint = bin.hint()?;
                info!(path = %path.display(), "Opening database");
                stack(bin, log, &config, hint)?
            }
            None => stack(
                VirtualFile::new(0),
                VirtualFile::new(0),
                &config,
                DEFAULT_PAGE_SIZE_LOG2,
            )?,
        };
        let engine = Engine::open(file, schema)?;
        Ok(Database {
            manager: TransactionManager::new(engine),
            config,
        })
    }
}

/// Durable file over `bin` and `log`, with the read cache if configured.
fn stack<B, L>(bin: B, log: L, config: &DatabaseConfig, hint: u32) -> Result<Box<dyn File>>
where
    B: File + 'static,
    L: File + 'static,
{
    let durable: Box<dyn File> = match config.page_size_log2 {
        Some(page_size_log2) => Box::new(PagedDurableFile::open(bin, log, page_size_log2)?),
        None => Box::new(DurableFile::open(bin, log)?),
    };
    Ok(match config.max_cached_pages {
        Some(max_pages) => {
            let page_size_log2 = config.page_size_log2.unwrap_or(hint);
            Box::new(PagedFile::new(durable, page_size_log2, max_pages))
        }
        None => durable,
    })
}
