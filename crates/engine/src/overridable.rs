//! Store and link handles with replaceable operations
//!
//! An override receives the default handle together with the arguments of
//! the call, so it can decorate the default behavior or replace it outright.
//! Operations without an override go straight to the default handle.
//!
//! ```ignore
//! let overrides = StoreOverrides::new().insert(|store, record| {
//!     let stamped = record.clone().with("updated", now());
//!     store.insert(&stamped)
//! });
//! let mut users = OverridableWritableStore::new(engine.store_mut("users")?, &overrides);
//! users.insert(&record)?;
//! ```

use crate::handles::{ReadableLink, WritableStore};
use atlas_core::{Filters, Orders, Record, Result};
use std::fmt;

type WriteOverride = Box<dyn Fn(&mut WritableStore<'_>, &Record) -> Result<bool> + Send + Sync>;
type RemoveOverride = Box<dyn Fn(&mut WritableStore<'_>, &Record) -> Result<()> + Send + Sync>;
type LookupOverride = Box<dyn Fn(&WritableStore<'_>, &Record) -> Result<Record> + Send + Sync>;
type FilterOverride = Box<
    dyn Fn(
            &WritableStore<'_>,
            &Filters,
            Option<&Orders>,
            Option<&Record>,
            Option<usize>,
        ) -> Result<Vec<Record>>
        + Send
        + Sync,
>;
type LinkFilterOverride = Box<
    dyn Fn(&ReadableLink<'_>, Option<&Record>, Option<&Record>, Option<usize>) -> Result<Vec<Record>>
        + Send
        + Sync,
>;
type LinkLookupOverride =
    Box<dyn Fn(&ReadableLink<'_>, &Record) -> Result<Option<Record>> + Send + Sync>;

// =============================================================================
// Stores
// =============================================================================

/// Replacements for store operations.
#[derive(Default)]
pub struct StoreOverrides {
    insert: Option<WriteOverride>,
    update: Option<WriteOverride>,
    remove: Option<RemoveOverride>,
    lookup: Option<LookupOverride>,
    filter: Option<FilterOverride>,
}

impl StoreOverrides {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `insert` (builder style).
    pub fn insert(
        mut self,
        f: impl Fn(&mut WritableStore<'_>, &Record) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        self.insert = Some(Box::new(f));
        self
    }

    /// Override `update` (builder style).
    pub fn update(
        mut self,
        f: impl Fn(&mut WritableStore<'_>, &Record) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    /// Override `remove` (builder style).
    pub fn remove(
        mut self,
        f: impl Fn(&mut WritableStore<'_>, &Record) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.remove = Some(Box::new(f));
        self
    }

    /// Override `lookup` (builder style).
    pub fn lookup(
        mut self,
        f: impl Fn(&WritableStore<'_>, &Record) -> Result<Record> + Send + Sync + 'static,
    ) -> Self {
        self.lookup = Some(Box::new(f));
        self
    }

    /// Override `filter` (builder style).
    pub fn filter(
        mut self,
        f: impl Fn(
                &WritableStore<'_>,
                &Filters,
                Option<&Orders>,
                Option<&Record>,
                Option<usize>,
            ) -> Result<Vec<Record>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.filter = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for StoreOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOverrides")
            .field("insert", &self.insert.is_some())
            .field("update", &self.update.is_some())
            .field("remove", &self.remove.is_some())
            .field("lookup", &self.lookup.is_some())
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// Writable store whose operations may be overridden.
#[derive(Debug)]
pub struct OverridableWritableStore<'a> {
    store: WritableStore<'a>,
    overrides: &'a StoreOverrides,
}

impl<'a> OverridableWritableStore<'a> {
    /// Apply `overrides` to `store`.
    pub fn new(store: WritableStore<'a>, overrides: &'a StoreOverrides) -> Self {
        OverridableWritableStore { store, overrides }
    }

    /// The default handle
    pub fn inner(&mut self) -> &mut WritableStore<'a> {
        &mut self.store
    }

    /// Insert or replace `record`.
    pub fn insert(&mut self, record: &Record) -> Result<bool> {
        match &self.overrides.insert {
            Some(f) => f(&mut self.store, record),
            None => self.store.insert(record),
        }
    }

    /// Merge `record` into the stored record.
    pub fn update(&mut self, record: &Record) -> Result<bool> {
        match &self.overrides.update {
            Some(f) => f(&mut self.store, record),
            None => self.store.update(record),
        }
    }

    /// Remove the record with the primary keys of `keys_record`.
    pub fn remove(&mut self, keys_record: &Record) -> Result<()> {
        match &self.overrides.remove {
            Some(f) => f(&mut self.store, keys_record),
            None => self.store.remove(keys_record),
        }
    }

    /// The record with the primary keys of `keys_record`.
    pub fn lookup(&self, keys_record: &Record) -> Result<Record> {
        match &self.overrides.lookup {
            Some(f) => f(&self.store, keys_record),
            None => self.store.lookup(keys_record),
        }
    }

    /// Records matching `filters`.
    pub fn filter(
        &self,
        filters: &Filters,
        orders: Option<&Orders>,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        match &self.overrides.filter {
            Some(f) => f(&self.store, filters, orders, anchor, limit),
            None => self.store.filter(filters, orders, anchor, limit),
        }
    }

    /// Number of records stored.
    pub fn length(&self) -> Result<u64> {
        self.store.length()
    }

    /// Remove every record.
    pub fn vacate(&mut self) -> Result<()> {
        self.store.vacate()
    }
}

// =============================================================================
// Links
// =============================================================================

/// Replacements for link operations.
#[derive(Default)]
pub struct LinkOverrides {
    filter: Option<LinkFilterOverride>,
    lookup: Option<LinkLookupOverride>,
}

impl LinkOverrides {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `filter` (builder style).
    pub fn filter(
        mut self,
        f: impl Fn(&ReadableLink<'_>, Option<&Record>, Option<&Record>, Option<usize>) -> Result<Vec<Record>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    /// Override `lookup` (builder style).
    pub fn lookup(
        mut self,
        f: impl Fn(&ReadableLink<'_>, &Record) -> Result<Option<Record>> + Send + Sync + 'static,
    ) -> Self {
        self.lookup = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for LinkOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkOverrides")
            .field("filter", &self.filter.is_some())
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}

/// Readable link whose operations may be overridden.
#[derive(Debug, Clone, Copy)]
pub struct OverridableReadableLink<'a> {
    link: ReadableLink<'a>,
    overrides: &'a LinkOverrides,
}

impl<'a> OverridableReadableLink<'a> {
    /// Apply `overrides` to `link`.
    pub fn new(link: ReadableLink<'a>, overrides: &'a LinkOverrides) -> Self {
        OverridableReadableLink { link, overrides }
    }

    /// Children of the parent with the keys of `parent_keys`.
    pub fn filter(
        &self,
        parent_keys: Option<&Record>,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        match &self.overrides.filter {
            Some(f) => f(&self.link, parent_keys, anchor, limit),
            None => self.link.filter(parent_keys, anchor, limit),
        }
    }

    /// Parent of `child_record`.
    pub fn lookup(&self, child_record: &Record) -> Result<Option<Record>> {
        match &self.overrides.lookup {
            Some(f) => f(&self.link, child_record),
            None => self.link.lookup(child_record),
        }
    }
}
