//! Declarative schema objects
//!
//! A [`Schema`] names the stores and links of a database. It holds no
//! state of its own; the catalog turns it into store and link managers.
//!
//! ## Derived Indices
//!
//! | Source | Index keys |
//! |--------|------------|
//! | [`Store::new`] | store orders, then primary keys |
//! | [`Store::index`] | declared keys, then missing primary keys |
//! | [`Link`] | mapped child keys, then link orders, then child primary keys |
//!
//! Every index ends with the primary keys of its store, so an index tree
//! holds exactly one entry per record. Duplicate index key lists are
//! ignored.

use atlas_core::{Error, FieldKind, Fields, Orders, Result};
use atlas_search::SearchVersion;
use std::collections::BTreeMap;

// =============================================================================
// Index
// =============================================================================

/// Ordered list of indexed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    keys: Vec<String>,
}

impl Index {
    /// Index over `keys`, in the given order.
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Index {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Indexed fields
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Check whether both indices cover the same keys in the same order.
    pub fn equals(&self, that: &Index) -> bool {
        self == that
    }

    /// Append every key of `keys` that is not indexed yet.
    fn complete(mut self, keys: &[String]) -> Self {
        for key in keys {
            if !self.keys.contains(key) {
                self.keys.push(key.clone());
            }
        }
        self
    }
}

/// Full-text index over one string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIndex {
    key: String,
    version: SearchVersion,
}

impl SearchIndex {
    /// Search index over `key` using the default layout.
    pub fn new(key: impl Into<String>) -> Self {
        SearchIndex {
            key: key.into(),
            version: SearchVersion::default(),
        }
    }

    /// Use the given index layout (builder style).
    pub fn version(mut self, version: SearchVersion) -> Self {
        self.version = version;
        self
    }

    /// Indexed field
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Index layout
    pub fn layout(&self) -> SearchVersion {
        self.version
    }

    /// Check whether both indices cover the same field.
    pub fn equals(&self, that: &SearchIndex) -> bool {
        self.key == that.key
    }
}

// =============================================================================
// Store
// =============================================================================

/// Definition of a record store.
///
/// # Example
///
/// ```ignore
/// let users = Store::new(
///     Fields::new()
///         .with("user_id", Field::string(""))
///         .with("name", Field::string("").searchable()),
///     ["user_id"],
///     Orders::new().with("name", Direction::Increasing),
/// )
/// .index(Index::new(["name"]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    fields: Fields,
    keys: Vec<String>,
    orders: Orders,
    indices: Vec<Index>,
    search_indices: Vec<SearchIndex>,
}

impl Store {
    /// Store of `fields` identified by `keys`, sorted by `orders` by default.
    ///
    /// Adds the default index and one search index per searchable field.
    pub fn new<S: Into<String>>(
        fields: Fields,
        keys: impl IntoIterator<Item = S>,
        orders: Orders,
    ) -> Self {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let search_indices = fields
            .iter()
            .filter(|(_, field)| field.is_searchable())
            .map(|(name, _)| SearchIndex::new(name.clone()))
            .collect();
        let mut store = Store {
            fields,
            keys,
            orders,
            indices: Vec::new(),
            search_indices,
        };
        let index = store.create_index();
        store.add_index(index);
        store
    }

    /// Index serving the default orders of the store.
    pub fn create_index(&self) -> Index {
        Index::new(self.orders.keys()).complete(&self.keys)
    }

    /// Declare an index (builder style).
    pub fn index(mut self, index: Index) -> Self {
        self.add_index(index);
        self
    }

    /// Declare a search index (builder style). Replaces an index on the same field.
    pub fn search_index(mut self, index: SearchIndex) -> Self {
        self.search_indices.retain(|existing| !existing.equals(&index));
        self.search_indices.push(index);
        self
    }

    pub(crate) fn add_index(&mut self, index: Index) {
        let index = index.complete(&self.keys);
        if !self.indices.iter().any(|existing| existing.equals(&index)) {
            self.indices.push(index);
        }
    }

    /// Record fields
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Primary keys
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Default orders
    pub fn orders(&self) -> &Orders {
        &self.orders
    }

    /// Declared and derived indices
    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    /// Declared search indices
    pub fn search_indices(&self) -> &[SearchIndex] {
        &self.search_indices
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.keys.is_empty() {
            return Err(Error::Schema(format!("store \"{}\" has no primary keys", name)));
        }
        let unknown = self
            .keys
            .iter()
            .map(String::as_str)
            .chain(self.orders.keys())
            .chain(self.indices.iter().flat_map(|index| index.keys.iter().map(String::as_str)))
            .find(|key| !self.fields.contains(key));
        if let Some(key) = unknown {
            return Err(Error::Schema(format!(
                "store \"{}\" refers to unknown field \"{}\"",
                name, key
            )));
        }
        for index in &self.search_indices {
            match self.fields.get(&index.key) {
                Some(field) if field.kind() == FieldKind::String => {}
                _ => {
                    return Err(Error::Schema(format!(
                        "store \"{}\" cannot search field \"{}\"",
                        name, index.key
                    )))
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Link
// =============================================================================

/// Relation from the records of a child store to one parent record.
///
/// Each primary key of the parent maps to a field of the child holding its
/// value. A child whose mapped fields are null has no parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    parent: String,
    child: String,
    keys_map: Vec<(String, String)>,
    orders: Orders,
}

impl Link {
    /// Link `child` records to `parent` records through `keys_map`.
    ///
    /// `keys_map` pairs each parent primary key with a child field.
    pub fn new<P: Into<String>, C: Into<String>>(
        parent: impl Into<String>,
        child: impl Into<String>,
        keys_map: impl IntoIterator<Item = (P, C)>,
    ) -> Self {
        Link {
            parent: parent.into(),
            child: child.into(),
            keys_map: keys_map
                .into_iter()
                .map(|(p, c)| (p.into(), c.into()))
                .collect(),
            orders: Orders::new(),
        }
    }

    /// Sort the child records of a parent by `orders` (builder style).
    pub fn orders(mut self, orders: Orders) -> Self {
        self.orders = orders;
        self
    }

    /// Name of the parent store
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Name of the child store
    pub fn child(&self) -> &str {
        &self.child
    }

    /// Pairs of (parent key, child field)
    pub fn keys_map(&self) -> &[(String, String)] {
        &self.keys_map
    }

    /// Orders of the child records
    pub fn child_orders(&self) -> &Orders {
        &self.orders
    }

    /// Index letting the child store serve this link.
    pub fn create_index(&self, child: &Store) -> Index {
        Index::new(
            self.keys_map
                .iter()
                .map(|(_, key)| key.as_str())
                .chain(self.orders.keys()),
        )
        .complete(child.keys())
    }

    fn validate(&self, name: &str, stores: &BTreeMap<String, Store>) -> Result<()> {
        let lookup = |store: &str| {
            stores.get(store).ok_or_else(|| {
                Error::Schema(format!("link \"{}\" refers to unknown store \"{}\"", name, store))
            })
        };
        let parent = lookup(&self.parent)?;
        let child = lookup(&self.child)?;
        let mut parent_keys: Vec<&str> = self.keys_map.iter().map(|(key, _)| key.as_str()).collect();
        parent_keys.sort_unstable();
        let mut expected: Vec<&str> = parent.keys.iter().map(String::as_str).collect();
        expected.sort_unstable();
        if parent_keys != expected {
            return Err(Error::Schema(format!(
                "link \"{}\" must map every primary key of \"{}\"",
                name, self.parent
            )));
        }
        for (parent_key, child_key) in &self.keys_map {
            let (Some(from), Some(to)) = (parent.fields.get(parent_key), child.fields.get(child_key))
            else {
                return Err(Error::Schema(format!(
                    "link \"{}\" maps unknown field \"{}\"",
                    name, child_key
                )));
            };
            if from.kind() != to.kind() {
                return Err(Error::Schema(format!(
                    "link \"{}\" maps \"{}\" to \"{}\" of another kind",
                    name, parent_key, child_key
                )));
            }
        }
        if let Some(key) = self.orders.keys().find(|key| !child.fields.contains(key)) {
            return Err(Error::Schema(format!(
                "link \"{}\" orders by unknown field \"{}\"",
                name, key
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Named stores and links of a database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    stores: BTreeMap<String, Store>,
    links: BTreeMap<String, Link>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a store (builder style). Replaces a store of the same name.
    pub fn store(mut self, name: impl Into<String>, store: Store) -> Self {
        self.stores.insert(name.into(), store);
        self
    }

    /// Declare a link (builder style).
    ///
    /// The child store gains the index serving the link, so declare the
    /// child store first.
    pub fn link(mut self, name: impl Into<String>, link: Link) -> Self {
        if let Some(child) = self.stores.get_mut(&link.child) {
            let index = link.create_index(child);
            child.add_index(index);
        }
        self.links.insert(name.into(), link);
        self
    }

    /// Declared stores by name
    pub fn stores(&self) -> &BTreeMap<String, Store> {
        &self.stores
    }

    /// Declared links by name
    pub fn links(&self) -> &BTreeMap<String, Link> {
        &self.links
    }

    /// Check that every store and link refers to existing fields and stores.
    pub fn validate(&self) -> Result<()> {
        for (name, store) in &self.stores {
            store.validate(name)?;
        }
        for (name, link) in &self.links {
            link.validate(name, &self.stores)?;
        }
        Ok(())
    }
}
