//! Persisted catalog of stores
//!
//! The catalog maps every store to the root blocks of its table, indices and
//! search indices so that a database can be reopened. It is the first block
//! ever allocated in a file.
//!
//! ## Block Layout
//!
//! ```text
//! +-----------+-------------+---------------------+
//! | crc32 (4) | length (4)  | bincode payload ... |
//! +-----------+-------------+---------------------+
//! ```
//!
//! The checksum covers the payload. Both integers are big-endian.
//!
//! ## Reconciliation
//!
//! On open the declared schema is compared with the catalog:
//!
//! | Declared | Persisted | Action |
//! |----------|-----------|--------|
//! | store | - | create the store and its indices |
//! | - | store | delete the store |
//! | index | - | build it from a table scan |
//! | - | index | drop it |
//! | fields or keys differ | | schema error |

use crate::index::IndexManager;
use crate::schema::Schema;
use crate::store::StoreManager;
use atlas_core::binary::{self, Endian};
use atlas_core::{Error, Fields, Orders, RecordManager, Result};
use atlas_search::{SearchIndexManager, SearchVersion};
use atlas_storage::{BlockId, BlockManager};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Block holding the catalog.
pub const CATALOG_BLOCK: BlockId = 1;

const HEADER_LENGTH: usize = 8;

/// Persisted index of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Indexed fields
    pub keys: Vec<String>,
    /// Root block of the index tree
    pub root: BlockId,
}

/// Persisted search index of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    /// Indexed field
    pub key: String,
    /// Index layout
    pub version: SearchVersion,
    /// Root block of the index tree
    pub root: BlockId,
}

/// Persisted state of one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    /// Record fields
    pub fields: Fields,
    /// Primary keys
    pub keys: Vec<String>,
    /// Root block of the table
    pub table: BlockId,
    /// Secondary indices
    pub indices: Vec<IndexEntry>,
    /// Search indices
    pub search_indices: Vec<SearchIndexEntry>,
}

impl StoreEntry {
    fn describe(store: &StoreManager) -> Self {
        StoreEntry {
            fields: store.record_manager().fields().clone(),
            keys: store.keys().to_vec(),
            table: store.table_root(),
            indices: store
                .indices()
                .iter()
                .map(|index| IndexEntry {
                    keys: index.keys().to_vec(),
                    root: index.root(),
                })
                .collect(),
            search_indices: store
                .search_indices()
                .iter()
                .map(|index| SearchIndexEntry {
                    key: index.key().to_string(),
                    version: index.version(),
                    root: index.root(),
                })
                .collect(),
        }
    }

    fn open(&self, orders: Orders) -> StoreManager {
        let record_manager = RecordManager::new(self.fields.clone());
        let indices = self
            .indices
            .iter()
            .map(|entry| IndexManager::open(record_manager.clone(), entry.keys.clone(), entry.root))
            .collect();
        let search_indices = self
            .search_indices
            .iter()
            .map(|entry| {
                SearchIndexManager::open(
                    record_manager.clone(),
                    entry.key.clone(),
                    entry.root,
                    entry.version,
                )
            })
            .collect();
        StoreManager::open(
            self.fields.clone(),
            self.keys.clone(),
            orders,
            self.table,
            indices,
            search_indices,
        )
    }
}

/// Stores known to a database file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    stores: BTreeMap<String, StoreEntry>,
}

impl Catalog {
    /// Read the catalog, creating an empty one in an empty file.
    pub fn load(blocks: &mut BlockManager) -> Result<Self> {
        if blocks.allocated_ids() == 0 {
            let catalog = Catalog::default();
            let encoded = catalog.encode()?;
            let bid = blocks.create_block(encoded.len() as u64)?;
            if bid != CATALOG_BLOCK {
                return Err(Error::Corruption(format!(
                    "catalog allocated at block {} instead of {}",
                    bid, CATALOG_BLOCK
                )));
            }
            blocks.write_block(bid, &encoded)?;
            info!(block = bid, "Created catalog");
            return Ok(catalog);
        }
        if !blocks.is_live(CATALOG_BLOCK) {
            return Err(Error::Corruption("missing catalog block".to_string()));
        }
        Self::decode(&blocks.read_block(CATALOG_BLOCK)?)
    }

    /// Write the catalog back to its block.
    pub fn save(&self, blocks: &mut BlockManager) -> Result<()> {
        let encoded = self.encode()?;
        blocks.resize_block(CATALOG_BLOCK, encoded.len() as u64)?;
        blocks.write_block(CATALOG_BLOCK, &encoded)
    }

    /// Persisted stores by name
    pub fn stores(&self) -> &BTreeMap<String, StoreEntry> {
        &self.stores
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)
            .map_err(|e| Error::Corruption(format!("cannot encode catalog: {}", e)))?;
        let mut buffer = vec![0u8; HEADER_LENGTH];
        binary::set_unsigned(&mut buffer, 0, 4, crc32fast::hash(&payload) as u64, Endian::Big)?;
        binary::set_unsigned(&mut buffer, 4, 4, payload.len() as u64, Endian::Big)?;
        buffer.extend_from_slice(&payload);
        Ok(buffer)
    }

    fn decode(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < HEADER_LENGTH {
            return Err(Error::Corruption("truncated catalog header".to_string()));
        }
        let checksum = binary::unsigned(buffer, 0, 4, Endian::Big)? as u32;
        let length = binary::unsigned(buffer, 4, 4, Endian::Big)? as usize;
        let payload = buffer
            .get(HEADER_LENGTH..HEADER_LENGTH + length)
            .ok_or_else(|| Error::Corruption("truncated catalog payload".to_string()))?;
        if crc32fast::hash(payload) != checksum {
            return Err(Error::Corruption("catalog checksum mismatch".to_string()));
        }
        bincode::deserialize(payload)
            .map_err(|e| Error::Corruption(format!("cannot decode catalog: {}", e)))
    }

    /// Bring the stores in `blocks` in line with `schema`.
    ///
    /// Returns a manager for every declared store, by name.
    pub fn reconcile(
        &mut self,
        blocks: &mut BlockManager,
        schema: &Schema,
    ) -> Result<BTreeMap<String, StoreManager>> {
        let undeclared: Vec<String> = self
            .stores
            .keys()
            .filter(|name| !schema.stores().contains_key(*name))
            .cloned()
            .collect();
        for name in undeclared {
            if let Some(entry) = self.stores.remove(&name) {
                entry.open(Orders::new()).delete(blocks)?;
                info!(store = %name, "Deleted undeclared store");
            }
        }
        let mut managers = BTreeMap::new();
        for (name, store) in schema.stores() {
            let mut manager = match self.stores.get(name) {
                Some(entry) => {
                    if entry.fields != *store.fields() {
                        return Err(Error::Schema(format!(
                            "fields of store \"{}\" differ from the persisted fields",
                            name
                        )));
                    }
                    if entry.keys != store.keys() {
                        return Err(Error::Schema(format!(
                            "keys of store \"{}\" differ from the persisted keys",
                            name
                        )));
                    }
                    entry.open(store.orders().clone())
                }
                None => {
                    info!(store = %name, "Creating store");
                    StoreManager::create(
                        blocks,
                        store.fields().clone(),
                        store.keys().to_vec(),
                        store.orders().clone(),
                    )?
                }
            };
            let stale: Vec<Vec<String>> = manager
                .indices()
                .iter()
                .filter(|index| !store.indices().iter().any(|declared| declared.keys() == index.keys()))
                .map(|index| index.keys().to_vec())
                .collect();
            for keys in stale {
                manager.drop_index(blocks, &keys)?;
            }
            let stale: Vec<String> = manager
                .search_indices()
                .iter()
                .filter(|index| {
                    !store
                        .search_indices()
                        .iter()
                        .any(|declared| declared.key() == index.key())
                })
                .map(|index| index.key().to_string())
                .collect();
            for key in stale {
                manager.drop_search_index(blocks, &key)?;
            }
            for index in store.indices() {
                manager.add_index(blocks, index)?;
            }
            for index in store.search_indices() {
                manager.add_search_index(blocks, index)?;
            }
            self.stores.insert(name.clone(), StoreEntry::describe(&manager));
            managers.insert(name.clone(), manager);
        }
        Ok(managers)
    }
}
