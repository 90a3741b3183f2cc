//! The engine: every store and link of one database file
//!
//! Opening an engine validates the schema, reconciles it with the catalog
//! and commits the result, so a database that opened successfully always
//! matches its schema on disk. Records are then read and written through
//! store and link handles.

use crate::catalog::Catalog;
use crate::handles::{ReadableLink, ReadableStore, WritableStore};
use crate::link::{LinkManager, StoreId};
use crate::schema::Schema;
use crate::store::StoreManager;
use atlas_concurrency::Transactional;
use atlas_core::{Error, Result};
use atlas_storage::{BlockManager, File};
use std::collections::BTreeMap;
use tracing::{error, info};

/// Stores and links over one block manager.
#[derive(Debug)]
pub struct Engine {
    blocks: BlockManager,
    stores: Vec<StoreManager>,
    store_ids: BTreeMap<String, StoreId>,
    links: BTreeMap<String, LinkManager>,
}

impl Engine {
    /// Open the database in `file` with the stores and links of `schema`.
    ///
    /// Stores and indices missing from the file are created, and those not
    /// declared any more are deleted, before the engine is returned.
    pub fn open(file: Box<dyn File>, schema: Schema) -> Result<Self> {
        schema.validate()?;
        let mut blocks = BlockManager::open(file)?;
        let managers = match Self::reconcile(&mut blocks, &schema) {
            Ok(managers) => managers,
            Err(e) => {
                error!(error = %e, "Failed to reconcile schema, discarding changes");
                blocks.discard()?;
                return Err(e);
            }
        };
        blocks.persist()?;

        let mut stores = Vec::with_capacity(managers.len());
        let mut store_ids = BTreeMap::new();
        for (name, manager) in managers {
            store_ids.insert(name, StoreId(stores.len()));
            stores.push(manager);
        }
        let mut links = BTreeMap::new();
        for (name, link) in schema.links() {
            let id = |store: &str| {
                store_ids.get(store).copied().ok_or_else(|| {
                    Error::Schema(format!("link \"{}\" refers to unknown store \"{}\"", name, store))
                })
            };
            let manager = LinkManager::new(
                id(link.parent())?,
                id(link.child())?,
                link.keys_map().to_vec(),
                link.child_orders().clone(),
            );
            links.insert(name.clone(), manager);
        }
        info!(stores = stores.len(), links = links.len(), "Opened engine");
        Ok(Engine {
            blocks,
            stores,
            store_ids,
            links,
        })
    }

    fn reconcile(
        blocks: &mut BlockManager,
        schema: &Schema,
    ) -> Result<BTreeMap<String, StoreManager>> {
        let mut catalog = Catalog::load(blocks)?;
        let managers = catalog.reconcile(blocks, schema)?;
        catalog.save(blocks)?;
        Ok(managers)
    }

    fn store_id(&self, name: &str) -> Result<StoreId> {
        self.store_ids
            .get(name)
            .copied()
            .ok_or_else(|| Error::Schema(format!("unknown store \"{}\"", name)))
    }

    /// Names of the stores
    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.store_ids.keys().map(String::as_str)
    }

    /// Names of the links
    pub fn link_names(&self) -> impl Iterator<Item = &str> {
        self.links.keys().map(String::as_str)
    }

    /// Read access to store `name`.
    pub fn store(&self, name: &str) -> Result<ReadableStore<'_>> {
        let StoreId(id) = self.store_id(name)?;
        Ok(ReadableStore::new(&self.stores[id], &self.blocks))
    }

    /// Write access to store `name`.
    pub fn store_mut(&mut self, name: &str) -> Result<WritableStore<'_>> {
        let StoreId(id) = self.store_id(name)?;
        Ok(WritableStore::new(&mut self.stores[id], &mut self.blocks))
    }

    /// Read access to link `name`.
    pub fn link(&self, name: &str) -> Result<ReadableLink<'_>> {
        let link = self
            .links
            .get(name)
            .ok_or_else(|| Error::Schema(format!("unknown link \"{}\"", name)))?;
        let StoreId(parent) = link.parent();
        let StoreId(child) = link.child();
        Ok(ReadableLink::new(
            link,
            &self.stores[parent],
            &self.stores[child],
            &self.blocks,
        ))
    }

    /// The underlying block manager
    pub fn blocks(&self) -> &BlockManager {
        &self.blocks
    }
}

impl Transactional for Engine {
    fn persist(&mut self) -> Result<()> {
        self.blocks.persist()
    }

    fn discard(&mut self) -> Result<()> {
        self.blocks.discard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Link, Store};
    use atlas_core::{Direction, Field, Fields, Filters, Orders, Record};
    use atlas_durability::DurableFile;
    use atlas_storage::{PhysicalFile, VirtualFile};

    fn schema() -> Schema {
        Schema::new()
            .store(
                "users",
                Store::new(
                    Fields::new()
                        .with("user_id", Field::string(""))
                        .with("name", Field::string("").searchable()),
                    ["user_id"],
                    Orders::new(),
                ),
            )
            .store(
                "posts",
                Store::new(
                    Fields::new()
                        .with("post_id", Field::string(""))
                        .with("user_id", Field::nullable_string(None))
                        .with("title", Field::string("")),
                    ["post_id"],
                    Orders::new(),
                ),
            )
            .link(
                "user_posts",
                Link::new("users", "posts", [("user_id", "user_id")])
                    .orders(Orders::new().with("title", Direction::Increasing)),
            )
    }

    fn populate(engine: &mut Engine) {
        let mut users = engine.store_mut("users").unwrap();
        users
            .insert(&Record::new().with("user_id", "u1").with("name", "Ada Lovelace"))
            .unwrap();
        let mut posts = engine.store_mut("posts").unwrap();
        for (post_id, title) in [("p1", "Notes"), ("p2", "Engines")] {
            posts
                .insert(
                    &Record::new()
                        .with("post_id", post_id)
                        .with("user_id", "u1")
                        .with("title", title),
                )
                .unwrap();
        }
        engine.persist().unwrap();
    }

    #[test]
    fn test_stores_and_links() {
        let mut engine = Engine::open(Box::new(VirtualFile::new(0)), schema()).unwrap();
        populate(&mut engine);
        assert_eq!(engine.store_names().collect::<Vec<_>>(), ["posts", "users"]);

        let link = engine.link("user_posts").unwrap();
        let parent = Record::new().with("user_id", "u1");
        let titles: Vec<_> = link
            .filter(Some(&parent), None, None)
            .unwrap()
            .iter()
            .map(|post| post.get("title").and_then(|v| v.as_str()).unwrap().to_string())
            .collect();
        assert_eq!(titles, ["Engines", "Notes"]);

        let users = engine.store("users").unwrap();
        assert_eq!(users.search("lov", None, None).unwrap().len(), 1);
        assert!(engine.store("comments").unwrap_err().to_string().contains("comments"));
        assert!(engine.link("likes").is_err());
    }

    #[test]
    fn test_discard_rolls_back_uncommitted_records() {
        let mut engine = Engine::open(
            Box::new(DurableFile::open(VirtualFile::new(0), VirtualFile::new(0)).unwrap()),
            schema(),
        )
        .unwrap();
        populate(&mut engine);
        engine
            .store_mut("posts")
            .unwrap()
            .remove(&Record::new().with("post_id", "p1"))
            .unwrap();
        assert_eq!(engine.store("posts").unwrap().length().unwrap(), 1);
        engine.discard().unwrap();
        assert_eq!(engine.store("posts").unwrap().length().unwrap(), 2);
    }

    #[test]
    fn test_reopen_physical_file() {
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            let bin = PhysicalFile::open(dir.path().join("atlas.bin"), false).unwrap();
            let log = PhysicalFile::open(dir.path().join("atlas.log"), false).unwrap();
            let file = DurableFile::open(bin, log).unwrap();
            Engine::open(Box::new(file), schema()).unwrap()
        };
        let mut engine = open();
        populate(&mut engine);
        drop(engine);

        let engine = open();
        let posts = engine.store("posts").unwrap();
        let records = posts
            .filter(&Filters::new().equal("user_id", "u1"), None, None, None)
            .unwrap();
        assert_eq!(records.len(), 2);
        let post = posts.lookup(&Record::new().with("post_id", "p2")).unwrap();
        let user = engine.link("user_posts").unwrap().lookup(&post).unwrap().unwrap();
        assert_eq!(user.get("name").and_then(|v| v.as_str()), Some("Ada Lovelace"));
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let schema = Schema::new().store(
            "users",
            Store::new(Fields::new().with("id", Field::integer(0)), ["user_id"], Orders::new()),
        );
        let error = Engine::open(Box::new(VirtualFile::new(0)), schema).unwrap_err();
        assert!(matches!(error, Error::Schema(_)));
    }
}
