//! Link managers
//!
//! A link relates child records to the parent record whose primary keys they
//! hold. It owns no trees: `filter` is a filter on the child store and
//! `lookup` a lookup in the parent store. The child store carries an index
//! starting with the mapped fields, so `filter` is served by one branch.

use crate::store::StoreManager;
use atlas_core::{Filter, Filters, Orders, Record, Result, Value};
use atlas_storage::BlockManager;

/// Stable handle of a store within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub usize);

/// Resolves a link between two stores.
#[derive(Debug, Clone)]
pub struct LinkManager {
    parent: StoreId,
    child: StoreId,
    keys_map: Vec<(String, String)>,
    orders: Orders,
}

impl LinkManager {
    /// Link `child` to `parent` through pairs of (parent key, child field).
    pub fn new(
        parent: StoreId,
        child: StoreId,
        keys_map: Vec<(String, String)>,
        orders: Orders,
    ) -> Self {
        LinkManager {
            parent,
            child,
            keys_map,
            orders,
        }
    }

    /// Handle of the parent store
    pub fn parent(&self) -> StoreId {
        self.parent
    }

    /// Handle of the child store
    pub fn child(&self) -> StoreId {
        self.child
    }

    /// Child records of the parent with the keys of `parent_keys`.
    ///
    /// Without parent keys the children without parent are returned.
    pub fn filter(
        &self,
        child: &StoreManager,
        blocks: &BlockManager,
        parent_keys: Option<&Record>,
        anchor: Option<&Record>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let mut filters = Filters::new();
        for (parent_key, child_key) in &self.keys_map {
            let value = parent_keys
                .and_then(|record| record.get(parent_key))
                .cloned()
                .unwrap_or(Value::Null);
            let nullable = child
                .record_manager()
                .fields()
                .get(child_key)
                .map_or(false, |field| field.is_nullable());
            if value.is_null() && !nullable {
                return Ok(Vec::new());
            }
            filters.set(child_key.clone(), Filter::Equal(value));
        }
        child.filter(blocks, &filters, Some(&self.orders), anchor, limit)
    }

    /// Parent of `child_record`, or `None` when a mapped field is null.
    pub fn lookup(
        &self,
        parent: &StoreManager,
        blocks: &BlockManager,
        child_record: &Record,
    ) -> Result<Option<Record>> {
        let mut keys_record = Record::new();
        for (parent_key, child_key) in &self.keys_map {
            match child_record.get(child_key) {
                None | Some(Value::Null) => return Ok(None),
                Some(value) => keys_record.set(parent_key.clone(), value.clone()),
            }
        }
        parent.lookup(blocks, &keys_record).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Index;
    use atlas_core::{Direction, Field, Fields};
    use atlas_storage::VirtualFile;

    struct Fixture {
        blocks: BlockManager,
        users: StoreManager,
        posts: StoreManager,
        link: LinkManager,
    }

    fn fixture() -> Fixture {
        let mut blocks = BlockManager::open(Box::new(VirtualFile::new(0))).unwrap();
        let mut users = StoreManager::create(
            &mut blocks,
            Fields::new()
                .with("user_id", Field::string(""))
                .with("name", Field::string("")),
            vec!["user_id".to_string()],
            Orders::new(),
        )
        .unwrap();
        let mut posts = StoreManager::create(
            &mut blocks,
            Fields::new()
                .with("post_id", Field::string(""))
                .with("user_id", Field::nullable_string(None))
                .with("posted", Field::integer(0)),
            vec!["post_id".to_string()],
            Orders::new(),
        )
        .unwrap();
        posts
            .add_index(&mut blocks, &Index::new(["user_id", "posted", "post_id"]))
            .unwrap();
        users
            .insert(&mut blocks, &Record::new().with("user_id", "u1").with("name", "Ada"))
            .unwrap();
        let rows: [(&str, Option<&str>, i64); 4] = [
            ("p1", Some("u1"), 10),
            ("p2", Some("u1"), 30),
            ("p3", None, 20),
            ("p4", Some("u1"), 20),
        ];
        for (post_id, user_id, posted) in rows {
            let record = Record::new()
                .with("post_id", post_id)
                .with("user_id", user_id)
                .with("posted", posted);
            posts.insert(&mut blocks, &record).unwrap();
        }
        let link = LinkManager::new(
            StoreId(0),
            StoreId(1),
            vec![("user_id".to_string(), "user_id".to_string())],
            Orders::new().with("posted", Direction::Decreasing),
        );
        Fixture {
            blocks,
            users,
            posts,
            link,
        }
    }

    fn post_ids(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .map(|record| record.get("post_id").and_then(|v| v.as_str()).unwrap())
            .collect()
    }

    #[test]
    fn test_filter_lists_children_in_link_order() {
        let f = fixture();
        let parent = Record::new().with("user_id", "u1");
        let children = f.link.filter(&f.posts, &f.blocks, Some(&parent), None, None).unwrap();
        assert_eq!(post_ids(&children), ["p2", "p4", "p1"]);

        let anchor = Record::new().with("post_id", "p2");
        let children = f
            .link
            .filter(&f.posts, &f.blocks, Some(&parent), Some(&anchor), Some(1))
            .unwrap();
        assert_eq!(post_ids(&children), ["p4"]);
    }

    #[test]
    fn test_filter_without_parent_lists_orphans() {
        let f = fixture();
        let orphans = f.link.filter(&f.posts, &f.blocks, None, None, None).unwrap();
        assert_eq!(post_ids(&orphans), ["p3"]);
        let stranger = Record::new().with("user_id", "u9");
        assert!(f
            .link
            .filter(&f.posts, &f.blocks, Some(&stranger), None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_lookup_resolves_parent() {
        let f = fixture();
        let post = f.posts.lookup(&f.blocks, &Record::new().with("post_id", "p1")).unwrap();
        let parent = f.link.lookup(&f.users, &f.blocks, &post).unwrap().unwrap();
        assert_eq!(parent.get("name").and_then(|v| v.as_str()), Some("Ada"));

        let orphan = f.posts.lookup(&f.blocks, &Record::new().with("post_id", "p3")).unwrap();
        assert_eq!(f.link.lookup(&f.users, &f.blocks, &orphan).unwrap(), None);

        let dangling = Record::new().with("user_id", "u9");
        assert!(f.link.lookup(&f.users, &f.blocks, &dangling).unwrap_err().is_not_found());
    }
}
