//! Radix tree over multi-component byte-string keys
//!
//! Keys are sequences of byte-string components (one per indexed field).
//! Each component is walked nibble by nibble through path-compressed nodes;
//! when a component ends, its node's `subtree` holds every key that continues
//! with a further component, and its `resident` holds the value of the key
//! that ends there. Every node lives in its own block.
//!
//! ## Traversal Order
//!
//! Within one component, shorter byte strings sort before their extensions and
//! siblings sort by nibble. Across components, a key sorts before the keys it
//! is a proper prefix of. Each key level can be walked `Increasing` or
//! `Decreasing`, so one tree serves both sort orders.
//!
//! ## Relationships
//!
//! | Relationship | Values yielded |
//! |--------------|----------------|
//! | `^=` | keys having the given components as prefix (last one may be partial) |
//! | `=` | the exact key |
//! | `>` / `>=` | keys sorting after the given key (`>=` includes it) |
//! | `<` / `<=` | keys sorting before the given key (`<=` includes it) |
//!
//! Relationships always compare keys in increasing order, component by
//! component and byte by byte. Directions only decide the order in which the
//! matching values are yielded, so `>` with a decreasing first level yields
//! the greater keys from the largest down. An empty key sorts before every
//! stored key.

mod cursor;
mod node;

pub use cursor::{Cursor, Entries};

use crate::blocks::{BlockId, BlockManager};
use atlas_core::{Direction, Error, Result};
use cursor::{slot_item, slots, Item, Path, Slot};
use node::{common_prefix_length, nibbles, Node};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Relationship between the yielded keys and the key given to `filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// `^=`
    Prefix,
    /// `=`
    Equal,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
}

impl Relationship {
    /// Operator symbol
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Prefix => "^=",
            Relationship::Equal => "=",
            Relationship::Greater => ">",
            Relationship::GreaterOrEqual => ">=",
            Relationship::Less => "<",
            Relationship::LessOrEqual => "<=",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "^=" => Ok(Relationship::Prefix),
            "=" => Ok(Relationship::Equal),
            ">" => Ok(Relationship::Greater),
            ">=" => Ok(Relationship::GreaterOrEqual),
            "<" => Ok(Relationship::Less),
            "<=" => Ok(Relationship::LessOrEqual),
            other => Err(Error::InvalidOperation(format!(
                "unknown relationship \"{}\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Exact,
    Stop,
    Descend(BlockId, usize, usize),
    Beside { greater: bool },
}

/// A radix tree rooted at one block.
#[derive(Debug, Clone)]
pub struct RadixTree {
    root: BlockId,
    deleted: bool,
}

impl RadixTree {
    /// Allocate an empty tree.
    pub fn create(blocks: &mut BlockManager) -> Result<Self> {
        let root = Node::default().create(blocks)?;
        Ok(RadixTree {
            root,
            deleted: false,
        })
    }

    /// Open the tree rooted at block `root`.
    pub fn open(root: BlockId) -> Self {
        RadixTree {
            root,
            deleted: false,
        }
    }

    /// Block id of the root node
    pub fn root(&self) -> BlockId {
        self.root
    }

    fn check_live(&self) -> Result<()> {
        if self.deleted {
            Err(Error::InvalidOperation(format!(
                "tree rooted at block {} has been deleted",
                self.root
            )))
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert or overwrite the value stored for `keys`.
    pub fn insert<K: AsRef<[u8]>>(
        &mut self,
        blocks: &mut BlockManager,
        keys: &[K],
        value: u64,
    ) -> Result<()> {
        self.check_live()?;
        let key: Vec<Vec<u8>> = keys.iter().map(|k| nibbles(k.as_ref())).collect();
        insert_at(blocks, self.root, &key, 0, 0, value)?;
        Ok(())
    }

    /// Remove the value stored for `keys`. Absent keys are ignored.
    pub fn remove<K: AsRef<[u8]>>(&mut self, blocks: &mut BlockManager, keys: &[K]) -> Result<()> {
        self.check_live()?;
        let key: Vec<Vec<u8>> = keys.iter().map(|k| nibbles(k.as_ref())).collect();
        remove_at(blocks, self.root, &key, 0, 0)?;
        Ok(())
    }

    /// Remove every value, keeping the root block.
    pub fn vacate(&mut self, blocks: &mut BlockManager) -> Result<()> {
        self.check_live()?;
        let root = Node::read(blocks, self.root)?;
        free_descendants(blocks, &root)?;
        Node::default().write(blocks, self.root)
    }

    /// Release every block of the tree. The tree is unusable afterwards.
    pub fn delete(&mut self, blocks: &mut BlockManager) -> Result<()> {
        self.check_live()?;
        let root = Node::read(blocks, self.root)?;
        free_descendants(blocks, &root)?;
        blocks.delete_block(self.root)?;
        self.deleted = true;
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of values stored.
    pub fn length(&self, blocks: &BlockManager) -> Result<u64> {
        self.check_live()?;
        Ok(Node::read(blocks, self.root)?.total)
    }

    /// Value stored for exactly `keys`.
    pub fn lookup<K: AsRef<[u8]>>(&self, blocks: &BlockManager, keys: &[K]) -> Result<Option<u64>> {
        self.check_live()?;
        let key: Vec<Vec<u8>> = keys.iter().map(|k| nibbles(k.as_ref())).collect();
        Ok(self.find(blocks, &key)?.and_then(|node| node.resident))
    }

    /// Tree of the keys that continue `keys` with further components.
    ///
    /// The values are keyed by the remaining components only. Returns `None`
    /// when no stored key continues `keys`.
    pub fn branch<K: AsRef<[u8]>>(
        &self,
        blocks: &BlockManager,
        keys: &[K],
    ) -> Result<Option<RadixTree>> {
        self.check_live()?;
        if keys.is_empty() {
            return Ok(Some(RadixTree::open(self.root)));
        }
        let key: Vec<Vec<u8>> = keys.iter().map(|k| nibbles(k.as_ref())).collect();
        Ok(self
            .find(blocks, &key)?
            .filter(|node| node.subtree != 0)
            .map(|node| RadixTree::open(node.subtree)))
    }

    /// Every value in increasing key order.
    pub fn iter<'a>(&self, blocks: &'a BlockManager) -> Result<Cursor<'a>> {
        self.filter(blocks, Relationship::Greater, &[] as &[&[u8]], &[])
    }

    /// Values whose keys stand in `relationship` to `keys`, in traversal order.
    pub fn filter<'a, K: AsRef<[u8]>>(
        &self,
        blocks: &'a BlockManager,
        relationship: Relationship,
        keys: &[K],
        directions: &[Direction],
    ) -> Result<Cursor<'a>> {
        self.check_live()?;
        let key: Vec<Vec<u8>> = keys.iter().map(|k| nibbles(k.as_ref())).collect();
        let items = self.items(blocks, relationship, &key, directions)?;
        Ok(Cursor::new(blocks, directions, items, false))
    }

    /// Like [`filter`](Self::filter), yielding each value with its key.
    pub fn entries<'a, K: AsRef<[u8]>>(
        &self,
        blocks: &'a BlockManager,
        relationship: Relationship,
        keys: &[K],
        directions: &[Direction],
    ) -> Result<Entries<'a>> {
        self.check_live()?;
        let key: Vec<Vec<u8>> = keys.iter().map(|k| nibbles(k.as_ref())).collect();
        let items = self.items(blocks, relationship, &key, directions)?;
        Ok(Entries::new(Cursor::new(blocks, directions, items, true)))
    }

    fn items(
        &self,
        blocks: &BlockManager,
        relationship: Relationship,
        key: &[Vec<u8>],
        directions: &[Direction],
    ) -> Result<Vec<(Item, Path)>> {
        if key.is_empty() {
            let items = match relationship {
                Relationship::Prefix | Relationship::Greater | Relationship::GreaterOrEqual => {
                    vec![Item::Node(self.root, 0)]
                }
                Relationship::Equal => Node::read(blocks, self.root)?
                    .resident
                    .map(Item::Value)
                    .into_iter()
                    .collect(),
                Relationship::Less | Relationship::LessOrEqual => Vec::new(),
            };
            return Ok(items.into_iter().map(|item| (item, Path::new())).collect());
        }
        if relationship == Relationship::Prefix {
            return Ok(self.prefix_node(blocks, key)?.into_iter().collect());
        }
        let wanted = |ordering: Ordering| match relationship {
            Relationship::Equal => ordering == Ordering::Equal,
            Relationship::Greater => ordering == Ordering::Greater,
            Relationship::GreaterOrEqual => ordering != Ordering::Less,
            Relationship::Less => ordering == Ordering::Less,
            Relationship::LessOrEqual => ordering != Ordering::Greater,
            Relationship::Prefix => false,
        };
        self.locate(blocks, key, directions, wanted)
    }

    /// Node where the last component of `key` ends.
    fn find(&self, blocks: &BlockManager, key: &[Vec<u8>]) -> Result<Option<Node>> {
        let mut node = Node::read(blocks, self.root)?;
        if key.is_empty() {
            return Ok(Some(node));
        }
        let (mut level, mut offset) = (0, 0);
        loop {
            let component = &key[level];
            if offset == component.len() {
                if level + 1 == key.len() {
                    return Ok(Some(node));
                }
                if node.subtree == 0 {
                    return Ok(None);
                }
                node = Node::read(blocks, node.subtree)?;
                level += 1;
                offset = 0;
                continue;
            }
            let child = node.children[component[offset] as usize];
            if child == 0 {
                return Ok(None);
            }
            node = Node::read(blocks, child)?;
            if !component[offset..].starts_with(&node.prefix) {
                return Ok(None);
            }
            offset += node.prefix.len();
        }
    }

    /// Node holding every key that starts with `key`, the last component
    /// being matched as a byte prefix.
    fn prefix_node(&self, blocks: &BlockManager, key: &[Vec<u8>]) -> Result<Option<(Item, Path)>> {
        let (mut id, mut level, mut offset) = (self.root, 0, 0);
        loop {
            let component = &key[level];
            let last = level + 1 == key.len();
            let node = Node::read(blocks, id)?;
            if offset == component.len() {
                if last {
                    let path = path_to(key, level, offset.saturating_sub(node.prefix.len()));
                    return Ok(Some((Item::Node(id, level), path)));
                }
                if node.subtree == 0 {
                    return Ok(None);
                }
                id = node.subtree;
                level += 1;
                offset = 0;
                continue;
            }
            let child_id = node.children[component[offset] as usize];
            if child_id == 0 {
                return Ok(None);
            }
            let child = Node::read(blocks, child_id)?;
            let rest = &component[offset..];
            let common = common_prefix_length(&child.prefix, rest);
            if common == rest.len() && last {
                return Ok(Some((Item::Node(child_id, level), path_to(key, level, offset))));
            }
            if common < child.prefix.len() {
                return Ok(None);
            }
            id = child_id;
            offset += common;
        }
    }

    /// Items whose keys compare to `key` as `wanted` accepts, in traversal
    /// order.
    fn locate(
        &self,
        blocks: &BlockManager,
        key: &[Vec<u8>],
        directions: &[Direction],
        wanted: impl Fn(Ordering) -> bool,
    ) -> Result<Vec<(Item, Path)>> {
        let mut side = Side::default();
        let (mut id, mut level, mut offset) = (self.root, 0, 0);
        loop {
            let node = Node::read(blocks, id)?;
            let component = &key[level];
            let (path, step) = if offset == component.len() {
                if level + 1 == key.len() {
                    (Slot::Resident, Step::Exact)
                } else if node.subtree != 0 {
                    (Slot::Subtree, Step::Descend(node.subtree, level + 1, 0))
                } else {
                    (Slot::Subtree, Step::Stop)
                }
            } else {
                let nibble = component[offset];
                match node.children[nibble as usize] {
                    0 => (Slot::Child(nibble), Step::Stop),
                    child_id => {
                        let child = Node::read(blocks, child_id)?;
                        let rest = &component[offset..];
                        let common = common_prefix_length(&child.prefix, rest);
                        if common == child.prefix.len() {
                            (
                                Slot::Child(nibble),
                                Step::Descend(child_id, level, offset + common),
                            )
                        } else {
                            // The whole child lies on one side of the key.
                            let greater = common == rest.len() || child.prefix[common] > rest[common];
                            (Slot::Child(nibble), Step::Beside { greater })
                        }
                    }
                }
            };
            let here = path_to(key, level, offset);
            side.enter();
            let mut passed = false;
            for slot in slots(directions, level) {
                let ordering = if slot == path {
                    passed = true;
                    match step {
                        Step::Exact => Ordering::Equal,
                        Step::Beside { greater: true } => Ordering::Greater,
                        Step::Beside { greater: false } => Ordering::Less,
                        Step::Stop | Step::Descend(..) => continue,
                    }
                } else {
                    slot.rank().cmp(&path.rank())
                };
                if wanted(ordering) {
                    // Nothing lies below the path slot once the walk stops
                    // there, so it joins the leading items.
                    side.push(slot_item(&node, slot, level), &here, passed && slot != path);
                }
            }
            match step {
                Step::Descend(next, next_level, next_offset) => {
                    id = next;
                    level = next_level;
                    offset = next_offset;
                }
                _ => break,
            }
        }
        Ok(side.finish())
    }
}

/// Items selected while walking down to a key.
///
/// Items met before the path slot of a node are visited before anything
/// below it, items met after it once the deeper levels are done.
#[derive(Default)]
struct Side {
    leading: Vec<(Item, Path)>,
    trailing: Vec<Vec<(Item, Path)>>,
}

impl Side {
    fn enter(&mut self) {
        self.trailing.push(Vec::new());
    }

    fn push(&mut self, item: Option<Item>, path: &Path, trailing: bool) {
        let Some(item) = item else { return };
        let entry = (item, path.clone());
        match self.trailing.last_mut() {
            Some(last) if trailing => last.push(entry),
            _ => self.leading.push(entry),
        }
    }

    fn finish(self) -> Vec<(Item, Path)> {
        let mut items = self.leading;
        items.extend(self.trailing.into_iter().rev().flatten());
        items
    }
}

/// Path of the position `offset` nibbles into component `level` of `key`.
fn path_to(key: &[Vec<u8>], level: usize, offset: usize) -> Path {
    let mut path = key[..level].to_vec();
    path.push(key[level][..offset].to_vec());
    path
}

// =============================================================================
// Node-level algorithms
// =============================================================================

/// Returns true when a new value was added below `id`.
fn insert_at(
    blocks: &mut BlockManager,
    id: BlockId,
    key: &[Vec<u8>],
    level: usize,
    offset: usize,
    value: u64,
) -> Result<bool> {
    let mut node = Node::read(blocks, id)?;
    let added = if key.is_empty() || (offset == key[level].len() && level + 1 == key.len()) {
        let added = node.resident.is_none();
        node.resident = Some(value);
        added
    } else if offset == key[level].len() {
        if node.subtree == 0 {
            node.subtree = Node::default().create(blocks)?;
        }
        insert_at(blocks, node.subtree, key, level + 1, 0, value)?
    } else {
        let component = &key[level];
        let nibble = component[offset] as usize;
        let rest = &component[offset..];
        let child_id = node.children[nibble];
        if child_id == 0 {
            let child_id = Node::with_prefix(rest).create(blocks)?;
            node.children[nibble] = child_id;
            insert_at(blocks, child_id, key, level, component.len(), value)?
        } else {
            let mut child = Node::read(blocks, child_id)?;
            let common = common_prefix_length(&child.prefix, rest);
            if common == child.prefix.len() {
                insert_at(blocks, child_id, key, level, offset + common, value)?
            } else {
                let mut middle = Node::with_prefix(&child.prefix[..common]);
                middle.total = child.total;
                child.prefix.drain(..common);
                middle.children[child.prefix[0] as usize] = child_id;
                child.write(blocks, child_id)?;
                let middle_id = middle.create(blocks)?;
                node.children[nibble] = middle_id;
                insert_at(blocks, middle_id, key, level, offset + common, value)?
            }
        }
    };
    if added {
        node.total += 1;
    }
    node.write(blocks, id)?;
    Ok(added)
}

/// Returns true when a value was removed below `id`.
fn remove_at(
    blocks: &mut BlockManager,
    id: BlockId,
    key: &[Vec<u8>],
    level: usize,
    offset: usize,
) -> Result<bool> {
    let mut node = Node::read(blocks, id)?;
    let removed = if key.is_empty() || (offset == key[level].len() && level + 1 == key.len()) {
        node.resident.take().is_some()
    } else if offset == key[level].len() {
        if node.subtree == 0 {
            return Ok(false);
        }
        let removed = remove_at(blocks, node.subtree, key, level + 1, 0)?;
        if removed && Node::read(blocks, node.subtree)?.total == 0 {
            blocks.delete_block(node.subtree)?;
            node.subtree = 0;
        }
        removed
    } else {
        let component = &key[level];
        let nibble = component[offset] as usize;
        let child_id = node.children[nibble];
        if child_id == 0 {
            return Ok(false);
        }
        let child = Node::read(blocks, child_id)?;
        if !component[offset..].starts_with(&child.prefix) {
            return Ok(false);
        }
        let removed = remove_at(blocks, child_id, key, level, offset + child.prefix.len())?;
        if removed {
            node.children[nibble] = collapse(blocks, child_id)?;
        }
        removed
    };
    if removed {
        node.total -= 1;
        node.write(blocks, id)?;
    }
    Ok(removed)
}

/// Delete an emptied child or merge it with its only child.
/// Returns the id that should take the child's place (0 for none).
fn collapse(blocks: &mut BlockManager, id: BlockId) -> Result<BlockId> {
    let node = Node::read(blocks, id)?;
    if node.is_empty() {
        blocks.delete_block(id)?;
        return Ok(0);
    }
    if let Some((_, grandchild_id)) = node.single_child() {
        let mut grandchild = Node::read(blocks, grandchild_id)?;
        let mut prefix = node.prefix.clone();
        prefix.extend_from_slice(&grandchild.prefix);
        grandchild.prefix = prefix;
        grandchild.write(blocks, grandchild_id)?;
        blocks.delete_block(id)?;
        return Ok(grandchild_id);
    }
    Ok(id)
}

fn free_descendants(blocks: &mut BlockManager, node: &Node) -> Result<()> {
    let mut pending: Vec<BlockId> = node
        .children
        .iter()
        .copied()
        .chain(std::iter::once(node.subtree))
        .filter(|&id| id != 0)
        .collect();
    while let Some(id) = pending.pop() {
        let node = Node::read(blocks, id)?;
        pending.extend(
            node.children
                .iter()
                .copied()
                .chain(std::iter::once(node.subtree))
                .filter(|&id| id != 0),
        );
        blocks.delete_block(id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
