//! Lazy traversal of radix trees.

use super::node::Node;
use crate::blocks::{BlockId, BlockManager};
use atlas_core::{Direction, Result};
use smallvec::SmallVec;

/// Pending work of a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Item {
    /// A terminal value, emitted as is
    Value(u64),
    /// A node still to be expanded, with the key level it belongs to
    Node(BlockId, usize),
}

/// Positions inside a node, in the order a traversal may visit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The value of the key whose component ends at this node
    Resident,
    /// Keys that continue with a further component
    Subtree,
    /// Keys whose current component continues with this nibble
    Child(u8),
}

impl Slot {
    /// Position in increasing key order
    pub(crate) fn rank(self) -> u8 {
        match self {
            Slot::Resident => 0,
            Slot::Subtree => 1,
            Slot::Child(nibble) => 2 + nibble,
        }
    }
}

fn direction_at(directions: &[Direction], level: usize) -> Direction {
    directions.get(level).copied().unwrap_or_default()
}

/// Slots of a node at `level` in traversal order.
///
/// A component ending here sorts before its extensions; a key ending here
/// sorts before keys with more components. Decreasing levels reverse these.
pub(crate) fn slots(directions: &[Direction], level: usize) -> SmallVec<[Slot; 18]> {
    let mut end_group: SmallVec<[Slot; 2]> = SmallVec::new();
    match direction_at(directions, level + 1) {
        Direction::Increasing => end_group.extend([Slot::Resident, Slot::Subtree]),
        Direction::Decreasing => end_group.extend([Slot::Subtree, Slot::Resident]),
    }
    let mut slots = SmallVec::new();
    match direction_at(directions, level) {
        Direction::Increasing => {
            slots.extend(end_group);
            slots.extend((0..16).map(Slot::Child));
        }
        Direction::Decreasing => {
            slots.extend((0..16).rev().map(Slot::Child));
            slots.extend(end_group);
        }
    }
    slots
}

pub(crate) fn slot_item(node: &Node, slot: Slot, level: usize) -> Option<Item> {
    match slot {
        Slot::Resident => node.resident.map(Item::Value),
        Slot::Subtree if node.subtree != 0 => Some(Item::Node(node.subtree, level + 1)),
        Slot::Subtree => None,
        Slot::Child(nibble) => match node.children[nibble as usize] {
            0 => None,
            child => Some(Item::Node(child, level)),
        },
    }
}

/// Key components leading to a traversal item, in nibbles.
///
/// Nodes still to be expanded carry the path of their parent; their own
/// prefix is added when they are read.
pub(crate) type Path = Vec<Vec<u8>>;

/// Iterator over the terminal values of a tree range.
///
/// Nodes are read from the block manager only when the traversal reaches
/// them, so taking a few values from a large range stays cheap.
pub struct Cursor<'a> {
    blocks: &'a BlockManager,
    directions: Vec<Direction>,
    keyed: bool,
    stack: SmallVec<[(Item, Path); 32]>,
}

impl<'a> Cursor<'a> {
    /// `items` are given in traversal order. Paths are kept only when
    /// `keyed` is set.
    pub(crate) fn new(
        blocks: &'a BlockManager,
        directions: &[Direction],
        items: Vec<(Item, Path)>,
        keyed: bool,
    ) -> Self {
        Cursor {
            blocks,
            directions: directions.to_vec(),
            keyed,
            stack: items
                .into_iter()
                .rev()
                .map(|(item, path)| (item, if keyed { path } else { Path::new() }))
                .collect(),
        }
    }

    fn advance(&mut self) -> Option<Result<(Path, u64)>> {
        while let Some((item, mut path)) = self.stack.pop() {
            match item {
                Item::Value(value) => return Some(Ok((path, value))),
                Item::Node(id, level) => {
                    let node = match Node::read(self.blocks, id) {
                        Ok(node) => node,
                        Err(e) => {
                            self.stack.clear();
                            return Some(Err(e));
                        }
                    };
                    if self.keyed {
                        while path.len() <= level {
                            path.push(Vec::new());
                        }
                        path[level].extend_from_slice(&node.prefix);
                    }
                    let items: SmallVec<[Item; 18]> = slots(&self.directions, level)
                        .into_iter()
                        .filter_map(|slot| slot_item(&node, slot, level))
                        .collect();
                    let keyed = self.keyed;
                    self.stack.extend(
                        items
                            .into_iter()
                            .rev()
                            .map(|item| (item, if keyed { path.clone() } else { Path::new() })),
                    );
                }
            }
        }
        None
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().map(|entry| entry.map(|(_, value)| value))
    }
}

/// Iterator over the keys and values of a tree range.
pub struct Entries<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Entries<'a> {
    pub(crate) fn new(cursor: Cursor<'a>) -> Self {
        Entries { cursor }
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<(Vec<Vec<u8>>, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.advance().map(|entry| {
            entry.map(|(path, value)| {
                let keys = path
                    .iter()
                    .map(|component| {
                        component
                            .chunks(2)
                            .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
                            .collect()
                    })
                    .collect();
                (keys, value)
            })
        })
    }
}
