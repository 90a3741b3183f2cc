//! On-disk radix tree nodes.
//!
//! ```text
//! +--------+---------+---------+-------+----------+-------------+--------+
//! | total  | resident| subtree | flags | reserved | prefix len  |children|
//! | u64    | u64     | u64     | u8    | u8       | u32 nibbles | 16*u64 |
//! +--------+---------+---------+-------+----------+-------------+--------+
//! | packed prefix nibbles (two per byte, high nibble first)              |
//! +----------------------------------------------------------------------+
//! ```
//!
//! `total` counts the terminal values stored below and at the node, including
//! those of subtrees. A child id of 0 means no child.

use crate::blocks::{BlockId, BlockManager};
use atlas_core::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

const HAS_RESIDENT: u8 = 0x01;
const HEADER_LENGTH: usize = 30 + 16 * 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Node {
    pub prefix: Vec<u8>,
    pub total: u64,
    pub resident: Option<u64>,
    pub subtree: BlockId,
    pub children: [BlockId; 16],
}

impl Node {
    pub fn with_prefix(prefix: &[u8]) -> Self {
        Node {
            prefix: prefix.to_vec(),
            ..Node::default()
        }
    }

    fn encoded_length(&self) -> usize {
        HEADER_LENGTH + (self.prefix.len() + 1) / 2
    }

    fn encode(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; self.encoded_length()];
        BigEndian::write_u64(&mut buffer[0..8], self.total);
        BigEndian::write_u64(&mut buffer[8..16], self.resident.unwrap_or(0));
        BigEndian::write_u64(&mut buffer[16..24], self.subtree);
        buffer[24] = if self.resident.is_some() { HAS_RESIDENT } else { 0 };
        BigEndian::write_u32(&mut buffer[26..30], self.prefix.len() as u32);
        for (index, child) in self.children.iter().enumerate() {
            let start = 30 + index * 8;
            BigEndian::write_u64(&mut buffer[start..start + 8], *child);
        }
        for (index, nibble) in self.prefix.iter().enumerate() {
            let shift = if index % 2 == 0 { 4 } else { 0 };
            buffer[HEADER_LENGTH + index / 2] |= nibble << shift;
        }
        buffer
    }

    fn decode(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < HEADER_LENGTH {
            return Err(Error::Corruption(format!(
                "tree node of {} bytes is truncated",
                buffer.len()
            )));
        }
        let prefix_length = BigEndian::read_u32(&buffer[26..30]) as usize;
        if buffer.len() != HEADER_LENGTH + (prefix_length + 1) / 2 {
            return Err(Error::Corruption(format!(
                "tree node of {} bytes cannot hold {} prefix nibbles",
                buffer.len(),
                prefix_length
            )));
        }
        let mut children = [0; 16];
        for (index, child) in children.iter_mut().enumerate() {
            let start = 30 + index * 8;
            *child = BigEndian::read_u64(&buffer[start..start + 8]);
        }
        let prefix = (0..prefix_length)
            .map(|index| {
                let byte = buffer[HEADER_LENGTH + index / 2];
                if index % 2 == 0 {
                    byte >> 4
                } else {
                    byte & 0x0f
                }
            })
            .collect();
        Ok(Node {
            prefix,
            total: BigEndian::read_u64(&buffer[0..8]),
            resident: if buffer[24] & HAS_RESIDENT != 0 {
                Some(BigEndian::read_u64(&buffer[8..16]))
            } else {
                None
            },
            subtree: BigEndian::read_u64(&buffer[16..24]),
            children,
        })
    }

    pub fn read(blocks: &BlockManager, id: BlockId) -> Result<Self> {
        Self::decode(&blocks.read_block(id)?)
    }

    pub fn create(&self, blocks: &mut BlockManager) -> Result<BlockId> {
        let buffer = self.encode();
        let id = blocks.create_block(buffer.len() as u64)?;
        blocks.write_block(id, &buffer)?;
        Ok(id)
    }

    pub fn write(&self, blocks: &mut BlockManager, id: BlockId) -> Result<()> {
        let buffer = self.encode();
        if blocks.block_length(id)? != buffer.len() as u64 {
            blocks.resize_block(id, buffer.len() as u64)?;
        }
        blocks.write_block(id, &buffer)
    }

    pub fn is_empty(&self) -> bool {
        self.resident.is_none() && self.subtree == 0 && self.children.iter().all(|&c| c == 0)
    }

    /// The only child of a node without resident or subtree, if any.
    pub fn single_child(&self) -> Option<(usize, BlockId)> {
        if self.resident.is_some() || self.subtree != 0 {
            return None;
        }
        let mut children = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| **child != 0);
        match (children.next(), children.next()) {
            (Some((index, &child)), None) => Some((index, child)),
            _ => None,
        }
    }
}

/// Split bytes into nibbles, high nibble first.
pub(crate) fn nibbles(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect()
}

pub(crate) fn common_prefix_length(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_round_trip() {
        let mut node = Node::with_prefix(&[1, 2, 3]);
        node.total = 7;
        node.resident = Some(0);
        node.subtree = 9;
        node.children[15] = 42;
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_node_decode_rejects_bad_length() {
        let node = Node::with_prefix(&[1, 2, 3, 4]);
        let mut buffer = node.encode();
        buffer.pop();
        assert!(Node::decode(&buffer).is_err());
        assert!(Node::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_nibbles() {
        assert_eq!(nibbles(&[0xab, 0x01]), vec![0xa, 0xb, 0x0, 0x1]);
        assert_eq!(common_prefix_length(&[1, 2, 3], &[1, 2, 4]), 2);
    }

    #[test]
    fn test_single_child() {
        let mut node = Node::default();
        node.children[3] = 5;
        assert_eq!(node.single_child(), Some((3, 5)));
        node.children[4] = 6;
        assert_eq!(node.single_child(), None);
    }
}
