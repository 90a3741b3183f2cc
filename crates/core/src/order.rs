//! Sort directions and per-field orders.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Direction of an order, also used as the per-level walk direction of trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Smallest first
    #[default]
    Increasing,
    /// Largest first
    Decreasing,
}

impl Direction {
    /// Compare two values in this direction.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match self {
            Direction::Increasing => a.compare(b),
            Direction::Decreasing => b.compare(a),
        }
    }
}

/// Insertion-ordered list of `(field, direction)` pairs.
///
/// Earlier entries take precedence when sorting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orders {
    entries: Vec<(String, Direction)>,
}

impl Orders {
    /// Create an empty order list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an order (builder style). Re-adding a field keeps its position.
    pub fn with(mut self, key: impl Into<String>, direction: Direction) -> Self {
        self.set(key, direction);
        self
    }

    /// Set the direction of `key`, appending it if absent.
    pub fn set(&mut self, key: impl Into<String>, direction: Direction) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = direction,
            None => self.entries.push((key, direction)),
        }
    }

    /// Direction of `key`, if ordered
    pub fn get(&self, key: &str) -> Option<Direction> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, direction)| *direction)
    }

    /// Check whether `key` is ordered
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove the order on `key`
    pub fn remove(&mut self, key: &str) -> Option<Direction> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Ordered keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Entries in precedence order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Direction)> {
        self.entries.iter().map(|(k, d)| (k.as_str(), *d))
    }

    /// Number of orders
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there is no order
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare two records field by field in precedence order.
    pub fn compare(&self, a: &crate::Record, b: &crate::Record) -> Ordering {
        for (key, direction) in self.iter() {
            let ordering = match (a.get(key), b.get(key)) {
                (Some(x), Some(y)) => direction.compare(x, y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Record;

    #[test]
    fn test_orders_keep_insertion_order() {
        let mut orders = Orders::new()
            .with("b", Direction::Increasing)
            .with("a", Direction::Decreasing);
        orders.set("b", Direction::Decreasing);
        let keys: Vec<_> = orders.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(orders.get("b"), Some(Direction::Decreasing));
        assert_eq!(orders.remove("b"), Some(Direction::Decreasing));
        assert_eq!(orders.len(), 1);
    }

    #[test]
    fn test_compare_records() {
        let orders = Orders::new()
            .with("group", Direction::Increasing)
            .with("name", Direction::Decreasing);
        let a = Record::new().with("group", 1i64).with("name", "a");
        let b = Record::new().with("group", 1i64).with("name", "b");
        let c = Record::new().with("group", 0i64).with("name", "c");
        assert_eq!(orders.compare(&a, &b), Ordering::Greater);
        assert_eq!(orders.compare(&c, &a), Ordering::Less);
    }
}
