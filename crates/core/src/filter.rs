//! Field predicates used by `filter`.

use crate::record::Record;
use crate::value::Value;

/// Predicate on a single field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// The field equals the given value
    Equal(Value),
}

impl Filter {
    /// Check whether `value` satisfies the predicate.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Filter::Equal(expected) => expected == value,
        }
    }
}

/// Insertion-ordered list of `(field, filter)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    entries: Vec<(String, Filter)>,
}

impl Filters {
    /// Create an empty filter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value` (builder style).
    pub fn equal(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, Filter::Equal(value.into()));
        self
    }

    /// Set the filter on `key`, replacing a previous one.
    pub fn set(&mut self, key: impl Into<String>, filter: Filter) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = filter,
            None => self.entries.push((key, filter)),
        }
    }

    /// Filter on `key`, if any
    pub fn get(&self, key: &str) -> Option<&Filter> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    /// Remove the filter on `key`
    pub fn remove(&mut self, key: &str) -> Option<Filter> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Filters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Filter)> {
        self.entries.iter().map(|(k, f)| (k.as_str(), f))
    }

    /// Number of filters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there is no filter
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `record` satisfies every filter. Absent fields never match.
    pub fn matches(&self, record: &Record) -> bool {
        self.entries.iter().all(|(key, filter)| {
            record
                .get(key)
                .map_or(false, |value| filter.matches(value))
        })
    }
}

impl From<&Record> for Filters {
    /// Equality filters on every field of a (keys) record
    fn from(record: &Record) -> Self {
        let mut filters = Filters::new();
        for (key, value) in record.iter() {
            filters.set(key.clone(), Filter::Equal(value.clone()));
        }
        filters
    }
}
