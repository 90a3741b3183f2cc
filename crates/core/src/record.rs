//! Records: ordered maps from field name to value.

use crate::value::Value;
use std::collections::BTreeMap;

/// A record, or a partial record holding only some fields (keys records).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field (builder style)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Set a field
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Remove a field
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Number of fields present
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no field is present
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy the named fields into a new record. Absent fields are skipped.
    pub fn project<S: AsRef<str>>(&self, keys: &[S]) -> Record {
        let values = keys
            .iter()
            .filter_map(|key| {
                let key = key.as_ref();
                self.values.get(key).map(|v| (key.to_string(), v.clone()))
            })
            .collect();
        Record { values }
    }

    /// Overwrite fields of `self` with every field present in `other`.
    pub fn merge(&mut self, other: &Record) {
        for (name, value) in other.iter() {
            self.values.insert(name.clone(), value.clone());
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
