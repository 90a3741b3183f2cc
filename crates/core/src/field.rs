//! Field definitions.
//!
//! A field is one of six scalar kinds, optionally nullable, with a default
//! value used when a record is created through `update` without a previous
//! version. String fields may be marked searchable, which makes the store
//! maintain a full-text search index for them.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Arbitrary bytes
    Binary,
    /// 128-bit signed integer
    BigInt,
    /// Boolean
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Number,
    /// UTF-8 string
    String,
}

impl FieldKind {
    /// Check whether a non-null value is of this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldKind::Binary, Value::Binary(_))
                | (FieldKind::BigInt, Value::BigInt(_))
                | (FieldKind::Boolean, Value::Boolean(_))
                | (FieldKind::Integer, Value::Integer(_))
                | (FieldKind::Number, Value::Number(_))
                | (FieldKind::String, Value::String(_))
        )
    }
}

/// Definition of a single record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    kind: FieldKind,
    nullable: bool,
    default: Value,
    searchable: bool,
}

impl Field {
    fn new(kind: FieldKind, nullable: bool, default: Value) -> Self {
        Field {
            kind,
            nullable,
            default,
            searchable: false,
        }
    }

    /// Binary field
    pub fn binary(default: impl Into<Vec<u8>>) -> Self {
        Self::new(FieldKind::Binary, false, Value::Binary(default.into()))
    }

    /// Nullable binary field
    pub fn nullable_binary(default: Option<Vec<u8>>) -> Self {
        Self::new(FieldKind::Binary, true, default.into())
    }

    /// BigInt field
    pub fn bigint(default: i128) -> Self {
        Self::new(FieldKind::BigInt, false, Value::BigInt(default))
    }

    /// Nullable BigInt field
    pub fn nullable_bigint(default: Option<i128>) -> Self {
        Self::new(FieldKind::BigInt, true, default.into())
    }

    /// Boolean field
    pub fn boolean(default: bool) -> Self {
        Self::new(FieldKind::Boolean, false, Value::Boolean(default))
    }

    /// Nullable boolean field
    pub fn nullable_boolean(default: Option<bool>) -> Self {
        Self::new(FieldKind::Boolean, true, default.into())
    }

    /// Integer field
    pub fn integer(default: i64) -> Self {
        Self::new(FieldKind::Integer, false, Value::Integer(default))
    }

    /// Nullable integer field
    pub fn nullable_integer(default: Option<i64>) -> Self {
        Self::new(FieldKind::Integer, true, default.into())
    }

    /// Number field
    pub fn number(default: f64) -> Self {
        Self::new(FieldKind::Number, false, Value::Number(default))
    }

    /// Nullable number field
    pub fn nullable_number(default: Option<f64>) -> Self {
        Self::new(FieldKind::Number, true, default.into())
    }

    /// String field
    pub fn string(default: impl Into<String>) -> Self {
        Self::new(FieldKind::String, false, Value::String(default.into()))
    }

    /// Nullable string field
    pub fn nullable_string(default: Option<&str>) -> Self {
        Self::new(FieldKind::String, true, default.into())
    }

    /// Mark a string field as searchable.
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Scalar kind
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Whether `Value::Null` is accepted
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether a search index is maintained for this field
    pub fn is_searchable(&self) -> bool {
        self.searchable && self.kind == FieldKind::String
    }

    /// Default value
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Check whether `value` may be stored in this field.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            self.nullable
        } else {
            self.kind.accepts(value)
        }
    }
}

/// Named fields of a store, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields {
    fields: BTreeMap<String, Field>,
}

impl Fields {
    /// Create an empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style)
    pub fn with(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Check whether a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.fields.iter()
    }

    /// Field names in name order
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when no field is defined
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
