//! Scalar values stored in record fields.
//!
//! ## Ordering
//!
//! `Value::compare` defines the order used for sorting materialized records.
//! It agrees with the byte order of the key codec in [`crate::codec`], so a
//! tree walk over encoded keys and an in-memory sort produce the same order.
//!
//! - `Null` sorts before every other value
//! - Numbers use the IEEE-754 total order (`-NaN < -inf < ... < inf < NaN`)
//! - Strings compare by their UTF-8 bytes
//! - Values of different kinds compare by kind

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value, only valid for nullable fields
    Null,
    /// Arbitrary bytes
    Binary(Vec<u8>),
    /// 128-bit signed integer
    BigInt(i128),
    /// Boolean
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit IEEE-754 floating point
    Number(f64),
    /// UTF-8 string
    String(String),
}

impl Value {
    /// Returns the kind name (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Binary(_) => "Binary",
            Value::BigInt(_) => "BigInt",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
        }
    }

    /// Returns true for `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, if any
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Binary(_) => 1,
            Value::BigInt(_) => 2,
            Value::Boolean(_) => 3,
            Value::Integer(_) => 4,
            Value::Number(_) => 5,
            Value::String(_) => 6,
        }
    }

    /// Total order over values.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<i128> for Value {
    fn from(i: i128) -> Self {
        Value::BigInt(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Binary(bytes.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sorts_first() {
        assert_eq!(Value::Null.compare(&Value::from("")), Ordering::Less);
        assert_eq!(Value::from(0i64).compare(&Value::Null), Ordering::Greater);
    }

    #[test]
    fn test_number_total_order() {
        let values = [f64::NEG_INFINITY, -1.5, -0.0, 0.0, 2.0, f64::INFINITY];
        for pair in values.windows(2) {
            assert_eq!(
                Value::Number(pair[0]).compare(&Value::Number(pair[1])),
                Ordering::Less
            );
        }
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn test_strings_compare_bytewise() {
        assert_eq!(Value::from("B").compare(&Value::from("a")), Ordering::Less);
        assert_eq!(Value::from("apa").compare(&Value::from("apa1")), Ordering::Less);
    }

    #[test]
    fn test_option_conversion() {
        assert!(Value::from(None::<&str>).is_null());
        assert_eq!(Value::from(Some(5i64)), Value::Integer(5));
    }
}
