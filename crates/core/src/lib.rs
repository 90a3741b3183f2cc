//! Core types for Atlas
//!
//! This crate defines the vocabulary shared by every other crate:
//! - Error: the unified error type and `Result` alias
//! - Value, Field, Fields, Record: typed records and their schema
//! - RecordManager: the deterministic record and key codec
//! - Direction, Orders, Filter, Filters: query orders and predicates
//! - binary: fixed-width field packing for on-disk headers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary;
pub mod codec;
pub mod error;
pub mod field;
pub mod filter;
pub mod order;
pub mod record;
pub mod value;

pub use binary::Endian;
pub use codec::{encode_key, RecordManager};
pub use error::{Error, Result};
pub use field::{Field, FieldKind, Fields};
pub use filter::{Filter, Filters};
pub use order::{Direction, Orders};
pub use record::Record;
pub use value::Value;
