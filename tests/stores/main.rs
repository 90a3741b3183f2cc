//! Store Integration Tests
//!
//! Tests for records, filters, orders, anchors and links through the
//! database facade.

#[path = "../common/mod.rs"]
mod common;

mod filters;
mod links;
mod model;
mod performance;
