//! Storage Integration Tests
//!
//! Tests for the file stack below the facade: reopening, file layouts and
//! schema reconciliation.

#[path = "../common/mod.rs"]
mod common;

mod layouts;
mod reopen;
