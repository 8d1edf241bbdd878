//! Database access layer.
//!
//! This module provides PostgreSQL access functionality:
//! - Scoped connection acquisition (one connection per operation)
//! - Query and write execution with validation
//! - Catalog introspection
//! - Type mappings from PostgreSQL to JSON

pub mod client;
pub mod introspect;
pub mod types;

pub use client::{DbClient, ExplainOutcome};
