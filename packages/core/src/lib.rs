//! Carstruct Core Business Logic Layer
//!
//! This crate provides the structure-tree engine behind the Carstruct
//! vehicle-configuration backend: one algorithm family maintaining the
//! hierarchical system trees (category → group → usage) of reusable
//! templates and the versioned instances cloned from them.
//!
//! # Architecture
//!
//! - **One node schema, two flavors**: template-owned and instance-owned
//!   nodes share a schema; the typed owner id keeps the sets disjoint and
//!   selects flavor-specific rules (template trees have exactly one root)
//! - **Materialized paths**: ancestor chains are encoded on each node, so
//!   subtree operations are prefix scans instead of recursive joins
//! - **Stores as contracts**: the engine consumes async repository traits;
//!   durable backends live with the embedding application, an in-memory
//!   reference backend ships here
//!
//! # Modules
//!
//! - [`models`] - data structures (StructureNode, owners, reports)
//! - [`services`] - the tree engine and owner services
//! - [`db`] - persistence contracts and the in-memory backend

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use services::*;
