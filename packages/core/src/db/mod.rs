//! Persistence Layer
//!
//! Repository contracts consumed by the tree engine, plus the in-memory
//! reference backend:
//!
//! - [`NodeStore`] - one contract for template-owned and instance-owned
//!   nodes (the two sets stay disjoint via the typed owner id)
//! - [`TemplateStore`] / [`InstanceStore`] - owning-tree metadata
//! - `Memory*Store` - arena-backed backends used by the test suite and as
//!   the reference implementation
//!
//! Durable backends (SQL or otherwise) live with the embedding application;
//! this crate only defines the contracts it consumes.

mod memory;
mod node_store;
mod owner_store;

pub use memory::{MemoryInstanceStore, MemoryNodeStore, MemoryTemplateStore};
pub use node_store::NodeStore;
pub use owner_store::{InstanceStore, TemplateStore};
