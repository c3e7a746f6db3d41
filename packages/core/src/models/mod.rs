//! Data Models
//!
//! Core data structures shared by both tree flavors:
//!
//! - `StructureNode` - the single node schema for template and instance trees
//! - `StructureTemplate` / `StructureInstance` - owning-tree metadata
//! - `path` - materialized-path helpers
//! - report values returned by the engine (diff, clone, validation)

mod node;
mod owner;
pub mod path;
mod report;

pub use node::{
    CategoryId, GroupId, NodeId, NodeKind, Status, StructureNode, UsageId, ValidationError,
};
pub use owner::{
    InstanceId, ModelId, OwnerId, SeriesId, StructureInstance, StructureTemplate, TemplateId,
    TreeKind,
};
pub use report::{CloneReport, DiffEntry, ModifiedEntry, StructureDiff, ValidationReport};
