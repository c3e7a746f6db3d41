//! Business Services
//!
//! The service layer of the structure-tree engine:
//!
//! - `StructureTreeService` - the unified tree engine (creation, move,
//!   ordering, cloning, validation, diff) shared by both tree flavors
//! - `TemplateService` - template metadata and template-owned trees
//! - `InstanceService` - instance metadata, publishing, and instance-owned
//!   trees
//!
//! Services coordinate between the persistence contracts and the tree
//! algorithms; they own no transactions and expect the caller to supply a
//! per-owner lock around move/clone/validate sequences.

pub mod error;
pub mod instance_service;
pub mod structure_service;
pub mod template_service;

pub use error::StructureServiceError;
pub use instance_service::InstanceService;
pub use structure_service::{ImportNode, StructureTreeService};
pub use template_service::TemplateService;
