//! Service Layer Error Types
//!
//! One error enum covers the whole engine surface. The taxonomy follows the
//! operation contracts: validation failures and not-found conditions are
//! rejected before any mutation; structural violations (cycles, extra
//! template roots) leave the tree untouched; a zero-row update of the node
//! an operation is acting on is always raised as [`StaleWrite`] rather than
//! returned as a boolean, so callers cannot silently ignore a lost write.
//!
//! [`StaleWrite`]: StructureServiceError::StaleWrite

use crate::models::{InstanceId, NodeId, OwnerId, TemplateId, ValidationError};
use thiserror::Error;

/// Errors raised by the structure-tree engine and the owner services.
#[derive(Error, Debug)]
pub enum StructureServiceError {
    /// Field or type validation failed; nothing was written.
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Node not found by id.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// Referenced parent node does not exist in the owner's tree.
    #[error("parent node not found: {id}")]
    ParentNotFound { id: NodeId },

    /// Template not found by id.
    #[error("template not found: {id}")]
    TemplateNotFound { id: TemplateId },

    /// Instance not found by id.
    #[error("instance not found: {id}")]
    InstanceNotFound { id: InstanceId },

    /// No owner row matches the given code and version.
    #[error("no structure found for code [{code}] version [{version}]")]
    VersionNotFound { code: String, version: String },

    /// The code and version combination is already taken.
    #[error("structure code [{code}] with version [{version}] already exists")]
    DuplicateVersion { code: String, version: String },

    /// Moving the node under the given parent would make it its own
    /// ancestor.
    #[error("circular reference: cannot move node {node_id} under {parent_id}")]
    CircularReference { node_id: NodeId, parent_id: NodeId },

    /// Template trees allow exactly one root node.
    #[error("{owner} already has a root node")]
    MultipleRoots { owner: OwnerId },

    /// An update affected zero rows: the row vanished between load and
    /// write (concurrent delete or stale snapshot).
    #[error("stale write: {context}")]
    StaleWrite { context: String },

    /// Store operation failed.
    #[error("store operation failed: {0}")]
    StoreFailed(String),
}

impl StructureServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: NodeId) -> Self {
        Self::NodeNotFound { id }
    }

    /// Create a parent not found error
    pub fn parent_not_found(id: NodeId) -> Self {
        Self::ParentNotFound { id }
    }

    /// Create a template not found error
    pub fn template_not_found(id: TemplateId) -> Self {
        Self::TemplateNotFound { id }
    }

    /// Create an instance not found error
    pub fn instance_not_found(id: InstanceId) -> Self {
        Self::InstanceNotFound { id }
    }

    /// Create a version not found error
    pub fn version_not_found(code: impl Into<String>, version: impl Into<String>) -> Self {
        Self::VersionNotFound {
            code: code.into(),
            version: version.into(),
        }
    }

    /// Create a duplicate version error
    pub fn duplicate_version(code: impl Into<String>, version: impl Into<String>) -> Self {
        Self::DuplicateVersion {
            code: code.into(),
            version: version.into(),
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(node_id: NodeId, parent_id: NodeId) -> Self {
        Self::CircularReference { node_id, parent_id }
    }

    /// Create a multiple roots error
    pub fn multiple_roots(owner: OwnerId) -> Self {
        Self::MultipleRoots { owner }
    }

    /// Create a stale write error
    pub fn stale_write(context: impl Into<String>) -> Self {
        Self::StaleWrite {
            context: context.into(),
        }
    }

    /// Create a store failed error
    pub fn store_failed(msg: impl Into<String>) -> Self {
        Self::StoreFailed(msg.into())
    }
}

impl From<anyhow::Error> for StructureServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::StoreFailed(err.to_string())
    }
}
