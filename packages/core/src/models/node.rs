//! Structure Node Data Model
//!
//! This module defines the `StructureNode` struct shared by both tree
//! flavors (template-owned and instance-owned), plus the value types it is
//! built from.
//!
//! # Architecture
//!
//! - **One node schema**: template trees and instance trees store the same
//!   shape; the owning tree is identified by [`OwnerId`], a sum type that
//!   keeps the two node sets disjoint by construction.
//! - **Typed node kind**: the `CATEGORY`/`GROUP`/`USAGE` discriminator and
//!   its type-specific reference collapse into [`NodeKind`], so "exactly one
//!   reference populated" is unrepresentable to get wrong.
//! - **Materialized position**: `path` and `level` are derived state,
//!   recomputed by [`StructureNode::assign_path`] after the node has a
//!   persisted id and after every reparenting.
//!
//! # Examples
//!
//! ```rust
//! use carstruct_core::models::{NodeKind, OwnerId, StructureNode, TemplateId};
//!
//! let kind = NodeKind::from_parts("CATEGORY", Some(10), None, None).unwrap();
//! let root = StructureNode::create_root(
//!     OwnerId::Template(TemplateId(1)),
//!     kind,
//!     "CAT_POWERTRAIN".to_string(),
//!     "动力总成".to_string(),
//!     Some("Powertrain".to_string()),
//!     None,
//!     "jerry".to_string(),
//! )
//! .unwrap();
//! assert!(root.id.is_none()); // assigned by the store on first save
//! ```

use crate::models::owner::OwnerId;
use crate::models::path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for node and owner field checks
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("{node_type} nodes require a {attribute} reference")]
    MissingRequiredAttribute {
        node_type: &'static str,
        attribute: &'static str,
    },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: Status, to: Status },
}

/// Persisted node identifier, assigned by the node store on first save.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference into the system-category catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

/// Reference into the system-group catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(pub i64);

/// Reference into the usage catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UsageId(pub i64);

/// Node type plus its type-specific catalog reference.
///
/// Replaces the original pair of a string discriminator and three nullable
/// reference columns: the variant is the discriminator, its payload is the
/// one reference that kind requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "nodeType", content = "nodeRef", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Category(CategoryId),
    Group(GroupId),
    Usage(UsageId),
}

impl NodeKind {
    /// Build a kind from the wire-level discriminator and the nullable
    /// reference triplet.
    ///
    /// An unknown discriminator is rejected with
    /// [`ValidationError::InvalidNodeType`]; a known discriminator whose
    /// matching reference is absent is rejected with
    /// [`ValidationError::MissingRequiredAttribute`]. References for other
    /// kinds are ignored.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use carstruct_core::models::{GroupId, NodeKind};
    ///
    /// let kind = NodeKind::from_parts("GROUP", None, Some(20), None).unwrap();
    /// assert_eq!(kind, NodeKind::Group(GroupId(20)));
    /// assert!(NodeKind::from_parts("ENGINE", None, None, None).is_err());
    /// assert!(NodeKind::from_parts("USAGE", None, None, None).is_err());
    /// ```
    pub fn from_parts(
        node_type: &str,
        category_id: Option<i64>,
        group_id: Option<i64>,
        usage_id: Option<i64>,
    ) -> Result<Self, ValidationError> {
        match node_type {
            "CATEGORY" => category_id
                .map(|id| NodeKind::Category(CategoryId(id)))
                .ok_or(ValidationError::MissingRequiredAttribute {
                    node_type: "CATEGORY",
                    attribute: "category",
                }),
            "GROUP" => group_id.map(|id| NodeKind::Group(GroupId(id))).ok_or(
                ValidationError::MissingRequiredAttribute {
                    node_type: "GROUP",
                    attribute: "group",
                },
            ),
            "USAGE" => usage_id.map(|id| NodeKind::Usage(UsageId(id))).ok_or(
                ValidationError::MissingRequiredAttribute {
                    node_type: "USAGE",
                    attribute: "usage",
                },
            ),
            other => Err(ValidationError::InvalidNodeType(other.to_string())),
        }
    }

    /// Wire-level discriminator for this kind.
    pub fn type_code(&self) -> &'static str {
        match self {
            NodeKind::Category(_) => "CATEGORY",
            NodeKind::Group(_) => "GROUP",
            NodeKind::Usage(_) => "USAGE",
        }
    }

    fn code_prefix(&self) -> &'static str {
        match self {
            NodeKind::Category(_) => "CAT",
            NodeKind::Group(_) => "GRP",
            NodeKind::Usage(_) => "USG",
        }
    }

    /// Generate a fresh node code for this kind (`CAT_`/`GRP_`/`USG_` prefix
    /// plus a unique suffix).
    ///
    /// Codes are the identity key for structural diffing, so generated codes
    /// must not collide within an owner's tree.
    pub fn generate_code(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}_{}", self.code_prefix(), &suffix[..16])
    }
}

/// Logical lifecycle status shared by nodes and owning trees.
///
/// `ENABLED ⇄ DISABLED` toggles freely; `DELETED` is terminal. Physical
/// removal is a separate, explicit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Enabled,
    Disabled,
    Deleted,
}

impl Status {
    /// Whether a transition from `self` to `to` is allowed.
    pub fn can_transition(self, to: Status) -> bool {
        match self {
            Status::Deleted => to == Status::Deleted,
            Status::Enabled | Status::Disabled => true,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Status::Enabled => "ENABLED",
            Status::Disabled => "DISABLED",
            Status::Deleted => "DELETED",
        };
        f.write_str(code)
    }
}

/// A single node of a structure tree.
///
/// # Fields
///
/// - `id`: persisted identifier, `None` until the first save
/// - `owner_id`: the template or instance whose tree this node belongs to
/// - `parent_id`: parent node within the same owner, `None` for a root
/// - `kind`: node type plus its type-specific catalog reference
/// - `code`: business identity, expected unique within one owner's tree
///   (the structural-diff key)
/// - `name` / `name_en`: display names
/// - `sort_order`: display order among siblings; ties are broken by id at
///   read time
/// - `path` / `level`: materialized position, maintained by
///   [`assign_path`](Self::assign_path)
/// - `status`: logical lifecycle state
/// - audit fields: `creator`, `created_at`, `updated_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureNode {
    pub id: Option<NodeId>,
    pub owner_id: OwnerId,
    pub parent_id: Option<NodeId>,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub code: String,
    pub name: String,
    pub name_en: Option<String>,
    pub sort_order: i32,
    pub path: Option<String>,
    pub level: i32,
    pub status: Status,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn require_text(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

impl StructureNode {
    /// Create a root node value (no parent).
    ///
    /// `path` and `level` stay unset: they are computed by
    /// [`assign_path`](Self::assign_path) once the store has assigned an id.
    pub fn create_root(
        owner_id: OwnerId,
        kind: NodeKind,
        code: String,
        name: String,
        name_en: Option<String>,
        sort_order: Option<i32>,
        creator: String,
    ) -> Result<Self, ValidationError> {
        Self::create(owner_id, None, kind, code, name, name_en, sort_order, creator)
    }

    /// Create a child node value under `parent_id`.
    ///
    /// The caller is responsible for having resolved the parent within the
    /// same owner scope before building the child.
    #[allow(clippy::too_many_arguments)]
    pub fn create_child(
        owner_id: OwnerId,
        parent_id: NodeId,
        kind: NodeKind,
        code: String,
        name: String,
        name_en: Option<String>,
        sort_order: Option<i32>,
        creator: String,
    ) -> Result<Self, ValidationError> {
        Self::create(
            owner_id,
            Some(parent_id),
            kind,
            code,
            name,
            name_en,
            sort_order,
            creator,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn create(
        owner_id: OwnerId,
        parent_id: Option<NodeId>,
        kind: NodeKind,
        code: String,
        name: String,
        name_en: Option<String>,
        sort_order: Option<i32>,
        creator: String,
    ) -> Result<Self, ValidationError> {
        require_text(&code, "code")?;
        require_text(&name, "name")?;
        require_text(&creator, "creator")?;
        let now = Utc::now();

        Ok(Self {
            id: None,
            owner_id,
            parent_id,
            kind,
            code,
            name,
            name_en,
            sort_order: sort_order.unwrap_or(0),
            path: None,
            level: 0,
            status: Status::Enabled,
            creator,
            created_at: now,
            updated_at: now,
        })
    }

    /// Recompute the materialized path and depth from the persisted id and
    /// the resolved parent.
    ///
    /// Must run exactly once after the first save and again after every
    /// successful move. Fails if the node has no id yet, or if the parent's
    /// own path has not been assigned.
    pub fn assign_path(&mut self, parent: Option<&StructureNode>) -> Result<(), ValidationError> {
        let id = self.id.ok_or(ValidationError::MissingField("id"))?;
        match parent {
            Some(parent) => {
                let parent_path = parent
                    .path
                    .as_deref()
                    .ok_or(ValidationError::MissingField("parent path"))?;
                self.path = Some(path::compose(Some(parent_path), id));
                self.level = parent.level + 1;
            }
            None => {
                self.path = Some(path::compose(None, id));
                self.level = 0;
            }
        }
        self.touch();
        Ok(())
    }

    /// Rename the node.
    pub fn update_info(
        &mut self,
        name: String,
        name_en: Option<String>,
    ) -> Result<(), ValidationError> {
        require_text(&name, "name")?;
        self.name = name;
        self.name_en = name_en;
        self.touch();
        Ok(())
    }

    /// Apply a status transition, rejecting moves out of the terminal
    /// `DELETED` state.
    pub fn transition_status(&mut self, to: Status) -> Result<(), ValidationError> {
        if !self.status.can_transition(to) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    /// Bump the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::owner::{InstanceId, TemplateId};

    fn category_kind() -> NodeKind {
        NodeKind::Category(CategoryId(10))
    }

    #[test]
    fn test_from_parts_selects_matching_reference() {
        let kind = NodeKind::from_parts("USAGE", Some(1), Some(2), Some(30)).unwrap();
        assert_eq!(kind, NodeKind::Usage(UsageId(30)));
    }

    #[test]
    fn test_from_parts_rejects_unknown_type() {
        let err = NodeKind::from_parts("ENGINE", None, None, None).unwrap_err();
        assert_eq!(err, ValidationError::InvalidNodeType("ENGINE".to_string()));
    }

    #[test]
    fn test_from_parts_rejects_missing_reference() {
        let err = NodeKind::from_parts("CATEGORY", None, Some(2), None).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingRequiredAttribute {
                node_type: "CATEGORY",
                ..
            }
        ));
    }

    #[test]
    fn test_generated_codes_carry_kind_prefix() {
        assert!(NodeKind::Group(GroupId(1)).generate_code().starts_with("GRP_"));
        assert!(category_kind().generate_code().starts_with("CAT_"));
        let a = category_kind().generate_code();
        let b = category_kind().generate_code();
        assert_ne!(a, b);
    }

    #[test]
    fn test_create_root_defaults() {
        let node = StructureNode::create_root(
            OwnerId::Template(TemplateId(1)),
            category_kind(),
            "CAT_X".to_string(),
            "底盘".to_string(),
            None,
            None,
            "tester".to_string(),
        )
        .unwrap();
        assert_eq!(node.id, None);
        assert_eq!(node.parent_id, None);
        assert_eq!(node.sort_order, 0);
        assert_eq!(node.status, Status::Enabled);
        assert_eq!(node.path, None);
    }

    #[test]
    fn test_create_rejects_blank_fields() {
        let err = StructureNode::create_root(
            OwnerId::Instance(InstanceId(1)),
            category_kind(),
            "  ".to_string(),
            "name".to_string(),
            None,
            None,
            "tester".to_string(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("code"));
    }

    #[test]
    fn test_assign_path_requires_persisted_id() {
        let mut node = StructureNode::create_root(
            OwnerId::Template(TemplateId(1)),
            category_kind(),
            "CAT_X".to_string(),
            "name".to_string(),
            None,
            None,
            "tester".to_string(),
        )
        .unwrap();
        assert_eq!(
            node.assign_path(None),
            Err(ValidationError::MissingField("id"))
        );

        node.id = Some(NodeId(42));
        node.assign_path(None).unwrap();
        assert_eq!(node.path.as_deref(), Some("42"));
        assert_eq!(node.level, 0);
    }

    #[test]
    fn test_assign_path_under_parent() {
        let mut parent = StructureNode::create_root(
            OwnerId::Template(TemplateId(1)),
            category_kind(),
            "CAT_P".to_string(),
            "parent".to_string(),
            None,
            None,
            "tester".to_string(),
        )
        .unwrap();
        parent.id = Some(NodeId(7));
        parent.assign_path(None).unwrap();

        let mut child = StructureNode::create_child(
            OwnerId::Template(TemplateId(1)),
            NodeId(7),
            NodeKind::Group(GroupId(20)),
            "GRP_C".to_string(),
            "child".to_string(),
            None,
            None,
            "tester".to_string(),
        )
        .unwrap();
        child.id = Some(NodeId(9));
        child.assign_path(Some(&parent)).unwrap();
        assert_eq!(child.path.as_deref(), Some("7-9"));
        assert_eq!(child.level, 1);
    }

    #[test]
    fn test_node_wire_shape() {
        let mut node = StructureNode::create_root(
            OwnerId::Template(TemplateId(3)),
            NodeKind::Group(GroupId(20)),
            "GRP_AXLE".to_string(),
            "车桥".to_string(),
            Some("Axle".to_string()),
            Some(2),
            "tester".to_string(),
        )
        .unwrap();
        node.id = Some(NodeId(9));
        node.assign_path(None).unwrap();

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["nodeType"], "GROUP");
        assert_eq!(json["nodeRef"], 20);
        assert_eq!(json["ownerId"]["template"], 3);
        assert_eq!(json["sortOrder"], 2);
        assert_eq!(json["path"], "9");
        assert_eq!(json["status"], "ENABLED");

        let back: StructureNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_deleted_status_is_terminal() {
        let mut node = StructureNode::create_root(
            OwnerId::Template(TemplateId(1)),
            category_kind(),
            "CAT_X".to_string(),
            "name".to_string(),
            None,
            None,
            "tester".to_string(),
        )
        .unwrap();
        node.transition_status(Status::Disabled).unwrap();
        node.transition_status(Status::Enabled).unwrap();
        node.transition_status(Status::Deleted).unwrap();
        let err = node.transition_status(Status::Enabled).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidStatusTransition {
                from: Status::Deleted,
                to: Status::Enabled,
            }
        );
    }
}
