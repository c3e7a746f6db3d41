//! Engine Result Values
//!
//! Value types returned by tree-level operations: structural diffs, clone
//! outcomes, and validation reports. The application layer serializes these
//! as-is.

use crate::models::node::{NodeId, StructureNode};
use serde::{Deserialize, Serialize};

/// A node present in only one of the two compared trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    pub code: String,
    pub node: StructureNode,
}

/// A node present in both trees whose structural identity differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedEntry {
    pub code: String,
    pub old_node: StructureNode,
    pub new_node: StructureNode,
}

/// Structural comparison of two trees, keyed by node code.
///
/// `sort_order` and `status` never contribute to `modified`: display order
/// and lifecycle state are not structural identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureDiff {
    pub added: Vec<DiffEntry>,
    pub removed: Vec<DiffEntry>,
    pub modified: Vec<ModifiedEntry>,
    pub total_added: usize,
    pub total_removed: usize,
    pub total_modified: usize,
}

impl StructureDiff {
    pub fn new(
        added: Vec<DiffEntry>,
        removed: Vec<DiffEntry>,
        modified: Vec<ModifiedEntry>,
    ) -> Self {
        Self {
            total_added: added.len(),
            total_removed: removed.len(),
            total_modified: modified.len(),
            added,
            removed,
            modified,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_added == 0 && self.total_removed == 0 && self.total_modified == 0
    }
}

/// Outcome of cloning one owner's tree into another owner scope.
///
/// `skipped` lists source nodes whose parent chain never resolved; they (and
/// their descendants) are excluded from the clone rather than failing the
/// whole operation, and are surfaced here so callers cannot miss the data
/// loss.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneReport {
    pub cloned: usize,
    pub skipped: Vec<NodeId>,
}

/// Result of a structural integrity check over one owner's node set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
}
