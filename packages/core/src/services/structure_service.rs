//! Structure Tree Service - Unified Tree Engine
//!
//! One engine serves both tree flavors (template trees and instance trees):
//! the owner id a node carries decides the flavor-specific rules, everything
//! else is shared. The engine owns:
//!
//! - Node creation with materialized-path assignment (two-step: the path is
//!   computed only after the store has assigned an id)
//! - Subtree relocation with cycle prevention and descendant path rewrite
//! - Sibling display-order renumbering
//! - Whole-tree cloning into a new owner scope
//! - Structural validation and two-tree structural diffing
//!
//! # Concurrency Contract
//!
//! Move, clone, and validate are unguarded read-then-multi-row-write
//! sequences. The engine performs no locking and owns no transaction: the
//! caller must supply an ambient atomic-execution context and should hold a
//! lock scoped to the owning tree for the duration of those calls. Two
//! overlapping moves on the same tree without such a lock can interleave
//! their subtree scans and leave inconsistent paths.

use crate::db::NodeStore;
use crate::models::{
    path, CloneReport, DiffEntry, ModifiedEntry, NodeId, NodeKind, OwnerId, Status,
    StructureDiff, StructureNode, ValidationError, ValidationReport,
};
use crate::services::error::StructureServiceError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One node of a tree to be imported in bulk under a single parent.
#[derive(Debug, Clone)]
pub struct ImportNode {
    pub kind: NodeKind,
    pub code: String,
    pub name: String,
    pub name_en: Option<String>,
    pub sort_order: Option<i32>,
}

/// Core engine for structure-tree operations.
///
/// Generic over the node store so durable backends and the in-memory
/// reference backend share one implementation.
pub struct StructureTreeService<S: NodeStore> {
    store: Arc<S>,
}

impl<S: NodeStore> Clone for StructureTreeService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: NodeStore> StructureTreeService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    //
    // NODE CREATION
    //

    /// Create a root node for `owner_id`.
    ///
    /// Template trees allow exactly one root; a second root on a template
    /// owner is rejected with `MultipleRoots` before anything is written.
    /// Instance trees may grow any number of independent roots.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_root_node(
        &self,
        owner_id: OwnerId,
        kind: NodeKind,
        code: String,
        name: String,
        name_en: Option<String>,
        sort_order: Option<i32>,
        creator: String,
    ) -> Result<StructureNode, StructureServiceError> {
        if !owner_id.kind().allows_multiple_roots() {
            let roots = self.store.find_roots(owner_id).await?;
            if !roots.is_empty() {
                return Err(StructureServiceError::multiple_roots(owner_id));
            }
        }
        let node =
            StructureNode::create_root(owner_id, kind, code, name, name_en, sort_order, creator)?;
        let node = self.persist_positioned(node, None).await?;
        tracing::debug!(node_id = %display_id(&node), owner = %owner_id, "created root node");
        Ok(node)
    }

    /// Create a child node under `parent_id`, which must already exist in
    /// the same owner scope.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_child_node(
        &self,
        owner_id: OwnerId,
        parent_id: NodeId,
        kind: NodeKind,
        code: String,
        name: String,
        name_en: Option<String>,
        sort_order: Option<i32>,
        creator: String,
    ) -> Result<StructureNode, StructureServiceError> {
        let parent = self
            .store
            .find_by_id(parent_id)
            .await?
            .filter(|p| p.owner_id == owner_id)
            .ok_or_else(|| StructureServiceError::parent_not_found(parent_id))?;
        let node = StructureNode::create_child(
            owner_id, parent_id, kind, code, name, name_en, sort_order, creator,
        )?;
        let node = self.persist_positioned(node, Some(&parent)).await?;
        tracing::debug!(node_id = %display_id(&node), owner = %owner_id, "created child node");
        Ok(node)
    }

    /// Save a freshly built node, then assign its path/level from the now
    /// persisted id and write it back.
    async fn persist_positioned(
        &self,
        node: StructureNode,
        parent: Option<&StructureNode>,
    ) -> Result<StructureNode, StructureServiceError> {
        let mut node = self.store.save(node).await?;
        node.assign_path(parent)?;
        let affected = self.store.update(&node).await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "node {} vanished before its path could be assigned",
                display_id(&node)
            )));
        }
        Ok(node)
    }

    /// Rename a node and optionally reposition it among its siblings.
    pub async fn update_node_info(
        &self,
        node_id: NodeId,
        name: String,
        name_en: Option<String>,
        sort_order: Option<i32>,
    ) -> Result<StructureNode, StructureServiceError> {
        let mut node = self.require_node(node_id).await?;
        node.update_info(name, name_en)?;
        let affected = self.store.update(&node).await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "node {node_id} vanished during rename"
            )));
        }
        if sort_order.is_some() {
            self.adjust_order(&mut node, sort_order).await?;
        }
        Ok(node)
    }

    //
    // MOVE
    //

    /// Reparent a node, rewriting the materialized paths and levels of its
    /// whole subtree, then apply the requested display position.
    ///
    /// If the target parent equals the current parent (both may be none),
    /// the call degenerates to a pure sibling reorder.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` / `ParentNotFound` before any mutation
    /// - `CircularReference` when the target parent sits inside the moved
    ///   node's own subtree (or is the node itself); the tree is untouched
    /// - `StaleWrite` when the moved node's update affects zero rows
    pub async fn move_node(
        &self,
        node_id: NodeId,
        new_parent_id: Option<NodeId>,
        sort_order: Option<i32>,
    ) -> Result<(), StructureServiceError> {
        let mut node = self.require_node(node_id).await?;
        if node.parent_id == new_parent_id {
            return self.adjust_order(&mut node, sort_order).await;
        }
        let old_path = stored_path(&node)?.to_string();
        let old_level = node.level;

        match new_parent_id {
            Some(parent_id) => {
                if parent_id == node_id {
                    return Err(StructureServiceError::circular_reference(node_id, parent_id));
                }
                let parent = self
                    .store
                    .find_by_id(parent_id)
                    .await?
                    .filter(|p| p.owner_id == node.owner_id)
                    .ok_or_else(|| StructureServiceError::parent_not_found(parent_id))?;
                let parent_path = stored_path(&parent)?;
                if path::contains_segment(parent_path, node_id) {
                    return Err(StructureServiceError::circular_reference(node_id, parent_id));
                }
                node.parent_id = Some(parent_id);
                node.assign_path(Some(&parent))?;
            }
            None => {
                node.parent_id = None;
                node.assign_path(None)?;
            }
        }

        let affected = self.store.update(&node).await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "node {node_id} vanished during move"
            )));
        }

        let new_path = stored_path(&node)?.to_string();
        let level_delta = node.level - old_level;
        self.rewrite_subtree(node.owner_id, &old_path, &new_path, level_delta)
            .await?;
        tracing::debug!(
            node_id = %node_id,
            old_path = %old_path,
            new_path = %new_path,
            "moved node"
        );

        self.adjust_order(&mut node, sort_order).await
    }

    /// Rewrite every descendant of the pre-move path in one logical pass:
    /// replace the captured old prefix with the new one and shift levels by
    /// the delta the moved node itself experienced.
    async fn rewrite_subtree(
        &self,
        owner_id: OwnerId,
        old_path: &str,
        new_path: &str,
        level_delta: i32,
    ) -> Result<(), StructureServiceError> {
        let prefix = path::descendant_prefix(old_path);
        let descendants = self.store.find_by_path_prefix(owner_id, &prefix).await?;
        for mut descendant in descendants {
            let current = stored_path(&descendant)?.to_string();
            descendant.path = Some(path::rebase(&current, old_path, new_path));
            descendant.level += level_delta;
            descendant.touch();
            let affected = self.store.update(&descendant).await?;
            if affected == 0 {
                tracing::warn!(
                    node_id = %display_id(&descendant),
                    "descendant vanished during subtree rewrite"
                );
            }
        }
        Ok(())
    }

    //
    // DISPLAY ORDER
    //

    /// Reposition a node among its current siblings.
    pub async fn reorder_node(
        &self,
        node_id: NodeId,
        sort_order: Option<i32>,
    ) -> Result<(), StructureServiceError> {
        let mut node = self.require_node(node_id).await?;
        self.adjust_order(&mut node, sort_order).await
    }

    /// Renumber the sibling set so display orders stay dense and unique.
    ///
    /// The target position is clamped to `1..=sibling_count + 1`; no target
    /// means append last. Remaining siblings are renumbered sequentially
    /// from 1, skipping the slot reserved for the node. The same rule
    /// applies to both tree flavors, and re-applying it is a no-op.
    async fn adjust_order(
        &self,
        node: &mut StructureNode,
        sort_order: Option<i32>,
    ) -> Result<(), StructureServiceError> {
        let node_id = node.id;
        let siblings: Vec<StructureNode> = match node.parent_id {
            Some(parent_id) => self.store.find_by_parent(parent_id).await?,
            None => self.store.find_roots(node.owner_id).await?,
        }
        .into_iter()
        .filter(|sibling| sibling.id != node_id)
        .collect();

        let slot_count = siblings.len() as i32 + 1;
        let target = sort_order.unwrap_or(slot_count).clamp(1, slot_count);
        node.sort_order = target;
        node.touch();
        let affected = self.store.update(node).await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "node {} vanished during reorder",
                display_id(node)
            )));
        }

        let mut ordered = siblings;
        ordered.sort_by_key(|sibling| (sibling.sort_order, sibling.id));
        let mut next = 1;
        for mut sibling in ordered {
            if next == target {
                next += 1;
            }
            if sibling.sort_order != next {
                sibling.sort_order = next;
                sibling.touch();
                let affected = self.store.update(&sibling).await?;
                if affected == 0 {
                    tracing::warn!(
                        node_id = %display_id(&sibling),
                        "sibling vanished during reorder"
                    );
                }
            }
            next += 1;
        }
        Ok(())
    }

    //
    // CLONING
    //

    /// Deep-copy the whole node set of `source_owner` into
    /// `target_owner`'s scope.
    ///
    /// Clones are fresh rows: new ids, paths recomputed for the new owner,
    /// business fields copied verbatim. No link back to the source is kept;
    /// later correlation is only possible via matching codes.
    ///
    /// Source nodes are processed in level order (parents before children),
    /// so the whole set clones in a single pass. A source node whose parent
    /// never resolves - a dangling reference in the source data - is
    /// excluded together with its descendants and reported in
    /// [`CloneReport::skipped`] rather than failing the clone; run
    /// [`validate`](Self::validate) on the source owner to chase the root
    /// cause.
    pub async fn clone_tree(
        &self,
        source_owner: OwnerId,
        target_owner: OwnerId,
        creator: &str,
    ) -> Result<CloneReport, StructureServiceError> {
        if creator.trim().is_empty() {
            return Err(ValidationError::MissingField("creator").into());
        }
        let mut source_nodes = self.store.find_by_owner(source_owner).await?;
        if source_nodes.is_empty() {
            return Ok(CloneReport::default());
        }
        source_nodes.sort_by_key(|n| (n.level, n.id));

        let mut clones_by_source: HashMap<NodeId, StructureNode> = HashMap::new();
        let mut skipped = Vec::new();
        let mut cloned = 0usize;

        for source in &source_nodes {
            let source_id = persisted_id(source)?;
            let parent_clone = match source.parent_id {
                None => None,
                Some(source_parent) => match clones_by_source.get(&source_parent) {
                    Some(clone) => Some(clone.clone()),
                    None => {
                        skipped.push(source_id);
                        continue;
                    }
                },
            };

            let draft = match &parent_clone {
                None => StructureNode::create_root(
                    target_owner,
                    source.kind,
                    source.code.clone(),
                    source.name.clone(),
                    source.name_en.clone(),
                    Some(source.sort_order),
                    creator.to_string(),
                )?,
                Some(parent) => StructureNode::create_child(
                    target_owner,
                    persisted_id(parent)?,
                    source.kind,
                    source.code.clone(),
                    source.name.clone(),
                    source.name_en.clone(),
                    Some(source.sort_order),
                    creator.to_string(),
                )?,
            };
            let clone = self.persist_positioned(draft, parent_clone.as_ref()).await?;
            clones_by_source.insert(source_id, clone);
            cloned += 1;
        }

        if !skipped.is_empty() {
            tracing::warn!(
                source = %source_owner,
                skipped = skipped.len(),
                "source nodes with unresolvable parents were excluded from the clone"
            );
        }
        tracing::info!(
            source = %source_owner,
            target = %target_owner,
            cloned,
            "cloned structure tree"
        );
        Ok(CloneReport { cloned, skipped })
    }

    //
    // VALIDATION
    //

    /// Structural integrity check over one owner's full node set.
    ///
    /// All checks run and every issue is reported, with one exception: the
    /// cycle walk is skipped when dangling parent references were found,
    /// since walking chains over missing parents is undefined.
    pub async fn validate(&self, owner_id: OwnerId) -> Result<ValidationReport, StructureServiceError> {
        let nodes = self.store.find_by_owner(owner_id).await?;
        let mut issues = Vec::new();

        if nodes.is_empty() {
            issues.push("no nodes".to_string());
            return Ok(ValidationReport {
                valid: false,
                issues,
            });
        }

        let root_count = nodes.iter().filter(|n| n.parent_id.is_none()).count();
        if root_count == 0 {
            issues.push("no root node".to_string());
        } else if root_count > 1 && !owner_id.kind().allows_multiple_roots() {
            issues.push("multiple root nodes".to_string());
        }

        let ids: HashSet<NodeId> = nodes.iter().filter_map(|n| n.id).collect();
        let mut dangling = false;
        for node in &nodes {
            if let Some(parent_id) = node.parent_id {
                if !ids.contains(&parent_id) {
                    dangling = true;
                    issues.push(format!(
                        "dangling parent reference: {} -> {parent_id}",
                        display_id(node)
                    ));
                }
            }
        }

        if !dangling && has_cycle(&nodes) {
            issues.push("cycle detected".to_string());
        }

        Ok(ValidationReport {
            valid: issues.is_empty(),
            issues,
        })
    }

    //
    // DIFF
    //

    /// Structural comparison of two trees, keyed by node code.
    ///
    /// A node counts as modified when its name, english name, or kind (type
    /// plus type-specific reference) differ; display order and lifecycle
    /// status are ignored. Duplicate codes within one owner - which the
    /// data model already forbids - resolve last-write-wins.
    pub async fn diff(
        &self,
        owner_a: OwnerId,
        owner_b: OwnerId,
    ) -> Result<StructureDiff, StructureServiceError> {
        let map_a = self.nodes_by_code(owner_a).await?;
        let map_b = self.nodes_by_code(owner_b).await?;

        let mut added = Vec::new();
        let mut modified = Vec::new();
        for (code, node_b) in &map_b {
            match map_a.get(code) {
                None => added.push(DiffEntry {
                    code: code.clone(),
                    node: node_b.clone(),
                }),
                Some(node_a) => {
                    if !structurally_equal(node_a, node_b) {
                        modified.push(ModifiedEntry {
                            code: code.clone(),
                            old_node: node_a.clone(),
                            new_node: node_b.clone(),
                        });
                    }
                }
            }
        }
        let mut removed = Vec::new();
        for (code, node_a) in &map_a {
            if !map_b.contains_key(code) {
                removed.push(DiffEntry {
                    code: code.clone(),
                    node: node_a.clone(),
                });
            }
        }

        added.sort_by(|a, b| a.code.cmp(&b.code));
        removed.sort_by(|a, b| a.code.cmp(&b.code));
        modified.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(StructureDiff::new(added, removed, modified))
    }

    async fn nodes_by_code(
        &self,
        owner_id: OwnerId,
    ) -> Result<HashMap<String, StructureNode>, StructureServiceError> {
        let nodes = self.store.find_by_owner(owner_id).await?;
        let mut by_code = HashMap::with_capacity(nodes.len());
        for node in nodes {
            by_code.insert(node.code.clone(), node);
        }
        Ok(by_code)
    }

    //
    // STATUS
    //

    /// Apply a lifecycle transition to one node. `DELETED` is terminal.
    pub async fn set_node_status(
        &self,
        node_id: NodeId,
        status: Status,
    ) -> Result<(), StructureServiceError> {
        let mut node = self.require_node(node_id).await?;
        node.transition_status(status)?;
        let affected = self.store.update(&node).await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "node {node_id} vanished during status change"
            )));
        }
        Ok(())
    }

    //
    // BULK IMPORT
    //

    /// Import a batch of nodes as direct children of `parent_id` (or as
    /// roots when no parent is given), in one `save_batch` round trip plus
    /// the per-node path assignment.
    ///
    /// Returns the number of imported nodes.
    pub async fn import_nodes(
        &self,
        owner_id: OwnerId,
        parent_id: Option<NodeId>,
        nodes: Vec<ImportNode>,
        creator: &str,
    ) -> Result<u64, StructureServiceError> {
        if nodes.is_empty() {
            return Ok(0);
        }
        if creator.trim().is_empty() {
            return Err(ValidationError::MissingField("creator").into());
        }
        let parent = match parent_id {
            Some(parent_id) => Some(
                self.store
                    .find_by_id(parent_id)
                    .await?
                    .filter(|p| p.owner_id == owner_id)
                    .ok_or_else(|| StructureServiceError::parent_not_found(parent_id))?,
            ),
            None => {
                if !owner_id.kind().allows_multiple_roots() {
                    let existing = self.store.find_roots(owner_id).await?.len();
                    if existing + nodes.len() > 1 {
                        return Err(StructureServiceError::multiple_roots(owner_id));
                    }
                }
                None
            }
        };

        let mut drafts = Vec::with_capacity(nodes.len());
        for import in nodes {
            let draft = match parent_id {
                Some(parent_id) => StructureNode::create_child(
                    owner_id,
                    parent_id,
                    import.kind,
                    import.code,
                    import.name,
                    import.name_en,
                    import.sort_order,
                    creator.to_string(),
                )?,
                None => StructureNode::create_root(
                    owner_id,
                    import.kind,
                    import.code,
                    import.name,
                    import.name_en,
                    import.sort_order,
                    creator.to_string(),
                )?,
            };
            drafts.push(draft);
        }

        let saved = self.store.save_batch(drafts).await?;
        let count = saved.len() as u64;
        for mut node in saved {
            node.assign_path(parent.as_ref())?;
            let affected = self.store.update(&node).await?;
            if affected == 0 {
                return Err(StructureServiceError::stale_write(format!(
                    "imported node {} vanished before its path could be assigned",
                    display_id(&node)
                )));
            }
        }
        tracing::info!(owner = %owner_id, count, "imported node batch");
        Ok(count)
    }

    //
    // QUERIES
    //

    pub async fn node(&self, node_id: NodeId) -> Result<Option<StructureNode>, StructureServiceError> {
        Ok(self.store.find_by_id(node_id).await?)
    }

    /// Every node of the owner's tree, ordered by id.
    pub async fn tree(&self, owner_id: OwnerId) -> Result<Vec<StructureNode>, StructureServiceError> {
        Ok(self.store.find_by_owner(owner_id).await?)
    }

    /// Root nodes of the owner's tree, in display order.
    pub async fn roots(&self, owner_id: OwnerId) -> Result<Vec<StructureNode>, StructureServiceError> {
        Ok(self.store.find_roots(owner_id).await?)
    }

    /// Direct children of a node, in display order.
    pub async fn children(&self, parent_id: NodeId) -> Result<Vec<StructureNode>, StructureServiceError> {
        Ok(self.store.find_by_parent(parent_id).await?)
    }

    /// The node plus its full descendant set, via path-prefix scan.
    pub async fn subtree(&self, node_id: NodeId) -> Result<Vec<StructureNode>, StructureServiceError> {
        let node = self.require_node(node_id).await?;
        let prefix = path::descendant_prefix(stored_path(&node)?);
        let mut nodes = vec![node.clone()];
        nodes.extend(
            self.store
                .find_by_path_prefix(node.owner_id, &prefix)
                .await?,
        );
        Ok(nodes)
    }

    //
    // DELETION
    //

    /// Physically remove a single node. Returns affected rows.
    pub async fn delete_node(&self, node_id: NodeId) -> Result<u64, StructureServiceError> {
        Ok(self.store.delete_by_id(node_id).await?)
    }

    /// Physically remove a node and its whole subtree (path-prefix
    /// cascade). Returns the number of removed nodes.
    pub async fn delete_subtree(&self, node_id: NodeId) -> Result<u64, StructureServiceError> {
        let node = self.require_node(node_id).await?;
        let prefix = path::descendant_prefix(stored_path(&node)?);
        let descendants = self
            .store
            .delete_by_path_prefix(node.owner_id, &prefix)
            .await?;
        let this = self.store.delete_by_id(node_id).await?;
        Ok(descendants + this)
    }

    /// Physically remove an owner's entire node set. Returns the removed
    /// count.
    pub async fn delete_tree(&self, owner_id: OwnerId) -> Result<u64, StructureServiceError> {
        let removed = self.store.delete_by_owner(owner_id).await?;
        tracing::info!(owner = %owner_id, removed, "deleted structure tree");
        Ok(removed)
    }

    async fn require_node(&self, node_id: NodeId) -> Result<StructureNode, StructureServiceError> {
        self.store
            .find_by_id(node_id)
            .await?
            .ok_or_else(|| StructureServiceError::node_not_found(node_id))
    }
}

/// Structural identity for diffing: name, english name, and kind (type plus
/// its reference). Display order and lifecycle status deliberately excluded.
fn structurally_equal(a: &StructureNode, b: &StructureNode) -> bool {
    a.name == b.name && a.name_en == b.name_en && a.kind == b.kind
}

/// Walk each node's parent chain with a per-node visited set; a revisit
/// before reaching a root means a cycle.
fn has_cycle(nodes: &[StructureNode]) -> bool {
    let by_id: HashMap<NodeId, &StructureNode> =
        nodes.iter().filter_map(|n| n.id.map(|id| (id, n))).collect();
    for node in nodes {
        let mut visited = HashSet::new();
        let mut cursor = node.id;
        while let Some(current) = cursor {
            if !visited.insert(current) {
                return true;
            }
            cursor = by_id.get(&current).and_then(|n| n.parent_id);
        }
    }
    false
}

fn persisted_id(node: &StructureNode) -> Result<NodeId, StructureServiceError> {
    node.id.ok_or_else(|| {
        StructureServiceError::store_failed(format!(
            "node with code [{}] has no persisted id",
            node.code
        ))
    })
}

fn stored_path(node: &StructureNode) -> Result<&str, StructureServiceError> {
    node.path.as_deref().ok_or_else(|| {
        StructureServiceError::store_failed(format!(
            "node {} has no materialized path",
            display_id(node)
        ))
    })
}

fn display_id(node: &StructureNode) -> String {
    match node.id {
        Some(id) => id.to_string(),
        None => "?".to_string(),
    }
}

#[cfg(test)]
#[path = "structure_service_test.rs"]
mod structure_service_test;

#[cfg(test)]
#[path = "structure_clone_test.rs"]
mod structure_clone_test;

#[cfg(test)]
#[path = "structure_audit_test.rs"]
mod structure_audit_test;
