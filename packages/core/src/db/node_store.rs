//! NodeStore Trait - Persistence Abstraction for Tree Nodes
//!
//! One contract serves both tree flavors: template-owned and instance-owned
//! nodes share a schema and are kept disjoint by the [`OwnerId`] key, so a
//! single trait (and, if desired, a single backing table) covers both.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: all methods are async so embedded and networked
//!    backends can implement the same trait.
//! 2. **Affected-row counts**: `update` and the delete methods report how
//!    many rows they touched; the service layer turns a zero-row update of
//!    the operated-on node into a typed error instead of silently
//!    succeeding.
//! 3. **Error Handling**: `anyhow::Result` for flexible backend context;
//!    services translate failures into their own error type.
//! 4. **No transactions here**: move, clone, and validate perform
//!    multi-statement read-modify-write sequences. The caller owns the
//!    transaction boundary and should hold a per-owner lock for the duration
//!    of those calls; the engine never locks on its own.

use crate::models::{NodeId, OwnerId, StructureNode};
use anyhow::Result;
use async_trait::async_trait;

/// Abstraction layer for structure-node persistence.
///
/// Implementations must be `Send + Sync`; handles are shared via `Arc`.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Persist a new node and assign its id.
    ///
    /// The returned node carries the store-assigned [`NodeId`]; `path` and
    /// `level` are still unassigned at this point (the engine computes them
    /// as a second step and calls [`update`](Self::update)).
    async fn save(&self, node: StructureNode) -> Result<StructureNode>;

    /// Persist a batch of new nodes, assigning ids in input order.
    ///
    /// Atomic only to the extent the caller's transaction makes it so.
    async fn save_batch(&self, nodes: Vec<StructureNode>) -> Result<Vec<StructureNode>>;

    /// Overwrite a persisted node, returning the number of affected rows.
    ///
    /// Zero means the node vanished between load and write (concurrent
    /// delete); the engine surfaces that as a typed error for the node it
    /// operates on.
    async fn update(&self, node: &StructureNode) -> Result<u64>;

    async fn find_by_id(&self, id: NodeId) -> Result<Option<StructureNode>>;

    /// All nodes of one owner's tree, ordered by id.
    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Vec<StructureNode>>;

    /// Direct children of a node, in display order (`sort_order`, ties by
    /// id).
    async fn find_by_parent(&self, parent_id: NodeId) -> Result<Vec<StructureNode>>;

    /// Root nodes of one owner's tree, in display order.
    async fn find_roots(&self, owner_id: OwnerId) -> Result<Vec<StructureNode>>;

    /// Subtree scan: every node of `owner_id` whose materialized path starts
    /// with `prefix`. Used by move (descendant rewrite) and subtree queries.
    async fn find_by_path_prefix(&self, owner_id: OwnerId, prefix: &str)
        -> Result<Vec<StructureNode>>;

    /// Physically remove one node. Returns affected rows (0 or 1).
    async fn delete_by_id(&self, id: NodeId) -> Result<u64>;

    /// Physically remove an owner's entire node set. Returns removed count.
    async fn delete_by_owner(&self, owner_id: OwnerId) -> Result<u64>;

    /// Physically remove every node of `owner_id` whose path starts with
    /// `prefix` (cascading subtree delete). Returns removed count.
    async fn delete_by_path_prefix(&self, owner_id: OwnerId, prefix: &str) -> Result<u64>;
}
