//! In-Memory Store Backends
//!
//! Arena-backed implementations of the persistence contracts: every owner's
//! node set lives in its own map keyed by node id, with a side index from
//! node id to owner for id-based lookups. This is the reference backend and
//! the one the test suite runs against; durable backends live with the
//! embedding application.
//!
//! Ids are assigned from a store-wide counter, so node ids are unique across
//! owners (materialized paths rely on that).

use crate::models::{
    InstanceId, NodeId, OwnerId, Status, StructureInstance, StructureNode, StructureTemplate,
    TemplateId,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::node_store::NodeStore;
use super::owner_store::{InstanceStore, TemplateStore};

#[derive(Default)]
struct NodeArenas {
    next_id: i64,
    arenas: HashMap<OwnerId, BTreeMap<NodeId, StructureNode>>,
    owners: HashMap<NodeId, OwnerId>,
}

/// In-memory [`NodeStore`] holding template-owned and instance-owned nodes
/// in per-owner arenas.
#[derive(Default)]
pub struct MemoryNodeStore {
    inner: Mutex<NodeArenas>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, NodeArenas>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("node store mutex poisoned"))
    }
}

fn in_display_order(mut nodes: Vec<StructureNode>) -> Vec<StructureNode> {
    nodes.sort_by_key(|n| (n.sort_order, n.id));
    nodes
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn save(&self, mut node: StructureNode) -> Result<StructureNode> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let id = NodeId(inner.next_id);
        node.id = Some(id);
        inner.owners.insert(id, node.owner_id);
        inner
            .arenas
            .entry(node.owner_id)
            .or_default()
            .insert(id, node.clone());
        Ok(node)
    }

    async fn save_batch(&self, nodes: Vec<StructureNode>) -> Result<Vec<StructureNode>> {
        let mut inner = self.lock()?;
        let mut saved = Vec::with_capacity(nodes.len());
        for mut node in nodes {
            inner.next_id += 1;
            let id = NodeId(inner.next_id);
            node.id = Some(id);
            inner.owners.insert(id, node.owner_id);
            inner
                .arenas
                .entry(node.owner_id)
                .or_default()
                .insert(id, node.clone());
            saved.push(node);
        }
        Ok(saved)
    }

    async fn update(&self, node: &StructureNode) -> Result<u64> {
        let mut inner = self.lock()?;
        let Some(id) = node.id else {
            return Ok(0);
        };
        let Some(owner) = inner.owners.get(&id).copied() else {
            return Ok(0);
        };
        match inner.arenas.get_mut(&owner).and_then(|arena| arena.get_mut(&id)) {
            Some(slot) => {
                *slot = node.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find_by_id(&self, id: NodeId) -> Result<Option<StructureNode>> {
        let inner = self.lock()?;
        let Some(owner) = inner.owners.get(&id) else {
            return Ok(None);
        };
        Ok(inner
            .arenas
            .get(owner)
            .and_then(|arena| arena.get(&id))
            .cloned())
    }

    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Vec<StructureNode>> {
        let inner = self.lock()?;
        Ok(inner
            .arenas
            .get(&owner_id)
            .map(|arena| arena.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_by_parent(&self, parent_id: NodeId) -> Result<Vec<StructureNode>> {
        let inner = self.lock()?;
        let Some(owner) = inner.owners.get(&parent_id) else {
            return Ok(Vec::new());
        };
        let children = inner
            .arenas
            .get(owner)
            .map(|arena| {
                arena
                    .values()
                    .filter(|n| n.parent_id == Some(parent_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(in_display_order(children))
    }

    async fn find_roots(&self, owner_id: OwnerId) -> Result<Vec<StructureNode>> {
        let inner = self.lock()?;
        let roots = inner
            .arenas
            .get(&owner_id)
            .map(|arena| {
                arena
                    .values()
                    .filter(|n| n.parent_id.is_none())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(in_display_order(roots))
    }

    async fn find_by_path_prefix(
        &self,
        owner_id: OwnerId,
        prefix: &str,
    ) -> Result<Vec<StructureNode>> {
        let inner = self.lock()?;
        Ok(inner
            .arenas
            .get(&owner_id)
            .map(|arena| {
                arena
                    .values()
                    .filter(|n| n.path.as_deref().is_some_and(|p| p.starts_with(prefix)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_by_id(&self, id: NodeId) -> Result<u64> {
        let mut inner = self.lock()?;
        let Some(owner) = inner.owners.remove(&id) else {
            return Ok(0);
        };
        let removed = inner
            .arenas
            .get_mut(&owner)
            .and_then(|arena| arena.remove(&id))
            .is_some();
        Ok(u64::from(removed))
    }

    async fn delete_by_owner(&self, owner_id: OwnerId) -> Result<u64> {
        let mut inner = self.lock()?;
        let Some(arena) = inner.arenas.remove(&owner_id) else {
            return Ok(0);
        };
        for id in arena.keys() {
            inner.owners.remove(id);
        }
        Ok(arena.len() as u64)
    }

    async fn delete_by_path_prefix(&self, owner_id: OwnerId, prefix: &str) -> Result<u64> {
        let mut inner = self.lock()?;
        let Some(arena) = inner.arenas.get_mut(&owner_id) else {
            return Ok(0);
        };
        let doomed: Vec<NodeId> = arena
            .values()
            .filter(|n| n.path.as_deref().is_some_and(|p| p.starts_with(prefix)))
            .filter_map(|n| n.id)
            .collect();
        for id in &doomed {
            arena.remove(id);
        }
        for id in &doomed {
            inner.owners.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

#[derive(Default)]
struct TemplateRows {
    next_id: i64,
    rows: BTreeMap<TemplateId, StructureTemplate>,
}

/// In-memory [`TemplateStore`].
#[derive(Default)]
pub struct MemoryTemplateStore {
    inner: Mutex<TemplateRows>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, TemplateRows>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("template store mutex poisoned"))
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn save(&self, mut template: StructureTemplate) -> Result<StructureTemplate> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let id = TemplateId(inner.next_id);
        template.id = Some(id);
        inner.rows.insert(id, template.clone());
        Ok(template)
    }

    async fn update(&self, template: &StructureTemplate) -> Result<u64> {
        let mut inner = self.lock()?;
        let Some(id) = template.id else {
            return Ok(0);
        };
        match inner.rows.get_mut(&id) {
            Some(slot) => {
                *slot = template.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find_by_id(&self, id: TemplateId) -> Result<Option<StructureTemplate>> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    async fn find_by_code_and_version(
        &self,
        code: &str,
        version: &str,
    ) -> Result<Option<StructureTemplate>> {
        Ok(self
            .lock()?
            .rows
            .values()
            .find(|t| t.code == code && t.version == version)
            .cloned())
    }

    async fn exists_by_code_and_version(&self, code: &str, version: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .rows
            .values()
            .any(|t| t.code == code && t.version == version))
    }

    async fn update_status(&self, id: TemplateId, status: Status) -> Result<u64> {
        let mut inner = self.lock()?;
        match inner.rows.get_mut(&id) {
            Some(template) => {
                template.status = status;
                template.touch();
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[derive(Default)]
struct InstanceRows {
    next_id: i64,
    rows: BTreeMap<InstanceId, StructureInstance>,
}

/// In-memory [`InstanceStore`].
#[derive(Default)]
pub struct MemoryInstanceStore {
    inner: Mutex<InstanceRows>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InstanceRows>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("instance store mutex poisoned"))
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn save(&self, mut instance: StructureInstance) -> Result<StructureInstance> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let id = InstanceId(inner.next_id);
        instance.id = Some(id);
        inner.rows.insert(id, instance.clone());
        Ok(instance)
    }

    async fn update(&self, instance: &StructureInstance) -> Result<u64> {
        let mut inner = self.lock()?;
        let Some(id) = instance.id else {
            return Ok(0);
        };
        match inner.rows.get_mut(&id) {
            Some(slot) => {
                *slot = instance.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find_by_id(&self, id: InstanceId) -> Result<Option<StructureInstance>> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    async fn find_by_code_and_version(
        &self,
        code: &str,
        version: &str,
    ) -> Result<Option<StructureInstance>> {
        Ok(self
            .lock()?
            .rows
            .values()
            .find(|i| i.code == code && i.version == version)
            .cloned())
    }

    async fn exists_by_code_and_version(&self, code: &str, version: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .rows
            .values()
            .any(|i| i.code == code && i.version == version))
    }

    async fn update_status(&self, id: InstanceId, status: Status) -> Result<u64> {
        let mut inner = self.lock()?;
        match inner.rows.get_mut(&id) {
            Some(instance) => {
                instance.status = status;
                instance.touch();
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
