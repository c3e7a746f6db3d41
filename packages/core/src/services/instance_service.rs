//! Instance Service - Versioned Tree Lifecycle
//!
//! Owner-level operations for structure-tree instances: creation from a
//! template (the cross-flavor clone), version forking, publishing, and the
//! owner-checked node operations. An instance never mutates in place to
//! "become" a new version - forking always produces an independent node set
//! under a new instance row.

use crate::db::{InstanceStore, NodeStore, TemplateStore};
use crate::models::{
    CloneReport, InstanceId, ModelId, NodeId, NodeKind, OwnerId, SeriesId, Status, StructureDiff,
    StructureInstance, StructureNode, TemplateId, ValidationReport,
};
use crate::services::error::StructureServiceError;
use crate::services::structure_service::{ImportNode, StructureTreeService};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Service for instance metadata and instance-owned trees.
pub struct InstanceService<S: NodeStore, R: InstanceStore, T: TemplateStore> {
    instances: Arc<R>,
    templates: Arc<T>,
    trees: StructureTreeService<S>,
}

impl<S: NodeStore, R: InstanceStore, T: TemplateStore> InstanceService<S, R, T> {
    pub fn new(instances: Arc<R>, templates: Arc<T>, nodes: Arc<S>) -> Self {
        Self {
            instances,
            templates,
            trees: StructureTreeService::new(nodes),
        }
    }

    /// The underlying tree engine, for node-level operations that need no
    /// owner check (move, reorder, status, queries).
    pub fn trees(&self) -> &StructureTreeService<S> {
        &self.trees
    }

    /// Create an instance for a series/model by cloning a template's node
    /// set into the new instance's scope.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_instance_from_template(
        &self,
        code: String,
        name: String,
        description: Option<String>,
        series_id: Option<SeriesId>,
        model_id: Option<ModelId>,
        template_id: TemplateId,
        version: String,
        creator: String,
    ) -> Result<(StructureInstance, CloneReport), StructureServiceError> {
        let instance = StructureInstance::create(
            code, name, description, series_id, model_id, version, creator.clone(),
        )?;
        if self
            .instances
            .exists_by_code_and_version(&instance.code, &instance.version)
            .await?
        {
            return Err(StructureServiceError::duplicate_version(
                instance.code,
                instance.version,
            ));
        }
        let template = self
            .templates
            .find_by_id(template_id)
            .await?
            .ok_or_else(|| StructureServiceError::template_not_found(template_id))?;
        let template_owner = template.owner_id().ok_or_else(|| {
            StructureServiceError::store_failed(format!(
                "template with code [{}] has no persisted id",
                template.code
            ))
        })?;

        let instance = self.instances.save(instance).await?;
        let report = self
            .trees
            .clone_tree(template_owner, owner_of(&instance)?, &creator)
            .await?;
        tracing::info!(
            code = %instance.code,
            version = %instance.version,
            template = %template_owner,
            cloned = report.cloned,
            "created structure instance from template"
        );
        Ok((instance, report))
    }

    /// Fork an instance into a new version, deep-copying its whole node set
    /// under the new instance row.
    pub async fn create_new_version_with_nodes(
        &self,
        source_instance_id: InstanceId,
        new_version: String,
        description: Option<String>,
        creator: String,
    ) -> Result<(StructureInstance, CloneReport), StructureServiceError> {
        let source = self.require_instance(source_instance_id).await?;
        if self
            .instances
            .exists_by_code_and_version(&source.code, &new_version)
            .await?
        {
            return Err(StructureServiceError::duplicate_version(
                source.code,
                new_version,
            ));
        }
        let new_instance = StructureInstance::create(
            source.code.clone(),
            source.name.clone(),
            description,
            source.series_id,
            source.model_id,
            new_version,
            creator.clone(),
        )?;
        let new_instance = self.instances.save(new_instance).await?;
        let report = self
            .trees
            .clone_tree(owner_of(&source)?, owner_of(&new_instance)?, &creator)
            .await?;
        Ok((new_instance, report))
    }

    /// Add a node to an instance tree from wire-level parts. Instance trees
    /// may have several independent roots.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_node(
        &self,
        instance_id: InstanceId,
        parent_node_id: Option<NodeId>,
        node_type: &str,
        category_id: Option<i64>,
        group_id: Option<i64>,
        usage_id: Option<i64>,
        code: Option<String>,
        name: String,
        name_en: Option<String>,
        sort_order: Option<i32>,
        creator: String,
    ) -> Result<StructureNode, StructureServiceError> {
        let instance = self.require_instance(instance_id).await?;
        let kind = NodeKind::from_parts(node_type, category_id, group_id, usage_id)?;
        let code = code.unwrap_or_else(|| kind.generate_code());
        let owner = owner_of(&instance)?;
        match parent_node_id {
            Some(parent_id) => {
                self.trees
                    .add_child_node(owner, parent_id, kind, code, name, name_en, sort_order, creator)
                    .await
            }
            None => {
                self.trees
                    .add_root_node(owner, kind, code, name, name_en, sort_order, creator)
                    .await
            }
        }
    }

    /// Bulk-import nodes under one parent of the instance's tree.
    pub async fn import_node_tree(
        &self,
        instance_id: InstanceId,
        parent_node_id: Option<NodeId>,
        nodes: Vec<ImportNode>,
        creator: &str,
    ) -> Result<u64, StructureServiceError> {
        let instance = self.require_instance(instance_id).await?;
        self.trees
            .import_nodes(owner_of(&instance)?, parent_node_id, nodes, creator)
            .await
    }

    /// Structural integrity check of the instance's tree.
    pub async fn validate_structure(
        &self,
        instance_id: InstanceId,
    ) -> Result<ValidationReport, StructureServiceError> {
        let instance = self.require_instance(instance_id).await?;
        self.trees.validate(owner_of(&instance)?).await
    }

    /// Structural comparison of two instances' trees, keyed by node code.
    pub async fn compare_instances(
        &self,
        instance_a: InstanceId,
        instance_b: InstanceId,
    ) -> Result<StructureDiff, StructureServiceError> {
        let a = self.require_instance(instance_a).await?;
        let b = self.require_instance(instance_b).await?;
        self.trees.diff(owner_of(&a)?, owner_of(&b)?).await
    }

    /// The instance row together with its full node set.
    pub async fn instance_with_tree(
        &self,
        instance_id: InstanceId,
    ) -> Result<(StructureInstance, Vec<StructureNode>), StructureServiceError> {
        let instance = self.require_instance(instance_id).await?;
        let nodes = self.trees.tree(owner_of(&instance)?).await?;
        Ok((instance, nodes))
    }

    /// Same as [`instance_with_tree`](Self::instance_with_tree), addressed
    /// by code and version.
    pub async fn instance_with_tree_by_code_and_version(
        &self,
        code: &str,
        version: &str,
    ) -> Result<(StructureInstance, Vec<StructureNode>), StructureServiceError> {
        let instance = self
            .instances
            .find_by_code_and_version(code, version)
            .await?
            .ok_or_else(|| StructureServiceError::version_not_found(code, version))?;
        let nodes = self.trees.tree(owner_of(&instance)?).await?;
        Ok((instance, nodes))
    }

    /// Mark the instance as published from `effective_time` on.
    pub async fn publish_instance(
        &self,
        instance_id: InstanceId,
        effective_time: DateTime<Utc>,
    ) -> Result<(), StructureServiceError> {
        let mut instance = self.require_instance(instance_id).await?;
        instance.publish(effective_time);
        let affected = self.instances.update(&instance).await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "instance {instance_id} vanished during publish"
            )));
        }
        Ok(())
    }

    /// Withdraw a published instance.
    pub async fn unpublish_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<(), StructureServiceError> {
        let mut instance = self.require_instance(instance_id).await?;
        instance.unpublish();
        let affected = self.instances.update(&instance).await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "instance {instance_id} vanished during unpublish"
            )));
        }
        Ok(())
    }

    /// Physically remove the instance's node set, then logically delete the
    /// instance row. Returns the number of removed nodes.
    pub async fn delete_instance_with_nodes(
        &self,
        instance_id: InstanceId,
    ) -> Result<u64, StructureServiceError> {
        let instance = self.require_instance(instance_id).await?;
        let removed = self.trees.delete_tree(owner_of(&instance)?).await?;
        let affected = self
            .instances
            .update_status(instance_id, Status::Deleted)
            .await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "instance {instance_id} vanished during delete"
            )));
        }
        Ok(removed)
    }

    pub async fn enable_instance(&self, instance_id: InstanceId) -> Result<(), StructureServiceError> {
        self.set_status(instance_id, Status::Enabled).await
    }

    pub async fn disable_instance(&self, instance_id: InstanceId) -> Result<(), StructureServiceError> {
        self.set_status(instance_id, Status::Disabled).await
    }

    async fn set_status(
        &self,
        instance_id: InstanceId,
        status: Status,
    ) -> Result<(), StructureServiceError> {
        let affected = self.instances.update_status(instance_id, status).await?;
        if affected == 0 {
            return Err(StructureServiceError::instance_not_found(instance_id));
        }
        Ok(())
    }

    pub async fn find_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<Option<StructureInstance>, StructureServiceError> {
        Ok(self.instances.find_by_id(instance_id).await?)
    }

    async fn require_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<StructureInstance, StructureServiceError> {
        self.instances
            .find_by_id(instance_id)
            .await?
            .ok_or_else(|| StructureServiceError::instance_not_found(instance_id))
    }
}

fn owner_of(instance: &StructureInstance) -> Result<OwnerId, StructureServiceError> {
    instance.owner_id().ok_or_else(|| {
        StructureServiceError::store_failed(format!(
            "instance with code [{}] has no persisted id",
            instance.code
        ))
    })
}

#[cfg(test)]
#[path = "instance_service_test.rs"]
mod instance_service_test;
