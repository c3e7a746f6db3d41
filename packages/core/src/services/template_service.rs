//! Template Service - Reusable Tree Lifecycle
//!
//! Owner-level operations for structure-tree templates: metadata CRUD,
//! version forking (clone the node set under a new template row), and the
//! node operations that need an owner-existence check before they hit the
//! tree engine. Everything tree-shaped is delegated to
//! [`StructureTreeService`].

use crate::db::{NodeStore, TemplateStore};
use crate::models::{
    CloneReport, NodeId, NodeKind, OwnerId, Status, StructureNode, StructureTemplate, TemplateId,
    ValidationReport,
};
use crate::services::error::StructureServiceError;
use crate::services::structure_service::{ImportNode, StructureTreeService};
use std::sync::Arc;

/// Service for template metadata and template-owned trees.
pub struct TemplateService<S: NodeStore, R: TemplateStore> {
    templates: Arc<R>,
    trees: StructureTreeService<S>,
}

impl<S: NodeStore, R: TemplateStore> TemplateService<S, R> {
    pub fn new(templates: Arc<R>, nodes: Arc<S>) -> Self {
        Self {
            templates,
            trees: StructureTreeService::new(nodes),
        }
    }

    /// The underlying tree engine, for node-level operations that need no
    /// owner check (move, reorder, status, queries).
    pub fn trees(&self) -> &StructureTreeService<S> {
        &self.trees
    }

    /// Create a template. The code+version combination must be unused.
    pub async fn create_template(
        &self,
        code: String,
        name: String,
        description: Option<String>,
        version: String,
        creator: String,
    ) -> Result<StructureTemplate, StructureServiceError> {
        let template = StructureTemplate::create(code, name, description, version, creator)?;
        if self
            .templates
            .exists_by_code_and_version(&template.code, &template.version)
            .await?
        {
            return Err(StructureServiceError::duplicate_version(
                template.code,
                template.version,
            ));
        }
        let template = self.templates.save(template).await?;
        tracing::info!(
            code = %template.code,
            version = %template.version,
            "created structure template"
        );
        Ok(template)
    }

    /// Rename a template / replace its description.
    pub async fn update_template_info(
        &self,
        template_id: TemplateId,
        name: String,
        description: Option<String>,
    ) -> Result<StructureTemplate, StructureServiceError> {
        let mut template = self.require_template(template_id).await?;
        template.update_info(name, description)?;
        let affected = self.templates.update(&template).await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "template {template_id} vanished during rename"
            )));
        }
        Ok(template)
    }

    /// Fork a template into a new version, deep-copying its whole node set
    /// under the new template row.
    pub async fn create_new_version_with_nodes(
        &self,
        source_template_id: TemplateId,
        new_version: String,
        creator: String,
    ) -> Result<(StructureTemplate, CloneReport), StructureServiceError> {
        let source = self.require_template(source_template_id).await?;
        if self
            .templates
            .exists_by_code_and_version(&source.code, &new_version)
            .await?
        {
            return Err(StructureServiceError::duplicate_version(
                source.code,
                new_version,
            ));
        }
        let new_template = StructureTemplate::create(
            source.code.clone(),
            source.name.clone(),
            source.description.clone(),
            new_version,
            creator.clone(),
        )?;
        let new_template = self.templates.save(new_template).await?;
        let report = self
            .trees
            .clone_tree(owner_of(&source)?, owner_of(&new_template)?, &creator)
            .await?;
        Ok((new_template, report))
    }

    /// Add a node to a template tree from wire-level parts.
    ///
    /// With no parent the node becomes the template's root (there can be
    /// only one); with a parent it is attached beneath it. A missing code
    /// gets a generated one.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_node(
        &self,
        template_id: TemplateId,
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
        let template = self.require_template(template_id).await?;
        let kind = NodeKind::from_parts(node_type, category_id, group_id, usage_id)?;
        let code = code.unwrap_or_else(|| kind.generate_code());
        let owner = owner_of(&template)?;
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

    /// Bulk-import nodes under one parent of the template's tree.
    pub async fn import_node_tree(
        &self,
        template_id: TemplateId,
        parent_node_id: Option<NodeId>,
        nodes: Vec<ImportNode>,
        creator: &str,
    ) -> Result<u64, StructureServiceError> {
        let template = self.require_template(template_id).await?;
        self.trees
            .import_nodes(owner_of(&template)?, parent_node_id, nodes, creator)
            .await
    }

    /// Structural integrity check of the template's tree.
    pub async fn validate_structure(
        &self,
        template_id: TemplateId,
    ) -> Result<ValidationReport, StructureServiceError> {
        let template = self.require_template(template_id).await?;
        self.trees.validate(owner_of(&template)?).await
    }

    /// The template row together with its full node set.
    pub async fn template_with_tree(
        &self,
        template_id: TemplateId,
    ) -> Result<(StructureTemplate, Vec<StructureNode>), StructureServiceError> {
        let template = self.require_template(template_id).await?;
        let nodes = self.trees.tree(owner_of(&template)?).await?;
        Ok((template, nodes))
    }

    /// Same as [`template_with_tree`](Self::template_with_tree), addressed
    /// by code and version.
    pub async fn template_with_tree_by_code_and_version(
        &self,
        code: &str,
        version: &str,
    ) -> Result<(StructureTemplate, Vec<StructureNode>), StructureServiceError> {
        let template = self
            .templates
            .find_by_code_and_version(code, version)
            .await?
            .ok_or_else(|| StructureServiceError::version_not_found(code, version))?;
        let nodes = self.trees.tree(owner_of(&template)?).await?;
        Ok((template, nodes))
    }

    /// Physically remove the template's node set, then logically delete the
    /// template row. Returns the number of removed nodes.
    pub async fn delete_template_with_nodes(
        &self,
        template_id: TemplateId,
    ) -> Result<u64, StructureServiceError> {
        let template = self.require_template(template_id).await?;
        let removed = self.trees.delete_tree(owner_of(&template)?).await?;
        let affected = self
            .templates
            .update_status(template_id, Status::Deleted)
            .await?;
        if affected == 0 {
            return Err(StructureServiceError::stale_write(format!(
                "template {template_id} vanished during delete"
            )));
        }
        Ok(removed)
    }

    pub async fn enable_template(&self, template_id: TemplateId) -> Result<(), StructureServiceError> {
        self.set_status(template_id, Status::Enabled).await
    }

    pub async fn disable_template(&self, template_id: TemplateId) -> Result<(), StructureServiceError> {
        self.set_status(template_id, Status::Disabled).await
    }

    async fn set_status(
        &self,
        template_id: TemplateId,
        status: Status,
    ) -> Result<(), StructureServiceError> {
        let affected = self.templates.update_status(template_id, status).await?;
        if affected == 0 {
            return Err(StructureServiceError::template_not_found(template_id));
        }
        Ok(())
    }

    pub async fn find_template(
        &self,
        template_id: TemplateId,
    ) -> Result<Option<StructureTemplate>, StructureServiceError> {
        Ok(self.templates.find_by_id(template_id).await?)
    }

    async fn require_template(
        &self,
        template_id: TemplateId,
    ) -> Result<StructureTemplate, StructureServiceError> {
        self.templates
            .find_by_id(template_id)
            .await?
            .ok_or_else(|| StructureServiceError::template_not_found(template_id))
    }
}

fn owner_of(template: &StructureTemplate) -> Result<OwnerId, StructureServiceError> {
    template.owner_id().ok_or_else(|| {
        StructureServiceError::store_failed(format!(
            "template with code [{}] has no persisted id",
            template.code
        ))
    })
}

#[cfg(test)]
#[path = "template_service_test.rs"]
mod template_service_test;
