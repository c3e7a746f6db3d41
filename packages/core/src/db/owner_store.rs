//! Owner Metadata Stores
//!
//! Persistence contracts for the owning-tree metadata rows. Deliberately
//! narrow: the engine needs identity, code+version uniqueness checks, and
//! status updates; list/paging queries belong to the application layer.

use crate::models::{InstanceId, Status, StructureInstance, StructureTemplate, TemplateId};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence contract for structure-tree templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Persist a new template and assign its id.
    async fn save(&self, template: StructureTemplate) -> Result<StructureTemplate>;

    /// Overwrite a persisted template, returning affected rows.
    async fn update(&self, template: &StructureTemplate) -> Result<u64>;

    async fn find_by_id(&self, id: TemplateId) -> Result<Option<StructureTemplate>>;

    async fn find_by_code_and_version(
        &self,
        code: &str,
        version: &str,
    ) -> Result<Option<StructureTemplate>>;

    async fn exists_by_code_and_version(&self, code: &str, version: &str) -> Result<bool>;

    /// Set the lifecycle status directly (logical delete included).
    async fn update_status(&self, id: TemplateId, status: Status) -> Result<u64>;
}

/// Persistence contract for structure-tree instances.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Persist a new instance and assign its id.
    async fn save(&self, instance: StructureInstance) -> Result<StructureInstance>;

    /// Overwrite a persisted instance, returning affected rows.
    async fn update(&self, instance: &StructureInstance) -> Result<u64>;

    async fn find_by_id(&self, id: InstanceId) -> Result<Option<StructureInstance>>;

    async fn find_by_code_and_version(
        &self,
        code: &str,
        version: &str,
    ) -> Result<Option<StructureInstance>>;

    async fn exists_by_code_and_version(&self, code: &str, version: &str) -> Result<bool>;

    /// Set the lifecycle status directly (logical delete included).
    async fn update_status(&self, id: InstanceId, status: Status) -> Result<u64>;
}
