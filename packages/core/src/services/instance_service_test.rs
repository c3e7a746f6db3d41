//! Instance service tests: creation from a template, version forking,
//! publishing, and instance comparison.

use super::InstanceService;
use crate::db::{MemoryInstanceStore, MemoryNodeStore, MemoryTemplateStore};
use crate::models::{InstanceId, ModelId, SeriesId, Status, TemplateId};
use crate::services::error::StructureServiceError;
use crate::services::template_service::TemplateService;
use chrono::Utc;
use std::sync::Arc;

const CREATOR: &str = "tester";

type Services = (
    InstanceService<MemoryNodeStore, MemoryInstanceStore, MemoryTemplateStore>,
    TemplateService<MemoryNodeStore, MemoryTemplateStore>,
);

/// Both services wired over one shared node store and template store, the
/// way the application composes them.
fn services() -> Services {
    let nodes = Arc::new(MemoryNodeStore::new());
    let templates = Arc::new(MemoryTemplateStore::new());
    let instances = Arc::new(MemoryInstanceStore::new());
    (
        InstanceService::new(instances, templates.clone(), nodes.clone()),
        TemplateService::new(templates, nodes),
    )
}

/// A template with a three-node tree (category root, group, usage).
async fn seeded_template(
    templates: &TemplateService<MemoryNodeStore, MemoryTemplateStore>,
) -> TemplateId {
    let template = templates
        .create_template(
            "CS-TPL".to_string(),
            "平台模板".to_string(),
            None,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    let template_id = template.id.unwrap();
    let root = templates
        .add_node(
            template_id,
            None,
            "CATEGORY",
            Some(10),
            None,
            None,
            Some("CAT_CHASSIS".to_string()),
            "底盘".to_string(),
            None,
            Some(1),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    let group = templates
        .add_node(
            template_id,
            root.id,
            "GROUP",
            None,
            Some(20),
            None,
            Some("GRP_AXLE".to_string()),
            "车桥".to_string(),
            None,
            Some(1),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    templates
        .add_node(
            template_id,
            group.id,
            "USAGE",
            None,
            None,
            Some(30),
            Some("USG_FRONT".to_string()),
            "前桥用法".to_string(),
            None,
            Some(1),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    template_id
}

#[tokio::test]
async fn test_create_instance_from_template_clones_tree() {
    let (instances, templates) = services();
    let template_id = seeded_template(&templates).await;

    let (instance, report) = instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "某车型结构".to_string(),
            None,
            Some(SeriesId(3)),
            Some(ModelId(5)),
            template_id,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    assert_eq!(report.cloned, 3);
    assert!(report.skipped.is_empty());

    let (reloaded, nodes) = instances
        .instance_with_tree(instance.id.unwrap())
        .await
        .unwrap();
    assert_eq!(reloaded.series_id, Some(SeriesId(3)));
    let mut codes: Vec<&str> = nodes.iter().map(|n| n.code.as_str()).collect();
    codes.sort();
    assert_eq!(codes, ["CAT_CHASSIS", "GRP_AXLE", "USG_FRONT"]);

    let report = instances
        .validate_structure(instance.id.unwrap())
        .await
        .unwrap();
    assert!(report.valid);
}

#[tokio::test]
async fn test_create_instance_requires_known_template_and_free_version() {
    let (instances, templates) = services();
    let template_id = seeded_template(&templates).await;

    let err = instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "结构".to_string(),
            None,
            None,
            None,
            TemplateId(999),
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StructureServiceError::TemplateNotFound { .. }));

    instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "结构".to_string(),
            None,
            None,
            None,
            template_id,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    let err = instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "结构".to_string(),
            None,
            None,
            None,
            template_id,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StructureServiceError::DuplicateVersion { .. }));
}

#[tokio::test]
async fn test_instance_version_fork_is_independent() {
    let (instances, templates) = services();
    let template_id = seeded_template(&templates).await;
    let (instance, _) = instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "结构".to_string(),
            None,
            None,
            None,
            template_id,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap();

    let (forked, report) = instances
        .create_new_version_with_nodes(
            instance.id.unwrap(),
            "V2.0".to_string(),
            Some("next round".to_string()),
            "forker".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(report.cloned, 3);
    assert_eq!(forked.code, instance.code);
    assert_eq!(forked.version, "V2.0");

    // editing the fork leaves the source untouched
    let fork_root = instances
        .trees()
        .roots(forked.owner_id().unwrap())
        .await
        .unwrap()
        .remove(0);
    instances
        .trees()
        .update_node_info(fork_root.id.unwrap(), "改装底盘".to_string(), None, None)
        .await
        .unwrap();

    let (_, source_nodes) = instances
        .instance_with_tree(instance.id.unwrap())
        .await
        .unwrap();
    assert!(source_nodes.iter().any(|n| n.name == "底盘"));
}

#[tokio::test]
async fn test_compare_instances_by_code() {
    let (instances, templates) = services();
    let template_id = seeded_template(&templates).await;
    let (a, _) = instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "结构A".to_string(),
            None,
            None,
            None,
            template_id,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    let (b, _) = instances
        .create_new_version_with_nodes(
            a.id.unwrap(),
            "V2.0".to_string(),
            None,
            CREATOR.to_string(),
        )
        .await
        .unwrap();

    let same = instances
        .compare_instances(a.id.unwrap(), a.id.unwrap())
        .await
        .unwrap();
    assert!(same.is_empty());

    // rename one node and add another in the fork
    let b_owner = b.owner_id().unwrap();
    let b_root = instances.trees().roots(b_owner).await.unwrap().remove(0);
    instances
        .trees()
        .update_node_info(b_root.id.unwrap(), "新底盘".to_string(), None, None)
        .await
        .unwrap();
    instances
        .add_node(
            b.id.unwrap(),
            Some(b_root.id.unwrap()),
            "GROUP",
            None,
            Some(99),
            None,
            Some("GRP_NEW".to_string()),
            "新增组".to_string(),
            None,
            None,
            CREATOR.to_string(),
        )
        .await
        .unwrap();

    let diff = instances
        .compare_instances(a.id.unwrap(), b.id.unwrap())
        .await
        .unwrap();
    assert_eq!(diff.total_added, 1);
    assert_eq!(diff.total_removed, 0);
    assert_eq!(diff.total_modified, 1);
    assert_eq!(diff.added[0].code, "GRP_NEW");
    assert_eq!(diff.modified[0].code, "CAT_CHASSIS");

    let err = instances
        .compare_instances(a.id.unwrap(), InstanceId(999))
        .await
        .unwrap_err();
    assert!(matches!(err, StructureServiceError::InstanceNotFound { .. }));
}

#[tokio::test]
async fn test_publish_and_unpublish_cycle() {
    let (instances, templates) = services();
    let template_id = seeded_template(&templates).await;
    let (instance, _) = instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "结构".to_string(),
            None,
            None,
            None,
            template_id,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    let instance_id = instance.id.unwrap();

    instances
        .publish_instance(instance_id, Utc::now())
        .await
        .unwrap();
    let reloaded = instances.find_instance(instance_id).await.unwrap().unwrap();
    assert!(reloaded.published);
    assert!(reloaded.effective_time.is_some());

    instances.unpublish_instance(instance_id).await.unwrap();
    let reloaded = instances.find_instance(instance_id).await.unwrap().unwrap();
    assert!(!reloaded.published);
    assert_eq!(reloaded.effective_time, None);
}

#[tokio::test]
async fn test_delete_instance_with_nodes() {
    let (instances, templates) = services();
    let template_id = seeded_template(&templates).await;
    let (instance, _) = instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "结构".to_string(),
            None,
            None,
            None,
            template_id,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    let instance_id = instance.id.unwrap();

    let removed = instances
        .delete_instance_with_nodes(instance_id)
        .await
        .unwrap();
    assert_eq!(removed, 3);

    let reloaded = instances.find_instance(instance_id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, Status::Deleted);
    assert!(instances
        .trees()
        .tree(instance.owner_id().unwrap())
        .await
        .unwrap()
        .is_empty());

    // the template the instance came from is unaffected
    let (_, template_nodes) = templates.template_with_tree(template_id).await.unwrap();
    assert_eq!(template_nodes.len(), 3);
}

#[tokio::test]
async fn test_enable_disable_instance() {
    let (instances, templates) = services();
    let template_id = seeded_template(&templates).await;
    let (instance, _) = instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "结构".to_string(),
            None,
            None,
            None,
            template_id,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    let instance_id = instance.id.unwrap();

    instances.disable_instance(instance_id).await.unwrap();
    let reloaded = instances.find_instance(instance_id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, Status::Disabled);

    instances.enable_instance(instance_id).await.unwrap();
    let reloaded = instances.find_instance(instance_id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, Status::Enabled);

    let err = instances.enable_instance(InstanceId(999)).await.unwrap_err();
    assert!(matches!(err, StructureServiceError::InstanceNotFound { .. }));
}

#[tokio::test]
async fn test_instance_lookup_by_code_and_version() {
    let (instances, templates) = services();
    let template_id = seeded_template(&templates).await;
    instances
        .create_instance_from_template(
            "CS-M1".to_string(),
            "结构".to_string(),
            None,
            None,
            None,
            template_id,
            "V1.0".to_string(),
            CREATOR.to_string(),
        )
        .await
        .unwrap();

    let (found, nodes) = instances
        .instance_with_tree_by_code_and_version("CS-M1", "V1.0")
        .await
        .unwrap();
    assert_eq!(found.code, "CS-M1");
    assert_eq!(nodes.len(), 3);

    let err = instances
        .instance_with_tree_by_code_and_version("CS-M1", "V9.9")
        .await
        .unwrap_err();
    assert!(matches!(err, StructureServiceError::VersionNotFound { .. }));
}
