//! Validator and diff tests, including the deliberately corrupt node sets
//! the validator exists to catch (built through the raw store, since the
//! engine itself refuses to create them).

use super::StructureTreeService;
use crate::db::{MemoryNodeStore, NodeStore};
use crate::models::{
    CategoryId, GroupId, InstanceId, NodeKind, OwnerId, Status, StructureNode, TemplateId,
};
use std::sync::Arc;

const CREATOR: &str = "tester";

fn service() -> (StructureTreeService<MemoryNodeStore>, Arc<MemoryNodeStore>) {
    let store = Arc::new(MemoryNodeStore::new());
    (StructureTreeService::new(store.clone()), store)
}

async fn add_root(
    service: &StructureTreeService<MemoryNodeStore>,
    owner: OwnerId,
    code: &str,
    name: &str,
    kind: NodeKind,
) -> StructureNode {
    service
        .add_root_node(
            owner,
            kind,
            code.to_string(),
            name.to_string(),
            None,
            None,
            CREATOR.to_string(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_validate_empty_tree() {
    let (service, _store) = service();
    let report = service
        .validate(OwnerId::Template(TemplateId(1)))
        .await
        .unwrap();
    assert!(!report.valid);
    assert_eq!(report.issues, ["no nodes"]);
}

#[tokio::test]
async fn test_validate_healthy_tree() {
    let (service, _store) = service();
    let owner = OwnerId::Template(TemplateId(1));
    let root = add_root(&service, owner, "R", "根", NodeKind::Category(CategoryId(10))).await;
    service
        .add_child_node(
            owner,
            root.id.unwrap(),
            NodeKind::Group(GroupId(20)),
            "C".to_string(),
            "组".to_string(),
            None,
            None,
            CREATOR.to_string(),
        )
        .await
        .unwrap();

    let report = service.validate(owner).await.unwrap();
    assert!(report.valid);
    assert!(report.issues.is_empty());
}

#[tokio::test]
async fn test_validate_flags_multiple_template_roots() {
    let (service, store) = service();
    let owner = OwnerId::Template(TemplateId(1));
    add_root(&service, owner, "R1", "根一", NodeKind::Category(CategoryId(10))).await;

    // the engine refuses a second template root, so smuggle one in
    let rogue = StructureNode::create_root(
        owner,
        NodeKind::Category(CategoryId(11)),
        "R2".to_string(),
        "根二".to_string(),
        None,
        None,
        CREATOR.to_string(),
    )
    .unwrap();
    let mut rogue = store.save(rogue).await.unwrap();
    rogue.assign_path(None).unwrap();
    store.update(&rogue).await.unwrap();

    let report = service.validate(owner).await.unwrap();
    assert!(!report.valid);
    assert_eq!(report.issues, ["multiple root nodes"]);
}

#[tokio::test]
async fn test_validate_accepts_multiple_instance_roots() {
    let (service, _store) = service();
    let owner = OwnerId::Instance(InstanceId(1));
    add_root(&service, owner, "R1", "根一", NodeKind::Category(CategoryId(10))).await;
    add_root(&service, owner, "R2", "根二", NodeKind::Category(CategoryId(11))).await;

    let report = service.validate(owner).await.unwrap();
    assert!(report.valid, "unexpected issues: {:?}", report.issues);
}

#[tokio::test]
async fn test_validate_reports_dangling_parent_and_skips_cycle_walk() {
    let (service, store) = service();
    let owner = OwnerId::Instance(InstanceId(1));
    let root = add_root(&service, owner, "R", "根", NodeKind::Category(CategoryId(10))).await;
    let child = service
        .add_child_node(
            owner,
            root.id.unwrap(),
            NodeKind::Group(GroupId(20)),
            "C".to_string(),
            "组".to_string(),
            None,
            None,
            CREATOR.to_string(),
        )
        .await
        .unwrap();

    store.delete_by_id(root.id.unwrap()).await.unwrap();

    let report = service.validate(owner).await.unwrap();
    assert!(!report.valid);
    assert!(report.issues.contains(&"no root node".to_string()));
    let expected = format!(
        "dangling parent reference: {} -> {}",
        child.id.unwrap(),
        root.id.unwrap()
    );
    assert!(report.issues.contains(&expected));
    // cycle walking over missing parents is undefined, so it must not run
    assert!(!report.issues.contains(&"cycle detected".to_string()));
}

#[tokio::test]
async fn test_validate_detects_parent_cycle() {
    let (service, store) = service();
    let owner = OwnerId::Instance(InstanceId(1));
    let n1 = add_root(&service, owner, "N1", "一", NodeKind::Category(CategoryId(10))).await;
    let n2 = service
        .add_child_node(
            owner,
            n1.id.unwrap(),
            NodeKind::Group(GroupId(20)),
            "N2".to_string(),
            "二".to_string(),
            None,
            None,
            CREATOR.to_string(),
        )
        .await
        .unwrap();

    // close the loop behind the engine's back
    let mut corrupted = store.find_by_id(n1.id.unwrap()).await.unwrap().unwrap();
    corrupted.parent_id = n2.id;
    store.update(&corrupted).await.unwrap();

    let report = service.validate(owner).await.unwrap();
    assert!(!report.valid);
    assert!(report.issues.contains(&"no root node".to_string()));
    assert!(report.issues.contains(&"cycle detected".to_string()));
}

#[tokio::test]
async fn test_diff_of_a_tree_with_itself_is_empty() {
    let (service, _store) = service();
    let owner = OwnerId::Instance(InstanceId(1));
    let root = add_root(&service, owner, "R", "根", NodeKind::Category(CategoryId(10))).await;
    service
        .add_child_node(
            owner,
            root.id.unwrap(),
            NodeKind::Group(GroupId(20)),
            "C".to_string(),
            "组".to_string(),
            None,
            None,
            CREATOR.to_string(),
        )
        .await
        .unwrap();

    let diff = service.diff(owner, owner).await.unwrap();
    assert!(diff.is_empty());
    assert_eq!(diff.total_added, 0);
    assert_eq!(diff.total_removed, 0);
    assert_eq!(diff.total_modified, 0);
}

#[tokio::test]
async fn test_diff_classifies_added_removed_modified() {
    let (service, _store) = service();
    let a = OwnerId::Instance(InstanceId(1));
    let b = OwnerId::Instance(InstanceId(2));

    // tree A: X (Foo, group 1) and Y; tree B: X (Bar, group 1) and Z
    add_root(&service, a, "X", "Foo", NodeKind::Group(GroupId(1))).await;
    add_root(&service, a, "Y", "Only in A", NodeKind::Category(CategoryId(2))).await;
    add_root(&service, b, "X", "Bar", NodeKind::Group(GroupId(1))).await;
    add_root(&service, b, "Z", "Only in B", NodeKind::Category(CategoryId(3))).await;

    let diff = service.diff(a, b).await.unwrap();
    assert_eq!(diff.total_added, 1);
    assert_eq!(diff.total_removed, 1);
    assert_eq!(diff.total_modified, 1);
    assert_eq!(diff.added[0].code, "Z");
    assert_eq!(diff.removed[0].code, "Y");
    assert_eq!(diff.modified[0].code, "X");
    assert_eq!(diff.modified[0].old_node.name, "Foo");
    assert_eq!(diff.modified[0].new_node.name, "Bar");
}

#[tokio::test]
async fn test_diff_ignores_sort_order_and_status() {
    let (service, _store) = service();
    let a = OwnerId::Instance(InstanceId(1));
    let b = OwnerId::Instance(InstanceId(2));

    let left = service
        .add_root_node(
            a,
            NodeKind::Group(GroupId(1)),
            "X".to_string(),
            "同名".to_string(),
            None,
            Some(1),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    service
        .add_root_node(
            b,
            NodeKind::Group(GroupId(1)),
            "X".to_string(),
            "同名".to_string(),
            None,
            Some(9),
            CREATOR.to_string(),
        )
        .await
        .unwrap();
    service
        .set_node_status(left.id.unwrap(), Status::Disabled)
        .await
        .unwrap();

    let diff = service.diff(a, b).await.unwrap();
    assert!(diff.is_empty());
}

#[tokio::test]
async fn test_diff_sees_reference_change_within_same_type() {
    let (service, _store) = service();
    let a = OwnerId::Instance(InstanceId(1));
    let b = OwnerId::Instance(InstanceId(2));

    add_root(&service, a, "X", "同名", NodeKind::Group(GroupId(1))).await;
    add_root(&service, b, "X", "同名", NodeKind::Group(GroupId(2))).await;

    let diff = service.diff(a, b).await.unwrap();
    assert_eq!(diff.total_modified, 1);

    // a type flip with an identical reference value is a modification too
    let c = OwnerId::Instance(InstanceId(3));
    add_root(&service, c, "X", "同名", NodeKind::Category(CategoryId(1))).await;
    let diff = service.diff(a, c).await.unwrap();
    assert_eq!(diff.total_modified, 1);
}
