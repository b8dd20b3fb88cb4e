//! End-to-end scenarios over the in-memory store.

mod common;

use common::{Recorder, ids, init_tracing, item, single_root};
use horizon_canopy::store::{Capability, CapabilitySet, MemoryStore, ObjectStore, Query, QueryOptions, StoreEvent};
use horizon_canopy::{
    ChildrenChange, ConstructionError, Item, ItemId, ModelBuilder, ModelConfig, ModelError, StoreTreeModel,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn multi_parent_store() -> MemoryStore {
    MemoryStore::with_items([
        item(json!({"id": 1, "name": "left", "parent": []})),
        item(json!({"id": 2, "name": "right", "parent": []})),
        item(json!({"id": 3, "name": "shared", "parent": [1, 2]})),
    ])
}

fn plain_model(store: &MemoryStore) -> Arc<StoreTreeModel> {
    ModelBuilder::new().store(store.clone()).build().unwrap()
}

#[tokio::test]
async fn test_children_of_resolved_root() {
    init_tracing();
    let store = MemoryStore::with_items([
        item(json!({"id": 1, "parent": null})),
        item(json!({"id": 2, "parent": 1})),
    ]);
    let model = single_root(&store);

    let root = model.get_root().await.unwrap();
    assert_eq!(model.get_identity(&root), Some(ItemId::Num(1)));

    let children = model.get_children(&root).await.unwrap();
    assert_eq!(children, vec![item(json!({"id": 2, "parent": 1}))]);
}

#[tokio::test]
async fn test_paste_removes_one_of_many_parents() {
    init_tracing();
    let store = multi_parent_store();
    let model = plain_model(&store);
    let left = store.snapshot(&ItemId::Num(1)).unwrap();
    let right = store.snapshot(&ItemId::Num(2)).unwrap();
    let shared = store.snapshot(&ItemId::Num(3)).unwrap();

    assert_eq!(ids(&model.get_children(&left).await.unwrap()), vec![ItemId::Num(3)]);
    assert_eq!(ids(&model.get_children(&right).await.unwrap()), vec![ItemId::Num(3)]);
    let left_generation = model.children_generation(&ItemId::Num(1)).unwrap();
    let right_generation = model.children_generation(&ItemId::Num(2)).unwrap();

    let changes = Recorder::<ChildrenChange>::new();
    model.on_children_change(changes.sink());

    model.paste_item(&shared, Some(&right), &left, false, None).await.unwrap();

    let stored = store.snapshot(&ItemId::Num(3)).unwrap();
    assert_eq!(stored.get("parent"), Some(&json!([1])));

    assert_ne!(model.children_generation(&ItemId::Num(1)), Some(left_generation));
    assert_ne!(model.children_generation(&ItemId::Num(2)), Some(right_generation));

    let announced: Vec<_> = changes.take().iter().filter_map(|c| c.parent.identity("id")).collect();
    assert!(announced.contains(&ItemId::Num(1)));
    assert!(announced.contains(&ItemId::Num(2)));
    assert!(model.get_children(&right).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_paste_on_evented_store_evicts_both_parents() {
    init_tracing();
    let store = multi_parent_store().evented();
    let model = plain_model(&store);
    let left = store.snapshot(&ItemId::Num(1)).unwrap();
    let right = store.snapshot(&ItemId::Num(2)).unwrap();
    let shared = store.snapshot(&ItemId::Num(3)).unwrap();

    model.get_children(&left).await.unwrap();
    model.get_children(&right).await.unwrap();

    model.paste_item(&shared, Some(&right), &left, false, None).await.unwrap();
    assert_eq!(model.children_generation(&ItemId::Num(1)), None);
    assert_eq!(model.children_generation(&ItemId::Num(2)), None);

    // The store echoes the write; routing it announces the old parent.
    let changes = Recorder::<ChildrenChange>::new();
    model.on_children_change(changes.sink());
    assert_eq!(model.process_events().await, 1);

    let announced = changes.take();
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].parent.identity("id"), Some(ItemId::Num(2)));
    assert!(announced[0].children.is_empty());
}

#[tokio::test]
async fn test_delete_of_moved_item_keeps_snapshot() {
    init_tracing();
    let store = MemoryStore::with_items([
        item(json!({"id": 4, "parent": null})),
        item(json!({"id": 5, "parent": 4})),
    ])
    .evented();
    let model = plain_model(&store);
    let folder = store.snapshot(&ItemId::Num(4)).unwrap();

    model.get_children(&folder).await.unwrap();
    let generation = model.children_generation(&ItemId::Num(4)).unwrap();
    assert!(model.snapshot(&ItemId::Num(5)).is_some());

    let deletes = Recorder::<Item>::new();
    let changes = Recorder::<ChildrenChange>::new();
    model.on_delete(deletes.sink());
    model.on_children_change(changes.sink());

    let moved = store.snapshot(&ItemId::Num(5)).unwrap();
    store.publish(StoreEvent::Delete(moved.clone()));
    assert_eq!(model.pending_events(), 1);
    assert_eq!(model.process_events().await, 1);

    assert_eq!(model.snapshot(&ItemId::Num(5)), Some(moved.clone()));
    assert_eq!(deletes.take(), vec![moved]);
    assert_ne!(model.children_generation(&ItemId::Num(4)), Some(generation));
    let announced = changes.take();
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].parent, folder);
}

#[tokio::test]
async fn test_confirmed_delete_drops_snapshot() {
    init_tracing();
    let store = MemoryStore::with_items([
        item(json!({"id": 4, "parent": null})),
        item(json!({"id": 5, "parent": 4})),
    ])
    .evented();
    let model = plain_model(&store);
    let folder = store.snapshot(&ItemId::Num(4)).unwrap();
    model.get_children(&folder).await.unwrap();

    store.remove(&ItemId::Num(5));
    model.process_events().await;

    assert_eq!(model.snapshot(&ItemId::Num(5)), None);
    assert!(model.get_children(&folder).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_synthesized_get_children_queries_parent_field() {
    init_tracing();
    let store = MemoryStore::new();
    assert!(!store.capabilities().has(Capability::GetChildren));
    let model = plain_model(&store);

    let parent = item(json!({"id": 7}));
    model.adapter().get_children(&parent, &QueryOptions::default()).await.unwrap();

    assert_eq!(store.query_log(), vec![Query::new().with("parent", 7)]);
}

#[tokio::test]
async fn test_synthesized_get_children_uses_configured_parent_field() {
    let store = MemoryStore::new();
    let model = ModelBuilder::new()
        .store(store.clone())
        .config(ModelConfig::new().with_parent_property("owner"))
        .build()
        .unwrap();

    model
        .adapter()
        .get_children(&item(json!({"id": 7})), &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(store.query_log(), vec![Query::new().with("owner", 7)]);
}

#[test]
fn test_store_without_get_fails_before_initialization() {
    init_tracing();
    let store = MemoryStore::new().with_capabilities(CapabilitySet::NONE | Capability::Put | Capability::Emit);

    let err = ModelBuilder::new()
        .store(store.clone())
        .config(ModelConfig::new().with_query_field("parent", Value::Null))
        .build()
        .err()
        .unwrap();

    assert_eq!(
        err,
        ModelError::Construction(ConstructionError::MissingCapability(Capability::Get))
    );
    assert!(err.is_fatal());
    assert_eq!(store.subscriber_count(), 0);
    assert!(store.query_log().is_empty());
    assert_eq!(store.load_count(), 0);
}
