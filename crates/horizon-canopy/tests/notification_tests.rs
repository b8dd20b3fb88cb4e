//! Change propagation across the three notification modes.

mod common;

use std::time::Duration;

use common::{Recorder, family, ids, init_tracing, item, single_root};
use horizon_canopy::{ChildrenChange, ItemChange, ItemId, RootAction, RootChange};
use serde_json::json;

#[tokio::test]
async fn test_event_pump_routes_in_background() {
    init_tracing();
    let store = family().evented();
    let model = single_root(&store);
    let root = model.get_root().await.unwrap();
    model.get_children(&root).await.unwrap();

    let changes = Recorder::<ChildrenChange>::new();
    model.on_children_change(changes.sink());
    let pump = model.spawn_event_pump();

    store.insert(item(json!({"id": 5, "name": "Lisa", "parent": 1}))).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while changes.len() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("children change was never routed");

    let announced = changes.take();
    assert_eq!(ids(&announced[0].children), vec![ItemId::Num(2), ItemId::Num(3), ItemId::Num(5)]);

    model.destroy();
    tokio::time::timeout(Duration::from_secs(5), pump)
        .await
        .expect("pump did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_observable_insert_reports_new_root_child() {
    init_tracing();
    let store = family().observable();
    let model = single_root(&store);
    let root = model.get_root().await.unwrap();
    model.get_children(&root).await.unwrap();

    let changes = Recorder::<ChildrenChange>::new();
    let roots = Recorder::<RootChange>::new();
    model.on_children_change(changes.sink());
    model.on_root_change(roots.sink());

    let lisa = item(json!({"id": 5, "name": "Lisa", "parent": 1}));
    store.insert(lisa.clone()).unwrap();
    assert_eq!(model.process_events().await, 1);

    assert_eq!(
        roots.take(),
        vec![RootChange {
            item: lisa,
            action: RootAction::New,
        }]
    );
    let announced = changes.take();
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].parent, root);
    assert_eq!(announced[0].children.len(), 3);
}

#[tokio::test]
async fn test_observable_update_in_place() {
    init_tracing();
    let store = family().observable();
    let model = single_root(&store);
    let root = model.get_root().await.unwrap();
    model.get_children(&root).await.unwrap();

    let changes = Recorder::<ItemChange>::new();
    model.on_change(changes.sink());

    store.insert(item(json!({"id": 3, "name": "Marjorie", "parent": 1}))).unwrap();
    assert_eq!(model.process_events().await, 1);

    let seen = changes.take();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].property, "name");
    assert_eq!(seen[0].new_value, Some(json!("Marjorie")));
}

#[tokio::test]
async fn test_observable_root_update() {
    let store = family().observable();
    let model = single_root(&store);
    let root = model.get_root().await.unwrap();
    model.get_children(&root).await.unwrap();

    let changes = Recorder::<ItemChange>::new();
    model.on_change(changes.sink());

    store.insert(item(json!({"id": 1, "name": "The Simpsons", "parent": null}))).unwrap();
    assert_eq!(model.process_events().await, 1);

    let seen = changes.take();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].old_value, Some(json!("Simpsons")));
}

#[tokio::test]
async fn test_observable_move_announces_old_parent() {
    init_tracing();
    let store = family().observable();
    let model = single_root(&store);
    model.get_root().await.unwrap();
    let homer = store.snapshot(&ItemId::Num(2)).unwrap();
    let marge = store.snapshot(&ItemId::Num(3)).unwrap();
    assert_eq!(ids(&model.get_children(&homer).await.unwrap()), vec![ItemId::Num(4)]);
    assert!(model.get_children(&marge).await.unwrap().is_empty());
    let before = model.children_generation(&ItemId::Num(2));

    let changes = Recorder::<ChildrenChange>::new();
    model.on_children_change(changes.sink());

    store.insert(item(json!({"id": 4, "name": "Bart", "parent": 3}))).unwrap();
    assert_eq!(model.process_events().await, 2);

    let announced = changes.take();
    let from_homer = announced.iter().find(|c| c.parent == homer).map(|c| ids(&c.children));
    let from_marge = announced.iter().find(|c| c.parent == marge).map(|c| ids(&c.children));
    assert_eq!(from_homer, Some(vec![]));
    assert_eq!(from_marge, Some(vec![ItemId::Num(4)]));

    assert_ne!(model.children_generation(&ItemId::Num(2)), before);
    assert!(model.get_children(&homer).await.unwrap().is_empty());
    assert!(model.snapshot(&ItemId::Num(4)).is_some());
}

#[tokio::test]
async fn test_unmonitored_set_value_emits_locally() {
    let store = family();
    let model = single_root(&store);
    let marge = store.snapshot(&ItemId::Num(3)).unwrap();

    let changes = Recorder::<ItemChange>::new();
    model.on_change(changes.sink());

    model.set_value(&marge, "hair", "blue").await.unwrap();

    let seen = changes.take();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].property, "hair");
    assert_eq!(seen[0].old_value, None);
    assert_eq!(store.snapshot(&ItemId::Num(3)).unwrap().get("hair"), Some(&json!("blue")));
}

#[tokio::test]
async fn test_evented_set_value_waits_for_echo() {
    let store = family().evented();
    let model = single_root(&store);
    let root = model.get_root().await.unwrap();
    model.get_children(&root).await.unwrap();
    let marge = store.snapshot(&ItemId::Num(3)).unwrap();

    let changes = Recorder::<ItemChange>::new();
    model.on_change(changes.sink());

    model.set_value(&marge, "hair", "blue").await.unwrap();
    assert_eq!(changes.len(), 0);

    model.process_events().await;
    assert_eq!(changes.len(), 1);
}

#[tokio::test]
async fn test_new_item_is_placed_before_sibling() {
    init_tracing();
    let store = family();
    let model = single_root(&store);
    let root = model.get_root().await.unwrap();
    let marge = store.snapshot(&ItemId::Num(3)).unwrap();

    let changes = Recorder::<ChildrenChange>::new();
    let roots = Recorder::<RootChange>::new();
    model.on_children_change(changes.sink());
    model.on_root_change(roots.sink());

    let created = model
        .new_item(item(json!({"name": "Lisa"})), &root, Some(&marge))
        .await
        .unwrap()
        .unwrap();

    let id = model.get_identity(&created).unwrap();
    assert!(matches!(&id, ItemId::Str(hex) if hex.len() == 16));
    assert_eq!(created.get("parent"), Some(&json!(1)));

    let announced = changes.take();
    assert_eq!(announced.len(), 1);
    assert_eq!(ids(&announced[0].children), vec![ItemId::Num(2), id, ItemId::Num(3)]);
    assert_eq!(roots.take()[0].action, RootAction::New);
}

#[tokio::test]
async fn test_new_item_moves_existing_item() {
    let store = family();
    let model = single_root(&store);
    let marge = store.snapshot(&ItemId::Num(3)).unwrap();
    let bart = store.snapshot(&ItemId::Num(4)).unwrap();

    let moved = model.new_item(bart, &marge, None).await.unwrap().unwrap();
    assert_eq!(moved.get("parent"), Some(&json!(3)));
    assert_eq!(ids(&model.get_children(&marge).await.unwrap()), vec![ItemId::Num(4)]);
}

#[tokio::test]
async fn test_new_item_adds_parent_in_multi_parent_store() {
    let store = common::family();
    store.insert(item(json!({"id": 10, "name": "Springfield", "parent": []}))).unwrap();
    store.insert(item(json!({"id": 11, "name": "Shelbyville", "parent": []}))).unwrap();
    store.insert(item(json!({"id": 12, "name": "Lake", "parent": [10]}))).unwrap();
    let model = single_root(&store);
    let shelbyville = store.snapshot(&ItemId::Num(11)).unwrap();
    let lake = store.snapshot(&ItemId::Num(12)).unwrap();

    let shared = model.new_item(lake, &shelbyville, None).await.unwrap().unwrap();
    assert_eq!(shared.get("parent"), Some(&json!([10, 11])));
}

#[tokio::test]
async fn test_paste_into_root_reports_attach() {
    let store = family();
    let model = single_root(&store);
    let root = model.get_root().await.unwrap();
    let homer = store.snapshot(&ItemId::Num(2)).unwrap();
    let bart = store.snapshot(&ItemId::Num(4)).unwrap();

    let roots = Recorder::<RootChange>::new();
    model.on_root_change(roots.sink());

    model.paste_item(&bart, Some(&homer), &root, false, None).await.unwrap();
    assert_eq!(store.snapshot(&ItemId::Num(4)).unwrap().get("parent"), Some(&json!(1)));
    assert_eq!(roots.take()[0].action, RootAction::Attach);

    let bart = store.snapshot(&ItemId::Num(4)).unwrap();
    model.paste_item(&bart, Some(&root), &homer, false, None).await.unwrap();
    assert_eq!(roots.take()[0].action, RootAction::Detach);
}

#[tokio::test]
async fn test_evented_new_item_evicts_before_echo() {
    let store = family().evented();
    let model = single_root(&store);
    let root = model.get_root().await.unwrap();
    model.get_children(&root).await.unwrap();
    assert!(model.children_generation(&ItemId::Num(1)).is_some());

    let changes = Recorder::<ChildrenChange>::new();
    model.on_children_change(changes.sink());

    model
        .new_item(item(json!({"id": 9, "name": "Lisa"})), &root, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(model.children_generation(&ItemId::Num(1)), None);
    assert_eq!(changes.len(), 0);

    model.process_events().await;
    let announced = changes.take();
    assert!(
        announced
            .iter()
            .any(|c| c.parent == root && ids(&c.children).contains(&ItemId::Num(9)))
    );
}

#[tokio::test]
async fn test_set_value_with_same_value_is_silent() {
    let store = family().evented();
    let model = single_root(&store);
    let marge = store.snapshot(&ItemId::Num(3)).unwrap();

    let changes = Recorder::<ItemChange>::new();
    model.on_change(changes.sink());

    model.set_value(&marge, "name", "Marge").await.unwrap();
    assert_eq!(model.pending_events(), 0);
    model.process_events().await;
    assert_eq!(changes.len(), 0);

    let unmonitored = family();
    let model = single_root(&unmonitored);
    let marge = unmonitored.snapshot(&ItemId::Num(3)).unwrap();
    let changes = Recorder::<ItemChange>::new();
    model.on_change(changes.sink());

    model.set_value(&marge, "name", "Marge").await.unwrap();
    assert_eq!(changes.len(), 0);
}
