use sync_store::{ChangeKey, ChangeOperation, NewChange, Revision, SyncNode, SyncStore};
use tempfile::tempdir;

fn new_change(rev: i64, pk: &str) -> NewChange {
    NewChange::new(rev, "vaults", ChangeOperation::Update, pk)
        .with_payload(format!("payload-{pk}").into_bytes())
        .with_source("peer-a")
}

#[test]
fn store_persists_changes_across_reopen() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("nested/sync.db");
    let store = SyncStore::open(&store_path).unwrap();

    let keys = store
        .append_changes(&[new_change(3, "pk-3"), new_change(1, "pk-1"), new_change(2, "pk-2")])
        .unwrap();
    assert_eq!(keys.len(), 3);

    let changes = store.list_changes(10).unwrap();
    assert_eq!(changes.len(), 3);
    assert_eq!(changes[0].rev, Revision(1));
    assert_eq!(changes[0].row_key, "pk-1");
    assert_eq!(changes[0].change_id, keys[1]);
    assert_eq!(changes[2].source.as_deref(), Some("peer-a"));
    drop(store);

    // Reopen to ensure durability.
    let store = SyncStore::open(&store_path).unwrap();
    assert_eq!(store.count_changes().unwrap(), 3);
}

#[test]
fn keys_below_are_ordered_limited_and_exclusive() {
    let dir = tempdir().unwrap();
    let store = SyncStore::open(dir.path().join("sync.db")).unwrap();
    let changes: Vec<NewChange> = (1..=10)
        .rev()
        .map(|rev| new_change(rev, &format!("pk-{rev}")))
        .collect();
    store.append_changes(&changes).unwrap();

    let keys = store
        .unit_of_work(|unit| unit.change_keys_below(Revision(5), 3))
        .unwrap();
    assert_eq!(keys.len(), 3);

    let all = store.list_changes(100).unwrap();
    let expected: Vec<ChangeKey> = all
        .iter()
        .filter(|change| change.rev.0 < 5)
        .take(3)
        .map(|change| change.change_id)
        .collect();
    assert_eq!(keys, expected);

    let below = store
        .unit_of_work(|unit| unit.change_keys_below(Revision(5), 100))
        .unwrap();
    assert_eq!(below.len(), 4);
    assert_eq!(store.count_changes_below(Revision(5)).unwrap(), 4);
}

#[test]
fn deleting_missing_keys_is_a_no_op() {
    let dir = tempdir().unwrap();
    let store = SyncStore::open(dir.path().join("sync.db")).unwrap();
    let keys = store
        .append_changes(&[new_change(1, "a"), new_change(2, "b")])
        .unwrap();

    let deleted = store
        .unit_of_work(|unit| unit.delete_changes(&keys))
        .unwrap();
    assert_eq!(deleted, 2);

    let deleted_again = store
        .unit_of_work(|unit| unit.delete_changes(&keys))
        .unwrap();
    assert_eq!(deleted_again, 0);
    assert_eq!(store.count_changes().unwrap(), 0);
}

#[test]
fn sync_node_upsert_and_remove() {
    let dir = tempdir().unwrap();
    let store = SyncStore::open(dir.path().join("sync.db")).unwrap();

    assert!(store.list_sync_nodes().unwrap().is_empty());
    store.upsert_sync_node(&SyncNode::local("self", 3)).unwrap();
    store.upsert_sync_node(&SyncNode::remote("peer", "10")).unwrap();
    store.upsert_sync_node(&SyncNode::remote("peer", 11)).unwrap();

    let nodes = store.list_sync_nodes().unwrap();
    assert_eq!(nodes.len(), 2);
    let peer = nodes.iter().find(|node| node.node_id == "peer").unwrap();
    assert_eq!(peer.my_revision.to_revision().unwrap(), Revision(11));

    assert!(store.remove_sync_node("peer").unwrap());
    assert!(!store.remove_sync_node("peer").unwrap());
    assert_eq!(store.list_sync_nodes().unwrap().len(), 1);
}
