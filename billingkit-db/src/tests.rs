use crate::{MemoryStore, PurchaseRow, PurchaseStore};

fn row(order_id: &str, item_id: &str, state: i64) -> PurchaseRow {
    PurchaseRow {
        order_id: order_id.to_owned(),
        item_id: item_id.to_owned(),
        state,
        purchase_time: 1_700_000_000_000,
        developer_payload: Some("payload".to_owned()),
    }
}

#[test]
fn upsert_replaces_by_order_id() {
    let store = MemoryStore::new();
    {
        let mut session = store.open().unwrap();
        session.upsert(&row("order-1", "sku-a", 0)).unwrap();
        session.upsert(&row("order-1", "sku-a", 2)).unwrap();
    }
    let session = store.open().unwrap();
    let rows = session.select(Some("sku-a"), None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].state, 2);
}

#[test]
fn select_filters_by_item_and_state() {
    let store = MemoryStore::new();
    {
        let mut session = store.open().unwrap();
        session.upsert(&row("order-1", "sku-a", 0)).unwrap();
        session.upsert(&row("order-2", "sku-a", 1)).unwrap();
        session.upsert(&row("order-3", "sku-b", 0)).unwrap();
    }
    let session = store.open().unwrap();
    assert_eq!(session.select(None, None).unwrap().len(), 3);
    assert_eq!(session.select(Some("sku-a"), None).unwrap().len(), 2);
    assert_eq!(session.select(Some("sku-a"), Some(0)).unwrap().len(), 1);
    assert_eq!(session.select(Some("sku-c"), None).unwrap().len(), 0);
}

#[test]
fn count_matches_item_and_state_only() {
    let store = MemoryStore::new();
    {
        let mut session = store.open().unwrap();
        session.upsert(&row("order-1", "sku-a", 0)).unwrap();
        session.upsert(&row("order-2", "sku-a", 0)).unwrap();
        session.upsert(&row("order-3", "sku-a", 2)).unwrap();
    }
    let session = store.open().unwrap();
    assert_eq!(session.count("sku-a", 0).unwrap(), 2);
    assert_eq!(session.count("sku-a", 2).unwrap(), 1);
    assert_eq!(session.count("sku-b", 0).unwrap(), 0);
}

#[test]
fn sessions_are_scoped() {
    let store = MemoryStore::new();
    {
        let mut session = store.open().unwrap();
        session.upsert(&row("order-1", "sku-a", 0)).unwrap();
    }
    // The first session released the table on drop; reopening works.
    let session = store.open().unwrap();
    assert_eq!(session.select(None, None).unwrap().len(), 1);
}
