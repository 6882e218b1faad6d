//! Tests for the in-memory ticket store

use super::*;
use crate::{Priority, PriorityPolicy};
use std::collections::BTreeMap;

fn at(s: &str) -> Timestamp {
    Timestamp::from_rfc3339(s).unwrap()
}

fn ticket(id: &str) -> Ticket {
    let created = at("2026-06-01T10:00:00Z");
    Ticket {
        id: TicketId::new(id).unwrap(),
        lifecycle: "issue".to_string(),
        requester_id: RequesterId::new("alice").unwrap(),
        description: "VPN keeps dropping".to_string(),
        priority: Priority::P2,
        status: "new".to_string(),
        sla: PriorityPolicy::default()
            .budgets_for(Priority::P2)
            .deadlines_from(created),
        attributes: BTreeMap::new(),
        created_at: created,
        updated_at: created,
    }
}

#[tokio::test]
async fn test_create_then_get() {
    let store = InMemoryTicketStore::new();
    let t = ticket("INC-00000001");

    assert!(store.get(&t.id).await.unwrap().is_none());
    store.create(&t).await.unwrap();

    assert_eq!(store.get(&t.id).await.unwrap(), Some(t));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_create_rejects_duplicate_id() {
    let store = InMemoryTicketStore::new();
    let t = ticket("INC-00000001");
    store.create(&t).await.unwrap();

    let err = store.create(&t).await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_update_merges_status_only() {
    let store = InMemoryTicketStore::new();
    let t = ticket("INC-00000001");
    store.create(&t).await.unwrap();

    let later = at("2026-06-01T10:05:00Z");
    let updated = store
        .update(&t.id, &TicketPatch::status_change("new", "assigned", later))
        .await
        .unwrap();

    assert_eq!(updated.status, "assigned");
    assert_eq!(updated.updated_at, later);
    assert_eq!(updated.description, t.description);
    assert_eq!(updated.sla, t.sla);
}

#[tokio::test]
async fn test_update_precondition_conflict() {
    let store = InMemoryTicketStore::new();
    let t = ticket("INC-00000001");
    store.create(&t).await.unwrap();

    let err = store
        .update(
            &t.id,
            &TicketPatch::status_change("assigned", "in_progress", Timestamp::now()),
        )
        .await
        .unwrap_err();

    match err {
        StorageError::PreconditionFailed {
            expected, actual, ..
        } => {
            assert_eq!(expected, "assigned");
            assert_eq!(actual, "new");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.get(&t.id).await.unwrap().unwrap().status, "new");
}

#[tokio::test]
async fn test_update_missing_ticket() {
    let store = InMemoryTicketStore::new();
    let id = TicketId::new("INC-DEADBEEF").unwrap();

    let err = store
        .update(&id, &TicketPatch::status_change("new", "assigned", Timestamp::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn test_touch_requester_merges() {
    let store = InMemoryTicketStore::new();
    let requester = RequesterId::new("alice").unwrap();
    let first = at("2026-06-01T10:00:00Z");
    let second = at("2026-06-02T11:00:00Z");

    store.touch_requester(&requester, first).await.unwrap();
    let record = store.touch_requester(&requester, second).await.unwrap();

    assert_eq!(record.created_at, first);
    assert_eq!(record.last_seen_at, second);
    assert_eq!(store.requester(&requester), Some(record));
}

#[tokio::test]
async fn test_clones_share_state() {
    let store = InMemoryTicketStore::new();
    let handle = store.clone();
    handle.seed(ticket("INC-00000002"));

    assert_eq!(store.len(), 1);
    assert!(store.health_check().await.is_ok());
}
