//! Tests for the filesystem ticket store

use super::*;
use crate::{Priority, PriorityPolicy};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn ticket(id: &str) -> Ticket {
    let created = Timestamp::from_rfc3339("2026-06-01T10:00:00Z").unwrap();
    Ticket {
        id: TicketId::new(id).unwrap(),
        lifecycle: "access_request".to_string(),
        requester_id: RequesterId::new("bob@example.com").unwrap(),
        description: String::new(),
        priority: Priority::P3,
        status: "new".to_string(),
        sla: PriorityPolicy::default()
            .budgets_for(Priority::P3)
            .deadlines_from(created),
        attributes: BTreeMap::from([
            ("resource".to_string(), "billing-db".to_string()),
            ("access_level".to_string(), "read".to_string()),
        ]),
        created_at: created,
        updated_at: created,
    }
}

async fn store() -> (TempDir, FilesystemTicketStore) {
    let dir = TempDir::new().unwrap();
    let store = FilesystemTicketStore::new(dir.path().to_path_buf())
        .await
        .unwrap();
    (dir, store)
}

#[tokio::test]
async fn test_create_and_read_back() {
    let (dir, store) = store().await;
    let t = ticket("AR-1A2B3C4D");

    store.create(&t).await.unwrap();

    assert!(dir.path().join("tickets/AR-1A2B3C4D.json").exists());
    assert!(!dir.path().join("tickets/AR-1A2B3C4D.tmp").exists());
    assert_eq!(store.get(&t.id).await.unwrap(), Some(t));
}

#[tokio::test]
async fn test_missing_ticket_is_none() {
    let (_dir, store) = store().await;
    let id = TicketId::new("AR-FFFFFFFF").unwrap();
    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_rejects_existing_document() {
    let (_dir, store) = store().await;
    let t = ticket("AR-1A2B3C4D");
    store.create(&t).await.unwrap();

    assert!(matches!(
        store.create(&t).await,
        Err(StorageError::AlreadyExists { .. })
    ));
}

#[tokio::test]
async fn test_update_persists_across_instances() {
    let (dir, store) = store().await;
    let t = ticket("AR-1A2B3C4D");
    store.create(&t).await.unwrap();

    let later = t.created_at.add_minutes(1);
    store
        .update(&t.id, &TicketPatch::status_change("new", "assigned", later))
        .await
        .unwrap();

    let reopened = FilesystemTicketStore::new(dir.path().to_path_buf())
        .await
        .unwrap();
    let stored = reopened.get(&t.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "assigned");
    assert_eq!(stored.updated_at, later);
    assert_eq!(stored.attributes, t.attributes);
}

#[tokio::test]
async fn test_update_precondition_conflict_leaves_document() {
    let (_dir, store) = store().await;
    let t = ticket("AR-1A2B3C4D");
    store.create(&t).await.unwrap();

    let result = store
        .update(
            &t.id,
            &TicketPatch::status_change("in_progress", "completed", Timestamp::now()),
        )
        .await;

    assert!(matches!(result, Err(StorageError::PreconditionFailed { .. })));
    assert_eq!(store.get(&t.id).await.unwrap().unwrap().status, "new");
}

#[tokio::test]
async fn test_corrupt_document_reports_serialization_error() {
    let (dir, store) = store().await;
    std::fs::write(dir.path().join("tickets/AR-BADBAD00.json"), "{ not json").unwrap();

    let id = TicketId::new("AR-BADBAD00").unwrap();
    assert!(matches!(
        store.get(&id).await,
        Err(StorageError::SerializationFailed { .. })
    ));
}

#[tokio::test]
async fn test_requester_with_unsafe_characters_is_stored() {
    let (_dir, store) = store().await;
    let requester = RequesterId::new("../../etc/passwd").unwrap();
    let first = Timestamp::from_rfc3339("2026-06-01T10:00:00Z").unwrap();

    store.touch_requester(&requester, first).await.unwrap();
    let record = store
        .touch_requester(&requester, first.add_minutes(30))
        .await
        .unwrap();

    assert_eq!(record.created_at, first);
    assert_eq!(record.last_seen_at, first.add_minutes(30));
}

#[tokio::test]
async fn test_health_check() {
    let (dir, store) = store().await;
    assert!(store.health_check().await.is_ok());

    std::fs::remove_dir_all(dir.path().join("tickets")).unwrap();
    assert!(store.health_check().await.is_err());
}

#[tokio::test]
async fn test_custom_collection_names() {
    let dir = TempDir::new().unwrap();
    let store = FilesystemTicketStore::with_collections(dir.path().to_path_buf(), "issues", "users")
        .await
        .unwrap();

    store.create(&ticket("AR-1A2B3C4D")).await.unwrap();
    assert!(dir.path().join("issues/AR-1A2B3C4D.json").exists());
    assert!(!dir.path().join("tickets").exists());
}

#[tokio::test]
async fn test_collection_name_must_be_plain_directory() {
    let dir = TempDir::new().unwrap();
    let result =
        FilesystemTicketStore::with_collections(dir.path().to_path_buf(), "../escape", "users").await;
    assert!(matches!(result, Err(StorageError::Unavailable { .. })));
}

#[tokio::test]
async fn test_failed_write_removes_temp_file() {
    let (dir, _store) = store().await;
    // A non-empty directory in the way makes the final rename fail
    let target = dir.path().join("tickets/AR-1A2B3C4D.json");
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join("keep"), b"x").unwrap();

    let result = FilesystemTicketStore::write_document(&target, &ticket("AR-1A2B3C4D")).await;

    assert!(matches!(result, Err(StorageError::InternalError { .. })));
    assert!(!dir.path().join("tickets/AR-1A2B3C4D.tmp").exists());
}

#[tokio::test]
async fn test_create_fails_when_existence_cannot_be_checked() {
    let (dir, store) = store().await;
    let tickets = dir.path().join("tickets");
    std::fs::remove_dir_all(&tickets).unwrap();
    std::fs::write(&tickets, b"not a directory").unwrap();

    let result = store.create(&ticket("AR-1A2B3C4D")).await;

    assert!(matches!(result, Err(StorageError::InternalError { .. })));
    assert_eq!(std::fs::read(&tickets).unwrap(), b"not a directory");
}
