//! Integration tests for ticket submission across lifecycle classes

mod common;

use common::{TestHarness, ACKNOWLEDGEMENT};
use serde_json::json;
use ticket_keeper_core::{RequesterId, TransitionSource};

/// A too-short issue is rejected without any write or side effect
#[tokio::test]
async fn test_short_issue_is_rejected_without_write() {
    // Arrange
    let harness = TestHarness::new();

    // Act
    let response = harness
        .post("/submit", json!({"reporter_id": "u1", "issue": "bad"}))
        .await;

    // Assert
    assert_eq!(response["status"], "failed");
    assert_eq!(response["id"], "N/A");
    assert!(harness.store.is_empty());
    assert!(harness.publisher.events().is_empty());
    assert!(harness.scheduler.tasks().is_empty());
    assert!(harness
        .store
        .requester(&RequesterId::new("u1").unwrap())
        .is_none());
}

/// A blank requester is rejected without any write
#[tokio::test]
async fn test_blank_requester_is_rejected_without_write() {
    let harness = TestHarness::new();

    for body in [
        json!({"reporter_id": "", "issue": "cannot log in"}),
        json!({"reporter_id": "   ", "issue": "cannot log in"}),
        json!({"issue": "cannot log in"}),
    ] {
        let response = harness.post("/submit", body).await;
        assert_eq!(response["status"], "failed");
        assert_eq!(response["id"], "N/A");
    }

    assert!(harness.store.is_empty());
}

/// Non-JSON bodies are treated as empty submissions
#[tokio::test]
async fn test_garbage_body_is_invalid_input() {
    let harness = TestHarness::new();

    let response = harness.post("/submit", json!(["not", "an", "object"])).await;

    assert_eq!(response["status"], "failed");
    assert_eq!(response["id"], "N/A");
    assert!(harness.store.is_empty());
}

/// A valid issue is stored, announced, scheduled and acknowledged
#[tokio::test]
async fn test_issue_submission_side_effects() {
    let harness = TestHarness::new();

    let response = harness
        .post(
            "/submit",
            json!({"user_id": "alice@example.com", "justification": "VPN drops every hour"}),
        )
        .await;

    assert_eq!(response["status"], "created");
    assert_eq!(response["lifecycle"], "issue");
    assert_eq!(response["ticket_status"], "new");
    assert_eq!(response["assistant_reply"], ACKNOWLEDGEMENT);
    let id = response["id"].as_str().unwrap();
    assert!(id.starts_with("INC-"));
    assert_eq!(harness.store.len(), 1);

    let events = harness.publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].entity_id.as_str(), id);
    assert_eq!(events[0].old_status, None);
    assert_eq!(events[0].new_status, "new");
    assert_eq!(events[0].source, TransitionSource::Submission);

    let targets: Vec<String> = harness
        .scheduler
        .tasks()
        .into_iter()
        .map(|task| task.target_status)
        .collect();
    assert_eq!(targets, vec!["assigned", "in_progress", "completed"]);

    let requester = harness
        .store
        .requester(&RequesterId::new("alice@example.com").unwrap());
    assert!(requester.is_some());
}

/// Access requests need their class-specific attributes
#[tokio::test]
async fn test_access_request_attributes() {
    let harness = TestHarness::new();

    let missing = harness
        .post(
            "/submit",
            json!({"user_id": "bob", "lifecycle": "access_request", "resource": "billing-db"}),
        )
        .await;
    assert_eq!(missing["status"], "failed");
    assert!(missing["error"].as_str().unwrap().contains("access_level"));
    assert!(harness.store.is_empty());

    let id = harness
        .submit(json!({
            "user_id": "bob",
            "lifecycle": "access_request",
            "resource": "billing-db",
            "access_level": "read",
            "justification": "Quarterly audit"
        }))
        .await;
    assert!(id.starts_with("AR-"));

    let status = harness.status(&id).await;
    assert_eq!(status["lifecycle"], "access_request");
    assert_eq!(status["attributes"]["resource"], "billing-db");
    assert_eq!(status["attributes"]["access_level"], "read");
    assert_eq!(status["description"], "Quarterly audit");
}

/// Classes without an acknowledgement prompt get no reply
#[tokio::test]
async fn test_supplier_onboarding_has_no_reply() {
    let harness = TestHarness::new();

    let response = harness
        .post(
            "/submit",
            json!({
                "requester_id": "procurement",
                "lifecycle": "supplier_onboarding",
                "supplier_name": "Acme Bolts",
                "country": "NL"
            }),
        )
        .await;

    assert_eq!(response["status"], "created");
    assert!(response["id"].as_str().unwrap().starts_with("SUP-"));
    assert!(response.get("assistant_reply").is_none());
}

/// Supply orders have no follow-up schedule
#[tokio::test]
async fn test_supply_order_schedules_nothing() {
    let harness = TestHarness::new();

    let id = harness
        .submit(json!({
            "requester_id": "warehouse",
            "lifecycle": "supply_order",
            "item_id": "SKU-1042",
            "description": "Two pallets of M8 bolts"
        }))
        .await;

    assert!(id.starts_with("ORD-"));
    assert!(harness.scheduler.tasks().is_empty());
    assert_eq!(harness.publisher.events().len(), 1);
}

/// Unknown lifecycle classes are rejected
#[tokio::test]
async fn test_unknown_lifecycle_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .post(
            "/submit",
            json!({"reporter_id": "u1", "issue": "cannot log in", "lifecycle": "refund"}),
        )
        .await;

    assert_eq!(response["status"], "failed");
    assert_eq!(response["id"], "N/A");
    assert!(harness.store.is_empty());
}

/// Issues need at least five characters of description
#[tokio::test]
async fn test_issue_description_minimum_is_five_characters() {
    let harness = TestHarness::new();

    let four = harness
        .post("/submit", json!({"reporter_id": "u1", "issue": "down"}))
        .await;
    assert_eq!(four["status"], "failed");
    assert_eq!(four["id"], "N/A");
    assert!(harness.store.is_empty());

    let five = harness
        .post("/submit", json!({"reporter_id": "u1", "issue": "ñandú"}))
        .await;
    assert_eq!(five["status"], "created");
    assert_eq!(harness.store.len(), 1);
}
