//! Integration tests for status transitions and follow-up delivery
//!
//! Transitions obey a monotonic guard: a request applies only when it moves
//! a non-terminal ticket to a higher-ranked status. Everything else is
//! acknowledged without a write.

mod common;

use common::TestHarness;
use serde_json::json;
use ticket_keeper_core::TransitionSource;

async fn issue(harness: &TestHarness) -> String {
    harness
        .submit(json!({"reporter_id": "u1", "issue": "cannot log in", "priority": "P2"}))
        .await
}

/// Follow-ups delivered in schedule order walk the issue to completion
#[tokio::test]
async fn test_follow_ups_in_order_complete_the_issue() {
    let harness = TestHarness::new();
    let id = issue(&harness).await;

    for task in harness.scheduler.tasks() {
        let response = harness
            .advance(task.ticket_id.as_str(), &task.target_status, "scheduler")
            .await;
        assert_eq!(response["ok"], true);
        assert_eq!(response["applied"], true);
    }

    let status = harness.status(&id).await;
    assert_eq!(status["current_status"], "completed");
    assert_eq!(status["terminal"], true);

    // Creation plus three transitions
    let events = harness.publisher.events();
    assert_eq!(events.len(), 4);
    assert!(events[1..]
        .iter()
        .all(|event| event.source == TransitionSource::Scheduler));
}

/// `completed` arriving before `in_progress` leaves the ticket completed
#[tokio::test]
async fn test_out_of_order_delivery_keeps_highest_status() {
    // Arrange
    let harness = TestHarness::new();
    let id = issue(&harness).await;

    // Act: assigned, then completed, then the late in_progress
    let assigned = harness.advance(&id, "assigned", "scheduler").await;
    let completed = harness.advance(&id, "completed", "scheduler").await;
    let late = harness.advance(&id, "in_progress", "scheduler").await;

    // Assert
    assert_eq!(assigned["applied"], true);
    assert_eq!(completed["applied"], true);
    assert_eq!(late["ok"], true);
    assert_eq!(late["applied"], false);
    assert_eq!(late["reason"], "after_terminal");
    assert_eq!(late["current_status"], "completed");

    let status = harness.status(&id).await;
    assert_eq!(status["current_status"], "completed");

    // The ignored request produced no event
    let new_statuses: Vec<String> = harness
        .publisher
        .events()
        .into_iter()
        .map(|event| event.new_status)
        .collect();
    assert_eq!(new_statuses, vec!["new", "assigned", "completed"]);
}

/// Deliveries in fully reversed order still end completed
#[tokio::test]
async fn test_reversed_delivery_ends_completed() {
    let harness = TestHarness::new();
    let id = issue(&harness).await;

    let mut tasks = harness.scheduler.tasks();
    tasks.reverse();

    let applied: Vec<bool> = {
        let mut applied = Vec::new();
        for task in &tasks {
            let response = harness.advance(&id, &task.target_status, "scheduler").await;
            applied.push(response["applied"] == true);
        }
        applied
    };

    assert_eq!(applied, vec![true, false, false]);
    assert_eq!(harness.status(&id).await["current_status"], "completed");
}

/// A backwards request on a non-terminal ticket is ignored as regressive
#[tokio::test]
async fn test_regression_is_ignored() {
    let harness = TestHarness::new();
    let id = issue(&harness).await;

    harness.advance(&id, "in_progress", "operator").await;
    let response = harness.advance(&id, "assigned", "scheduler").await;

    assert_eq!(response["ok"], true);
    assert_eq!(response["applied"], false);
    assert_eq!(response["reason"], "regressive");
    assert_eq!(harness.status(&id).await["current_status"], "in_progress");
}

/// Repeating the same status is a successful no-op
#[tokio::test]
async fn test_same_status_twice_is_idempotent() {
    let harness = TestHarness::new();
    let id = issue(&harness).await;

    let first = harness.advance(&id, "assigned", "scheduler").await;
    let second = harness.advance(&id, "assigned", "scheduler").await;

    assert_eq!(first["ok"], true);
    assert_eq!(first["applied"], true);
    assert_eq!(second["ok"], true);
    assert_eq!(second["applied"], false);
    assert_eq!(second["current_status"], "assigned");

    let transitions = harness
        .publisher
        .events()
        .into_iter()
        .filter(|event| event.new_status == "assigned")
        .count();
    assert_eq!(transitions, 1);
}

/// Unknown tickets fail softly
#[tokio::test]
async fn test_unknown_ticket_reports_failure() {
    let harness = TestHarness::new();

    let response = harness.advance("INC-FFFFFFFF", "assigned", "scheduler").await;

    assert_eq!(response["ok"], false);
    assert_eq!(response["applied"], false);
    assert!(response["error"].as_str().unwrap().contains("INC-FFFFFFFF"));
    assert!(harness.publisher.events().is_empty());
}

/// Statuses outside the ticket's class are rejected
#[tokio::test]
async fn test_status_from_another_class_is_rejected() {
    let harness = TestHarness::new();
    let id = issue(&harness).await;

    let response = harness.advance(&id, "shipped", "operator").await;

    assert_eq!(response["ok"], false);
    assert!(response["error"].as_str().unwrap().contains("shipped"));
    assert_eq!(harness.status(&id).await["current_status"], "new");
}

/// A rejected supply order can no longer ship
#[tokio::test]
async fn test_supply_order_rejection_is_final() {
    let harness = TestHarness::new();
    let id = harness
        .submit(json!({
            "requester_id": "warehouse",
            "lifecycle": "supply_order",
            "item_id": "SKU-1042"
        }))
        .await;

    let rejected = harness.advance(&id, "rejected", "operator").await;
    let shipped = harness.advance(&id, "shipped", "operator").await;

    assert_eq!(rejected["applied"], true);
    assert_eq!(shipped["applied"], false);
    assert_eq!(shipped["reason"], "after_terminal");

    let status = harness.status(&id).await;
    assert_eq!(status["current_status"], "rejected");
    assert_eq!(status["terminal"], true);
}

/// An approved supply order can ship but not be rejected
#[tokio::test]
async fn test_approved_supply_order_ships() {
    let harness = TestHarness::new();
    let id = harness
        .submit(json!({
            "requester_id": "warehouse",
            "lifecycle": "supply_order",
            "item_id": "SKU-1042"
        }))
        .await;

    harness.advance(&id, "approved", "operator").await;
    let rejected = harness.advance(&id, "rejected", "operator").await;
    let shipped = harness.advance(&id, "shipped", "operator").await;

    assert_eq!(rejected["applied"], false);
    assert_eq!(rejected["reason"], "regressive");
    assert_eq!(shipped["applied"], true);
    assert_eq!(harness.status(&id).await["current_status"], "shipped");
}

/// Re-submitting follow-ups restores lost tasks still ahead of the ticket
#[tokio::test]
async fn test_follow_up_resubmission_restores_lost_tasks() {
    let harness = TestHarness::new();
    let id = issue(&harness).await;
    harness.advance(&id, "assigned", "operator").await;

    // Everything is either passed or still queued
    let unchanged = harness.post("/admin/follow-ups", json!({"id": id})).await;
    assert_eq!(unchanged["ok"], true);
    assert_eq!(unchanged["scheduled"].as_array().unwrap().len(), 0);
    assert_eq!(unchanged["skipped"].as_array().unwrap().len(), 3);

    // Lose the in_progress task
    let lost = harness
        .scheduler
        .tasks()
        .into_iter()
        .find(|task| task.target_status == "in_progress")
        .unwrap();
    harness.scheduler.remove(&lost.task_name);

    let restored = harness.post("/admin/follow-ups", json!({"id": id})).await;
    assert_eq!(restored["scheduled"], json!([lost.task_name]));
    assert_eq!(restored["skipped"].as_array().unwrap().len(), 2);
    assert_eq!(restored["failed"].as_array().unwrap().len(), 0);
    assert_eq!(harness.scheduler.tasks().len(), 3);
}

/// Status lookups accept the query string and legacy id names
#[tokio::test]
async fn test_status_lookup_variants() {
    let harness = TestHarness::new();
    let id = issue(&harness).await;

    let (code, by_query) = harness.get(&format!("/status?id={}", id)).await;
    assert_eq!(code, axum::http::StatusCode::OK);
    assert_eq!(by_query["id"], id.as_str());

    let by_legacy_name = harness.post("/status", json!({"issue_id": id})).await;
    assert_eq!(by_legacy_name["id"], id.as_str());

    let missing = harness.post("/status", json!({"id": "INC-FFFFFFFF"})).await;
    assert_eq!(missing, json!({"status": "not_found"}));

    let no_id = harness.post("/status", json!({})).await;
    assert_eq!(no_id, json!({"status": "failed"}));
}
