//! Common test utilities for ticket-keeper-api integration tests
//!
//! This module provides:
//! - A router wired to in-memory collaborators and a manual clock
//! - Request helpers returning parsed JSON bodies

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use ticket_keeper_api::{create_router, AppState, ServiceConfig, ServiceMetrics};
use ticket_keeper_core::acknowledgement::CannedAcknowledgement;
use ticket_keeper_core::adapters::{
    InMemoryTicketStore, RecordingEventPublisher, RecordingScheduler,
};
use ticket_keeper_core::{LifecycleTracker, ManualClock, TicketStore, Timestamp};
use tower::ServiceExt;

/// Reply returned by the canned acknowledgement generator
#[allow(dead_code)]
pub const ACKNOWLEDGEMENT: &str = "Thanks, we are looking into it.";

/// Creation instant used by every harness
#[allow(dead_code)]
pub fn start_time() -> Timestamp {
    Timestamp::from_rfc3339("2026-04-01T08:00:00Z").unwrap()
}

/// Parse an RFC3339 field of a response body
#[allow(dead_code)]
pub fn timestamp(value: &Value) -> Timestamp {
    Timestamp::from_rfc3339(value.as_str().unwrap()).unwrap()
}

/// Router plus handles on its collaborators
#[allow(dead_code)]
pub struct TestHarness {
    pub router: Router,
    pub store: InMemoryTicketStore,
    pub publisher: RecordingEventPublisher,
    pub scheduler: RecordingScheduler,
    pub clock: ManualClock,
}

#[allow(dead_code)]
impl TestHarness {
    pub fn new() -> Self {
        let store = InMemoryTicketStore::new();
        let publisher = RecordingEventPublisher::new();
        let scheduler = RecordingScheduler::new();
        let clock = ManualClock::new(start_time());

        let router = build_router(
            Arc::new(store.clone()),
            publisher.clone(),
            scheduler.clone(),
            clock.clone(),
        );

        Self {
            router,
            store,
            publisher,
            scheduler,
            clock,
        }
    }

    pub async fn post(&self, uri: &str, body: Value) -> Value {
        post_json(&self.router, uri, body).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        get_json(&self.router, uri).await
    }

    /// Submit and return the new ticket id
    pub async fn submit(&self, body: Value) -> String {
        let response = self.post("/submit", body).await;
        assert_eq!(response["status"], "created", "submission failed: {}", response);
        response["id"].as_str().unwrap().to_string()
    }

    pub async fn advance(&self, id: &str, status: &str, source: &str) -> Value {
        self.post(
            "/advance-status",
            serde_json::json!({"id": id, "status": status, "source": source}),
        )
        .await
    }

    pub async fn status(&self, id: &str) -> Value {
        self.post("/status", serde_json::json!({"id": id})).await
    }
}

/// Router over the given store with recording collaborators
#[allow(dead_code)]
pub fn build_router(
    store: Arc<dyn TicketStore>,
    publisher: RecordingEventPublisher,
    scheduler: RecordingScheduler,
    clock: ManualClock,
) -> Router {
    let tracker = LifecycleTracker::new(
        store,
        Arc::new(publisher),
        Arc::new(scheduler),
        Arc::new(CannedAcknowledgement::new(ACKNOWLEDGEMENT)),
        Arc::new(clock),
    );

    let state = AppState::new(
        ServiceConfig::default(),
        Arc::new(tracker),
        ServiceMetrics::new().unwrap(),
    );
    create_router(state)
}

#[allow(dead_code)]
pub async fn post_json(router: &Router, uri: &str, body: Value) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

#[allow(dead_code)]
pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, read_json(response).await)
}

#[allow(dead_code)]
async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
