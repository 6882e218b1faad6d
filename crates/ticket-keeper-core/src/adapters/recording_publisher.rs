//! # Recording Event Publisher
//!
//! Keeps published events in memory. Used by tests and by local runs that
//! want to inspect the event stream.

use crate::events::{EventPublisher, LifecycleEvent, PublishError};
use crate::TicketId;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// In-memory event sink
///
/// Clones share the same event log.
#[derive(Clone, Default)]
pub struct RecordingEventPublisher {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event published so far, oldest first
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events for one ticket, oldest first
    pub fn events_for(&self, id: &TicketId) -> Vec<LifecycleEvent> {
        self.events()
            .into_iter()
            .filter(|event| &event.entity_id == id)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError> {
        let mut events = self.events.lock().map_err(|_| PublishError::Unavailable {
            message: "event log lock poisoned".to_string(),
        })?;
        events.push(event.clone());
        Ok(())
    }
}
