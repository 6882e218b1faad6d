//! # Tracing Event Publisher
//!
//! Writes lifecycle events to the log instead of a message bus. Default sink
//! when no topic is configured.

use crate::events::{EventPublisher, LifecycleEvent, PublishError};
use async_trait::async_trait;
use tracing::info;

/// Event sink that logs each event at INFO
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError> {
        info!(
            event_id = %event.event_id,
            ticket_id = %event.entity_id,
            lifecycle = %event.lifecycle,
            old_status = event.old_status.as_deref().unwrap_or("-"),
            new_status = %event.new_status,
            priority = %event.priority,
            source = %event.source,
            changed_at = %event.changed_at,
            "Lifecycle event"
        );
        Ok(())
    }
}
