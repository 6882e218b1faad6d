//! # Lifecycle Events
//!
//! Every applied status change, creation included, produces one
//! [`LifecycleEvent`]. Publication is best-effort: the tracker logs and
//! swallows [`PublishError`]s so the primary write is never rolled back.

use crate::ticket::Ticket;
use crate::{EventId, Priority, TicketId, Timestamp, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Origin of a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    /// Ticket creation
    Submission,
    /// Scheduled follow-up callback
    Scheduler,
    /// Manual action by an operator or agent
    Operator,
}

impl TransitionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Scheduler => "scheduler",
            Self::Operator => "operator",
        }
    }
}

impl fmt::Display for TransitionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "submission" | "submit" => Ok(Self::Submission),
            "scheduler" => Ok(Self::Scheduler),
            "operator" | "manual" | "agent" => Ok(Self::Operator),
            _ => Err(ValidationError::UnknownValue {
                field: "source".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Notification describing one status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_id: EventId,
    pub entity_id: TicketId,
    pub lifecycle: String,

    /// `None` for the creation event
    pub old_status: Option<String>,
    pub new_status: String,
    pub priority: Priority,
    pub source: TransitionSource,
    pub changed_at: Timestamp,
}

impl LifecycleEvent {
    /// Event for a freshly created ticket
    pub fn created(ticket: &Ticket) -> Self {
        Self {
            event_id: EventId::new(),
            entity_id: ticket.id.clone(),
            lifecycle: ticket.lifecycle.clone(),
            old_status: None,
            new_status: ticket.status.clone(),
            priority: ticket.priority,
            source: TransitionSource::Submission,
            changed_at: ticket.created_at,
        }
    }

    /// Event for an applied transition; `ticket` is the updated record
    pub fn transitioned(ticket: &Ticket, old_status: &str, source: TransitionSource) -> Self {
        Self {
            event_id: EventId::new(),
            entity_id: ticket.id.clone(),
            lifecycle: ticket.lifecycle.clone(),
            old_status: Some(old_status.to_string()),
            new_status: ticket.status.clone(),
            priority: ticket.priority,
            source,
            changed_at: ticket.updated_at,
        }
    }
}

/// Sink for lifecycle events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError>;
}

/// Errors raised by event publishers
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Event sink unavailable: {message}")]
    Unavailable { message: String },

    #[error("Event rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    #[error("Publish timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl PublishError {
    /// Check if error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } | Self::Timeout { .. } => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::SerializationFailed { .. } => false,
        }
    }
}
