//! # Ticket Entity
//!
//! The tracked record, its SLA deadlines, the raw submission it is built
//! from, and the merge patch used for status updates.

use crate::lifecycle::LifecyclePolicy;
use crate::{Priority, RequesterId, TicketId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SLA deadlines and stored breach flags
///
/// Flags default to `false` and are never recomputed in storage; breach is
/// evaluated at read time by [`Sla::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sla {
    pub response_due_at: Timestamp,
    pub resolve_due_at: Timestamp,

    #[serde(default)]
    pub response_breached: bool,

    #[serde(default)]
    pub resolution_breached: bool,
}

impl Sla {
    pub fn new(response_due_at: Timestamp, resolve_due_at: Timestamp) -> Self {
        Self {
            response_due_at,
            resolve_due_at,
            response_breached: false,
            resolution_breached: false,
        }
    }

    /// Breach state at `now`
    ///
    /// The response deadline counts as met once the ticket leaves its initial
    /// status; the resolution deadline once it reaches a terminal status.
    pub fn evaluate(&self, now: Timestamp, awaiting_response: bool, resolved: bool) -> SlaStatus {
        SlaStatus {
            response_breached: self.response_breached
                || (awaiting_response && now > self.response_due_at),
            resolution_breached: self.resolution_breached
                || (!resolved && now > self.resolve_due_at),
            minutes_to_resolve: self.resolve_due_at.minutes_since(now),
        }
    }
}

/// Read-time SLA evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaStatus {
    pub response_breached: bool,
    pub resolution_breached: bool,

    /// Negative once the resolution deadline has passed
    pub minutes_to_resolve: i64,
}

/// A tracked ticket as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub lifecycle: String,
    pub requester_id: RequesterId,
    pub description: String,
    pub priority: Priority,
    pub status: String,
    pub sla: Sla,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Ticket {
    /// Stored ticket plus breach evaluation at `now`
    pub fn view(&self, policy: &LifecyclePolicy, now: Timestamp) -> TicketView {
        let awaiting_response = self.status == policy.initial_status();
        let terminal = policy.is_terminal(&self.status);

        TicketView {
            sla_status: self.sla.evaluate(now, awaiting_response, terminal),
            terminal,
            ticket: self.clone(),
        }
    }
}

/// Ticket as returned by status lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketView {
    pub ticket: Ticket,
    pub sla_status: SlaStatus,
    pub terminal: bool,
}

/// Raw submission before validation
///
/// Every field is optional so that validation, not deserialization, decides
/// what is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    #[serde(default)]
    pub requester_id: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub lifecycle: Option<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl NewTicket {
    pub fn new(requester_id: &str, description: &str) -> Self {
        Self {
            requester_id: Some(requester_id.to_string()),
            description: Some(description.to_string()),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: &str) -> Self {
        self.priority = Some(priority.to_string());
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: &str) -> Self {
        self.lifecycle = Some(lifecycle.to_string());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }
}

/// Merge-style partial update
///
/// Only the fields present are written. `expected_status` is a precondition:
/// stores reject the patch when the stored status differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketPatch {
    pub status: Option<String>,
    pub updated_at: Timestamp,
    pub expected_status: Option<String>,
}

impl TicketPatch {
    /// Status change guarded by the status it was decided against
    pub fn status_change(expected: &str, status: &str, updated_at: Timestamp) -> Self {
        Self {
            status: Some(status.to_string()),
            updated_at,
            expected_status: Some(expected.to_string()),
        }
    }

    /// Whether the precondition holds for `ticket`
    pub fn precondition_holds(&self, ticket: &Ticket) -> bool {
        self.expected_status
            .as_deref()
            .map_or(true, |expected| expected == ticket.status)
    }

    /// Merge into `ticket`
    pub fn apply_to(&self, ticket: &mut Ticket) {
        if let Some(status) = &self.status {
            ticket.status = status.clone();
        }
        ticket.updated_at = self.updated_at;
    }
}

/// Companion record of a requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterRecord {
    pub requester_id: RequesterId,

    /// Set on first sight, never overwritten
    pub created_at: Timestamp,

    /// Refreshed on every submission
    pub last_seen_at: Timestamp,
}

impl RequesterRecord {
    pub fn first_seen(requester_id: RequesterId, now: Timestamp) -> Self {
        Self {
            requester_id,
            created_at: now,
            last_seen_at: now,
        }
    }

    /// Merge a new sighting into an existing record
    pub fn touch(&mut self, now: Timestamp) {
        self.last_seen_at = now;
    }
}

#[cfg(test)]
#[path = "ticket_tests.rs"]
mod tests;
