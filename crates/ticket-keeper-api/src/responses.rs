//! Response bodies for the HTTP API
//!
//! Agent-facing endpoints always answer `200 OK`; success and failure are
//! carried in the body. This module is the only place where tracker results
//! are flattened into those bodies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ticket_keeper_core::{
    AdvanceOutcome, CreatedTicket, Priority, ScheduleReport, Sla, SlaStatus, TicketView,
    Timestamp, TrackerError,
};

/// Reply sent with a rejected submission
pub const INVALID_INPUT_REPLY: &str =
    "Invalid input. Please provide reporter_id and issue details.";

/// Reply sent when the ticket could not be stored
pub const INTERNAL_ERROR_REPLY: &str =
    "An internal error occurred, but your request was received.";

/// Identifier reported for a rejected submission
pub const INVALID_ID: &str = "N/A";

/// Identifier reported when the ticket could not be stored
pub const ERROR_ID: &str = "ERROR";

/// SLA deadlines and breach flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaBody {
    pub response_due_at: Timestamp,
    pub resolve_due_at: Timestamp,
    pub response_breached: bool,
    pub resolution_breached: bool,

    /// Minutes until the resolve deadline; negative once it has passed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_to_resolve: Option<i64>,
}

impl SlaBody {
    /// Deadlines as stored, before any breach evaluation
    pub fn stored(sla: &Sla) -> Self {
        Self {
            response_due_at: sla.response_due_at,
            resolve_due_at: sla.resolve_due_at,
            response_breached: sla.response_breached,
            resolution_breached: sla.resolution_breached,
            minutes_to_resolve: None,
        }
    }

    /// Deadlines with breach flags evaluated at lookup time
    pub fn evaluated(sla: &Sla, status: &SlaStatus) -> Self {
        Self {
            response_due_at: sla.response_due_at,
            resolve_due_at: sla.resolve_due_at,
            response_breached: status.response_breached,
            resolution_breached: status.resolution_breached,
            minutes_to_resolve: Some(status.minutes_to_resolve),
        }
    }
}

/// `/submit` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Ticket id, `N/A` for invalid input or `ERROR` for a failed write
    pub id: String,

    /// `created` or `failed`
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_reply: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla: Option<SlaBody>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    pub fn created(created: &CreatedTicket) -> Self {
        let ticket = &created.ticket;
        Self {
            id: ticket.id.to_string(),
            status: "created".to_string(),
            ticket_status: Some(ticket.status.clone()),
            lifecycle: Some(ticket.lifecycle.clone()),
            priority: Some(ticket.priority),
            assistant_reply: created.acknowledgement.clone(),
            sla: Some(SlaBody::stored(&ticket.sla)),
            error: None,
        }
    }

    /// Flatten a failed creation
    ///
    /// Validation failures report `N/A`; everything else means the primary
    /// write did not happen and reports `ERROR`.
    pub fn failed(error: &TrackerError) -> Self {
        let (id, reply) = match error {
            TrackerError::InvalidInput(_) => (INVALID_ID, INVALID_INPUT_REPLY),
            _ => (ERROR_ID, INTERNAL_ERROR_REPLY),
        };

        Self {
            id: id.to_string(),
            status: "failed".to_string(),
            ticket_status: None,
            lifecycle: None,
            priority: None,
            assistant_reply: Some(reply.to_string()),
            sla: None,
            error: Some(error.to_string()),
        }
    }

    pub fn from_result(result: &Result<CreatedTicket, TrackerError>) -> Self {
        match result {
            Ok(created) => Self::created(created),
            Err(error) => Self::failed(error),
        }
    }
}

/// `/advance-status` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceResponse {
    /// Request understood and the ticket exists
    pub ok: bool,

    /// Status written
    pub applied: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<String>,

    /// Why a transition was ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AdvanceResponse {
    pub fn from_outcome(outcome: &AdvanceOutcome) -> Self {
        let reason = match outcome {
            AdvanceOutcome::Ignored { reason, .. } => Some(reason.as_str().to_string()),
            _ => None,
        };

        Self {
            ok: true,
            applied: outcome.applied(),
            current_status: Some(outcome.current_status().to_string()),
            reason,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            applied: false,
            current_status: None,
            reason: None,
            error: Some(message.into()),
        }
    }

    pub fn from_result(result: &Result<AdvanceOutcome, TrackerError>) -> Self {
        match result {
            Ok(outcome) => Self::from_outcome(outcome),
            Err(error) => Self::failed(error.to_string()),
        }
    }
}

/// Stored ticket as returned by `/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStatusBody {
    pub id: String,
    pub lifecycle: String,
    pub current_status: String,
    pub terminal: bool,
    pub priority: Priority,
    pub requester_id: String,
    pub description: String,
    pub sla: SlaBody,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// `/status` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusResponse {
    Found(Box<TicketStatusBody>),

    /// `not_found`, or `failed` for a missing id or a store error
    Unavailable { status: String },
}

impl StatusResponse {
    pub fn found(view: &TicketView) -> Self {
        let ticket = &view.ticket;
        Self::Found(Box::new(TicketStatusBody {
            id: ticket.id.to_string(),
            lifecycle: ticket.lifecycle.clone(),
            current_status: ticket.status.clone(),
            terminal: view.terminal,
            priority: ticket.priority,
            requester_id: ticket.requester_id.as_str().to_string(),
            description: ticket.description.clone(),
            sla: SlaBody::evaluated(&ticket.sla, &view.sla_status),
            attributes: ticket.attributes.clone(),
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        }))
    }

    pub fn not_found() -> Self {
        Self::Unavailable {
            status: "not_found".to_string(),
        }
    }

    pub fn failed() -> Self {
        Self::Unavailable {
            status: "failed".to_string(),
        }
    }

    pub fn from_result(result: &Result<TicketView, TrackerError>) -> Self {
        match result {
            Ok(view) => Self::found(view),
            Err(TrackerError::NotFound { .. }) => Self::not_found(),
            Err(_) => Self::failed(),
        }
    }
}

/// `/admin/follow-ups` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpResponse {
    pub ok: bool,

    #[serde(default)]
    pub scheduled: Vec<String>,

    #[serde(default)]
    pub skipped: Vec<String>,

    #[serde(default)]
    pub failed: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FollowUpResponse {
    pub fn from_report(report: &ScheduleReport) -> Self {
        Self {
            ok: true,
            scheduled: report.scheduled.clone(),
            skipped: report.skipped.clone(),
            failed: report.failed.clone(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn from_result(result: &Result<ScheduleReport, TrackerError>) -> Self {
        match result {
            Ok(report) => Self::from_report(report),
            Err(error) => Self::failed(error.to_string()),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: Timestamp,

    /// Store health detail when not ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
}

#[cfg(test)]
#[path = "responses_tests.rs"]
mod tests;
