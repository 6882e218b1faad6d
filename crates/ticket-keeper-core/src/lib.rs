//! # Ticket-Keeper Core
//!
//! Core business logic for tracking ticket-like entities (issues, access
//! requests, supplier onboarding requests, supply orders) through a status
//! lifecycle with Service-Level-Agreement deadlines.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - All external dependencies (document store, event sink, task scheduler,
//!   acknowledgement text service, clock) are abstracted behind traits
//!
//! ## Usage
//!
//! ```rust
//! use ticket_keeper_core::{Priority, PriorityPolicy, Timestamp};
//!
//! let policy = PriorityPolicy::default();
//! let budget = policy.budgets_for(Priority::P1);
//! assert_eq!(budget.response_minutes, 15);
//!
//! let created = Timestamp::now();
//! let sla = budget.deadlines_from(created);
//! assert!(sla.response_due_at <= sla.resolve_due_at);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ulid::Ulid;
use uuid::Uuid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identifier for a tracked ticket
///
/// Format: `{PREFIX}-{8 upper-case hex digits}`, e.g. `INC-3F2A9C01`. The
/// prefix comes from the lifecycle class. Identifiers double as document keys
/// and file names, so only ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketId(String);

impl TicketId {
    /// Maximum accepted identifier length
    pub const MAX_LENGTH: usize = 64;

    /// Create ticket ID with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "id".to_string(),
            });
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "id".to_string(),
                max_length: Self::MAX_LENGTH,
            });
        }

        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidCharacters {
                field: "id".to_string(),
                invalid_chars: "anything other than alphanumerics, '-' and '_'".to_string(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Generate a fresh identifier with the given class prefix
    pub fn generate(prefix: &str) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", prefix, random[..8].to_uppercase()))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TicketId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TicketId> for String {
    fn from(id: TicketId) -> Self {
        id.0
    }
}

/// Identifier of the person or system that raised a ticket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequesterId(String);

impl RequesterId {
    /// Maximum accepted identifier length
    pub const MAX_LENGTH: usize = 256;

    /// Create requester ID from raw input, trimming surrounding whitespace
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "reporter_id".to_string(),
            });
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "reporter_id".to_string(),
                max_length: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for lifecycle events
///
/// Uses ULID for lexicographic sorting and global uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Ulid);

impl EventId {
    /// Generate a new unique event ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation of event ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Add whole minutes to timestamp
    pub fn add_minutes(&self, minutes: u32) -> Self {
        Self(self.0 + chrono::Duration::minutes(i64::from(minutes)))
    }

    /// Get duration since another timestamp
    ///
    /// Returns zero when `other` is later than `self`.
    pub fn duration_since(&self, other: Self) -> Duration {
        let chrono_duration = self.0.signed_duration_since(other.0);
        chrono_duration.to_std().unwrap_or_default()
    }

    /// Signed number of whole minutes from `earlier` to `self`
    pub fn minutes_since(&self, earlier: Self) -> i64 {
        self.0.signed_duration_since(earlier.0).num_minutes()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' is below minimum length of {min_length}")]
    TooShort { field: String, min_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },

    #[error("Field '{field}' has unrecognized value '{value}'")]
    UnknownValue { field: String, value: String },
}

impl ValidationError {
    /// Name of the offending field
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::InvalidFormat { field, .. }
            | Self::TooLong { field, .. }
            | Self::TooShort { field, .. }
            | Self::InvalidCharacters { field, .. }
            | Self::UnknownValue { field, .. } => field,
        }
    }
}

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Time source abstraction
pub mod clock;

/// Priority tiers and the SLA budget table
pub mod priority;

/// Lifecycle classes and the monotonic transition guard
pub mod lifecycle;

/// Ticket entity, SLA deadlines and merge patches
pub mod ticket;

/// Document store contract
pub mod storage;

/// Lifecycle event contract
pub mod events;

/// Delayed follow-up scheduling contract
pub mod scheduler;

/// Generated acknowledgement text contract
pub mod acknowledgement;

/// The lifecycle tracker itself
pub mod tracker;

/// Infrastructure implementations of the collaborator traits
pub mod adapters;

// Re-export key types for convenience
pub use acknowledgement::{AcknowledgementError, AcknowledgementGenerator, AcknowledgementRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventPublisher, LifecycleEvent, PublishError, TransitionSource};
pub use lifecycle::{
    FollowUpStep, IgnoreReason, LifecyclePolicy, LifecycleRegistry, StatusStage,
    TransitionDecision,
};
pub use priority::{Priority, PriorityPolicy, SlaBudget};
pub use scheduler::{DeadlineScheduler, ScheduleReport, ScheduledTransition, SchedulerError};
pub use storage::{StorageError, TicketStore};
pub use ticket::{
    NewTicket, RequesterRecord, Sla, SlaStatus, Ticket, TicketPatch, TicketView,
};
pub use tracker::{
    AdvanceOutcome, CreatedTicket, LifecycleTracker, TrackerConfig, TrackerError,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
