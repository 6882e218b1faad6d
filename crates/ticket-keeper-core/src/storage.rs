//! # Ticket Store Interface
//!
//! Document store contract for tickets and requester records. Updates are
//! merge-style patches guarded by an optional status precondition, so two
//! concurrent transitions decided against the same status cannot both land.

use crate::ticket::{RequesterRecord, Ticket, TicketPatch};
use crate::{RequesterId, TicketId, Timestamp};
use async_trait::async_trait;
use thiserror::Error;

/// Persistent storage of tickets and requesters
///
/// # Examples
///
/// ```no_run
/// use ticket_keeper_core::adapters::InMemoryTicketStore;
/// use ticket_keeper_core::{TicketId, TicketStore};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryTicketStore::new();
/// let id = TicketId::new("INC-0000ABCD")?;
/// if let Some(ticket) = store.get(&id).await? {
///     println!("{} is {}", ticket.id, ticket.status);
/// }
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Fetch a ticket, `None` when absent
    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, StorageError>;

    /// Persist a new ticket
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] when the id is taken.
    async fn create(&self, ticket: &Ticket) -> Result<(), StorageError>;

    /// Merge a patch into a stored ticket and return the result
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] when the ticket does not exist
    /// - [`StorageError::PreconditionFailed`] when `patch.expected_status`
    ///   does not match the stored status
    async fn update(&self, id: &TicketId, patch: &TicketPatch) -> Result<Ticket, StorageError>;

    /// Upsert the requester record with merge semantics
    async fn touch_requester(
        &self,
        requester_id: &RequesterId,
        seen_at: Timestamp,
    ) -> Result<RequesterRecord, StorageError>;

    /// Check backend reachability
    async fn health_check(&self) -> Result<(), StorageError>;
}

/// Errors raised by ticket stores
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Ticket not found: {id}")]
    NotFound { id: TicketId },

    #[error("Ticket already exists: {id}")]
    AlreadyExists { id: TicketId },

    #[error("Precondition failed for {id}: expected status '{expected}', found '{actual}'")]
    PreconditionFailed {
        id: TicketId,
        expected: String,
        actual: String,
    },

    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Internal storage error: {message}")]
    InternalError { message: String },
}

impl StorageError {
    /// Check if error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::InternalError { .. } | Self::PreconditionFailed { .. }
        )
    }
}
