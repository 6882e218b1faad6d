//! # In-Memory Ticket Store
//!
//! Thread-safe in-memory implementation for testing and development.

use crate::storage::{StorageError, TicketStore};
use crate::ticket::{RequesterRecord, Ticket, TicketPatch};
use crate::{RequesterId, TicketId, Timestamp};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory document store
///
/// Clones share the same underlying maps.
#[derive(Clone, Default)]
pub struct InMemoryTicketStore {
    tickets: Arc<RwLock<HashMap<TicketId, Ticket>>>,
    requesters: Arc<RwLock<HashMap<RequesterId, RequesterRecord>>>,
}

impl InMemoryTicketStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tickets
    pub fn len(&self) -> usize {
        self.tickets.read().map(|tickets| tickets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requester record, if one was upserted
    pub fn requester(&self, requester_id: &RequesterId) -> Option<RequesterRecord> {
        self.requesters
            .read()
            .ok()
            .and_then(|requesters| requesters.get(requester_id).cloned())
    }

    /// Insert or replace a ticket without any checks
    pub fn seed(&self, ticket: Ticket) {
        let mut tickets = self.tickets.write().unwrap_or_else(|e| e.into_inner());
        tickets.insert(ticket.id.clone(), ticket);
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::InternalError {
        message: "store lock poisoned".to_string(),
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, StorageError> {
        let tickets = self.tickets.read().map_err(poisoned)?;
        Ok(tickets.get(id).cloned())
    }

    async fn create(&self, ticket: &Ticket) -> Result<(), StorageError> {
        let mut tickets = self.tickets.write().map_err(poisoned)?;
        if tickets.contains_key(&ticket.id) {
            return Err(StorageError::AlreadyExists {
                id: ticket.id.clone(),
            });
        }
        tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    async fn update(&self, id: &TicketId, patch: &TicketPatch) -> Result<Ticket, StorageError> {
        let mut tickets = self.tickets.write().map_err(poisoned)?;
        let ticket = tickets
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound { id: id.clone() })?;

        if !patch.precondition_holds(ticket) {
            return Err(StorageError::PreconditionFailed {
                id: id.clone(),
                expected: patch.expected_status.clone().unwrap_or_default(),
                actual: ticket.status.clone(),
            });
        }

        patch.apply_to(ticket);
        Ok(ticket.clone())
    }

    async fn touch_requester(
        &self,
        requester_id: &RequesterId,
        seen_at: Timestamp,
    ) -> Result<RequesterRecord, StorageError> {
        let mut requesters = self.requesters.write().map_err(poisoned)?;
        let record = requesters
            .entry(requester_id.clone())
            .and_modify(|record| record.touch(seen_at))
            .or_insert_with(|| RequesterRecord::first_seen(requester_id.clone(), seen_at));
        Ok(record.clone())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        self.tickets.read().map(|_| ()).map_err(poisoned)
    }
}

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;
