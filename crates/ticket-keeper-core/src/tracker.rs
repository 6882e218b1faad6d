//! # Lifecycle Tracker
//!
//! Owns ticket state: validates submissions, computes SLA deadlines, applies
//! monotonic status transitions and drives the event publisher, follow-up
//! scheduler and acknowledgement generator.
//!
//! Only the primary store write can fail an operation. Requester upserts,
//! event publication, follow-up scheduling and acknowledgement text are
//! best-effort: each runs under `outbound_timeout`, and failures are logged
//! and reported in the result without undoing the write.

use crate::acknowledgement::{
    AcknowledgementError, AcknowledgementGenerator, AcknowledgementRequest,
    DEFAULT_ACKNOWLEDGEMENT,
};
use crate::clock::Clock;
use crate::events::{EventPublisher, LifecycleEvent, PublishError, TransitionSource};
use crate::lifecycle::{IgnoreReason, LifecyclePolicy, LifecycleRegistry, TransitionDecision};
use crate::priority::PriorityPolicy;
use crate::scheduler::{DeadlineScheduler, ScheduleReport, ScheduledTransition, SchedulerError};
use crate::storage::{StorageError, TicketStore};
use crate::ticket::{NewTicket, Ticket, TicketPatch, TicketView};
use crate::{RequesterId, TicketId, Timestamp, ValidationError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Attempts at generating a free id before giving up on creation
const MAX_ID_ATTEMPTS: u32 = 3;

/// Tracker tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Bound on every outbound side-effect call
    pub outbound_timeout: Duration,

    /// Read-decide-write attempts when a concurrent update wins the race
    pub max_update_attempts: u32,

    /// Reply used when acknowledgement generation fails or is disabled
    pub fallback_acknowledgement: String,

    /// Call the acknowledgement generator at all
    pub acknowledgements_enabled: bool,

    /// Submit follow-up steps at creation
    pub follow_ups_enabled: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            outbound_timeout: Duration::from_secs(10),
            max_update_attempts: 3,
            fallback_acknowledgement: DEFAULT_ACKNOWLEDGEMENT.to_string(),
            acknowledgements_enabled: true,
            follow_ups_enabled: true,
        }
    }
}

/// Result of a successful creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTicket {
    pub ticket: Ticket,
    pub schedule: ScheduleReport,
    pub event_published: bool,

    /// `None` for classes without an acknowledgement prompt
    pub acknowledgement: Option<String>,
}

/// Result of a status advance request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Status written and event attempted
    Applied {
        ticket: Ticket,
        previous_status: String,
        event_published: bool,
    },
    /// Requested status was already current
    Unchanged { ticket: Ticket },
    /// Monotonic guard refused the transition
    Ignored {
        ticket: Ticket,
        requested: String,
        reason: IgnoreReason,
    },
}

impl AdvanceOutcome {
    /// Ticket as it stands after the request
    pub fn ticket(&self) -> &Ticket {
        match self {
            Self::Applied { ticket, .. }
            | Self::Unchanged { ticket }
            | Self::Ignored { ticket, .. } => ticket,
        }
    }

    /// Status after the request
    pub fn current_status(&self) -> &str {
        &self.ticket().status
    }

    /// Whether a write happened
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Unchanged { .. } => "unchanged",
            Self::Ignored { .. } => "ignored",
        }
    }
}

/// Errors surfaced by tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Rejected before any write
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Ticket not found: {id}")]
    NotFound { id: TicketId },

    /// Primary write of a new ticket failed
    #[error("Ticket creation failed: {source}")]
    CreationFailed {
        #[source]
        source: StorageError,
    },

    /// Store read or update failed
    #[error("Dependency failure in {dependency}: {message}")]
    DependencyFailure {
        dependency: &'static str,
        message: String,
    },
}

impl TrackerError {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound { .. } => "not_found",
            Self::CreationFailed { .. } => "creation_failed",
            Self::DependencyFailure { .. } => "dependency_failure",
        }
    }

    fn storage(error: StorageError) -> Self {
        Self::DependencyFailure {
            dependency: "storage",
            message: error.to_string(),
        }
    }
}

/// SLA lifecycle tracker with injected collaborators
#[derive(Clone)]
pub struct LifecycleTracker {
    store: Arc<dyn TicketStore>,
    publisher: Arc<dyn EventPublisher>,
    scheduler: Arc<dyn DeadlineScheduler>,
    acknowledger: Arc<dyn AcknowledgementGenerator>,
    clock: Arc<dyn Clock>,
    priorities: PriorityPolicy,
    lifecycles: LifecycleRegistry,
    config: TrackerConfig,
}

impl LifecycleTracker {
    /// Create a tracker with the built-in priority table and lifecycle classes
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use ticket_keeper_core::adapters::{
    ///     InMemoryTicketStore, RecordingEventPublisher, RecordingScheduler,
    /// };
    /// use ticket_keeper_core::acknowledgement::CannedAcknowledgement;
    /// use ticket_keeper_core::{LifecycleTracker, SystemClock};
    ///
    /// let tracker = LifecycleTracker::new(
    ///     Arc::new(InMemoryTicketStore::new()),
    ///     Arc::new(RecordingEventPublisher::new()),
    ///     Arc::new(RecordingScheduler::new()),
    ///     Arc::new(CannedAcknowledgement::default()),
    ///     Arc::new(SystemClock),
    /// );
    /// assert_eq!(tracker.lifecycles().default_class().name, "issue");
    /// ```
    pub fn new(
        store: Arc<dyn TicketStore>,
        publisher: Arc<dyn EventPublisher>,
        scheduler: Arc<dyn DeadlineScheduler>,
        acknowledger: Arc<dyn AcknowledgementGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publisher,
            scheduler,
            acknowledger,
            clock,
            priorities: PriorityPolicy::default(),
            lifecycles: LifecycleRegistry::default(),
            config: TrackerConfig::default(),
        }
    }

    pub fn with_priorities(mut self, priorities: PriorityPolicy) -> Self {
        self.priorities = priorities;
        self
    }

    pub fn with_lifecycles(mut self, lifecycles: LifecycleRegistry) -> Self {
        self.lifecycles = lifecycles;
        self
    }

    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn priorities(&self) -> &PriorityPolicy {
        &self.priorities
    }

    pub fn lifecycles(&self) -> &LifecycleRegistry {
        &self.lifecycles
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Store backing this tracker
    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Validate a submission and create the ticket
    ///
    /// # Errors
    ///
    /// - [`TrackerError::InvalidInput`] when validation fails; nothing is written
    /// - [`TrackerError::CreationFailed`] when the ticket cannot be persisted
    #[instrument(skip(self, raw), fields(lifecycle = raw.lifecycle.as_deref().unwrap_or("default")))]
    pub async fn create_ticket(&self, raw: NewTicket) -> Result<CreatedTicket, TrackerError> {
        let (policy, requester_id, description) = self.validate_submission(&raw)?;
        let priority = self.priorities.resolve_priority(raw.priority.as_deref());
        let now = self.clock.now();

        if let Err(e) = self.store.touch_requester(&requester_id, now).await {
            warn!(requester_id = %requester_id, error = %e, "Failed to upsert requester record");
        }

        let mut ticket = Ticket {
            id: TicketId::generate(&policy.id_prefix),
            lifecycle: policy.name.clone(),
            requester_id,
            description,
            priority,
            status: policy.initial_status().to_string(),
            sla: self.priorities.budgets_for(priority).deadlines_from(now),
            attributes: raw.attributes,
            created_at: now,
            updated_at: now,
        };

        let mut attempt = 1;
        loop {
            match self.store.create(&ticket).await {
                Ok(()) => break,
                Err(StorageError::AlreadyExists { id }) if attempt < MAX_ID_ATTEMPTS => {
                    debug!(ticket_id = %id, "Generated id collided, retrying");
                    ticket.id = TicketId::generate(&policy.id_prefix);
                    attempt += 1;
                }
                Err(source) => {
                    warn!(error = %source, "Primary ticket write failed");
                    return Err(TrackerError::CreationFailed { source });
                }
            }
        }

        info!(
            ticket_id = %ticket.id,
            priority = %ticket.priority,
            response_due_at = %ticket.sla.response_due_at,
            resolve_due_at = %ticket.sla.resolve_due_at,
            "Ticket created"
        );

        let event_published = self.publish(&LifecycleEvent::created(&ticket)).await;

        let schedule = if self.config.follow_ups_enabled {
            self.schedule_follow_ups(&ticket, policy, now).await
        } else {
            ScheduleReport::default()
        };

        let acknowledgement = self.acknowledge(&ticket, policy).await;

        Ok(CreatedTicket {
            ticket,
            schedule,
            event_published,
            acknowledgement,
        })
    }

    /// Move a ticket to `requested` unless the monotonic guard refuses
    ///
    /// Same-status requests are no-ops. Requests at or below the current rank,
    /// or after a terminal status, are ignored without a write. Both return
    /// success so that retried or reordered callbacks are harmless.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::NotFound`] for an unknown id
    /// - [`TrackerError::InvalidInput`] when `requested` is not a status of the ticket's class
    /// - [`TrackerError::DependencyFailure`] when the store fails or keeps losing races
    #[instrument(skip(self, id, source), fields(ticket_id = %id, source = %source))]
    pub async fn advance_status(
        &self,
        id: &TicketId,
        requested: &str,
        source: TransitionSource,
    ) -> Result<AdvanceOutcome, TrackerError> {
        let requested = requested.trim();
        let attempts = self.config.max_update_attempts.max(1);

        for attempt in 1..=attempts {
            let ticket = self.load(id).await?;
            let policy = self.policy_for(&ticket)?;

            match policy.decide(&ticket.status, requested)? {
                TransitionDecision::Unchanged => {
                    debug!(status = %ticket.status, "Status already current");
                    return Ok(AdvanceOutcome::Unchanged { ticket });
                }
                TransitionDecision::Ignore(reason) => {
                    info!(
                        current = %ticket.status,
                        requested = %requested,
                        reason = reason.as_str(),
                        "Transition ignored by monotonic guard"
                    );
                    return Ok(AdvanceOutcome::Ignored {
                        ticket,
                        requested: requested.to_string(),
                        reason,
                    });
                }
                TransitionDecision::Apply => {}
            }

            let patch = TicketPatch::status_change(&ticket.status, requested, self.clock.now());
            match self.store.update(id, &patch).await {
                Ok(updated) => {
                    info!(from = %ticket.status, to = %updated.status, "Status advanced");
                    let event = LifecycleEvent::transitioned(&updated, &ticket.status, source);
                    let event_published = self.publish(&event).await;
                    return Ok(AdvanceOutcome::Applied {
                        ticket: updated,
                        previous_status: ticket.status,
                        event_published,
                    });
                }
                Err(StorageError::PreconditionFailed { actual, .. }) => {
                    debug!(attempt, observed = %ticket.status, actual = %actual, "Concurrent update, re-deciding");
                }
                Err(StorageError::NotFound { id }) => return Err(TrackerError::NotFound { id }),
                Err(e) => return Err(TrackerError::storage(e)),
            }
        }

        Err(TrackerError::DependencyFailure {
            dependency: "storage",
            message: format!(
                "status of {} kept changing over {} attempts",
                id, attempts
            ),
        })
    }

    /// Stored ticket plus breach evaluation at the current time
    #[instrument(skip(self, id), fields(ticket_id = %id))]
    pub async fn get_ticket(&self, id: &TicketId) -> Result<TicketView, TrackerError> {
        let ticket = self.load(id).await?;
        let policy = self
            .lifecycles
            .get(&ticket.lifecycle)
            .unwrap_or_else(|| self.lifecycles.default_class());
        Ok(ticket.view(policy, self.clock.now()))
    }

    /// Re-submit follow-up steps the ticket has not reached yet
    ///
    /// Steps keep their original absolute times, clamped to now. Steps already
    /// pending are reported as skipped.
    #[instrument(skip(self, id), fields(ticket_id = %id))]
    pub async fn reschedule_follow_ups(&self, id: &TicketId) -> Result<ScheduleReport, TrackerError> {
        let ticket = self.load(id).await?;
        let policy = self.policy_for(&ticket)?;
        Ok(self.schedule_follow_ups(&ticket, policy, self.clock.now()).await)
    }

    fn validate_submission(
        &self,
        raw: &NewTicket,
    ) -> Result<(&LifecyclePolicy, RequesterId, String), ValidationError> {
        let requester_id = RequesterId::new(raw.requester_id.clone().unwrap_or_default())?;
        let policy = self.lifecycles.resolve(raw.lifecycle.as_deref())?;

        let description = raw.description.as_deref().unwrap_or_default().trim().to_string();
        let min = policy.min_description_chars;
        if min > 0 && description.is_empty() {
            return Err(ValidationError::Required {
                field: "description".to_string(),
            });
        }
        if description.chars().count() < min {
            return Err(ValidationError::TooShort {
                field: "description".to_string(),
                min_length: min,
            });
        }

        for key in &policy.required_attributes {
            let present = raw
                .attributes
                .get(key)
                .is_some_and(|value| !value.trim().is_empty());
            if !present {
                return Err(ValidationError::Required { field: key.clone() });
            }
        }

        Ok((policy, requester_id, description))
    }

    async fn load(&self, id: &TicketId) -> Result<Ticket, TrackerError> {
        self.store
            .get(id)
            .await
            .map_err(TrackerError::storage)?
            .ok_or_else(|| TrackerError::NotFound { id: id.clone() })
    }

    fn policy_for(&self, ticket: &Ticket) -> Result<&LifecyclePolicy, TrackerError> {
        self.lifecycles.get(&ticket.lifecycle).ok_or_else(|| {
            TrackerError::InvalidInput(ValidationError::UnknownValue {
                field: "lifecycle".to_string(),
                value: ticket.lifecycle.clone(),
            })
        })
    }

    async fn publish(&self, event: &LifecycleEvent) -> bool {
        let result = self
            .bounded(self.publisher.publish(event), |timeout_ms| PublishError::Timeout {
                timeout_ms,
            })
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    ticket_id = %event.entity_id,
                    new_status = %event.new_status,
                    error = %e,
                    "Failed to publish lifecycle event"
                );
                false
            }
        }
    }

    async fn schedule_follow_ups(
        &self,
        ticket: &Ticket,
        policy: &LifecyclePolicy,
        now: Timestamp,
    ) -> ScheduleReport {
        let mut report = ScheduleReport::default();
        let current = policy.stage(&ticket.status);
        let current_rank = current.map_or(0, |stage| stage.rank);
        let terminal = current.is_some_and(|stage| stage.terminal);

        for (index, step) in policy.follow_ups.iter().enumerate() {
            let mut task = ScheduledTransition::for_step(&ticket.id, index, step, ticket.created_at);
            let ahead = policy
                .stage(&step.status)
                .is_some_and(|stage| stage.rank > current_rank);

            if terminal || !ahead {
                report.skipped.push(task.task_name);
                continue;
            }

            if task.run_at < now {
                task.run_at = now;
            }

            let result = self
                .bounded(self.scheduler.schedule(&task), |timeout_ms| {
                    SchedulerError::Timeout { timeout_ms }
                })
                .await;

            match result {
                Ok(()) => report.scheduled.push(task.task_name),
                Err(SchedulerError::AlreadyScheduled { .. }) => report.skipped.push(task.task_name),
                Err(e) => {
                    warn!(task_name = %task.task_name, error = %e, "Failed to schedule follow-up");
                    report.failed.push(task.task_name);
                }
            }
        }

        report
    }

    async fn acknowledge(&self, ticket: &Ticket, policy: &LifecyclePolicy) -> Option<String> {
        let prompt = policy.acknowledgement_prompt.as_ref()?;
        if !self.config.acknowledgements_enabled {
            return Some(self.config.fallback_acknowledgement.clone());
        }

        let request = AcknowledgementRequest {
            prompt: prompt.clone(),
            description: ticket.description.clone(),
            priority: ticket.priority,
        };

        let result = self
            .bounded(self.acknowledger.acknowledge(&request), |timeout_ms| {
                AcknowledgementError::Timeout { timeout_ms }
            })
            .await;

        match result {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => Some(self.config.fallback_acknowledgement.clone()),
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "Acknowledgement generation failed");
                Some(self.config.fallback_acknowledgement.clone())
            }
        }
    }

    async fn bounded<F, T, E>(&self, call: F, on_timeout: impl FnOnce(u64) -> E) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let timeout = self.config.outbound_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(timeout.as_millis() as u64)),
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
