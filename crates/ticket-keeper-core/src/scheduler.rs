//! # Deadline Scheduler Interface
//!
//! Delayed execution of follow-up transitions. Each step is submitted as an
//! independent task with a deterministic name, so schedulers can refuse
//! duplicates and a ticket never carries two pending copies of a step.

use crate::lifecycle::FollowUpStep;
use crate::{TicketId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One follow-up transition to execute later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTransition {
    /// `{ticket_id}-{step}-{status}`, unique per ticket and step
    pub task_name: String,
    pub ticket_id: TicketId,
    pub target_status: String,
    pub run_at: Timestamp,
}

impl ScheduledTransition {
    /// Build the task for step `index` of a ticket created at `created_at`
    pub fn for_step(
        ticket_id: &TicketId,
        index: usize,
        step: &FollowUpStep,
        created_at: Timestamp,
    ) -> Self {
        Self {
            task_name: format!("{}-{}-{}", ticket_id, index, step.status),
            ticket_id: ticket_id.clone(),
            target_status: step.status.clone(),
            run_at: created_at.add_minutes(step.delay_minutes),
        }
    }
}

/// Outcome of submitting a set of follow-up steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleReport {
    /// Task names accepted by the scheduler
    pub scheduled: Vec<String>,

    /// Task names already pending, or steps the ticket has already passed
    pub skipped: Vec<String>,

    /// Task names the scheduler failed to accept
    pub failed: Vec<String>,
}

impl ScheduleReport {
    /// True when no step failed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of steps considered
    pub fn total(&self) -> usize {
        self.scheduled.len() + self.skipped.len() + self.failed.len()
    }
}

/// Delayed task scheduler
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeadlineScheduler: Send + Sync {
    /// Schedule one transition
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyScheduled`] when a task with the same
    /// name was accepted before.
    async fn schedule(&self, task: &ScheduledTransition) -> Result<(), SchedulerError>;
}

/// Errors raised by schedulers
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Task already scheduled: {task_name}")]
    AlreadyScheduled { task_name: String },

    #[error("Scheduler unavailable: {message}")]
    Unavailable { message: String },

    #[error("Scheduling timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl SchedulerError {
    /// Check if error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::AlreadyScheduled { .. })
    }
}
