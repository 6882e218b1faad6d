//! # Recording Scheduler
//!
//! Accepts follow-up tasks into memory without executing them. Tests drive
//! the recorded transitions by hand, in whatever order they need.

use crate::scheduler::{DeadlineScheduler, ScheduledTransition, SchedulerError};
use crate::TicketId;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// In-memory scheduler that rejects duplicate task names
#[derive(Clone, Default)]
pub struct RecordingScheduler {
    tasks: Arc<Mutex<Vec<ScheduledTransition>>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted tasks in submission order
    pub fn tasks(&self) -> Vec<ScheduledTransition> {
        self.tasks
            .lock()
            .map(|tasks| tasks.clone())
            .unwrap_or_default()
    }

    /// Accepted tasks for one ticket
    pub fn tasks_for(&self, id: &TicketId) -> Vec<ScheduledTransition> {
        self.tasks()
            .into_iter()
            .filter(|task| &task.ticket_id == id)
            .collect()
    }

    /// Forget a task so it can be scheduled again
    pub fn remove(&self, task_name: &str) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|task| task.task_name != task_name);
        }
    }
}

#[async_trait]
impl DeadlineScheduler for RecordingScheduler {
    async fn schedule(&self, task: &ScheduledTransition) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.lock().map_err(|_| SchedulerError::Unavailable {
            message: "task list lock poisoned".to_string(),
        })?;

        if tasks.iter().any(|existing| existing.task_name == task.task_name) {
            return Err(SchedulerError::AlreadyScheduled {
                task_name: task.task_name.clone(),
            });
        }

        tasks.push(task.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "recording_scheduler_tests.rs"]
mod tests;
