//! # Callback Scheduler
//!
//! In-process stand-in for a hosted task queue. Each accepted task becomes a
//! tokio timer that, once due, POSTs `{id, status, source: "scheduler"}` to
//! the service's `/advance-status` endpoint.
//!
//! Delivery is at-least-once within a process lifetime and not durable:
//! pending timers are lost on restart. Task names are remembered only while
//! a task is pending or being delivered, so the same step is never pending
//! twice and a lost step can be resubmitted by `reschedule_follow_ups`.
//!
//! The endpoint answers `200 OK` even when a transition fails, so a reply of
//! `{"ok": false}` counts as a failed attempt.

use crate::scheduler::{DeadlineScheduler, ScheduledTransition, SchedulerError};
use crate::Timestamp;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Settings for [`CallbackScheduler`]
#[derive(Debug, Clone)]
pub struct CallbackSchedulerConfig {
    /// Full URL of the advance-status endpoint
    pub callback_url: Url,

    /// Per-request timeout
    pub timeout: Duration,

    /// Delivery attempts per task
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles each time
    pub initial_backoff: Duration,
}

impl CallbackSchedulerConfig {
    pub fn new(callback_url: Url) -> Self {
        Self {
            callback_url,
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Timer-driven scheduler delivering follow-ups over HTTP
#[derive(Clone)]
pub struct CallbackScheduler {
    http_client: reqwest::Client,
    config: Arc<CallbackSchedulerConfig>,
    accepted: Arc<Mutex<HashSet<String>>>,
}

impl CallbackScheduler {
    /// Create scheduler; tasks are spawned on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: CallbackSchedulerConfig) -> Result<Self, SchedulerError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SchedulerError::Unavailable {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            config: Arc::new(config),
            accepted: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Number of task names currently remembered
    pub fn accepted_count(&self) -> usize {
        self.accepted.lock().map(|names| names.len()).unwrap_or(0)
    }

    async fn deliver(
        http_client: reqwest::Client,
        config: Arc<CallbackSchedulerConfig>,
        accepted: Arc<Mutex<HashSet<String>>>,
        task: ScheduledTransition,
    ) {
        let delay = task.run_at.duration_since(Timestamp::now());
        tokio::time::sleep(delay).await;

        let body = json!({
            "id": task.ticket_id.as_str(),
            "status": task.target_status,
            "source": "scheduler",
        });

        let mut backoff = config.initial_backoff;
        let attempts = config.max_attempts.max(1);
        for attempt in 1..=attempts {
            match Self::post_once(&http_client, &config.callback_url, &body).await {
                Ok(()) => {
                    info!(task_name = %task.task_name, attempt, "Follow-up delivered");
                    break;
                }
                Err(message) => {
                    warn!(task_name = %task.task_name, attempt, error = %message, "Follow-up delivery failed");
                    if attempt == attempts {
                        warn!(task_name = %task.task_name, "Follow-up abandoned after {} attempts", attempts);
                    } else {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        if let Ok(mut names) = accepted.lock() {
            names.remove(&task.task_name);
        }
    }

    async fn post_once(
        http_client: &reqwest::Client,
        callback_url: &Url,
        body: &Value,
    ) -> Result<(), String> {
        let response = http_client
            .post(callback_url.clone())
            .json(body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| e.to_string())?;

        // Bodies that are not JSON objects carry no outcome
        match response.json::<Value>().await {
            Ok(reply) if reply.get("ok") == Some(&Value::Bool(false)) => Err(format!(
                "transition rejected: {}",
                reply
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("no error given")
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DeadlineScheduler for CallbackScheduler {
    async fn schedule(&self, task: &ScheduledTransition) -> Result<(), SchedulerError> {
        {
            let mut names = self.accepted.lock().map_err(|_| SchedulerError::Unavailable {
                message: "task registry lock poisoned".to_string(),
            })?;
            if !names.insert(task.task_name.clone()) {
                return Err(SchedulerError::AlreadyScheduled {
                    task_name: task.task_name.clone(),
                });
            }
        }

        debug!(task_name = %task.task_name, run_at = %task.run_at, "Follow-up accepted");

        tokio::spawn(Self::deliver(
            self.http_client.clone(),
            Arc::clone(&self.config),
            Arc::clone(&self.accepted),
            task.clone(),
        ));

        Ok(())
    }
}

#[cfg(test)]
#[path = "callback_scheduler_tests.rs"]
mod tests;
