//! Metrics collection for the API service.
//!
//! Metrics live on a per-instance [`Registry`] so that several routers can
//! coexist in one process, e.g. in tests.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;
use ticket_keeper_core::{AdvanceOutcome, CreatedTicket, TrackerError};

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,

    // Lifecycle metrics
    pub submissions_total: IntCounterVec,
    pub transitions_total: IntCounterVec,
    pub side_effect_failures_total: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["method", "path"],
        )?;
        let submissions_total = IntCounterVec::new(
            Opts::new("ticket_submissions_total", "Ticket submissions by outcome"),
            &["lifecycle", "outcome"],
        )?;
        let transitions_total = IntCounterVec::new(
            Opts::new("ticket_transitions_total", "Status advance requests by outcome"),
            &["source", "outcome"],
        )?;
        let side_effect_failures_total = IntCounterVec::new(
            Opts::new(
                "ticket_side_effect_failures_total",
                "Best-effort side effects that failed after the primary write",
            ),
            &["dependency"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(transitions_total.clone()))?;
        registry.register(Box::new(side_effect_failures_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration,
            submissions_total,
            transitions_total,
            side_effect_failures_total,
        }))
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: Duration) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, path])
            .observe(duration.as_secs_f64());
    }

    /// Count a submission and any side effects it could not complete
    pub fn record_submission(&self, result: &Result<CreatedTicket, TrackerError>) {
        match result {
            Ok(created) => {
                self.submissions_total
                    .with_label_values(&[created.ticket.lifecycle.as_str(), "created"])
                    .inc();
                if !created.event_published {
                    self.record_side_effect_failure("events");
                }
                for _ in &created.schedule.failed {
                    self.record_side_effect_failure("scheduler");
                }
            }
            Err(error) => {
                self.submissions_total
                    .with_label_values(&["unknown", error.label()])
                    .inc();
            }
        }
    }

    pub fn record_transition(&self, source: &str, result: &Result<AdvanceOutcome, TrackerError>) {
        let outcome = match result {
            Ok(outcome) => {
                if let AdvanceOutcome::Applied {
                    event_published: false,
                    ..
                } = outcome
                {
                    self.record_side_effect_failure("events");
                }
                outcome.label()
            }
            Err(error) => error.label(),
        };

        self.transitions_total
            .with_label_values(&[source, outcome])
            .inc();
    }

    pub fn record_side_effect_failure(&self, dependency: &str) {
        self.side_effect_failures_total
            .with_label_values(&[dependency])
            .inc();
    }

    /// Prometheus text exposition of every metric in this instance
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
