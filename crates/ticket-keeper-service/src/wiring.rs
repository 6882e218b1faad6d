//! Construction of the lifecycle tracker from service configuration.
//!
//! Each collaborator is picked from its configuration section; platform
//! adapters are only built when the platform project is configured.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use ticket_keeper_api::{
    ConfigError, EventsBackend, SchedulerBackend, ServiceConfig, ServiceError, StorageBackend,
};
use ticket_keeper_core::acknowledgement::CannedAcknowledgement;
use ticket_keeper_core::adapters::{
    CallbackScheduler, CallbackSchedulerConfig, FilesystemTicketStore, GeminiAcknowledgement,
    GeminiConfig, InMemoryTicketStore, PubSubConfig, PubSubEventPublisher, RecordingScheduler,
    TracingEventPublisher, PUBSUB_BASE_URL,
};
use ticket_keeper_core::{
    AcknowledgementGenerator, DeadlineScheduler, EventPublisher, LifecycleTracker, SystemClock,
    TicketStore,
};
use tracing::{info, warn};
use url::Url;

fn invalid(message: impl Into<String>) -> ServiceError {
    ServiceError::Configuration(ConfigError::Invalid {
        message: message.into(),
    })
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ServiceError> {
    Url::parse(raw).map_err(|e| invalid(format!("{} '{}': {}", key, raw, e)))
}

fn outbound_timeout(config: &ServiceConfig) -> Duration {
    Duration::from_secs(config.tracker.outbound_timeout_seconds)
}

/// Build the tracker with every collaborator the configuration selects
pub async fn build_tracker(config: &ServiceConfig) -> Result<LifecycleTracker, ServiceError> {
    let lifecycles = config.lifecycle_registry()?;

    let store = build_store(config).await?;
    let publisher = build_publisher(config)?;
    let scheduler = build_scheduler(config)?;
    let acknowledger = build_acknowledger(config)?;

    Ok(
        LifecycleTracker::new(store, publisher, scheduler, acknowledger, Arc::new(SystemClock))
            .with_priorities(config.sla.clone())
            .with_lifecycles(lifecycles)
            .with_config(config.tracker_config()),
    )
}

pub async fn build_store(config: &ServiceConfig) -> Result<Arc<dyn TicketStore>, ServiceError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory ticket store; tickets are lost on restart");
            Ok(Arc::new(InMemoryTicketStore::new()))
        }
        StorageBackend::Filesystem => {
            let store = FilesystemTicketStore::with_collections(
                PathBuf::from(&config.storage.data_dir),
                &config.storage.tickets_collection,
                &config.storage.requesters_collection,
            )
            .await
            .map_err(|e| invalid(format!("storage: {}", e)))?;

            info!(
                data_dir = %config.storage.data_dir,
                tickets = %config.storage.tickets_collection,
                requesters = %config.storage.requesters_collection,
                "Using filesystem ticket store"
            );
            Ok(Arc::new(store))
        }
    }
}

pub fn build_publisher(config: &ServiceConfig) -> Result<Arc<dyn EventPublisher>, ServiceError> {
    match config.events.backend {
        EventsBackend::Log => {
            info!("Lifecycle events are written to the log");
            Ok(Arc::new(TracingEventPublisher))
        }
        EventsBackend::Pubsub => {
            let raw = config
                .platform
                .pubsub_endpoint
                .as_deref()
                .unwrap_or(PUBSUB_BASE_URL);
            let publisher = PubSubEventPublisher::new(PubSubConfig {
                base_url: parse_url("platform.pubsub_endpoint", raw)?,
                project_id: config.platform.project_id.clone(),
                topic: config.events.topic.clone(),
                access_token: config.platform.access_token.clone(),
                timeout: outbound_timeout(config),
            })
            .map_err(|e| invalid(format!("events: {}", e)))?;

            info!(
                topic = %config.events.topic,
                url = %publisher.publish_url(),
                "Publishing lifecycle events to Pub/Sub"
            );
            Ok(Arc::new(publisher))
        }
    }
}

pub fn build_scheduler(config: &ServiceConfig) -> Result<Arc<dyn DeadlineScheduler>, ServiceError> {
    if !config.features.follow_ups {
        info!("Follow-up scheduling disabled");
    }

    match config.scheduler.backend {
        SchedulerBackend::Memory => {
            warn!("Follow-ups are recorded but never delivered");
            Ok(Arc::new(RecordingScheduler::new()))
        }
        SchedulerBackend::Callback => {
            let callback_url = config.callback_url()?;
            let scheduler = CallbackScheduler::new(CallbackSchedulerConfig {
                callback_url: callback_url.clone(),
                timeout: outbound_timeout(config),
                max_attempts: config.scheduler.max_attempts,
                initial_backoff: Duration::from_millis(config.scheduler.initial_backoff_ms),
            })
            .map_err(|e| invalid(format!("scheduler: {}", e)))?;

            info!(
                queue = %config.scheduler.queue,
                callback_url = %callback_url,
                "Follow-ups delivered by in-process timers"
            );
            Ok(Arc::new(scheduler))
        }
    }
}

/// Generator for acknowledgement text
///
/// The hosted model is used only when acknowledgements are enabled and a
/// platform project is configured; otherwise every submission receives the
/// configured fallback reply.
pub fn build_acknowledger(
    config: &ServiceConfig,
) -> Result<Arc<dyn AcknowledgementGenerator>, ServiceError> {
    let canned = || -> Arc<dyn AcknowledgementGenerator> {
        Arc::new(CannedAcknowledgement::new(
            config.tracker.fallback_acknowledgement.clone(),
        ))
    };

    if !config.features.acknowledgements {
        info!("Acknowledgement generation disabled");
        return Ok(canned());
    }

    if config.platform.project_id.trim().is_empty() {
        warn!("No platform project configured; using the fallback acknowledgement");
        return Ok(canned());
    }

    let base_url = match &config.platform.vertex_endpoint {
        Some(raw) => parse_url("platform.vertex_endpoint", raw)?,
        None => GeminiConfig::regional_endpoint(&config.platform.location)
            .map_err(|e| invalid(format!("platform.location: {}", e)))?,
    };

    let generator = GeminiAcknowledgement::new(GeminiConfig {
        base_url,
        project_id: config.platform.project_id.clone(),
        location: config.platform.location.clone(),
        model: config.platform.model.clone(),
        access_token: config.platform.access_token.clone(),
        timeout: outbound_timeout(config),
    })
    .map_err(|e| invalid(format!("acknowledgements: {}", e)))?;

    info!(
        model = %config.platform.model,
        endpoint = %generator.endpoint(),
        "Acknowledgements generated by hosted model"
    );
    Ok(Arc::new(generator))
}

#[cfg(test)]
#[path = "wiring_tests.rs"]
mod tests;
