//! # Pub/Sub Event Publisher
//!
//! Publishes lifecycle events to a Google Cloud Pub/Sub topic through the
//! REST `topics.publish` endpoint. The event is serialized as JSON and
//! base64-encoded into the message `data`; ticket id, status and source are
//! copied into message attributes for subscription filtering.

use crate::events::{EventPublisher, LifecycleEvent, PublishError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default Pub/Sub REST endpoint
pub const PUBSUB_BASE_URL: &str = "https://pubsub.googleapis.com/";

/// Connection settings for [`PubSubEventPublisher`]
#[derive(Clone)]
pub struct PubSubConfig {
    pub base_url: Url,
    pub project_id: String,
    pub topic: String,

    /// OAuth2 bearer token; omitted when `None` (emulators)
    pub access_token: Option<String>,

    pub timeout: Duration,
}

impl fmt::Debug for PubSubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSubConfig")
            .field("base_url", &self.base_url.as_str())
            .field("project_id", &self.project_id)
            .field("topic", &self.topic)
            .field("access_token", &self.access_token.as_ref().map(|_| "<REDACTED>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct PublishRequest {
    messages: Vec<PubSubMessage>,
}

#[derive(Serialize)]
struct PubSubMessage {
    data: String,
    attributes: HashMap<String, String>,
}

/// Pub/Sub REST publisher
#[derive(Clone)]
pub struct PubSubEventPublisher {
    http_client: reqwest::Client,
    publish_url: Url,
    access_token: Option<String>,
    timeout: Duration,
}

impl PubSubEventPublisher {
    /// Create publisher for the configured topic
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL cannot be built or the HTTP client
    /// cannot be created.
    pub fn new(config: PubSubConfig) -> Result<Self, PublishError> {
        let path = format!(
            "v1/projects/{}/topics/{}:publish",
            config.project_id, config.topic
        );
        let publish_url = config
            .base_url
            .join(&path)
            .map_err(|e| PublishError::Unavailable {
                message: format!("Invalid Pub/Sub endpoint: {}", e),
            })?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PublishError::Unavailable {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            publish_url,
            access_token: config.access_token,
            timeout: config.timeout,
        })
    }

    /// Fully resolved publish endpoint
    pub fn publish_url(&self) -> &Url {
        &self.publish_url
    }

    fn encode(event: &LifecycleEvent) -> Result<PublishRequest, PublishError> {
        let body = serde_json::to_vec(event).map_err(|e| PublishError::SerializationFailed {
            message: e.to_string(),
        })?;

        let attributes = HashMap::from([
            ("ticket_id".to_string(), event.entity_id.to_string()),
            ("lifecycle".to_string(), event.lifecycle.clone()),
            ("new_status".to_string(), event.new_status.clone()),
            ("source".to_string(), event.source.to_string()),
        ]);

        Ok(PublishRequest {
            messages: vec![PubSubMessage {
                data: STANDARD.encode(body),
                attributes,
            }],
        })
    }
}

#[async_trait]
impl EventPublisher for PubSubEventPublisher {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError> {
        let request = Self::encode(event)?;

        let mut builder = self.http_client.post(self.publish_url.clone()).json(&request);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PublishError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                PublishError::Unavailable {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!(event_id = %event.event_id, ticket_id = %event.entity_id, "Event published to Pub/Sub");
        Ok(())
    }
}

#[cfg(test)]
#[path = "pubsub_publisher_tests.rs"]
mod tests;
