//! Configuration types for the HTTP service
//!
//! Every field carries a serde default, so an empty configuration yields a
//! working in-memory service. [`ConfigLoader`] layers files, `TK__` prefixed
//! environment variables and the well-known platform variables on top.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use ticket_keeper_core::{LifecyclePolicy, LifecycleRegistry, PriorityPolicy, TrackerConfig};
use tracing::{debug, info};
use url::Url;

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_ENV: &str = "TK_CONFIG_FILE";

/// Prefix for structured environment overrides, e.g. `TK__SERVER__PORT`
pub const ENV_PREFIX: &str = "TK";

/// Platform variables and the configuration keys they override
pub const PLATFORM_VARIABLES: &[(&str, &str)] = &[
    ("GOOGLE_CLOUD_PROJECT", "platform.project_id"),
    ("GCP_LOCATION", "platform.location"),
    ("GEMINI_MODEL", "platform.model"),
    ("ISSUES_COL", "storage.tickets_collection"),
    ("USERS_COL", "storage.requesters_collection"),
    ("ISSUES_TOPIC", "events.topic"),
    ("TASK_QUEUE", "scheduler.queue"),
    ("ENABLE_ACKNOWLEDGEMENTS", "features.acknowledgements"),
];

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Cloud project, region and model settings
    pub platform: PlatformConfig,

    /// Feature switches
    pub features: FeatureConfig,

    /// Ticket document store
    pub storage: StorageConfig,

    /// Lifecycle event sink
    pub events: EventsConfig,

    /// Follow-up transition scheduler
    pub scheduler: SchedulerConfig,

    /// Tracker tuning
    pub tracker: TrackerSettings,

    /// Priority tier budgets
    pub sla: PriorityPolicy,

    /// Lifecycle classes
    pub lifecycles: LifecycleSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Externally reachable base URL of this service
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
            public_url: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `ticket_keeper_core=debug`
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Cloud platform settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Project hosting the topic and the model; empty disables platform adapters
    pub project_id: String,

    pub location: String,

    /// Model used for acknowledgement text
    pub model: String,

    /// OAuth2 bearer token for platform calls
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// Override for the Pub/Sub endpoint
    pub pubsub_endpoint: Option<String>,

    /// Override for the regional Vertex AI endpoint
    pub vertex_endpoint: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: "us-central1".to_string(),
            model: "gemini-2.5-flash".to_string(),
            access_token: None,
            pubsub_endpoint: None,
            vertex_endpoint: None,
        }
    }
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("model", &self.model)
            .field("access_token", &self.access_token.as_ref().map(|_| "<REDACTED>"))
            .field("pubsub_endpoint", &self.pubsub_endpoint)
            .field("vertex_endpoint", &self.vertex_endpoint)
            .finish()
    }
}

/// Feature switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Generate acknowledgement text for new tickets
    pub acknowledgements: bool,

    /// Schedule follow-up transitions at creation
    pub follow_ups: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            acknowledgements: true,
            follow_ups: true,
        }
    }
}

/// Document store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Filesystem,
}

/// Ticket store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Root directory for the filesystem backend
    pub data_dir: String,

    pub tickets_collection: String,
    pub requesters_collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: "./data".to_string(),
            tickets_collection: "issues".to_string(),
            requesters_collection: "users".to_string(),
        }
    }
}

/// Event sink backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventsBackend {
    /// Write events to the service log
    #[default]
    Log,
    /// Publish to a Pub/Sub topic
    Pubsub,
}

/// Event sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub backend: EventsBackend,
    pub topic: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            backend: EventsBackend::Log,
            topic: "issues-topic".to_string(),
        }
    }
}

/// Follow-up scheduler backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerBackend {
    /// Timers that call back into `/advance-status`
    #[default]
    Callback,
    /// Record tasks without delivering them
    Memory,
}

/// Follow-up scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub backend: SchedulerBackend,

    /// Queue name reported in logs
    pub queue: String,

    /// Target of due transitions; defaults to this service's `/advance-status`
    pub callback_url: Option<String>,

    /// Delivery attempts per due transition
    pub max_attempts: u32,

    /// Delay before the first redelivery, doubled on each retry
    pub initial_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backend: SchedulerBackend::Callback,
            queue: "issue-status-queue".to_string(),
            callback_url: None,
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

/// Tracker tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Bound on each publisher, scheduler and acknowledgement call
    pub outbound_timeout_seconds: u64,

    /// Read-decide-write attempts for a status advance
    pub max_update_attempts: u32,

    /// Reply used when acknowledgement generation fails or is disabled
    pub fallback_acknowledgement: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        let defaults = TrackerConfig::default();
        Self {
            outbound_timeout_seconds: defaults.outbound_timeout.as_secs(),
            max_update_attempts: defaults.max_update_attempts,
            fallback_acknowledgement: defaults.fallback_acknowledgement,
        }
    }
}

/// Lifecycle class configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    /// Class used when a submission names none
    pub default_class: String,

    pub classes: Vec<LifecyclePolicy>,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            default_class: "issue".to_string(),
            classes: vec![
                LifecyclePolicy::issue(),
                LifecyclePolicy::access_request(),
                LifecyclePolicy::supplier_onboarding(),
                LifecyclePolicy::supply_order(),
            ],
        }
    }
}

impl ServiceConfig {
    /// Check configuration consistency
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port must not be 0"));
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::invalid("server.max_body_size must be positive"));
        }

        self.bind_address()?;

        self.sla
            .validate()
            .map_err(|e| ConfigError::invalid(format!("sla: {}", e)))?;

        self.lifecycle_registry()?;

        if self.storage.backend == StorageBackend::Filesystem && self.storage.data_dir.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "storage.data_dir".to_string(),
            });
        }

        for (key, name) in [
            ("storage.tickets_collection", &self.storage.tickets_collection),
            ("storage.requesters_collection", &self.storage.requesters_collection),
        ] {
            if !is_plain_name(name) {
                return Err(ConfigError::invalid(format!(
                    "{} '{}' may only contain alphanumerics, '-' and '_'",
                    key, name
                )));
            }
        }

        if self.storage.tickets_collection == self.storage.requesters_collection {
            return Err(ConfigError::invalid(
                "storage.tickets_collection and storage.requesters_collection must differ",
            ));
        }

        if self.events.backend == EventsBackend::Pubsub {
            if self.platform.project_id.trim().is_empty() {
                return Err(ConfigError::Missing {
                    key: "platform.project_id".to_string(),
                });
            }
            if self.events.topic.trim().is_empty() {
                return Err(ConfigError::Missing {
                    key: "events.topic".to_string(),
                });
            }
        }

        for (key, endpoint) in [
            ("platform.pubsub_endpoint", &self.platform.pubsub_endpoint),
            ("platform.vertex_endpoint", &self.platform.vertex_endpoint),
        ] {
            if let Some(endpoint) = endpoint {
                Url::parse(endpoint)
                    .map_err(|e| ConfigError::invalid(format!("{} '{}': {}", key, endpoint, e)))?;
            }
        }

        if self.scheduler.backend == SchedulerBackend::Callback {
            self.callback_url()?;
            if self.scheduler.max_attempts == 0 {
                return Err(ConfigError::invalid("scheduler.max_attempts must be at least 1"));
            }
        }

        if self.tracker.outbound_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "tracker.outbound_timeout_seconds must be positive",
            ));
        }

        if self.tracker.max_update_attempts == 0 {
            return Err(ConfigError::invalid(
                "tracker.max_update_attempts must be at least 1",
            ));
        }

        Ok(())
    }

    /// Socket address the server binds to
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.server.host, self.server.port);
        address
            .parse()
            .map_err(|e| ConfigError::invalid(format!("server address '{}': {}", address, e)))
    }

    /// Validated lifecycle registry
    pub fn lifecycle_registry(&self) -> Result<LifecycleRegistry, ConfigError> {
        LifecycleRegistry::from_policies(
            self.lifecycles.classes.clone(),
            &self.lifecycles.default_class,
        )
        .map_err(|e| ConfigError::invalid(format!("lifecycles: {}", e)))
    }

    /// URL the callback scheduler posts due transitions to
    ///
    /// Falls back to `/advance-status` on `server.public_url`, then on the
    /// loopback address at the configured port.
    pub fn callback_url(&self) -> Result<Url, ConfigError> {
        let raw = match (&self.scheduler.callback_url, &self.server.public_url) {
            (Some(url), _) => url.clone(),
            (None, Some(base)) => format!("{}/advance-status", base.trim_end_matches('/')),
            (None, None) => format!("http://127.0.0.1:{}/advance-status", self.server.port),
        };

        Url::parse(&raw)
            .map_err(|e| ConfigError::invalid(format!("scheduler.callback_url '{}': {}", raw, e)))
    }

    /// Tracker tuning derived from the tracker and feature sections
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            outbound_timeout: Duration::from_secs(self.tracker.outbound_timeout_seconds),
            max_update_attempts: self.tracker.max_update_attempts,
            fallback_acknowledgement: self.tracker.fallback_acknowledgement.clone(),
            acknowledgements_enabled: self.features.acknowledgements,
            follow_ups_enabled: self.features.follow_ups,
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Layered configuration loader
///
/// Sources, later ones overriding earlier ones:
/// 1. configuration files in the order added
/// 2. `TK__` prefixed variables, `__` separating nested keys
/// 3. the variables listed in [`PLATFORM_VARIABLES`]
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    files: Vec<(String, bool)>,
    variables: HashMap<String, String>,
}

impl ConfigLoader {
    /// Loader with no files and no environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard sources read from the process environment
    pub fn from_environment() -> Self {
        Self::standard(std::env::vars().collect())
    }

    /// Standard sources with the given environment
    ///
    /// Adds `/etc/ticket-keeper/service.yaml` and `./config/service.yaml` as
    /// optional files, and the file named by `TK_CONFIG_FILE` as a required
    /// one.
    pub fn standard(variables: HashMap<String, String>) -> Self {
        let explicit = variables
            .get(CONFIG_FILE_ENV)
            .filter(|path| !path.trim().is_empty())
            .cloned();

        let mut loader = Self::new()
            .with_file("/etc/ticket-keeper/service", false)
            .with_file("config/service", false)
            .with_variables(variables);

        if let Some(path) = explicit {
            info!(path = %path, "Loading configuration from explicit path");
            loader = loader.with_file(&path, true);
        }

        loader
    }

    /// Add a YAML file source
    pub fn with_file(mut self, path: &str, required: bool) -> Self {
        self.files.push((path.to_string(), required));
        self
    }

    /// Replace the environment used for overrides
    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Build, deserialize and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if a required file is missing, a value cannot be coerced
    /// to its field type, or validation fails.
    pub fn load(&self) -> Result<ServiceConfig, ConfigError> {
        let mut builder = config::Config::builder();

        for (path, required) in &self.files {
            builder = builder.add_source(
                config::File::with_name(path)
                    .required(*required)
                    .format(config::FileFormat::Yaml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .source(Some(self.variables.clone())),
        );

        for (variable, key) in PLATFORM_VARIABLES {
            let value = self
                .variables
                .get(*variable)
                .filter(|value| !value.trim().is_empty())
                .cloned();
            if value.is_some() {
                debug!(variable = %variable, key = %key, "Applying platform variable");
            }
            builder = builder.set_override_option(*key, value)?;
        }

        let config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
