//! Tests for [`ServiceConfig`] and [`ConfigLoader`].

use super::*;
use std::io::Write;
use tempfile::NamedTempFile;
use ticket_keeper_core::{Priority, StatusStage};

fn yaml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Defaults and validation
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.tickets_collection, "issues");
        assert_eq!(config.lifecycle_registry().unwrap().names().count(), 4);
    }

    #[test]
    fn test_port_zero_is_rejected() {
        let mut config = ServiceConfig::default();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_broken_sla_table_is_rejected() {
        let mut config = ServiceConfig::default();
        config.sla.tiers.remove(&Priority::P3);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sla"), "unexpected error: {err}");
    }

    #[test]
    fn test_duplicate_lifecycle_is_rejected() {
        let mut config = ServiceConfig::default();
        config.lifecycles.classes.push(LifecyclePolicy::issue());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"), "unexpected error: {err}");
    }

    #[test]
    fn test_unknown_default_lifecycle_is_rejected() {
        let mut config = ServiceConfig::default();
        config.lifecycles.default_class = "helpdesk".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pubsub_requires_project() {
        let mut config = ServiceConfig::default();
        config.events.backend = EventsBackend::Pubsub;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref key } if key == "platform.project_id"));

        config.platform.project_id = "demo".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unparseable_callback_url_is_rejected() {
        let mut config = ServiceConfig::default();
        config.scheduler.callback_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        config.scheduler.backend = SchedulerBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_collection_names_must_be_plain() {
        let mut config = ServiceConfig::default();
        config.storage.tickets_collection = "../etc".to_string();
        assert!(config.validate().is_err());

        config.storage.tickets_collection = "users".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = ServiceConfig::default();
        config.tracker.outbound_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }
}

// ============================================================================
// Derived values
// ============================================================================

mod derived_tests {
    use super::*;

    #[test]
    fn test_callback_url_defaults_to_loopback() {
        let mut config = ServiceConfig::default();
        config.server.port = 9191;
        assert_eq!(
            config.callback_url().unwrap().as_str(),
            "http://127.0.0.1:9191/advance-status"
        );
    }

    #[test]
    fn test_callback_url_uses_public_url() {
        let mut config = ServiceConfig::default();
        config.server.public_url = Some("https://tickets.example.com/".to_string());
        assert_eq!(
            config.callback_url().unwrap().as_str(),
            "https://tickets.example.com/advance-status"
        );
    }

    #[test]
    fn test_explicit_callback_url_wins() {
        let mut config = ServiceConfig::default();
        config.server.public_url = Some("https://tickets.example.com".to_string());
        config.scheduler.callback_url = Some("https://hooks.example.com/due".to_string());
        assert_eq!(
            config.callback_url().unwrap().as_str(),
            "https://hooks.example.com/due"
        );
    }

    #[test]
    fn test_tracker_config_follows_feature_switches() {
        let mut config = ServiceConfig::default();
        config.features.acknowledgements = false;
        config.tracker.outbound_timeout_seconds = 4;

        let tracker = config.tracker_config();
        assert!(!tracker.acknowledgements_enabled);
        assert!(tracker.follow_ups_enabled);
        assert_eq!(tracker.outbound_timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_debug_redacts_access_token() {
        let mut config = ServiceConfig::default();
        config.platform.access_token = Some("ya29.secret-token".to_string());

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("ya29.secret-token"), "debug output leaks token: {debug_str}");
        assert!(debug_str.contains("REDACTED"));
    }

    #[test]
    fn test_serialized_config_omits_access_token() {
        let mut config = ServiceConfig::default();
        config.platform.access_token = Some("ya29.secret-token".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("ya29.secret-token"));
        assert!(!json.contains("access_token"));
    }
}

// ============================================================================
// Layered loading
// ============================================================================

mod loader_tests {
    use super::*;

    #[test]
    fn test_empty_sources_give_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.events.backend, EventsBackend::Log);
    }

    #[test]
    fn test_file_values_are_applied() {
        let file = yaml_file(
            r#"
server:
  port: 9000
storage:
  backend: filesystem
  data_dir: /var/lib/ticket-keeper
sla:
  default_tier: P2
"#,
        );

        let config = ConfigLoader::new()
            .with_file(file.path().to_str().unwrap(), true)
            .load()
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
        assert_eq!(config.storage.data_dir, "/var/lib/ticket-keeper");
        assert_eq!(config.sla.default_tier, Priority::P2);
        // Untouched sections keep their defaults
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_custom_lifecycle_from_file() {
        let file = yaml_file(
            r#"
lifecycles:
  default_class: helpdesk
  classes:
    - name: helpdesk
      id_prefix: HD
      stages:
        - { name: open, rank: 0 }
        - { name: closed, rank: 1, terminal: true }
      follow_ups:
        - { delay_minutes: 30, status: closed }
"#,
        );

        let config = ConfigLoader::new()
            .with_file(file.path().to_str().unwrap(), true)
            .load()
            .unwrap();

        let registry = config.lifecycle_registry().unwrap();
        let helpdesk = registry.default_class();
        assert_eq!(helpdesk.name, "helpdesk");
        assert_eq!(helpdesk.stages[1], StatusStage::terminal("closed", 1));
        assert_eq!(helpdesk.follow_ups.len(), 1);
    }

    #[test]
    fn test_missing_required_file_fails() {
        let result = ConfigLoader::new()
            .with_file("/nonexistent/ticket-keeper/service.yaml", true)
            .load();
        assert!(matches!(result, Err(ConfigError::Loading(_))));
    }

    #[test]
    fn test_missing_optional_file_is_ignored() {
        let result = ConfigLoader::new()
            .with_file("/nonexistent/ticket-keeper/service", false)
            .load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_prefixed_variables_override_file() {
        let file = yaml_file("server:\n  port: 9000\n");

        let config = ConfigLoader::new()
            .with_file(file.path().to_str().unwrap(), true)
            .with_variables(vars(&[
                ("TK__SERVER__PORT", "9191"),
                ("TK__LOGGING__JSON_FORMAT", "true"),
            ]))
            .load()
            .unwrap();

        assert_eq!(config.server.port, 9191);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_platform_variables_are_mapped() {
        let config = ConfigLoader::new()
            .with_variables(vars(&[
                ("GOOGLE_CLOUD_PROJECT", "support-prod"),
                ("GCP_LOCATION", "europe-west1"),
                ("GEMINI_MODEL", "gemini-2.0-flash"),
                ("ISSUES_COL", "incidents"),
                ("USERS_COL", "reporters"),
                ("ISSUES_TOPIC", "incident-events"),
                ("TASK_QUEUE", "incident-queue"),
                ("ENABLE_ACKNOWLEDGEMENTS", "false"),
            ]))
            .load()
            .unwrap();

        assert_eq!(config.platform.project_id, "support-prod");
        assert_eq!(config.platform.location, "europe-west1");
        assert_eq!(config.platform.model, "gemini-2.0-flash");
        assert_eq!(config.storage.tickets_collection, "incidents");
        assert_eq!(config.storage.requesters_collection, "reporters");
        assert_eq!(config.events.topic, "incident-events");
        assert_eq!(config.scheduler.queue, "incident-queue");
        assert!(!config.features.acknowledgements);
    }

    #[test]
    fn test_platform_variables_win_over_prefixed_variables() {
        let config = ConfigLoader::new()
            .with_variables(vars(&[
                ("TK__PLATFORM__PROJECT_ID", "from-prefixed"),
                ("GOOGLE_CLOUD_PROJECT", "from-platform"),
            ]))
            .load()
            .unwrap();

        assert_eq!(config.platform.project_id, "from-platform");
    }

    #[test]
    fn test_blank_platform_variable_is_ignored() {
        let config = ConfigLoader::new()
            .with_variables(vars(&[("ISSUES_COL", "  ")]))
            .load()
            .unwrap();

        assert_eq!(config.storage.tickets_collection, "issues");
    }

    #[test]
    fn test_explicit_config_file_variable() {
        let file = yaml_file("server:\n  port: 7070\n");

        let config = ConfigLoader::standard(vars(&[(
            CONFIG_FILE_ENV,
            file.path().to_str().unwrap(),
        )]))
        .load()
        .unwrap();

        assert_eq!(config.server.port, 7070);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let result = ConfigLoader::new()
            .with_variables(vars(&[("TK__SERVER__PORT", "0")]))
            .load();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_uncoercible_value_is_an_error() {
        let result = ConfigLoader::new()
            .with_variables(vars(&[("TK__SERVER__PORT", "eighty")]))
            .load();
        assert!(matches!(result, Err(ConfigError::Loading(_))));
    }
}
