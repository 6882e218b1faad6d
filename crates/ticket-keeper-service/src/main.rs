//! # Ticket-Keeper Service
//!
//! Binary entry point for the Ticket-Keeper HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Builds the lifecycle tracker and its collaborators
//! - Starts the HTTP server from ticket-keeper-api

mod wiring;

use std::sync::Arc;
use ticket_keeper_api::{start_server, ConfigLoader, ServiceConfig, ServiceError};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources, later ones overriding earlier ones:
    //  1. /etc/ticket-keeper/service.yaml
    //  2. ./config/service.yaml
    //  3. file named by TK_CONFIG_FILE (required when set)
    //  4. TK__ prefixed variables, e.g. TK__SERVER__PORT=9090
    //  5. platform variables (GOOGLE_CLOUD_PROJECT, ISSUES_COL, ...)
    //
    // Logging is configured from the result, so a failure here is reported
    // on stderr before any subscriber exists.
    // -------------------------------------------------------------------------
    let config = match ConfigLoader::from_environment().load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ticket-keeper-service: invalid configuration: {}", e);
            std::process::exit(3);
        }
    };

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = ?config.storage.backend,
        events = ?config.events.backend,
        scheduler = ?config.scheduler.backend,
        "Starting Ticket-Keeper Service"
    );

    let tracker = match wiring::build_tracker(&config).await {
        Ok(tracker) => Arc::new(tracker),
        Err(e) => {
            error!(error = %e, "Failed to build lifecycle tracker; aborting");
            std::process::exit(exit_code(&e));
        }
    };

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(config, tracker).await {
        error!("Failed to start server: {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn init_logging(config: &ServiceConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "ticket_keeper_service={level},ticket_keeper_api={level},ticket_keeper_core={level},tower_http=debug",
            level = config.logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn exit_code(error: &ServiceError) -> i32 {
    match error {
        ServiceError::BindFailed { .. } => 1,
        ServiceError::ServerFailed { .. } => 2,
        ServiceError::Configuration(_) => 3,
        ServiceError::HealthCheckFailed { .. } => 4,
    }
}
