//! # Ticket-Keeper CLI
//!
//! Command-line interface for operating a Ticket-Keeper service.
//!
//! This module provides CLI commands for:
//! - Raising tickets and looking up their status and SLA
//! - Manual status transitions and follow-up re-submission
//! - Configuration validation
//! - Shell completions

pub mod client;
pub mod output;

pub use client::TicketKeeperClient;

use clap::{CommandFactory, Parser, Subcommand};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use ticket_keeper_api::{ConfigLoader, ServiceConfig, StatusResponse};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Structure
// ============================================================================

/// Ticket-Keeper CLI - SLA tracking for tickets and requests
#[derive(Parser)]
#[command(name = "ticket-keeper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operate a Ticket-Keeper lifecycle tracking service")]
pub struct Cli {
    /// Base URL of the Ticket-Keeper service
    #[arg(short, long, env = "TICKET_KEEPER_SERVER", default_value = "http://127.0.0.1:8080")]
    pub server: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Raise a ticket
    Submit {
        /// Requester identifier
        #[arg(short, long)]
        requester: String,

        /// Free-text description or justification
        #[arg(short, long)]
        description: String,

        /// Priority tier (P1-P4)
        #[arg(short, long)]
        priority: Option<String>,

        /// Lifecycle class, e.g. issue or access_request
        #[arg(short = 'c', long)]
        lifecycle: Option<String>,

        /// Class-specific attribute as key=value; repeatable
        #[arg(short, long = "attr", value_parser = parse_key_value)]
        attributes: Vec<(String, String)>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a ticket with its SLA evaluated now
    Status {
        /// Ticket identifier
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Move a ticket to another status
    Advance {
        /// Ticket identifier
        id: String,

        /// Requested status
        status: String,

        /// Origin recorded on the transition
        #[arg(short, long, default_value = "operator")]
        source: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Re-submit follow-up transitions still ahead of a ticket
    FollowUps {
        /// Ticket identifier
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Service configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load and validate the service configuration
    Validate {
        /// Additional configuration file, applied after the standard ones
        #[arg(short = 'F', long)]
        file: Option<PathBuf>,
    },

    /// Print the resolved service configuration
    Show {
        /// Additional configuration file, applied after the standard ones
        #[arg(short = 'F', long)]
        file: Option<PathBuf>,

        /// Output format for configuration
        #[arg(short, long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Output format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// Configuration format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
    /// TOML format
    Toml,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", raw));
    }

    Ok((key.to_string(), value.trim().to_string()))
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ticket_keeper_api::ConfigError),

    #[error("Request failed: {message}")]
    Http { message: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {message}")]
    Output { message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Http { .. } => 2,
            Self::CommandFailed { .. } => 3,
            Self::InvalidArgument { .. } => 4,
            Self::Io(_) => 5,
            Self::Output { .. } => 6,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Parse arguments, initialize logging and run the command
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli.log_level, cli.json_logs)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out).await
}

/// Initialize logging on stderr, keeping stdout for command output
pub fn initialize_logging(log_level: &str, json: bool) -> Result<(), CliError> {
    let filter = EnvFilter::try_new(log_level).map_err(|e| CliError::InvalidArgument {
        arg: "--log-level".to_string(),
        message: e.to_string(),
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("Failed to initialize logging: {}", e),
    })
}

/// Execute a parsed command, writing results to `out`
pub async fn run(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { action } => execute_config_command(action, out),
        Commands::Completions { shell } => execute_completions_command(shell, out),
        command => {
            let client = TicketKeeperClient::new(&cli.server, Duration::from_secs(cli.timeout))?;
            execute_service_command(&client, command, out).await
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Submission body for `/submit`
pub fn submission_fields(
    requester: &str,
    description: &str,
    priority: Option<&str>,
    lifecycle: Option<&str>,
    attributes: &[(String, String)],
) -> Map<String, Value> {
    let mut fields = Map::new();
    for (key, value) in attributes {
        fields.insert(key.clone(), Value::String(value.clone()));
    }

    fields.insert("requester_id".to_string(), Value::String(requester.to_string()));
    fields.insert("description".to_string(), Value::String(description.to_string()));
    if let Some(priority) = priority {
        fields.insert("priority".to_string(), Value::String(priority.to_string()));
    }
    if let Some(lifecycle) = lifecycle {
        fields.insert("lifecycle".to_string(), Value::String(lifecycle.to_string()));
    }

    fields
}

fn command_failed(message: impl Into<String>) -> CliError {
    CliError::CommandFailed {
        message: message.into(),
    }
}

async fn execute_service_command(
    client: &TicketKeeperClient,
    command: Commands,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Commands::Submit {
            requester,
            description,
            priority,
            lifecycle,
            attributes,
            format,
        } => {
            info!(
                requester = %requester,
                lifecycle = ?lifecycle,
                priority = ?priority,
                "Submitting ticket"
            );

            let fields = submission_fields(
                &requester,
                &description,
                priority.as_deref(),
                lifecycle.as_deref(),
                &attributes,
            );
            let response = client.submit(fields).await?;
            write!(out, "{}", output::render(&response, &format, output::submit_text)?)?;

            if response.status != "created" {
                return Err(command_failed(
                    response
                        .error
                        .unwrap_or_else(|| "submission was not accepted".to_string()),
                ));
            }
            Ok(())
        }
        Commands::Status { id, format } => {
            info!(ticket_id = %id, "Looking up ticket");

            let response = client.status(&id).await?;
            write!(out, "{}", output::render(&response, &format, output::status_text)?)?;

            match response {
                StatusResponse::Found(_) => Ok(()),
                StatusResponse::Unavailable { status } => {
                    Err(command_failed(format!("ticket {} {}", id, status)))
                }
            }
        }
        Commands::Advance {
            id,
            status,
            source,
            format,
        } => {
            info!(ticket_id = %id, requested = %status, source = %source, "Advancing ticket");

            let response = client.advance(&id, &status, &source).await?;
            write!(out, "{}", output::render(&response, &format, output::advance_text)?)?;

            if !response.ok {
                return Err(command_failed(
                    response.error.unwrap_or_else(|| "advance rejected".to_string()),
                ));
            }
            Ok(())
        }
        Commands::FollowUps { id, format } => {
            info!(ticket_id = %id, "Re-submitting follow-ups");

            let response = client.follow_ups(&id).await?;
            write!(
                out,
                "{}",
                output::render(&response, &format, output::follow_ups_text)?
            )?;

            if !response.ok {
                return Err(command_failed(
                    response
                        .error
                        .unwrap_or_else(|| "follow-ups rejected".to_string()),
                ));
            }
            Ok(())
        }
        Commands::Config { .. } | Commands::Completions { .. } => {
            Err(command_failed("command does not talk to the service"))
        }
    }
}

/// Load configuration the way the service does, plus an optional file
pub fn load_configuration(file: Option<&PathBuf>) -> Result<ServiceConfig, CliError> {
    let mut loader = ConfigLoader::from_environment();
    if let Some(path) = file {
        loader = loader.with_file(&path.to_string_lossy(), true);
    }
    Ok(loader.load()?)
}

/// Serialize configuration; secrets are never included
pub fn format_configuration(
    config: &ServiceConfig,
    format: &ConfigFormat,
) -> Result<String, CliError> {
    let output_error = |message: String| CliError::Output { message };

    match format {
        ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| output_error(e.to_string())),
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).map_err(|e| output_error(e.to_string()))
        }
        ConfigFormat::Toml => toml::to_string(config).map_err(|e| output_error(e.to_string())),
    }
}

fn execute_config_command(action: ConfigCommands, out: &mut impl Write) -> Result<(), CliError> {
    match action {
        ConfigCommands::Validate { file } => {
            let config = load_configuration(file.as_ref())?;
            let registry = config.lifecycle_registry()?;

            writeln!(out, "Configuration is valid")?;
            writeln!(out, "  listen:     {}", config.bind_address()?)?;
            writeln!(out, "  storage:    {:?}", config.storage.backend)?;
            writeln!(out, "  events:     {:?}", config.events.backend)?;
            writeln!(out, "  scheduler:  {:?}", config.scheduler.backend)?;
            writeln!(
                out,
                "  lifecycles: {} (default {})",
                registry.names().collect::<Vec<_>>().join(", "),
                config.lifecycles.default_class
            )?;
            Ok(())
        }
        ConfigCommands::Show { file, format } => {
            let config = load_configuration(file.as_ref())?;
            let rendered = format_configuration(&config, &format)?;
            write!(out, "{}", rendered)?;
            if !rendered.ends_with('\n') {
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

fn execute_completions_command(
    shell: clap_complete::Shell,
    out: &mut impl Write,
) -> Result<(), CliError> {
    info!(shell = ?shell, "Generating shell completions");

    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "ticket-keeper", out);
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
