//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Telemetry Forwarder - local agent that relays telemetry to an aggregation pool
#[derive(Parser, Debug)]
#[command(
    name = "telemetry-forwarder",
    author,
    version,
    about = "Telemetry forwarding agent",
    long_about = "Accepts telemetry datagrams from local producers and forwards each one to a \n\
                  randomly chosen aggregation node, with optional bounded retry. Exposes \n\
                  downstream stream health on GET /health and an optional TCP tap."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FORWARDER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FORWARDER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the forwarding agent
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "forwarder.toml", env = "FORWARDER_CONFIG")]
    pub config: PathBuf,

    /// Override the UDP ingest address
    #[arg(long, env = "FORWARDER_LISTEN")]
    pub listen: Option<String>,

    /// Override the health endpoint address
    #[arg(long, env = "FORWARDER_HEALTH")]
    pub health: Option<String>,

    /// Override the downstream TCP tap address
    #[arg(long, env = "FORWARDER_TAP")]
    pub tap: Option<String>,

    /// Prometheus exporter port (0 = disabled)
    #[arg(long, default_value = "0", env = "FORWARDER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Stop after this many seconds (0 = run until signalled)
    #[arg(long, default_value = "0", env = "FORWARDER_TIMEOUT")]
    pub timeout: u64,

    /// Stop after forwarding this many datagrams (0 = unlimited)
    #[arg(long, default_value = "0", env = "FORWARDER_MAX_MESSAGES")]
    pub max_messages: u64,

    /// Validate configuration and exit without running the agent
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "forwarder.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "forwarder.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
