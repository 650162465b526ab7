//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ForwarderBlueprint, TransportKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    engine: String,
    transport: String,
    destination_count: usize,
    retry_enabled: bool,
    health_addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tap_addr: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(CliError::config_not_found(config_path.clone()).to_string()),
            config_path,
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    engine: blueprint.forwarder.name.clone(),
                    transport: format!("{:?}", blueprint.forwarder.transport),
                    destination_count: blueprint.forwarder.destinations.len(),
                    retry_enabled: blueprint.forwarder.retry.enabled,
                    health_addr: blueprint.health.listen_addr.clone(),
                    tap_addr: blueprint.stream.tap_addr.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ForwarderBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.forwarder.destinations.is_empty() {
        warnings.push("No destinations configured - every write will fail to pick a client".to_string());
    }

    if blueprint.forwarder.transport == TransportKind::Log {
        warnings.push("Log transport selected - messages are logged, not sent".to_string());
    }

    if blueprint.forwarder.retry.enabled && blueprint.forwarder.destinations.len() == 1 {
        warnings.push("Retry enabled with a single destination".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Engine: {} ({})", summary.engine, summary.transport);
            println!("  Destinations: {}", summary.destination_count);
            println!("  Retry: {}", if summary.retry_enabled { "enabled" } else { "disabled" });
            println!("  Health: {}", summary.health_addr);
            if let Some(ref tap) = summary.tap_addr {
                println!("  Tap: {}", tap);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
