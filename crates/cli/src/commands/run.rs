//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::ForwarderBlueprint;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use crate::agent::{Agent, AgentConfig, DEFAULT_MAX_IN_FLIGHT_WRITES};
use crate::cli::RunArgs;
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_agent(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref listen) = args.listen {
        info!(listen = %listen, "Overriding ingest address from CLI");
        blueprint.agent.listen_addr = listen.clone();
    }
    if let Some(ref health) = args.health {
        info!(health = %health, "Overriding health address from CLI");
        blueprint.health.listen_addr = health.clone();
    }
    if let Some(ref tap) = args.tap {
        info!(tap = %tap, "Overriding stream tap address from CLI");
        blueprint.stream.tap_addr = Some(tap.clone());
    }
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        engine = %blueprint.forwarder.name,
        transport = ?blueprint.forwarder.transport,
        destinations = blueprint.forwarder.destinations.len(),
        retry = blueprint.forwarder.retry.enabled,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let agent_config = build_agent_config(blueprint, args)?;
    let agent = Agent::new(agent_config);

    info!("Starting agent...");
    let stats = agent
        .run(setup_shutdown_signal())
        .await
        .context("Agent execution failed")?;

    info!(
        datagrams = stats.datagrams_received,
        sent = stats.forwarder.sent_messages,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Agent completed successfully"
    );
    stats.print_summary();

    info!("Telemetry Forwarder finished");
    Ok(())
}

fn build_agent_config(blueprint: ForwarderBlueprint, args: &RunArgs) -> Result<AgentConfig, CliError> {
    let listen = parse_addr("listen", &blueprint.agent.listen_addr)?;
    let health = parse_addr("health", &blueprint.health.listen_addr)?;
    let tap = blueprint
        .stream
        .tap_addr
        .as_deref()
        .map(|raw| parse_addr("tap", raw))
        .transpose()?;

    Ok(AgentConfig {
        blueprint,
        listen,
        health,
        tap,
        max_messages: (args.max_messages != 0).then_some(args.max_messages),
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
        max_in_flight_writes: DEFAULT_MAX_IN_FLIGHT_WRITES,
    })
}

fn parse_addr(field: &'static str, raw: &str) -> Result<SocketAddr, CliError> {
    raw.parse()
        .map_err(|e| CliError::invalid_address(field, raw, e))
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ForwarderBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Agent:");
    println!("  Listen: {}", blueprint.agent.listen_addr);
    println!("  Max datagram: {} bytes", blueprint.agent.max_datagram_size);

    let forwarder = &blueprint.forwarder;
    println!("\nForwarder '{}' ({:?}):", forwarder.name, forwarder.transport);
    for destination in &forwarder.destinations {
        println!("  - {}", destination);
    }
    if forwarder.retry.enabled {
        println!(
            "  Retry: {} attempts, {}ms initial delay",
            forwarder.retry.max_attempts, forwarder.retry.initial_delay_ms
        );
    } else {
        println!("  Retry: disabled");
    }

    println!("\nHealth: {}", blueprint.health.listen_addr);
    if let Some(ref tap) = blueprint.stream.tap_addr {
        println!("Tap: {}", tap);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const TOML: &str = r#"
[forwarder]
name = "doppler"
destinations = ["127.0.0.1:3457"]

[stream]
tap_addr = "127.0.0.1:0"
"#;

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("unused.toml"),
            listen: None,
            health: None,
            tap: None,
            metrics_port: 0,
            timeout: 30,
            max_messages: 0,
            dry_run: false,
        }
    }

    fn blueprint() -> ForwarderBlueprint {
        config_loader::ConfigLoader::load_from_str(TOML, config_loader::ConfigFormat::Toml).unwrap()
    }

    #[test]
    fn test_agent_config_zero_means_disabled() {
        let config = build_agent_config(blueprint(), &args()).unwrap();
        assert_eq!(config.max_messages, None);
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.listen.port(), 3457);
        assert!(config.tap.is_some());
    }

    #[test]
    fn test_bad_address_names_field() {
        let mut bp = blueprint();
        bp.health.listen_addr = "nowhere".into();
        let err = build_agent_config(bp, &args()).unwrap_err();
        assert!(matches!(err, CliError::InvalidAddress { field: "health", .. }));
    }

    #[tokio::test]
    async fn test_missing_config_reports_path() {
        let mut args = args();
        args.config = PathBuf::from("/definitely/not/here.toml");
        let err = run_agent(&args).await.unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"), "got: {err}");
    }

    #[tokio::test]
    async fn test_dry_run_applies_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::io::Write::write_all(&mut file, TOML.as_bytes()).unwrap();

        let mut args = args();
        args.config = file.path().to_path_buf();
        args.listen = Some("127.0.0.1:9999".into());
        args.dry_run = true;
        assert!(run_agent(&args).await.is_ok());
    }
}
