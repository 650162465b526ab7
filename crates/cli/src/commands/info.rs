//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ForwarderBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    agent: AgentInfo,
    forwarder: ForwarderInfo,
    health_addr: String,
    stream: StreamInfo,
}

#[derive(Serialize)]
struct AgentInfo {
    listen_addr: String,
    max_datagram_size: usize,
}

#[derive(Serialize)]
struct ForwarderInfo {
    name: String,
    transport: String,
    destinations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry: Option<RetryInfo>,
}

#[derive(Serialize)]
struct RetryInfo {
    max_attempts: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    multiplier: f64,
    jitter: f64,
}

#[derive(Serialize)]
struct StreamInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    tap_addr: Option<String>,
    consumer_queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &ForwarderBlueprint) -> ConfigInfo {
    let forwarder = &blueprint.forwarder;
    let retry = forwarder.retry.enabled.then(|| RetryInfo {
        max_attempts: forwarder.retry.max_attempts,
        initial_delay_ms: forwarder.retry.initial_delay_ms,
        max_delay_ms: forwarder.retry.max_delay_ms,
        multiplier: forwarder.retry.multiplier,
        jitter: forwarder.retry.jitter,
    });

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        agent: AgentInfo {
            listen_addr: blueprint.agent.listen_addr.clone(),
            max_datagram_size: blueprint.agent.max_datagram_size,
        },
        forwarder: ForwarderInfo {
            name: forwarder.name.clone(),
            transport: format!("{:?}", forwarder.transport),
            destinations: forwarder.destinations.clone(),
            retry,
        },
        health_addr: blueprint.health.listen_addr.clone(),
        stream: StreamInfo {
            tap_addr: blueprint.stream.tap_addr.clone(),
            consumer_queue_capacity: blueprint.stream.consumer_queue_capacity,
        },
    }
}

fn print_config_info(blueprint: &ForwarderBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              Telemetry Forwarder Configuration               ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📥 Agent");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Listen: {}", blueprint.agent.listen_addr);
    println!("   └─ Max datagram: {} bytes", blueprint.agent.max_datagram_size);

    let forwarder = &blueprint.forwarder;
    println!("\n📤 Forwarder '{}' ({:?})", forwarder.name, forwarder.transport);
    if forwarder.destinations.is_empty() {
        println!("   ├─ Destinations: (none)");
    }
    for destination in &forwarder.destinations {
        println!("   ├─ {}", destination);
    }
    let retry = &forwarder.retry;
    if retry.enabled {
        println!(
            "   └─ Retry: {} attempts, {}ms..{}ms x{} (jitter {})",
            retry.max_attempts, retry.initial_delay_ms, retry.max_delay_ms, retry.multiplier, retry.jitter
        );
    } else {
        println!("   └─ Retry: disabled");
    }

    println!("\n🩺 Streams");
    println!("   ├─ Health: {}", blueprint.health.listen_addr);
    match &blueprint.stream.tap_addr {
        Some(tap) => println!("   ├─ Tap: {}", tap),
        None => println!("   ├─ Tap: disabled"),
    }
    println!("   └─ Queue capacity: {}", blueprint.stream.consumer_queue_capacity);

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_omitted_when_disabled() {
        let bp = config_loader::ConfigLoader::load_from_str(
            "[forwarder]\nname = \"doppler\"\ndestinations = [\"127.0.0.1:3457\"]\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        let value = serde_json::to_value(build_config_info(&bp)).unwrap();
        assert!(value["forwarder"].get("retry").is_none());
        assert_eq!(value["forwarder"]["destinations"][0], "127.0.0.1:3457");
        assert_eq!(value["stream"]["consumer_queue_capacity"], 100);
    }
}
