//! # Telemetry Forwarder CLI
//!
//! 命令行入口。
//!
//! 提供：
//! - 配置加载与验证
//! - 代理编排与生命周期管理
//! - 优雅关闭

mod agent;
mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_agent, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry Forwarder CLI starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_agent(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// 根据 CLI 参数初始化日志
fn init_logging(cli: &Cli) -> Result<()> {
    let (default_log_level, force_level) = if cli.quiet {
        ("warn", true)
    } else {
        let level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        (level, false)
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        force_level,
    })
}
