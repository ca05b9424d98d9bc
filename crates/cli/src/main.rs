//! # Peer Sync CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 单个节点（主机或客户端）的 UDP 运行与生命周期管理
//! - 进程内主机/客户端模拟
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod hands;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_node, run_simulation, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Peer Sync CLI starting");

    let result = match &cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Simulate(args) => run_simulation(args).await,
        Commands::Validate(args) => run_validate(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
///
/// Metrics are set up per command, so the exporter stays disabled here.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: (&cli.log_format).into(),
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        respect_env: !cli.quiet,
    })
}
