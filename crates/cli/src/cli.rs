//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{Handedness, Role};
use std::path::PathBuf;

/// Peer Sync - clock offset and yaw alignment between tracked peers
#[derive(Parser, Debug)]
#[command(
    name = "peer-sync",
    author,
    version,
    about = "Clock offset and yaw alignment between a host and its clients",
    long_about = "Synchronizes the clock of a client with its host over a request/response \n\
                  protocol, then aligns their tracking frames (yaw about the vertical axis \n\
                  plus translation) from paired hand joint positions."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PEER_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PEER_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one peer over UDP
    Run(RunArgs),

    /// Run a host and a client in-process over a simulated link
    Simulate(SimulateArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "peer.toml", env = "PEER_SYNC_CONFIG")]
    pub config: PathBuf,

    /// Override the role from configuration
    #[arg(long, value_enum, env = "PEER_SYNC_ROLE")]
    pub role: Option<RoleArg>,

    /// Override the local bind address
    #[arg(long, env = "PEER_SYNC_BIND")]
    pub bind: Option<String>,

    /// Override the host address (clients)
    #[arg(long, env = "PEER_SYNC_HOST_ADDR")]
    pub host_addr: Option<String>,

    /// Start an alignment session as soon as possible, triggered by this hand
    #[arg(long, value_enum)]
    pub auto_start: Option<HandArg>,

    /// Replay joint poses from a JSON recording instead of synthetic motion
    #[arg(long, env = "PEER_SYNC_HAND_RECORDING")]
    pub hand_recording: Option<PathBuf>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "PEER_SYNC_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PEER_SYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `simulate` command
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Optional configuration file for estimator parameters
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host clock minus client clock (seconds)
    #[arg(long, default_value = "5.0", allow_negative_numbers = true)]
    pub offset: f64,

    /// One-way link latency (milliseconds)
    #[arg(long, default_value = "10")]
    pub latency_ms: u64,

    /// Yaw of the client frame relative to the host frame (degrees)
    #[arg(long, default_value = "30.0", allow_negative_numbers = true)]
    pub yaw: f64,

    /// Client frame shift along X (meters)
    #[arg(long, default_value = "0.5", allow_negative_numbers = true)]
    pub shift_x: f64,

    /// Client frame shift along Z (meters)
    #[arg(long, default_value = "-1.0", allow_negative_numbers = true)]
    pub shift_z: f64,

    /// Give up after this many seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "peer.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Peer role
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum RoleArg {
    Host,
    Client,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Host => Role::Host,
            RoleArg::Client => Role::Client,
        }
    }
}

/// Trigger hand
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum HandArg {
    Left,
    Right,
}

impl From<HandArg> for Handedness {
    fn from(hand: HandArg) -> Self {
        match hand {
            HandArg::Left => Handedness::Left,
            HandArg::Right => Handedness::Right,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<&LogFormat> for observability::LogFormat {
    fn from(format: &LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
