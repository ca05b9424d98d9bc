//! `run` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{Handedness, PeerSyncConfig, Role, SyncEvent};
use hand_source::{CircularMotion, RecordedHandSource, SyntheticHandSource};
use peer_node::{MonotonicClock, NodeHandle, PeerNode};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use transport::{Inbox, UdpTransport};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::hands::HandInput;

/// Execute the `run` command
pub async fn run_node(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut config = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    apply_overrides(&mut config, args);
    ConfigLoader::validate(&config).map_err(|e| CliError::config_validation(e.to_string()))?;

    info!(
        role = %config.role,
        bind = %config.network.bind_addr,
        host = ?config.network.host_addr,
        format = ?config.network.format,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let hands = load_hands(args, &config)?;
    let (transport, inbox) = bind_transport(&config).await?;
    let link_metrics = Arc::clone(transport.metrics());

    let node = PeerNode::new(&config, transport, hands, MonotonicClock::new());
    let mut events = node.subscribe();
    let handle = node.spawn(inbox);

    let auto_start = args.auto_start.map(Handedness::from);
    if let (Role::Host, Some(hand)) = (config.role, auto_start) {
        start_session(&handle, hand).await;
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let deadline = deadline(args.timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => on_event(&handle, &event, auto_start).await,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event receiver lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping node...");
                break;
            }
            _ = &mut deadline => {
                info!(timeout_secs = args.timeout, "Run timeout reached");
                break;
            }
        }
    }

    let report = handle.shutdown().await.map_err(CliError::from)?;
    let link = link_metrics.snapshot();
    info!(
        sent = link.sent,
        received = link.received,
        send_failures = link.send_failures,
        decode_failures = link.decode_failures,
        "UDP link statistics"
    );
    println!("\n{report}");

    info!("Peer Sync finished");
    Ok(())
}

fn apply_overrides(config: &mut PeerSyncConfig, args: &RunArgs) {
    if let Some(role) = args.role {
        info!(role = ?role, "Overriding role from CLI");
        config.role = role.into();
    }
    if let Some(ref bind) = args.bind {
        info!(bind = %bind, "Overriding bind address from CLI");
        config.network.bind_addr = bind.clone();
    }
    if let Some(ref host_addr) = args.host_addr {
        info!(host = %host_addr, "Overriding host address from CLI");
        config.network.host_addr = Some(host_addr.clone());
    }
}

fn load_hands(args: &RunArgs, config: &PeerSyncConfig) -> Result<HandInput> {
    match args.hand_recording {
        Some(ref path) => {
            let tolerance = config.alignment.timestamp_deviation_tolerance_seconds;
            let source = RecordedHandSource::load(path, tolerance)
                .with_context(|| format!("Failed to load hand recording {}", path.display()))?;
            info!(duration_secs = source.duration(), "Replaying hand recording");
            Ok(HandInput::Recorded(source))
        }
        None => {
            info!("No hand recording given, using synthetic circular motion");
            Ok(HandInput::Synthetic(SyntheticHandSource::new(
                CircularMotion::default(),
            )))
        }
    }
}

async fn bind_transport(config: &PeerSyncConfig) -> Result<(UdpTransport, Inbox), CliError> {
    let network = &config.network;
    let bound = match config.role {
        Role::Host => UdpTransport::bind_host(&network.bind_addr, network.format).await?,
        Role::Client => {
            let host_addr = network
                .host_addr
                .as_deref()
                .ok_or_else(|| CliError::config_validation("network.host_addr is required"))?;
            UdpTransport::bind_client(&network.bind_addr, host_addr, network.format).await?
        }
    };
    Ok(bound)
}

async fn on_event(handle: &NodeHandle, event: &SyncEvent, auto_start: Option<Handedness>) {
    match event {
        SyncEvent::ClockOffsetConverged { offset } => {
            info!(offset_ms = offset * 1000.0, "Clock synchronized");
            if let Some(hand) = auto_start {
                start_session(handle, hand).await;
            }
        }
        SyncEvent::ClockOffsetFailed { rounds } => {
            warn!(rounds, "Clock synchronization failed");
        }
        SyncEvent::AlignmentStarted {
            session_id,
            trigger_hand,
        } => info!(session_id, trigger_hand = %trigger_hand, "Alignment session started"),
        SyncEvent::AlignmentStopped { session_id } => {
            info!(session_id, "Alignment session stopped");
        }
        SyncEvent::AlignmentConverged { session_id, result } => info!(
            session_id,
            theta_degrees = result.theta_degrees,
            translation = ?result.translation,
            "Alignment converged"
        ),
        SyncEvent::AlignmentFailed {
            session_id,
            elapsed_seconds,
        } => warn!(session_id, elapsed_seconds, "Alignment session timed out"),
    }
}

async fn start_session(handle: &NodeHandle, hand: Handedness) {
    match handle.start_alignment(hand).await {
        Ok(session_id) => info!(session_id, trigger_hand = %hand, "Auto-started alignment"),
        Err(e) => warn!(error = %e, "Auto-start rejected"),
    }
}

async fn deadline(timeout_secs: u64) {
    if timeout_secs == 0 {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
