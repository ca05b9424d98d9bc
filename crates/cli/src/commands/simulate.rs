//! `simulate` command implementation.
//!
//! Host and client run in one process over a channel link with a known clock skew
//! and a known frame offset, so the estimates can be compared with the truth.

use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{AlignmentResult, Handedness, PeerSyncConfig, Role, SyncEvent, Vector3};
use hand_source::{CircularMotion, FrameOffset, SyntheticHandSource};
use peer_node::{MonotonicClock, NodeHandle, PeerNode};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use transport::{channel_pair, ChannelLinkConfig};

use crate::cli::SimulateArgs;
use crate::error::CliError;

/// Client clock reading at simulation start
const CLIENT_CLOCK_ORIGIN: f64 = 100.0;

const TRIGGER_HAND: Handedness = Handedness::Left;

/// Execute the `simulate` command
pub async fn run_simulation(args: &SimulateArgs) -> Result<()> {
    let base = match args.config {
        Some(ref path) => ConfigLoader::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PeerSyncConfig::default(),
    };

    let mut host_config = base.clone();
    host_config.role = Role::Host;
    let mut client_config = base;
    client_config.role = Role::Client;

    // One revolution per solver window keeps the host centroid on the vertical axis
    let alignment = &client_config.alignment;
    let motion = CircularMotion {
        period_seconds: (alignment.pose_window_size + 1) as f64 * alignment.frame_interval_seconds,
        ..Default::default()
    };
    let frame = FrameOffset::new(args.yaw, Vector3::new(args.shift_x, 0.0, args.shift_z));
    let host_origin = CLIENT_CLOCK_ORIGIN + args.offset;

    info!(
        offset = args.offset,
        latency_ms = args.latency_ms,
        yaw = args.yaw,
        shift_x = args.shift_x,
        shift_z = args.shift_z,
        "Starting simulation"
    );

    let link = ChannelLinkConfig {
        latency: Duration::from_millis(args.latency_ms),
        format: client_config.network.format,
        ..Default::default()
    };
    let ((host_link, host_inbox), (client_link, client_inbox)) = channel_pair(link);

    let host = PeerNode::new(
        &host_config,
        host_link,
        SyntheticHandSource::new(motion).with_time_origin(host_origin),
        MonotonicClock::with_origin(host_origin),
    );
    let client = PeerNode::new(
        &client_config,
        client_link,
        SyntheticHandSource::new(motion)
            .with_frame(frame)
            .with_time_origin(CLIENT_CLOCK_ORIGIN),
        MonotonicClock::with_origin(CLIENT_CLOCK_ORIGIN),
    );
    let mut events = client.subscribe();
    let host = host.spawn(host_inbox);
    let client = client.spawn(client_inbox);

    let outcome = tokio::time::timeout(
        Duration::from_secs(args.timeout),
        drive(&host, &client, &mut events),
    )
    .await;

    let host_report = host.shutdown().await.map_err(CliError::from)?;
    let client_report = client.shutdown().await.map_err(CliError::from)?;

    let result = match outcome {
        Ok(result) => result?,
        Err(_) => {
            return Err(CliError::Timeout {
                seconds: args.timeout,
            }
            .into())
        }
    };

    print_comparison(args, &frame, client_report.clock_offset, &result);
    println!("--- host ---\n{host_report}");
    println!("--- client ---\n{client_report}");
    Ok(())
}

/// Start both sessions once the clock converged, return the first alignment
async fn drive(
    host: &NodeHandle,
    client: &NodeHandle,
    events: &mut broadcast::Receiver<SyncEvent>,
) -> Result<AlignmentResult> {
    loop {
        match events.recv().await {
            Ok(SyncEvent::ClockOffsetConverged { offset }) => {
                info!(offset, "Clock synchronized, starting alignment");
                host.start_alignment(TRIGGER_HAND).await?;
                client.start_alignment(TRIGGER_HAND).await?;
            }
            Ok(SyncEvent::ClockOffsetFailed { rounds }) => {
                anyhow::bail!("Clock offset did not converge after {rounds} rounds");
            }
            Ok(SyncEvent::AlignmentConverged { result, .. }) => {
                host.stop_alignment().await?;
                return Ok(result);
            }
            Ok(SyncEvent::AlignmentFailed {
                elapsed_seconds, ..
            }) => {
                anyhow::bail!("Alignment session timed out after {elapsed_seconds:.2}s");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event receiver lagged"),
            Err(RecvError::Closed) => anyhow::bail!("Client node stopped"),
        }
    }
}

fn print_comparison(
    args: &SimulateArgs,
    frame: &FrameOffset,
    estimated_offset: Option<f64>,
    result: &AlignmentResult,
) {
    // The shift rotated into the client frame
    let expected = FrameOffset::new(frame.yaw_degrees, Vector3::zero()).apply(frame.shift);

    println!("\n=== Simulation Result ===\n");
    match estimated_offset {
        Some(offset) => println!(
            "Clock offset:  applied {:.6} s, estimated {:.6} s",
            args.offset, offset
        ),
        None => println!("Clock offset:  applied {:.6} s, not converged", args.offset),
    }
    println!(
        "Yaw:           applied {:.3} deg, estimated {:.3} deg",
        frame.yaw_degrees, result.theta_degrees
    );
    println!(
        "Translation:   expected ({:.4}, {:.4}, {:.4}), estimated ({:.4}, {:.4}, {:.4})",
        expected.x,
        expected.y,
        expected.z,
        result.translation.x,
        result.translation.y,
        result.translation.z
    );
    println!();
}
