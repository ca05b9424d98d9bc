//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 主机/客户端经模拟链路的完整同步流程（暂停时间，确定性）
//! - 手势触发的会话与配置文件驱动的运行
//! - UDP 回环上的时钟同步

#[cfg(test)]
mod contract_tests {
    use contracts::{PeerMessage, PoseRequest, SyncEvent, Vector3, HOST_PEER_ID};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(HOST_PEER_ID, 0);
    }

    #[test]
    fn test_event_snapshot() {
        let event = SyncEvent::AlignmentStopped { session_id: 3 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "alignment_stopped");
        assert_eq!(json["session_id"], 3);
    }

    #[test]
    fn test_message_kinds() {
        let message: PeerMessage = PoseRequest {
            session_id: 1,
            requested_timestamp: 0.0,
            client_position: Vector3::zero(),
        }
        .into();
        assert_eq!(message.kind(), "pose_request");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{
        AlignmentResult, HandGesture, Handedness, PeerSyncConfig, Role, SyncEvent, Vector3,
    };
    use hand_source::{CircularMotion, FrameOffset, SyntheticHandSource};
    use peer_node::{MonotonicClock, NodeHandle, PeerNode};
    use tokio::sync::broadcast;
    use tokio::time::timeout;
    use transport::{channel_pair, ChannelLinkConfig};

    const HOST_ORIGIN: f64 = 105.0;
    const CLIENT_ORIGIN: f64 = 100.0;

    struct Peers {
        host: NodeHandle,
        client: NodeHandle,
        host_events: broadcast::Receiver<SyncEvent>,
        client_events: broadcast::Receiver<SyncEvent>,
    }

    /// One solver window per revolution: the host centroid stays on the vertical axis
    fn motion(config: &PeerSyncConfig) -> CircularMotion {
        let alignment = &config.alignment;
        CircularMotion {
            period_seconds: (alignment.pose_window_size + 1) as f64
                * alignment.frame_interval_seconds,
            ..Default::default()
        }
    }

    fn spawn_peers(config: &PeerSyncConfig, frame: FrameOffset) -> Peers {
        let mut host_config = config.clone();
        host_config.role = Role::Host;
        let mut client_config = config.clone();
        client_config.role = Role::Client;

        let link = ChannelLinkConfig {
            latency: Duration::from_millis(10),
            format: config.network.format,
            ..Default::default()
        };
        let ((host_link, host_inbox), (client_link, client_inbox)) = channel_pair(link);

        let host = PeerNode::new(
            &host_config,
            host_link,
            SyntheticHandSource::new(motion(config)).with_time_origin(HOST_ORIGIN),
            MonotonicClock::with_origin(HOST_ORIGIN),
        );
        let client = PeerNode::new(
            &client_config,
            client_link,
            SyntheticHandSource::new(motion(config))
                .with_frame(frame)
                .with_time_origin(CLIENT_ORIGIN),
            MonotonicClock::with_origin(CLIENT_ORIGIN),
        );

        let host_events = host.subscribe();
        let client_events = client.subscribe();
        Peers {
            host: host.spawn(host_inbox),
            client: client.spawn(client_inbox),
            host_events,
            client_events,
        }
    }

    /// Skip events until `pick` matches
    async fn wait_for<T>(
        events: &mut broadcast::Receiver<SyncEvent>,
        mut pick: impl FnMut(&SyncEvent) -> Option<T>,
    ) -> T {
        let fut = async {
            loop {
                let event = events.recv().await.unwrap();
                if let Some(value) = pick(&event) {
                    return value;
                }
            }
        };
        timeout(Duration::from_secs(60), fut)
            .await
            .expect("event not received in time")
    }

    async fn clock_converged(events: &mut broadcast::Receiver<SyncEvent>) -> f64 {
        wait_for(events, |e| match e {
            SyncEvent::ClockOffsetConverged { offset } => Some(*offset),
            _ => None,
        })
        .await
    }

    async fn alignment_converged(events: &mut broadcast::Receiver<SyncEvent>) -> AlignmentResult {
        wait_for(events, |e| match e {
            SyncEvent::AlignmentConverged { result, .. } => Some(*result),
            _ => None,
        })
        .await
    }

    fn assert_alignment(result: &AlignmentResult, frame: &FrameOffset) {
        let expected = FrameOffset::new(frame.yaw_degrees, Vector3::zero()).apply(frame.shift);
        assert!(
            (result.theta_degrees - frame.yaw_degrees).abs() < 0.5,
            "theta = {}",
            result.theta_degrees
        );
        assert!(
            result.translation.distance(&expected) < 0.05,
            "translation = {:?}, expected {:?}",
            result.translation,
            expected
        );
    }

    /// Clock sync then alignment with the default parameters
    #[tokio::test(start_paused = true)]
    async fn test_e2e_channel_default_config() {
        let config = PeerSyncConfig::default();
        let frame = FrameOffset::new(30.0, Vector3::new(0.5, 0.0, -1.0));
        let mut peers = spawn_peers(&config, frame);

        let offset = clock_converged(&mut peers.client_events).await;
        assert!((offset - (HOST_ORIGIN - CLIENT_ORIGIN)).abs() < 1e-3, "offset = {offset}");

        peers.host.start_alignment(Handedness::Left).await.unwrap();
        let session_id = peers.client.start_alignment(Handedness::Left).await.unwrap();
        assert_eq!(session_id, 1);

        let result = alignment_converged(&mut peers.client_events).await;
        assert_alignment(&result, &frame);
        assert!(peers.host.stop_alignment().await.unwrap());
        // Client sessions end on convergence
        assert!(!peers.client.stop_alignment().await.unwrap());

        let client_report = peers.client.shutdown().await.unwrap();
        let host_report = peers.host.shutdown().await.unwrap();

        assert_eq!(client_report.results.len(), 1);
        assert_eq!(client_report.clock_offset, Some(offset));
        assert_eq!(client_report.summary.sessions_converged, 1);
        assert!(host_report.results.is_empty());
        assert_eq!(host_report.summary.sessions_started, 1);
        // At least K2 + K3 + 1 answered pose requests
        assert!(host_report.summary.total_sent >= 81 + 11);
        assert!(peers.host_events.try_recv().is_ok());
    }

    /// Negative yaw, json wire format, two sessions in a row
    #[tokio::test(start_paused = true)]
    async fn test_e2e_channel_restart_session() {
        let mut config = PeerSyncConfig::default();
        config.network.format = contracts::WireFormat::Json;
        config.alignment.pose_window_size = 8;
        config.alignment.candidate_window_size = 5;
        let frame = FrameOffset::new(-135.0, Vector3::new(-0.3, 0.0, 0.8));
        let mut peers = spawn_peers(&config, frame);

        clock_converged(&mut peers.client_events).await;
        peers.host.start_alignment(Handedness::Right).await.unwrap();

        for expected_session in 1..=2 {
            let session_id = peers.client.start_alignment(Handedness::Right).await.unwrap();
            assert_eq!(session_id, expected_session);
            let result = alignment_converged(&mut peers.client_events).await;
            assert_alignment(&result, &frame);
        }

        let client_report = peers.client.shutdown().await.unwrap();
        peers.host.shutdown().await.unwrap();
        assert_eq!(client_report.results.len(), 2);
        assert_eq!(client_report.summary.sessions_started, 2);
    }

    /// Config file on disk, sessions started and stopped by fist gestures
    #[tokio::test(start_paused = true)]
    async fn test_e2e_gesture_triggered_from_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
role = "client"

[network]
host_addr = "127.0.0.1:7400"

[alignment]
pose_window_size = 8
candidate_window_size = 5
max_session_seconds = 10.0

[trigger]
fist_hold_seconds = 0.5
"#,
        )
        .unwrap();
        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.trigger.fist_hold_seconds, 0.5);

        let frame = FrameOffset::new(75.0, Vector3::new(1.0, 0.0, 1.0));
        let mut peers = spawn_peers(&config, frame);
        clock_converged(&mut peers.client_events).await;

        for peer in [&peers.host, &peers.client] {
            peer.gesture_changed(Handedness::Left, HandGesture::None, HandGesture::Fisting)
                .await
                .unwrap();
        }

        let trigger_hand = wait_for(&mut peers.client_events, |e| match e {
            SyncEvent::AlignmentStarted { trigger_hand, .. } => Some(*trigger_hand),
            _ => None,
        })
        .await;
        assert_eq!(trigger_hand, Handedness::Left);

        let result = alignment_converged(&mut peers.client_events).await;
        assert_alignment(&result, &frame);

        // Releasing the fist ends the host session
        peers
            .host
            .gesture_changed(Handedness::Left, HandGesture::Fisting, HandGesture::None)
            .await
            .unwrap();
        wait_for(&mut peers.host_events, |e| match e {
            SyncEvent::AlignmentStopped { session_id } => Some(*session_id),
            _ => None,
        })
        .await;

        let host_report = peers.host.shutdown().await.unwrap();
        let client_report = peers.client.shutdown().await.unwrap();
        assert_eq!(host_report.summary.sessions_failed, 0);
        assert_eq!(client_report.summary.sessions_converged, 1);
    }

    /// Without the host session the client never converges and times out
    #[tokio::test(start_paused = true)]
    async fn test_e2e_client_session_times_out_without_host() {
        let mut config = PeerSyncConfig::default();
        config.alignment.max_session_seconds = Some(2.0);
        let mut peers = spawn_peers(&config, FrameOffset::default());

        clock_converged(&mut peers.client_events).await;
        let session_id = peers.client.start_alignment(Handedness::Left).await.unwrap();

        let failed = wait_for(&mut peers.client_events, |e| match e {
            SyncEvent::AlignmentFailed { session_id, .. } => Some(*session_id),
            _ => None,
        })
        .await;
        assert_eq!(failed, session_id);

        let client_report = peers.client.shutdown().await.unwrap();
        peers.host.shutdown().await.unwrap();
        assert!(client_report.results.is_empty());
        assert_eq!(client_report.summary.sessions_failed, 1);
    }
}

#[cfg(test)]
mod udp_tests {
    use std::time::Duration;

    use contracts::{PeerSyncConfig, Role, SyncEvent, WireFormat};
    use hand_source::{CircularMotion, SyntheticHandSource};
    use peer_node::{MonotonicClock, PeerNode};
    use transport::UdpTransport;

    /// Clock offset over real sockets on loopback
    #[tokio::test]
    async fn test_udp_clock_sync() {
        let (host_link, host_inbox) = UdpTransport::bind_host("127.0.0.1:0", WireFormat::Bincode)
            .await
            .unwrap();
        let host_addr = host_link.local_addr().unwrap().to_string();
        let (client_link, client_inbox) =
            UdpTransport::bind_client("127.0.0.1:0", &host_addr, WireFormat::Bincode)
                .await
                .unwrap();
        let host_metrics = std::sync::Arc::clone(host_link.metrics());

        let mut config = PeerSyncConfig::default();
        config.role = Role::Host;
        let host = PeerNode::new(
            &config,
            host_link,
            SyntheticHandSource::new(CircularMotion::default()),
            MonotonicClock::with_origin(42.0),
        )
        .spawn(host_inbox);

        config.role = Role::Client;
        config.network.host_addr = Some(host_addr);
        let client = PeerNode::new(
            &config,
            client_link,
            SyntheticHandSource::new(CircularMotion::default()),
            MonotonicClock::with_origin(40.0),
        );
        let mut events = client.subscribe();
        let client = client.spawn(client_inbox);

        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .unwrap()
            .unwrap();
        let SyncEvent::ClockOffsetConverged { offset } = event else {
            panic!("unexpected event {event:?}");
        };
        assert!((offset - 2.0).abs() < 0.01, "offset = {offset}");

        let report = client.shutdown().await.unwrap();
        host.shutdown().await.unwrap();
        assert_eq!(report.clock_offset, Some(offset));
        assert!(host_metrics.snapshot().received >= 11);
    }
}
