//! PeerNode - single-task runtime of one peer

use std::time::Duration;

use contracts::{
    HandGesture, HandJoint, HandPoseSource, Handedness, PeerId, PeerMessage, PeerSyncConfig,
    PeerTransport, Role, SessionId, SyncClock, SyncEvent, HOST_PEER_ID,
};
use observability::SessionMetricsAggregator;
use sync_engine::{
    AlignmentError, AlignmentResult, ClockOffsetEstimator, ClockSyncOutcome,
    GestureTrigger, PoseAlignmentEstimator, ProbeState, TriggerAction,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};
use transport::{Inbound, Inbox};

use crate::handle::NodeHandle;
use crate::report::NodeReport;

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Requests from [`NodeHandle`]
#[derive(Debug)]
pub(crate) enum Command {
    StartAlignment {
        trigger_hand: Handedness,
        reply: oneshot::Sender<Result<SessionId, AlignmentError>>,
    },
    StopAlignment {
        reply: oneshot::Sender<bool>,
    },
    GestureChanged {
        handedness: Handedness,
        old: HandGesture,
        new: HandGesture,
    },
    Shutdown,
}

/// One peer: estimators of its role plus the collaborators they need
pub struct PeerNode<T, H, C> {
    role: Role,
    transport: T,
    hands: H,
    clock: C,
    joint: HandJoint,
    probe_interval: Duration,
    frame_interval: Duration,
    clock_sync: ClockOffsetEstimator,
    alignment: PoseAlignmentEstimator,
    trigger: GestureTrigger,
    events: broadcast::Sender<SyncEvent>,
    aggregator: SessionMetricsAggregator,
    results: Vec<AlignmentResult>,
}

impl<T, H, C> PeerNode<T, H, C>
where
    T: PeerTransport + 'static,
    H: HandPoseSource + 'static,
    C: SyncClock + 'static,
{
    pub fn new(config: &PeerSyncConfig, transport: T, hands: H, clock: C) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            role: config.role,
            transport,
            hands,
            clock,
            joint: config.alignment.hand_joint,
            probe_interval: tick_period(config.clock.probe_interval_seconds, 0.02),
            frame_interval: tick_period(config.alignment.frame_interval_seconds, 1.0 / 60.0),
            clock_sync: ClockOffsetEstimator::new(config.clock.clone()),
            alignment: PoseAlignmentEstimator::new(config.role, &config.alignment),
            trigger: GestureTrigger::new(&config.trigger),
            events,
            aggregator: SessionMetricsAggregator::new(),
            results: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Subscribe before spawning to observe the very first events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Run the node on its own task, consuming `inbox`
    pub fn spawn(self, inbox: Inbox) -> NodeHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let role = self.role;
        let events = self.events.clone();
        let task = tokio::spawn(self.run(inbox, rx));
        NodeHandle::new(role, tx, events, task)
    }

    #[instrument(name = "peer_node_run", skip_all, fields(role = %self.role))]
    async fn run(mut self, mut inbox: Inbox, mut commands: mpsc::Receiver<Command>) -> NodeReport {
        info!(
            transport = self.transport.name(),
            probe_ms = self.probe_interval.as_millis() as u64,
            frame_ms = self.frame_interval.as_millis() as u64,
            "Peer node started"
        );

        if self.role == Role::Client {
            self.clock_sync.start();
        }

        let mut probe = interval(self.probe_interval);
        probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frame = interval(self.frame_interval);
        frame.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let probing = self.clock_sync.state() == ProbeState::Probing;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command).await,
                },
                inbound = inbox.recv() => match inbound {
                    Some(inbound) => self.on_inbound(inbound).await,
                    None => {
                        warn!("Transport inbox closed, stopping node");
                        break;
                    }
                },
                _ = probe.tick(), if probing => self.on_probe_tick().await,
                _ = frame.tick() => self.on_frame_tick().await,
            }
        }

        self.finish()
    }

    async fn on_command(&mut self, command: Command) {
        let now = self.clock.now();
        match command {
            Command::StartAlignment {
                trigger_hand,
                reply,
            } => {
                let result = self.start_alignment(trigger_hand, now);
                if reply.send(result).is_err() {
                    trace!("Start requester went away");
                }
            }
            Command::StopAlignment { reply } => {
                let stopped = self.stop_alignment();
                if reply.send(stopped).is_err() {
                    trace!("Stop requester went away");
                }
            }
            Command::GestureChanged {
                handedness,
                old,
                new,
            } => {
                if let Some(action) = self.trigger.on_gesture_changed(handedness, old, new, now) {
                    self.apply_trigger(action, now);
                }
            }
            Command::Shutdown => {}
        }
    }

    #[instrument(
        level = "trace",
        name = "peer_node_inbound",
        skip(self, inbound),
        fields(from = inbound.from, kind = inbound.message.kind())
    )]
    async fn on_inbound(&mut self, inbound: Inbound) {
        let Inbound { from, message } = inbound;
        self.aggregator.on_received(message.kind());
        observability::record_message_received(self.transport.name(), message.kind());

        let now = self.clock.now();
        match message {
            PeerMessage::ClockOffsetRequest(request) => {
                if self.role != Role::Host {
                    debug!(from, "Client received a clock probe, ignoring");
                    return;
                }
                let response = ClockOffsetEstimator::respond(&request, now);
                self.send(from, response.into()).await;
            }
            PeerMessage::ClockOffsetResponse(response) => {
                match self.clock_sync.on_round_trip(&response, now) {
                    Some(ClockSyncOutcome::Converged { offset }) => {
                        self.publish(SyncEvent::ClockOffsetConverged { offset });
                    }
                    Some(ClockSyncOutcome::Failed { rounds }) => {
                        self.publish(SyncEvent::ClockOffsetFailed { rounds });
                    }
                    None => {}
                }
            }
            PeerMessage::PoseRequest(request) => {
                if let Some(response) = self.alignment.on_pose_request(&request, now) {
                    self.send(from, response.into()).await;
                }
            }
            PeerMessage::PoseResponse(response) => {
                if let Some(result) = self.alignment.on_pose_response(&response) {
                    self.results.push(result);
                    self.publish(SyncEvent::AlignmentConverged {
                        session_id: response.session_id,
                        result,
                    });
                }
            }
        }
    }

    async fn on_probe_tick(&mut self) {
        let now = self.clock.now();
        if let Some(request) = self.clock_sync.tick(now) {
            self.send(HOST_PEER_ID, request.into()).await;
        }
    }

    async fn on_frame_tick(&mut self) {
        let now = self.clock.now();

        if let Some(action) = self.trigger.update(now) {
            self.apply_trigger(action, now);
        }

        let session_id = self.alignment.session_id();
        if let Some(elapsed_seconds) = self.alignment.check_timeout(now) {
            if let Some(session_id) = session_id {
                self.publish(SyncEvent::AlignmentFailed {
                    session_id,
                    elapsed_seconds,
                });
            }
        }

        if !self.alignment.is_syncing() {
            return;
        }

        for handedness in Handedness::BOTH {
            let Some(pose) = self.hands.joint_pose(handedness, self.joint, now) else {
                continue;
            };
            if let Some(request) = self.alignment.on_hand_update(handedness, pose, now) {
                self.send(HOST_PEER_ID, request.into()).await;
            }
        }
    }

    fn apply_trigger(&mut self, action: TriggerAction, now: f64) {
        match action {
            TriggerAction::Start(hand) => {
                if let Err(e) = self.start_alignment(hand, now) {
                    debug!(error = %e, "Gesture start ignored");
                }
            }
            TriggerAction::Stop => {
                self.stop_alignment();
            }
        }
    }

    fn start_alignment(
        &mut self,
        trigger_hand: Handedness,
        now: f64,
    ) -> Result<SessionId, AlignmentError> {
        let offset = self.clock_sync.converged_offset();
        let session_id = self.alignment.start(trigger_hand, offset, now)?;
        self.publish(SyncEvent::AlignmentStarted {
            session_id,
            trigger_hand,
        });
        Ok(session_id)
    }

    fn stop_alignment(&mut self) -> bool {
        let session_id = self.alignment.session_id();
        let stopped = self.alignment.stop();
        if let (true, Some(session_id)) = (stopped, session_id) {
            self.publish(SyncEvent::AlignmentStopped { session_id });
        }
        stopped
    }

    async fn send(&mut self, to: PeerId, message: PeerMessage) {
        let kind = message.kind();
        let result = self.transport.send(to, message).await;
        self.aggregator.on_sent(kind, result.is_ok());
        if let Err(e) = result {
            warn!(to, kind, error = %e, "Send failed");
        }
    }

    fn publish(&mut self, event: SyncEvent) {
        self.aggregator.on_event(&event);
        debug!(?event, "Sync event");
        if self.events.send(event).is_err() {
            trace!("No event subscribers");
        }
    }

    fn finish(mut self) -> NodeReport {
        self.stop_alignment();
        self.clock_sync.stop();

        let report = NodeReport {
            role: self.role,
            clock_offset: self.clock_sync.converged_offset(),
            results: self.results,
            summary: self.aggregator.summary(),
        };
        info!(
            clock_offset = ?report.clock_offset,
            alignments = report.results.len(),
            "Peer node stopped"
        );
        report
    }
}

/// Tick period from seconds; non-positive or non-finite values fall back
fn tick_period(seconds: f64, fallback_seconds: f64) -> Duration {
    match Duration::try_from_secs_f64(seconds) {
        Ok(period) if !period.is_zero() => period,
        _ => {
            warn!(seconds, fallback_seconds, "Invalid tick period, using fallback");
            Duration::from_secs_f64(fallback_seconds)
        }
    }
}
