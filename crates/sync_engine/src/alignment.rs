//! Pose alignment sessions.
//!
//! The host records its own joint poses and answers pose requests from a recency
//! queue. The client pairs each answer with its own observation, fits a yaw +
//! translation over a window of pairs and declares convergence once the yaw of the
//! most recent candidates stabilizes.
//!
//! Both roles share the session lifecycle `Stopped → Syncing → Stopped`, with
//! `Failed` reachable only when a session time limit is configured.

use contracts::{
    AlignmentConfig, AlignmentResult, Handedness, JointPose, PoseRequest, PoseResponse, Role,
    SessionId,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::AlignmentError;
use crate::pose_history::HostPoseHistory;
use crate::solver::{solve_yaw_alignment, AlignmentCandidate, PosePair};
use crate::window::{population_std_dev, FifoWindow};

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentState {
    Stopped,
    Syncing,
    /// Session exceeded `max_session_seconds`
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct ActiveSession {
    id: SessionId,
    trigger_hand: Handedness,
    started_at: f64,
}

/// Lifecycle bookkeeping shared by both roles
#[derive(Debug)]
struct SessionCore {
    state: AlignmentState,
    active: Option<ActiveSession>,
    next_id: SessionId,
    max_session_seconds: Option<f64>,
}

impl SessionCore {
    fn new(max_session_seconds: Option<f64>) -> Self {
        Self {
            state: AlignmentState::Stopped,
            active: None,
            next_id: 1,
            max_session_seconds,
        }
    }

    fn begin(&mut self, trigger_hand: Handedness, now: f64) -> Result<SessionId, AlignmentError> {
        if self.active.is_some() {
            return Err(AlignmentError::AlreadySyncing);
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.active = Some(ActiveSession {
            id,
            trigger_hand,
            started_at: now,
        });
        self.state = AlignmentState::Syncing;
        Ok(id)
    }

    fn end(&mut self, state: AlignmentState) -> Option<ActiveSession> {
        self.state = state;
        self.active.take()
    }

    /// Active session if `handedness` may feed it
    fn sampling(&self, handedness: Handedness) -> Option<ActiveSession> {
        self.active.filter(|s| s.trigger_hand != handedness)
    }

    fn expired(&self, now: f64) -> Option<f64> {
        let limit = self.max_session_seconds?;
        let session = self.active?;
        let elapsed = now - session.started_at;
        (elapsed > limit).then_some(elapsed)
    }
}

/// Host role: record poses, answer requests
#[derive(Debug)]
pub struct HostAligner {
    core: SessionCore,
    history: HostPoseHistory,
    tolerance_seconds: f64,
}

impl HostAligner {
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            core: SessionCore::new(config.max_session_seconds),
            history: HostPoseHistory::new(config.hand_joint_pose_retention_seconds),
            tolerance_seconds: config.timestamp_deviation_tolerance_seconds,
        }
    }

    fn on_hand_update(&mut self, handedness: Handedness, pose: JointPose, now: f64) {
        if self.core.sampling(handedness).is_some() {
            self.history.record(pose, now);
        }
    }

    /// Answer with the recorded pose nearest to the requested time
    #[instrument(
        level = "trace",
        name = "host_pose_request",
        skip(self, request),
        fields(session_id = request.session_id, requested = request.requested_timestamp)
    )]
    pub fn on_pose_request(&mut self, request: &PoseRequest, now: f64) -> Option<PoseResponse> {
        self.history.prune(now);
        if !request.requested_timestamp.is_finite() {
            observability::record_pose_request("invalid_timestamp");
            debug!("Pose request without a finite timestamp, dropping request");
            return None;
        }
        let Some((sample, deviation)) = self.history.nearest(request.requested_timestamp) else {
            observability::record_pose_request("no_samples");
            trace!("No host poses recorded, dropping request");
            return None;
        };

        if deviation > self.tolerance_seconds {
            observability::record_pose_request("deviation_exceeded");
            debug!(
                deviation = deviation,
                tolerance = self.tolerance_seconds,
                "Nearest host pose too far from requested time, dropping request"
            );
            return None;
        }

        observability::record_pose_request("answered");
        Some(PoseResponse {
            session_id: request.session_id,
            host_position: sample.value.position,
            client_position: request.client_position,
        })
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn clear(&mut self) {
        self.history.clear();
    }
}

/// Client role: request host poses, pair, solve
#[derive(Debug)]
pub struct ClientAligner {
    core: SessionCore,
    clock_offset: f64,
    pairs: FifoWindow<PosePair>,
    candidates: FifoWindow<AlignmentCandidate>,
    theta_threshold_degrees: f64,
}

impl ClientAligner {
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            core: SessionCore::new(config.max_session_seconds),
            clock_offset: 0.0,
            pairs: FifoWindow::new(config.pose_window_size),
            candidates: FifoWindow::new(config.candidate_window_size),
            theta_threshold_degrees: config.theta_std_dev_threshold_degrees,
        }
    }

    fn on_hand_update(
        &mut self,
        handedness: Handedness,
        pose: JointPose,
        now: f64,
    ) -> Option<PoseRequest> {
        let session = self.core.sampling(handedness)?;
        Some(PoseRequest {
            session_id: session.id,
            requested_timestamp: now + self.clock_offset,
            client_position: pose.position,
        })
    }

    /// Pair a host answer with the echoed client observation
    #[instrument(
        level = "trace",
        name = "client_pose_response",
        skip(self, response),
        fields(session_id = response.session_id)
    )]
    pub fn on_pose_response(&mut self, response: &PoseResponse) -> Option<AlignmentResult> {
        let session = self.core.active?;
        if session.id != response.session_id {
            trace!(current = session.id, "Dropping pose response of another session");
            return None;
        }

        self.pairs.push(PosePair {
            host_position: response.host_position,
            client_position: response.client_position,
        });
        observability::record_pose_pair(self.pairs.len());

        if !self.pairs.is_overflowed() {
            return None;
        }

        let candidate = solve_yaw_alignment(self.pairs.iter())?;
        self.pairs.pop_oldest();
        self.candidates.push(candidate);
        observability::record_alignment_candidate(candidate.theta_degrees);

        if !self.candidates.is_overflowed() {
            return None;
        }

        let thetas: Vec<f64> = self.candidates.iter().map(|c| c.theta_degrees).collect();
        let std_dev = population_std_dev(&thetas);
        if std_dev < self.theta_threshold_degrees {
            let latest = self.candidates.latest().copied().unwrap_or(candidate);
            let result = AlignmentResult::new(latest.theta_degrees, latest.translation);
            self.clear();
            self.core.end(AlignmentState::Stopped);

            observability::record_alignment_converged(result.theta_degrees);
            info!(
                session_id = session.id,
                theta_degrees = result.theta_degrees,
                translation = ?result.translation,
                std_dev = std_dev,
                "Pose alignment converged"
            );
            return Some(result);
        }

        trace!(std_dev = std_dev, "Yaw not stable yet");
        self.candidates.pop_oldest();
        None
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    fn clear(&mut self) {
        self.pairs.clear();
        self.candidates.clear();
    }
}

/// Role-specific alignment estimator
#[derive(Debug)]
pub enum PoseAlignmentEstimator {
    Host(HostAligner),
    Client(ClientAligner),
}

impl PoseAlignmentEstimator {
    pub fn new(role: Role, config: &AlignmentConfig) -> Self {
        match role {
            Role::Host => Self::Host(HostAligner::new(config)),
            Role::Client => Self::Client(ClientAligner::new(config)),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::Host(_) => Role::Host,
            Self::Client(_) => Role::Client,
        }
    }

    fn core(&self) -> &SessionCore {
        match self {
            Self::Host(host) => &host.core,
            Self::Client(client) => &client.core,
        }
    }

    fn core_mut(&mut self) -> &mut SessionCore {
        match self {
            Self::Host(host) => &mut host.core,
            Self::Client(client) => &mut client.core,
        }
    }

    fn clear_windows(&mut self) {
        match self {
            Self::Host(host) => host.clear(),
            Self::Client(client) => client.clear(),
        }
    }

    /// Start a session triggered by `trigger_hand`
    ///
    /// Clients need the converged clock offset; the host ignores it.
    ///
    /// # Errors
    /// A session is already running, or (client) the clock is not synchronized.
    /// The estimator is left untouched.
    pub fn start(
        &mut self,
        trigger_hand: Handedness,
        clock_offset: Option<f64>,
        now: f64,
    ) -> Result<SessionId, AlignmentError> {
        if self.is_syncing() {
            warn!(role = %self.role(), "Alignment start rejected: already syncing");
            return Err(AlignmentError::AlreadySyncing);
        }

        if let Self::Client(client) = self {
            let Some(offset) = clock_offset else {
                warn!("Alignment start rejected: clock offset not converged");
                return Err(AlignmentError::ClockNotSynchronized);
            };
            client.clock_offset = offset;
        }

        self.clear_windows();
        let id = self.core_mut().begin(trigger_hand, now)?;
        observability::record_alignment_session(self.role(), "started");
        info!(
            role = %self.role(),
            session_id = id,
            trigger_hand = %trigger_hand,
            "Alignment session started"
        );
        Ok(id)
    }

    /// Stop the running session; `false` if none was running
    pub fn stop(&mut self) -> bool {
        if !self.is_syncing() {
            return false;
        }
        self.clear_windows();
        if let Some(session) = self.core_mut().end(AlignmentState::Stopped) {
            observability::record_alignment_session(self.role(), "stopped");
            info!(session_id = session.id, "Alignment session stopped");
        }
        true
    }

    pub fn is_syncing(&self) -> bool {
        self.core().active.is_some()
    }

    pub fn state(&self) -> AlignmentState {
        self.core().state
    }

    /// Id of the running session
    pub fn session_id(&self) -> Option<SessionId> {
        self.core().active.map(|s| s.id)
    }

    /// Hand whose gesture started the running session
    pub fn trigger_hand(&self) -> Option<Handedness> {
        self.core().active.map(|s| s.trigger_hand)
    }

    /// Feed a local joint update; clients get a request to send to the host
    pub fn on_hand_update(
        &mut self,
        handedness: Handedness,
        pose: JointPose,
        now: f64,
    ) -> Option<PoseRequest> {
        match self {
            Self::Host(host) => {
                host.on_hand_update(handedness, pose, now);
                None
            }
            Self::Client(client) => client.on_hand_update(handedness, pose, now),
        }
    }

    /// Host side of a pose request; clients never answer
    pub fn on_pose_request(&mut self, request: &PoseRequest, now: f64) -> Option<PoseResponse> {
        match self {
            Self::Host(host) => host.on_pose_request(request, now),
            Self::Client(_) => {
                debug!("Client received a pose request, ignoring");
                None
            }
        }
    }

    /// Client side of a pose response; `Some` once the session converged
    pub fn on_pose_response(&mut self, response: &PoseResponse) -> Option<AlignmentResult> {
        match self {
            Self::Client(client) => client.on_pose_response(response),
            Self::Host(_) => {
                debug!("Host received a pose response, ignoring");
                None
            }
        }
    }

    /// Fail the session once it has run longer than `max_session_seconds`
    ///
    /// Returns the elapsed time when the session was failed.
    pub fn check_timeout(&mut self, now: f64) -> Option<f64> {
        let elapsed = self.core().expired(now)?;
        self.clear_windows();
        let session = self.core_mut().end(AlignmentState::Failed);
        observability::record_alignment_session(self.role(), "failed");
        warn!(
            session_id = session.map(|s| s.id),
            elapsed_seconds = elapsed,
            "Alignment session timed out"
        );
        Some(elapsed)
    }

    /// Pairs + candidates (client) or recorded poses (host)
    pub fn buffered_len(&self) -> usize {
        match self {
            Self::Host(host) => host.history_len(),
            Self::Client(client) => client.pair_count() + client.candidate_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::yaw_rotation;
    use contracts::Vector3;
    use nalgebra::Vector3 as NVector3;

    fn small_config() -> AlignmentConfig {
        AlignmentConfig {
            pose_window_size: 8,
            candidate_window_size: 5,
            ..Default::default()
        }
    }

    fn rotate(theta_degrees: f64, v: Vector3) -> Vector3 {
        let r = yaw_rotation(theta_degrees) * NVector3::new(v.x, v.y, v.z);
        Vector3::new(r.x, r.y, r.z)
    }

    /// Host point `i` on a horizontal circle centered on the vertical axis
    ///
    /// With `period = pose_window_size + 1` every solved window covers one full
    /// turn, so the host centroid stays on the axis.
    fn host_point(i: usize, period: usize) -> Vector3 {
        let phase = (i % period) as f64 / period as f64 * std::f64::consts::TAU;
        Vector3::new(0.3 * phase.cos(), 1.1, 0.3 * phase.sin())
    }

    fn synthetic_response(
        session_id: SessionId,
        i: usize,
        period: usize,
        theta0: f64,
        shift: Vector3,
    ) -> PoseResponse {
        let host = host_point(i, period);
        PoseResponse {
            session_id,
            host_position: host,
            client_position: rotate(theta0, host) + shift,
        }
    }

    fn running_client(config: &AlignmentConfig) -> (PoseAlignmentEstimator, SessionId) {
        let mut estimator = PoseAlignmentEstimator::new(Role::Client, config);
        let id = estimator.start(Handedness::Left, Some(0.0), 0.0).unwrap();
        (estimator, id)
    }

    fn converge(
        config: &AlignmentConfig,
        theta0: f64,
        shift: Vector3,
    ) -> (usize, AlignmentResult, PoseAlignmentEstimator) {
        let (mut estimator, id) = running_client(config);
        let period = config.pose_window_size + 1;
        for i in 0..10_000 {
            let response = synthetic_response(id, i, period, theta0, shift);
            if let Some(result) = estimator.on_pose_response(&response) {
                return (i + 1, result, estimator);
            }
        }
        panic!("alignment did not converge");
    }

    #[test]
    fn test_recovers_known_transform() {
        let config = AlignmentConfig::default();
        let theta0 = 30.0;
        let shift = Vector3::new(0.5, 0.0, -0.8);

        let (pairs_used, result, estimator) = converge(&config, theta0, shift);

        assert_eq!(
            pairs_used,
            config.pose_window_size + config.candidate_window_size + 1
        );
        assert!((result.theta_degrees - theta0).abs() < 1e-6);
        let expected = rotate(theta0, shift);
        assert!(result.translation.distance(&expected) < 1e-6);
        assert!((result.rotation.angle_degrees() - theta0).abs() < 1e-6);

        assert_eq!(estimator.state(), AlignmentState::Stopped);
        assert!(!estimator.is_syncing());
        assert_eq!(estimator.buffered_len(), 0);
    }

    #[test]
    fn test_small_windows_converge_on_expected_pair() {
        let config = small_config();
        let (pairs_used, result, _) = converge(&config, -60.0, Vector3::zero());
        assert_eq!(pairs_used, 8 + 5 + 1);
        assert!((result.theta_degrees + 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_nan_pose_keeps_session_running_until_flushed() {
        let config = small_config();
        let (mut estimator, id) = running_client(&config);
        let theta0 = 40.0;

        let mut converged = None;
        for i in 0..100 {
            let mut response = synthetic_response(id, i, 9, theta0, Vector3::zero());
            if i == 3 {
                response.client_position.x = f64::NAN;
            }
            if let Some(result) = estimator.on_pose_response(&response) {
                converged = Some((i + 1, result));
                break;
            }
        }

        // the NaN pair poisons four solved windows; those candidates must drain first
        let (pairs_used, result) = converged.unwrap();
        assert_eq!(pairs_used, 18);
        assert!(result.theta_degrees.is_finite());
        assert!((result.theta_degrees - theta0).abs() < 1e-6);
    }

    #[test]
    fn test_windows_bounded_while_accumulating() {
        let config = small_config();
        let (mut estimator, id) = running_client(&config);
        for i in 0..13 {
            let response = synthetic_response(id, i, 9, 10.0, Vector3::zero());
            assert!(estimator.on_pose_response(&response).is_none());
            if let PoseAlignmentEstimator::Client(client) = &estimator {
                assert!(client.pair_count() <= 8);
                assert!(client.candidate_count() <= 5);
            }
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let config = small_config();
        let mut estimator = PoseAlignmentEstimator::new(Role::Client, &config);
        assert!(!estimator.stop());
        assert_eq!(estimator.state(), AlignmentState::Stopped);

        let id = estimator.start(Handedness::Right, Some(0.2), 0.0).unwrap();
        for i in 0..10 {
            estimator.on_pose_response(&synthetic_response(id, i, 9, 5.0, Vector3::zero()));
        }
        assert!(estimator.buffered_len() > 0);

        assert!(estimator.stop());
        assert_eq!(estimator.state(), AlignmentState::Stopped);
        assert_eq!(estimator.buffered_len(), 0);
        assert!(!estimator.stop());
    }

    #[test]
    fn test_start_preconditions() {
        let config = small_config();
        let mut client = PoseAlignmentEstimator::new(Role::Client, &config);
        assert_eq!(
            client.start(Handedness::Left, None, 0.0),
            Err(AlignmentError::ClockNotSynchronized)
        );
        assert_eq!(client.state(), AlignmentState::Stopped);

        client.start(Handedness::Left, Some(1.0), 0.0).unwrap();
        assert_eq!(
            client.start(Handedness::Left, Some(1.0), 0.0),
            Err(AlignmentError::AlreadySyncing)
        );

        let mut host = PoseAlignmentEstimator::new(Role::Host, &config);
        assert!(host.start(Handedness::Right, None, 0.0).is_ok());
    }

    #[test]
    fn test_stale_session_responses_dropped() {
        let config = small_config();
        let (mut estimator, old_id) = running_client(&config);
        estimator.stop();

        let stale = synthetic_response(old_id, 0, 9, 0.0, Vector3::zero());
        assert!(estimator.on_pose_response(&stale).is_none());
        assert_eq!(estimator.buffered_len(), 0);

        let new_id = estimator.start(Handedness::Left, Some(0.0), 1.0).unwrap();
        assert_ne!(new_id, old_id);
        assert!(estimator.on_pose_response(&stale).is_none());
        assert_eq!(estimator.buffered_len(), 0);

        let fresh = synthetic_response(new_id, 0, 9, 0.0, Vector3::zero());
        estimator.on_pose_response(&fresh);
        assert_eq!(estimator.buffered_len(), 1);
    }

    #[test]
    fn test_client_requests_use_offset_and_skip_trigger_hand() {
        let config = small_config();
        let mut estimator = PoseAlignmentEstimator::new(Role::Client, &config);
        let pose = JointPose::at(Vector3::new(0.1, 1.0, 0.2));
        assert!(estimator.on_hand_update(Handedness::Right, pose, 3.0).is_none());

        let id = estimator.start(Handedness::Left, Some(2.5), 3.0).unwrap();
        assert!(estimator.on_hand_update(Handedness::Left, pose, 3.1).is_none());

        let request = estimator.on_hand_update(Handedness::Right, pose, 3.1).unwrap();
        assert_eq!(request.session_id, id);
        assert!((request.requested_timestamp - 5.6).abs() < 1e-9);
        assert_eq!(request.client_position, pose.position);
    }

    #[test]
    fn test_host_answers_nearest_within_tolerance() {
        let config = AlignmentConfig::default();
        let mut host = PoseAlignmentEstimator::new(Role::Host, &config);
        host.start(Handedness::Left, None, 0.0).unwrap();

        for i in 0..30 {
            let t = i as f64 / 60.0;
            let pose = JointPose::at(Vector3::new(t, 0.0, 0.0));
            host.on_hand_update(Handedness::Right, pose, t);
            // trigger hand is not recorded
            host.on_hand_update(Handedness::Left, JointPose::default(), t);
        }
        assert_eq!(host.buffered_len(), 30);

        let client_position = Vector3::new(9.0, 9.0, 9.0);
        let request = PoseRequest {
            session_id: 4,
            requested_timestamp: 10.2 / 60.0,
            client_position,
        };
        let response = host.on_pose_request(&request, 29.0 / 60.0).unwrap();
        assert_eq!(response.session_id, 4);
        assert!((response.host_position.x - 10.0 / 60.0).abs() < 1e-9);
        assert_eq!(response.client_position, client_position);
    }

    #[test]
    fn test_host_drops_request_with_nan_timestamp() {
        let config = AlignmentConfig::default();
        let mut host = PoseAlignmentEstimator::new(Role::Host, &config);
        host.start(Handedness::Left, None, 0.0).unwrap();
        host.on_hand_update(Handedness::Right, JointPose::default(), 1.0);

        let request = PoseRequest {
            session_id: 1,
            requested_timestamp: f64::NAN,
            client_position: Vector3::zero(),
        };
        assert!(host.on_pose_request(&request, 1.0).is_none());

        let request = PoseRequest {
            requested_timestamp: 1.0,
            ..request
        };
        assert!(host.on_pose_request(&request, 1.0).is_some());
    }

    #[test]
    fn test_host_drops_request_beyond_tolerance() {
        let config = AlignmentConfig::default();
        let mut host = PoseAlignmentEstimator::new(Role::Host, &config);
        host.start(Handedness::Left, None, 0.0).unwrap();
        host.on_hand_update(Handedness::Right, JointPose::default(), 1.0);
        host.on_hand_update(Handedness::Right, JointPose::default(), 1.1);

        let request = PoseRequest {
            session_id: 1,
            requested_timestamp: 1.05,
            client_position: Vector3::zero(),
        };
        assert!(host.on_pose_request(&request, 1.1).is_none());

        // requests far in the past find only pruned history
        let request = PoseRequest {
            requested_timestamp: 1.1,
            ..request
        };
        assert!(host.on_pose_request(&request, 5.0).is_none());
    }

    #[test]
    fn test_session_timeout_fails() {
        let config = AlignmentConfig {
            max_session_seconds: Some(2.0),
            ..small_config()
        };
        let mut estimator = PoseAlignmentEstimator::new(Role::Client, &config);
        assert!(estimator.check_timeout(100.0).is_none());

        estimator.start(Handedness::Left, Some(0.0), 10.0).unwrap();
        assert!(estimator.check_timeout(11.5).is_none());

        let elapsed = estimator.check_timeout(12.5).unwrap();
        assert!((elapsed - 2.5).abs() < 1e-9);
        assert_eq!(estimator.state(), AlignmentState::Failed);
        assert!(!estimator.is_syncing());

        // a failed estimator can start again
        assert!(estimator.start(Handedness::Left, Some(0.0), 13.0).is_ok());
    }

    #[test]
    fn test_unbounded_session_never_times_out() {
        let config = small_config();
        let (mut estimator, _) = running_client(&config);
        assert!(estimator.check_timeout(1.0e6).is_none());
        assert!(estimator.is_syncing());
    }
}
