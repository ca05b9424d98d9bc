//! Client-side clock offset estimation.
//!
//! Each round trip yields one estimate of `host_time - client_time` using the
//! mid-point of the round trip, assuming symmetric latency. Estimates are kept in a
//! FIFO window; once the window has overflowed and its population standard deviation
//! drops under the threshold, the window mean is committed.

use contracts::{ClockOffsetRequest, ClockOffsetResponse, ClockSyncConfig};
use tracing::{debug, info, instrument, trace, warn};

use crate::window::{mean, population_std_dev, FifoWindow};

/// Probing lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Probing,
    Converged,
    /// Round limit reached without a stable window
    Failed,
}

/// Terminal outcome of a probing run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockSyncOutcome {
    Converged { offset: f64 },
    Failed { rounds: u32 },
}

/// Offset estimate from a single round trip
///
/// `sent_at` and `received_at` are client times, `host_timestamp` is the host time
/// at which the request was answered.
#[inline]
pub fn offset_sample(host_timestamp: f64, sent_at: f64, received_at: f64) -> f64 {
    host_timestamp + (received_at - sent_at) / 2.0 - received_at
}

/// Round-trip clock offset estimator
#[derive(Debug)]
pub struct ClockOffsetEstimator {
    config: ClockSyncConfig,
    state: ProbeState,
    window: FifoWindow<f64>,
    offset: Option<f64>,
    rounds: u32,
}

impl ClockOffsetEstimator {
    pub fn new(config: ClockSyncConfig) -> Self {
        let window = FifoWindow::new(config.offset_window_size);
        Self {
            config,
            state: ProbeState::Idle,
            window,
            offset: None,
            rounds: 0,
        }
    }

    /// Begin (or restart) probing
    ///
    /// A previously committed offset is kept until a new one converges.
    pub fn start(&mut self) {
        self.window.clear();
        self.rounds = 0;
        self.state = ProbeState::Probing;
        info!(
            window_size = self.config.offset_window_size,
            threshold_s = self.config.offset_std_dev_threshold_seconds,
            "Clock offset probing started"
        );
    }

    /// Abandon probing and return to `Idle`
    pub fn stop(&mut self) {
        if self.state == ProbeState::Probing {
            debug!(rounds = self.rounds, "Clock offset probing stopped");
        }
        self.window.clear();
        self.state = ProbeState::Idle;
    }

    /// Produce the next probe, if probing
    pub fn tick(&mut self, now: f64) -> Option<ClockOffsetRequest> {
        (self.state == ProbeState::Probing).then_some(ClockOffsetRequest {
            client_timestamp: now,
        })
    }

    /// Host side: answer a probe with the host's current time
    pub fn respond(request: &ClockOffsetRequest, host_now: f64) -> ClockOffsetResponse {
        ClockOffsetResponse {
            host_timestamp: host_now,
            echoed_client_timestamp: request.client_timestamp,
        }
    }

    /// Consume a probe reply received at client time `received_at`
    ///
    /// Returns an outcome exactly once per probing run.
    #[instrument(
        level = "trace",
        name = "clock_offset_round_trip",
        skip(self, response),
        fields(host_ts = response.host_timestamp)
    )]
    pub fn on_round_trip(
        &mut self,
        response: &ClockOffsetResponse,
        received_at: f64,
    ) -> Option<ClockSyncOutcome> {
        if self.state != ProbeState::Probing {
            trace!(state = ?self.state, "Dropping stale clock offset response");
            return None;
        }

        self.rounds = self.rounds.saturating_add(1);
        let sample = offset_sample(
            response.host_timestamp,
            response.echoed_client_timestamp,
            received_at,
        );
        observability::record_clock_offset_sample(sample);
        self.window.push(sample);

        if self.window.is_overflowed() {
            let samples: Vec<f64> = self.window.iter().copied().collect();
            let std_dev = population_std_dev(&samples);
            if std_dev < self.config.offset_std_dev_threshold_seconds {
                let offset = mean(&samples);
                self.offset = Some(offset);
                self.state = ProbeState::Converged;
                self.window.clear();
                observability::record_clock_offset_converged(offset, self.rounds);
                info!(
                    offset = offset,
                    std_dev = std_dev,
                    rounds = self.rounds,
                    "Clock offset converged"
                );
                return Some(ClockSyncOutcome::Converged { offset });
            }

            trace!(std_dev = std_dev, "Offset window not stable yet");
            self.window.pop_oldest();
        }

        if let Some(limit) = self.config.max_probe_rounds {
            if self.rounds >= limit {
                self.window.clear();
                self.state = ProbeState::Failed;
                observability::record_clock_probe_failed(self.rounds);
                warn!(rounds = self.rounds, "Clock offset did not converge");
                return Some(ClockSyncOutcome::Failed {
                    rounds: self.rounds,
                });
            }
        }

        None
    }

    pub fn has_converged(&self) -> bool {
        self.offset.is_some()
    }

    /// Committed offset, `0.0` until the first convergence
    pub fn offset(&self) -> f64 {
        self.offset.unwrap_or(0.0)
    }

    pub fn converged_offset(&self) -> Option<f64> {
        self.offset
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Round trips consumed by the current run
    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn config(window: usize, threshold: f64) -> ClockSyncConfig {
        ClockSyncConfig {
            offset_window_size: window,
            offset_std_dev_threshold_seconds: threshold,
            ..Default::default()
        }
    }

    /// Round trip whose computed sample is exactly `offset`
    fn reply_with_offset(offset: f64, sent_at: f64, rtt: f64) -> (ClockOffsetResponse, f64) {
        let received_at = sent_at + rtt;
        let host_timestamp = sent_at + rtt / 2.0 + offset;
        (
            ClockOffsetResponse {
                host_timestamp,
                echoed_client_timestamp: sent_at,
            },
            received_at,
        )
    }

    #[test]
    fn test_offset_sample_midpoint() {
        // host is 5s ahead, one-way latency 0.1s
        let sample = offset_sample(105.1, 100.0, 100.2);
        assert!((sample - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_only_while_probing() {
        let mut estimator = ClockOffsetEstimator::new(ClockSyncConfig::default());
        assert!(estimator.tick(1.0).is_none());

        estimator.start();
        let request = estimator.tick(1.5).unwrap();
        assert_eq!(request.client_timestamp, 1.5);

        let response = ClockOffsetEstimator::respond(&request, 7.0);
        assert_eq!(response.echoed_client_timestamp, 1.5);
        assert_eq!(response.host_timestamp, 7.0);
    }

    #[test]
    fn test_converges_under_symmetric_noisy_latency() {
        let true_offset = 3.25;
        let mut rng = StdRng::seed_from_u64(7);
        let mut estimator = ClockOffsetEstimator::new(config(10, 0.1));
        estimator.start();

        let mut client_time = 10.0;
        let mut outcome = None;
        for _ in 0..200 {
            let one_way: f64 = rng.random_range(0.005..0.08);
            let sent_at = client_time;
            let host_timestamp = sent_at + one_way + true_offset;
            let received_at = sent_at + 2.0 * one_way;
            let response = ClockOffsetResponse {
                host_timestamp,
                echoed_client_timestamp: sent_at,
            };
            if let Some(result) = estimator.on_round_trip(&response, received_at) {
                outcome = Some(result);
                break;
            }
            client_time += 0.02;
        }

        match outcome {
            Some(ClockSyncOutcome::Converged { offset }) => {
                assert!((offset - true_offset).abs() < 0.1, "offset {offset}");
            }
            other => panic!("expected convergence, got {other:?}"),
        }
        assert!(estimator.has_converged());
        assert_eq!(estimator.state(), ProbeState::Converged);
    }

    #[test]
    fn test_window_bounded_and_cleared_on_convergence() {
        let mut estimator = ClockOffsetEstimator::new(config(4, 0.1));
        estimator.start();

        // alternating far-apart samples keep the spread above the threshold
        for i in 0..20 {
            let offset = if i % 2 == 0 { 0.0 } else { 1.0 };
            let (response, received_at) = reply_with_offset(offset, i as f64, 0.01);
            assert!(estimator.on_round_trip(&response, received_at).is_none());
            assert!(estimator.window_len() <= 5);
        }
        assert_eq!(estimator.state(), ProbeState::Probing);

        let mut converged = false;
        for i in 20..40 {
            let (response, received_at) = reply_with_offset(0.5, i as f64, 0.01);
            if estimator.on_round_trip(&response, received_at).is_some() {
                converged = true;
                break;
            }
            assert!(estimator.window_len() <= 5);
        }
        assert!(converged);
        assert_eq!(estimator.window_len(), 0);
    }

    #[test]
    fn test_reference_offsets_converge_on_eleventh_sample() {
        let offsets = [
            1.00, 1.02, 0.99, 1.01, 1.00, 0.98, 1.03, 1.01, 0.99, 1.00, 1.00, 1.01, 0.99, 1.00,
            1.02,
        ];
        let mut estimator = ClockOffsetEstimator::new(config(10, 0.1));
        estimator.start();

        let mut converged_at = None;
        for (i, offset) in offsets.iter().enumerate() {
            let (response, received_at) = reply_with_offset(*offset, i as f64 * 0.02, 0.004);
            if let Some(ClockSyncOutcome::Converged { offset }) =
                estimator.on_round_trip(&response, received_at)
            {
                converged_at = Some(i + 1);
                assert!((offset - 1.00).abs() < 0.02, "offset {offset}");
                break;
            }
        }

        assert_eq!(converged_at, Some(11));
        assert_eq!(estimator.window_len(), 0);
        assert_eq!(estimator.rounds(), 11);
    }

    #[test]
    fn test_responses_ignored_unless_probing() {
        let mut estimator = ClockOffsetEstimator::new(config(2, 0.1));
        let (response, received_at) = reply_with_offset(1.0, 0.0, 0.01);
        assert!(estimator.on_round_trip(&response, received_at).is_none());
        assert_eq!(estimator.window_len(), 0);

        estimator.start();
        for i in 0..3 {
            let (response, received_at) = reply_with_offset(1.0, i as f64, 0.01);
            estimator.on_round_trip(&response, received_at);
        }
        assert!(estimator.has_converged());

        // late reply after convergence
        assert!(estimator.on_round_trip(&response, received_at).is_none());
        assert!((estimator.offset() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_is_idempotent_and_clears() {
        let mut estimator = ClockOffsetEstimator::new(config(10, 0.1));
        estimator.stop();
        assert_eq!(estimator.state(), ProbeState::Idle);

        estimator.start();
        let (response, received_at) = reply_with_offset(1.0, 0.0, 0.01);
        estimator.on_round_trip(&response, received_at);
        assert_eq!(estimator.window_len(), 1);

        estimator.stop();
        estimator.stop();
        assert_eq!(estimator.state(), ProbeState::Idle);
        assert_eq!(estimator.window_len(), 0);
        assert_eq!(estimator.offset(), 0.0);
    }

    #[test]
    fn test_round_limit_fails() {
        let mut estimator = ClockOffsetEstimator::new(ClockSyncConfig {
            offset_window_size: 3,
            offset_std_dev_threshold_seconds: 0.01,
            max_probe_rounds: Some(6),
            ..Default::default()
        });
        estimator.start();

        let mut outcome = None;
        for i in 0..10 {
            let offset = if i % 2 == 0 { 0.0 } else { 1.0 };
            let (response, received_at) = reply_with_offset(offset, i as f64, 0.01);
            if let Some(result) = estimator.on_round_trip(&response, received_at) {
                outcome = Some(result);
                break;
            }
        }

        assert_eq!(outcome, Some(ClockSyncOutcome::Failed { rounds: 6 }));
        assert_eq!(estimator.state(), ProbeState::Failed);
        assert!(estimator.tick(20.0).is_none());
        assert!(!estimator.has_converged());
    }

    #[test]
    fn test_round_counter_saturates() {
        let mut estimator = ClockOffsetEstimator::new(config(3, 0.01));
        estimator.start();
        estimator.rounds = u32::MAX - 1;

        for i in 0..3 {
            let offset = if i % 2 == 0 { 0.0 } else { 1.0 };
            let (response, received_at) = reply_with_offset(offset, i as f64, 0.01);
            assert!(estimator.on_round_trip(&response, received_at).is_none());
        }
        assert_eq!(estimator.rounds, u32::MAX);
        assert_eq!(estimator.state(), ProbeState::Probing);
    }
}
