//! Host-side recency queue of joint poses.

use std::collections::VecDeque;

use contracts::{JointPose, TimedSample};

/// Time-ordered joint poses no older than the retention period
#[derive(Debug, Clone)]
pub struct HostPoseHistory {
    samples: VecDeque<TimedSample<JointPose>>,
    retention_seconds: f64,
}

impl HostPoseHistory {
    pub fn new(retention_seconds: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            retention_seconds,
        }
    }

    /// Append a pose observed at `now`, then prune
    pub fn record(&mut self, pose: JointPose, now: f64) {
        self.samples.push_back(TimedSample {
            timestamp: now,
            value: pose,
        });
        self.prune(now);
    }

    /// Drop samples older than the retention period
    pub fn prune(&mut self, now: f64) {
        while let Some(front) = self.samples.front() {
            if now - front.timestamp > self.retention_seconds {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Sample closest in time to `requested`, with its absolute deviation
    pub fn nearest(&self, requested: f64) -> Option<(&TimedSample<JointPose>, f64)> {
        self.samples
            .iter()
            .map(|sample| (sample, (sample.timestamp - requested).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
