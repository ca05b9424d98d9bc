//! Replay of recorded joint poses.
//!
//! 录制文件为 JSON 数组，每个元素是一个带时间戳的关节位姿：
//!
//! ```json
//! [
//!   { "timestamp": 0.016, "handedness": "right", "joint": "index_tip",
//!     "pose": { "position": { "x": 0.1, "y": 1.2, "z": 0.3 },
//!               "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 } } }
//! ]
//! ```

use std::collections::HashMap;
use std::path::Path;

use contracts::{HandJoint, HandPoseSource, Handedness, JointPose, TimedSample};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HandSourceError, Result};

/// One line of a recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedSample {
    /// Seconds since the start of the recording
    pub timestamp: f64,
    pub handedness: Handedness,
    #[serde(default)]
    pub joint: HandJoint,
    pub pose: JointPose,
}

/// Nearest-sample lookup over a recording
#[derive(Debug, Clone)]
pub struct RecordedHandSource {
    tracks: HashMap<(Handedness, HandJoint), Vec<TimedSample<JointPose>>>,
    tolerance_seconds: f64,
    time_origin: f64,
}

impl RecordedHandSource {
    /// Build from samples; a pose is only returned when a sample lies within
    /// `tolerance_seconds` of the queried time
    pub fn from_samples(samples: Vec<RecordedSample>, tolerance_seconds: f64) -> Self {
        let mut tracks: HashMap<_, Vec<TimedSample<JointPose>>> = HashMap::new();
        for sample in samples {
            tracks
                .entry((sample.handedness, sample.joint))
                .or_default()
                .push(TimedSample {
                    timestamp: sample.timestamp,
                    value: sample.pose,
                });
        }
        for track in tracks.values_mut() {
            track.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        }

        Self {
            tracks,
            tolerance_seconds,
            time_origin: 0.0,
        }
    }

    /// Load a JSON recording
    ///
    /// # Errors
    /// Unreadable file, malformed JSON, or no samples at all
    pub fn load(path: &Path, tolerance_seconds: f64) -> Result<Self> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| HandSourceError::Read {
            path: display.clone(),
            source,
        })?;
        let samples: Vec<RecordedSample> =
            serde_json::from_str(&content).map_err(|e| HandSourceError::Parse {
                path: display.clone(),
                message: e.to_string(),
            })?;
        if samples.is_empty() {
            return Err(HandSourceError::Empty { path: display });
        }

        let count = samples.len();
        let source = Self::from_samples(samples, tolerance_seconds);
        info!(
            path = %path.display(),
            samples = count,
            tracks = source.tracks.len(),
            "Hand recording loaded"
        );
        Ok(source)
    }

    /// Local clock reading at recording time zero
    pub fn with_time_origin(mut self, origin: f64) -> Self {
        self.time_origin = origin;
        self
    }

    /// Recording length in seconds
    pub fn duration(&self) -> f64 {
        self.tracks
            .values()
            .filter_map(|t| t.last().map(|s| s.timestamp))
            .fold(0.0, f64::max)
    }
}

impl HandPoseSource for RecordedHandSource {
    fn joint_pose(&self, handedness: Handedness, joint: HandJoint, at: f64) -> Option<JointPose> {
        let track = self.tracks.get(&(handedness, joint))?;
        let t = at - self.time_origin;

        let idx = track.partition_point(|s| s.timestamp < t);
        let before = idx.checked_sub(1).and_then(|i| track.get(i));
        let after = track.get(idx);

        let nearest = match (before, after) {
            (Some(b), Some(a)) => {
                if (t - b.timestamp) <= (a.timestamp - t) {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        ((nearest.timestamp - t).abs() <= self.tolerance_seconds).then_some(nearest.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Vector3;
    use std::io::Write;

    fn sample(t: f64, x: f64) -> RecordedSample {
        RecordedSample {
            timestamp: t,
            handedness: Handedness::Right,
            joint: HandJoint::IndexTip,
            pose: JointPose::at(Vector3::new(x, 0.0, 0.0)),
        }
    }

    #[test]
    fn test_nearest_within_tolerance() {
        let source = RecordedHandSource::from_samples(
            vec![sample(0.2, 2.0), sample(0.0, 0.0), sample(0.1, 1.0)],
            0.02,
        );

        let pose = source
            .joint_pose(Handedness::Right, HandJoint::IndexTip, 0.11)
            .unwrap();
        assert_eq!(pose.position.x, 1.0);

        assert!(source
            .joint_pose(Handedness::Right, HandJoint::IndexTip, 0.15)
            .is_none());
        assert!(source
            .joint_pose(Handedness::Left, HandJoint::IndexTip, 0.1)
            .is_none());
        assert!((source.duration() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_time_origin() {
        let source =
            RecordedHandSource::from_samples(vec![sample(1.0, 5.0)], 0.01).with_time_origin(50.0);
        assert!(source
            .joint_pose(Handedness::Right, HandJoint::IndexTip, 51.0)
            .is_some());
        assert!(source
            .joint_pose(Handedness::Right, HandJoint::IndexTip, 1.0)
            .is_none());
    }

    #[test]
    fn test_load_json_file() {
        let samples = vec![sample(0.0, 1.0), sample(0.5, 2.0)];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&samples).unwrap().as_bytes())
            .unwrap();

        let source = RecordedHandSource::load(file.path(), 0.05).unwrap();
        let pose = source
            .joint_pose(Handedness::Right, HandJoint::IndexTip, 0.48)
            .unwrap();
        assert_eq!(pose.position.x, 2.0);
    }

    #[test]
    fn test_load_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[]").unwrap();
        assert!(matches!(
            RecordedHandSource::load(file.path(), 0.05),
            Err(HandSourceError::Empty { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(
            RecordedHandSource::load(file.path(), 0.05),
            Err(HandSourceError::Parse { .. })
        ));
    }
}
