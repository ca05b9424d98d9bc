//! SyncEvent - output of the estimators
//!
//! One-shot notifications published to collaborators (renderers, world-root movers).

use serde::{Deserialize, Serialize};

use crate::{Handedness, Quaternion, SessionId, Vector3};

/// Final yaw + translation transform between client and host frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Yaw about the vertical axis (degrees)
    pub theta_degrees: f64,
    /// Translation applied after the rotation
    pub translation: Vector3,
    /// `theta_degrees` about +Y as a quaternion
    pub rotation: Quaternion,
}

impl AlignmentResult {
    pub fn new(theta_degrees: f64, translation: Vector3) -> Self {
        Self {
            theta_degrees,
            translation,
            rotation: Quaternion::from_axis_angle(Vector3::UP, theta_degrees),
        }
    }
}

/// Notification emitted by a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Client clock offset committed
    ClockOffsetConverged { offset: f64 },
    /// Clock probing gave up (only with a round limit)
    ClockOffsetFailed { rounds: u32 },
    AlignmentStarted {
        session_id: SessionId,
        trigger_hand: Handedness,
    },
    AlignmentStopped { session_id: SessionId },
    AlignmentConverged {
        session_id: SessionId,
        result: AlignmentResult,
    },
    /// Session timed out (only with a session limit)
    AlignmentFailed {
        session_id: SessionId,
        elapsed_seconds: f64,
    },
}
