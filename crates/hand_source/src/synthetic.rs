//! Synthetic hand motion.
//!
//! 用于无头显环境的模拟与测试：关节在主机坐标系中沿水平圆周运动，
//! 客户端通过 `FrameOffset` 看到同一运动在自身坐标系中的表达。

use std::f64::consts::TAU;

use contracts::{HandJoint, HandPoseSource, Handedness, JointPose, Quaternion, Vector3};
use nalgebra::{Rotation3, Vector3 as NVector3};

/// Horizontal circular path in the host frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularMotion {
    pub center: Vector3,
    pub radius: f64,
    /// Seconds per revolution
    pub period_seconds: f64,
}

impl Default for CircularMotion {
    fn default() -> Self {
        Self {
            center: Vector3::new(0.0, 1.2, 0.0),
            radius: 0.25,
            period_seconds: 2.0,
        }
    }
}

impl CircularMotion {
    /// Position at physical time `t`
    pub fn position(&self, t: f64) -> Vector3 {
        let phase = if self.period_seconds > 0.0 {
            t / self.period_seconds * TAU
        } else {
            0.0
        };
        self.center + Vector3::new(self.radius * phase.cos(), 0.0, self.radius * phase.sin())
    }
}

/// Yaw + shift taking host-frame points into another tracking frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameOffset {
    pub yaw_degrees: f64,
    pub shift: Vector3,
}

impl FrameOffset {
    pub fn new(yaw_degrees: f64, shift: Vector3) -> Self {
        Self { yaw_degrees, shift }
    }

    /// `R(yaw) * p + shift`
    pub fn apply(&self, p: Vector3) -> Vector3 {
        let rotation =
            Rotation3::from_axis_angle(&NVector3::y_axis(), self.yaw_degrees.to_radians());
        let r = rotation * NVector3::new(p.x, p.y, p.z);
        Vector3::new(r.x, r.y, r.z) + self.shift
    }

    fn rotation(&self) -> Quaternion {
        Quaternion::from_axis_angle(Vector3::UP, self.yaw_degrees)
    }
}

/// Both hands follow the same circular path; every joint shares it
#[derive(Debug, Clone)]
pub struct SyntheticHandSource {
    motion: CircularMotion,
    frame: FrameOffset,
    time_origin: f64,
    untracked: Option<Handedness>,
}

impl SyntheticHandSource {
    pub fn new(motion: CircularMotion) -> Self {
        Self {
            motion,
            frame: FrameOffset::default(),
            time_origin: 0.0,
            untracked: None,
        }
    }

    /// Express the motion in another tracking frame
    pub fn with_frame(mut self, frame: FrameOffset) -> Self {
        self.frame = frame;
        self
    }

    /// Local clock reading at physical time zero
    pub fn with_time_origin(mut self, origin: f64) -> Self {
        self.time_origin = origin;
        self
    }

    /// Report `handedness` as not tracked
    pub fn without_hand(mut self, handedness: Handedness) -> Self {
        self.untracked = Some(handedness);
        self
    }

    pub fn motion(&self) -> &CircularMotion {
        &self.motion
    }

    pub fn frame(&self) -> &FrameOffset {
        &self.frame
    }
}

impl HandPoseSource for SyntheticHandSource {
    fn joint_pose(&self, handedness: Handedness, _joint: HandJoint, at: f64) -> Option<JointPose> {
        if self.untracked == Some(handedness) {
            return None;
        }
        let host_position = self.motion.position(at - self.time_origin);
        Some(JointPose {
            position: self.frame.apply(host_position),
            rotation: self.frame.rotation(),
        })
    }
}
