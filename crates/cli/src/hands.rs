//! Hand pose input selected on the command line

use contracts::{HandJoint, HandPoseSource, Handedness, JointPose};
use hand_source::{RecordedHandSource, SyntheticHandSource};

/// Recording replay or synthetic motion
#[derive(Debug, Clone)]
pub enum HandInput {
    Recorded(RecordedHandSource),
    Synthetic(SyntheticHandSource),
}

impl HandPoseSource for HandInput {
    fn joint_pose(&self, handedness: Handedness, joint: HandJoint, at: f64) -> Option<JointPose> {
        match self {
            Self::Recorded(source) => source.joint_pose(handedness, joint, at),
            Self::Synthetic(source) => source.joint_pose(handedness, joint, at),
        }
    }
}
