//! Hand tracking vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub const BOTH: [Handedness; 2] = [Handedness::Left, Handedness::Right];

    /// The other hand
    pub fn opposite(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Left => write!(f, "left"),
            Handedness::Right => write!(f, "right"),
        }
    }
}

/// Tracked hand joint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandJoint {
    Wrist,
    Palm,
    ThumbTip,
    #[default]
    IndexTip,
    MiddleTip,
    RingTip,
    LittleTip,
}

/// Recognized hand gesture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandGesture {
    #[default]
    None,
    Fisting,
    FacingSelf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_hand() {
        assert_eq!(Handedness::Left.opposite(), Handedness::Right);
        assert_eq!(Handedness::Right.opposite(), Handedness::Left);
    }

    #[test]
    fn test_joint_serde_name() {
        let json = serde_json::to_string(&HandJoint::IndexTip).unwrap();
        assert_eq!(json, "\"index_tip\"");
    }
}
