//! Traits of the external collaborators.
//!
//! The estimators never talk to the network, the tracker or the OS clock directly;
//! the peer runtime receives implementations of these traits at construction.

use crate::{ContractError, HandJoint, Handedness, JointPose, PeerId, PeerMessage};

/// Message transport (client/server substrate)
///
/// Sending must not block the caller until the peer answers; replies arrive later
/// through the transport's inbox.
#[trait_variant::make(PeerTransport: Send)]
pub trait LocalPeerTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send a message point-to-point
    ///
    /// # Errors
    /// Unknown peer, encode failure or closed link
    async fn send(&mut self, to: PeerId, message: PeerMessage) -> Result<(), ContractError>;
}

/// Source of tracked hand joint poses in this peer's own frame
pub trait HandPoseSource: Send {
    /// Pose of `joint` on `handedness` at local time `at`, if the hand is tracked
    fn joint_pose(&self, handedness: Handedness, joint: HandJoint, at: f64) -> Option<JointPose>;
}

/// Local monotonic clock (seconds)
pub trait SyncClock: Send + Sync {
    fn now(&self) -> f64;
}
