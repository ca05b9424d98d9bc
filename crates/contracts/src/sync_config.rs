//! Peer sync configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::HandJoint;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Role of this peer in the client/host topology
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Authoritative peer; source of ground-truth time and poses
    Host,
    #[default]
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => write!(f, "host"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// Complete peer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerSyncConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub clock: ClockSyncConfig,

    #[serde(default)]
    pub alignment: AlignmentConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,
}

/// Wire encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Compact binary (bincode)
    #[default]
    Bincode,
    /// Human-readable JSON
    Json,
}

/// Network endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Local socket address to bind
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Host address (required for clients)
    #[serde(default)]
    pub host_addr: Option<String>,
    #[serde(default)]
    pub format: WireFormat,
}

fn default_bind_addr() -> String {
    "0.0.0.0:7400".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            host_addr: None,
            format: WireFormat::default(),
        }
    }
}

/// Clock offset estimation parameters (client side)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSyncConfig {
    /// Offset samples required before the spread is evaluated (K1)
    pub offset_window_size: usize,
    /// Maximum acceptable population std dev of the offset window (T1, seconds)
    pub offset_std_dev_threshold_seconds: f64,
    /// Probe period (seconds)
    pub probe_interval_seconds: f64,
    /// Give up after this many round trips (None = probe forever)
    pub max_probe_rounds: Option<u32>,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self {
            offset_window_size: 10,
            offset_std_dev_threshold_seconds: 0.1,
            probe_interval_seconds: 0.02,
            max_probe_rounds: None,
        }
    }
}

/// Pose alignment parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Joint sampled on both peers
    pub hand_joint: HandJoint,
    /// Host keeps joint poses no older than this (T2, seconds)
    pub hand_joint_pose_retention_seconds: f64,
    /// Host answers only when its nearest sample is this close to the request (T3, seconds)
    pub timestamp_deviation_tolerance_seconds: f64,
    /// Pose pairs required before candidates are computed (K2)
    pub pose_window_size: usize,
    /// Candidates required before the yaw spread is evaluated (K3)
    pub candidate_window_size: usize,
    /// Maximum acceptable population std dev of candidate yaw (T4, degrees)
    pub theta_std_dev_threshold_degrees: f64,
    /// Hand update period (seconds)
    pub frame_interval_seconds: f64,
    /// Fail the session after this long (None = run until converged or stopped)
    pub max_session_seconds: Option<f64>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            hand_joint: HandJoint::IndexTip,
            hand_joint_pose_retention_seconds: 0.6,
            timestamp_deviation_tolerance_seconds: 0.034,
            pose_window_size: 50,
            candidate_window_size: 30,
            theta_std_dev_threshold_degrees: 0.1,
            frame_interval_seconds: 1.0 / 60.0,
            max_session_seconds: None,
        }
    }
}

/// Gesture trigger parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// How long a fist must be held before a session starts (seconds)
    pub fist_hold_seconds: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            fist_hold_seconds: 1.0,
        }
    }
}
