//! Peer messages exchanged between a client and the host.
//!
//! All messages are point-to-point. Shapes only; the binary layout lives in the
//! transport codec.

use serde::{Deserialize, Serialize};

use crate::Vector3;

/// Peer handle assigned by the transport
pub type PeerId = u64;

/// The host is always addressed as peer 0
pub const HOST_PEER_ID: PeerId = 0;

/// Alignment session identifier, fresh per client session
pub type SessionId = u32;

/// Client → host: "what time is it on your side?"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockOffsetRequest {
    /// Client time when the request was sent
    pub client_timestamp: f64,
}

/// Host → client reply to [`ClockOffsetRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockOffsetResponse {
    /// Host time when the request was handled
    pub host_timestamp: f64,
    /// The request's client timestamp, echoed back
    pub echoed_client_timestamp: f64,
}

/// Client → host: "where was your joint at this (host) time?"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseRequest {
    pub session_id: SessionId,
    /// Client time corrected into host time
    pub requested_timestamp: f64,
    /// Client's own observation, echoed back for pairing
    pub client_position: Vector3,
}

/// Host → client reply to [`PoseRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseResponse {
    pub session_id: SessionId,
    pub host_position: Vector3,
    pub client_position: Vector3,
}

/// Any message of the sync protocol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    ClockOffsetRequest(ClockOffsetRequest),
    ClockOffsetResponse(ClockOffsetResponse),
    PoseRequest(PoseRequest),
    PoseResponse(PoseResponse),
}

impl PeerMessage {
    /// Short name used in logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::ClockOffsetRequest(_) => "clock_offset_request",
            PeerMessage::ClockOffsetResponse(_) => "clock_offset_response",
            PeerMessage::PoseRequest(_) => "pose_request",
            PeerMessage::PoseResponse(_) => "pose_response",
        }
    }
}

impl From<ClockOffsetRequest> for PeerMessage {
    fn from(value: ClockOffsetRequest) -> Self {
        PeerMessage::ClockOffsetRequest(value)
    }
}

impl From<ClockOffsetResponse> for PeerMessage {
    fn from(value: ClockOffsetResponse) -> Self {
        PeerMessage::ClockOffsetResponse(value)
    }
}

impl From<PoseRequest> for PeerMessage {
    fn from(value: PoseRequest) -> Self {
        PeerMessage::PoseRequest(value)
    }
}

impl From<PoseResponse> for PeerMessage {
    fn from(value: PoseResponse) -> Self {
        PeerMessage::PoseResponse(value)
    }
}
