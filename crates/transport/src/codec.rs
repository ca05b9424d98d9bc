//! Wire codec
//!
//! Timestamps and positions travel as `f32`. Session ids stay `u32`.

use bytes::Bytes;
use contracts::{
    ClockOffsetRequest, ClockOffsetResponse, PeerMessage, PoseRequest, PoseResponse, SessionId,
    Vector3, WireFormat,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

type WireVec = [f32; 3];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireMessage {
    ClockOffsetRequest {
        client_timestamp: f32,
    },
    ClockOffsetResponse {
        host_timestamp: f32,
        echoed_client_timestamp: f32,
    },
    PoseRequest {
        session_id: SessionId,
        requested_timestamp: f32,
        client_position: WireVec,
    },
    PoseResponse {
        session_id: SessionId,
        host_position: WireVec,
        client_position: WireVec,
    },
}

fn to_wire(v: Vector3) -> WireVec {
    [v.x as f32, v.y as f32, v.z as f32]
}

fn from_wire(v: WireVec) -> Vector3 {
    Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64)
}

impl From<&PeerMessage> for WireMessage {
    fn from(message: &PeerMessage) -> Self {
        match *message {
            PeerMessage::ClockOffsetRequest(m) => WireMessage::ClockOffsetRequest {
                client_timestamp: m.client_timestamp as f32,
            },
            PeerMessage::ClockOffsetResponse(m) => WireMessage::ClockOffsetResponse {
                host_timestamp: m.host_timestamp as f32,
                echoed_client_timestamp: m.echoed_client_timestamp as f32,
            },
            PeerMessage::PoseRequest(m) => WireMessage::PoseRequest {
                session_id: m.session_id,
                requested_timestamp: m.requested_timestamp as f32,
                client_position: to_wire(m.client_position),
            },
            PeerMessage::PoseResponse(m) => WireMessage::PoseResponse {
                session_id: m.session_id,
                host_position: to_wire(m.host_position),
                client_position: to_wire(m.client_position),
            },
        }
    }
}

impl From<WireMessage> for PeerMessage {
    fn from(message: WireMessage) -> Self {
        match message {
            WireMessage::ClockOffsetRequest { client_timestamp } => {
                ClockOffsetRequest {
                    client_timestamp: client_timestamp as f64,
                }
                .into()
            }
            WireMessage::ClockOffsetResponse {
                host_timestamp,
                echoed_client_timestamp,
            } => ClockOffsetResponse {
                host_timestamp: host_timestamp as f64,
                echoed_client_timestamp: echoed_client_timestamp as f64,
            }
            .into(),
            WireMessage::PoseRequest {
                session_id,
                requested_timestamp,
                client_position,
            } => PoseRequest {
                session_id,
                requested_timestamp: requested_timestamp as f64,
                client_position: from_wire(client_position),
            }
            .into(),
            WireMessage::PoseResponse {
                session_id,
                host_position,
                client_position,
            } => PoseResponse {
                session_id,
                host_position: from_wire(host_position),
                client_position: from_wire(client_position),
            }
            .into(),
        }
    }
}

/// Encode a message into one datagram
pub fn encode(message: &PeerMessage, format: WireFormat) -> Result<Bytes> {
    let wire = WireMessage::from(message);
    let data = match format {
        WireFormat::Bincode => bincode::serialize(&wire)
            .map_err(|e| TransportError::codec(format!("bincode error: {e}")))?,
        WireFormat::Json => serde_json::to_vec(&wire)
            .map_err(|e| TransportError::codec(format!("json error: {e}")))?,
    };
    Ok(Bytes::from(data))
}

/// Decode one datagram
pub fn decode(data: &[u8], format: WireFormat) -> Result<PeerMessage> {
    let wire: WireMessage = match format {
        WireFormat::Bincode => bincode::deserialize(data)
            .map_err(|e| TransportError::codec(format!("bincode error: {e}")))?,
        WireFormat::Json => serde_json::from_slice(data)
            .map_err(|e| TransportError::codec(format!("json error: {e}")))?,
    };
    Ok(wire.into())
}
