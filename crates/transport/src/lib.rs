//! # Transport
//!
//! 点对点消息传输模块。
//!
//! 负责：
//! - `PeerMessage` 的线上编码 (bincode / JSON, f32 精度)
//! - 进程内通道链路（可配置单向延迟，用于模拟与测试）
//! - UDP 链路（主机按来源地址分配 `PeerId`）
//! - 入站消息汇入单消费者 `Inbox`

pub mod channel;
pub mod codec;
pub mod error;
pub mod metrics;
pub mod udp;

use contracts::{PeerId, PeerMessage};
use tokio::sync::mpsc;

pub use channel::{channel_pair, ChannelLinkConfig, ChannelTransport, CHANNEL_CLIENT_PEER_ID};
pub use codec::{decode, encode};
pub use contracts::PeerTransport;
pub use error::TransportError;
pub use metrics::{LinkMetrics, LinkMetricsSnapshot};
pub use udp::UdpTransport;

/// Message delivered to this peer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inbound {
    pub from: PeerId,
    pub message: PeerMessage,
}

/// Single-consumer queue of inbound messages
pub type Inbox = mpsc::Receiver<Inbound>;

/// Default inbox capacity
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;
