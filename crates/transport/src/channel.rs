//! In-process link with simulated one-way latency.
//!
//! Each direction has its own delivery worker: messages are encoded with the wire
//! codec, held until `sent_at + latency` and then decoded into the peer's inbox, so
//! the link behaves like the real wire (f32 narrowing included) and keeps order.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, PeerId, PeerMessage, PeerTransport, WireFormat, HOST_PEER_ID};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, instrument, trace, warn};

use crate::codec;
use crate::metrics::LinkMetrics;
use crate::{Inbound, Inbox, DEFAULT_INBOX_CAPACITY};

/// Peer id of the client end of a [`channel_pair`]
pub const CHANNEL_CLIENT_PEER_ID: PeerId = 1;

/// Link parameters
#[derive(Debug, Clone)]
pub struct ChannelLinkConfig {
    /// One-way latency, identical in both directions
    pub latency: Duration,
    pub format: WireFormat,
    /// Capacity of each inbox and each in-flight queue
    pub capacity: usize,
}

impl Default for ChannelLinkConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(10),
            format: WireFormat::default(),
            capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

struct InFlight {
    deliver_at: Instant,
    from: PeerId,
    payload: Bytes,
}

/// One end of an in-process link
pub struct ChannelTransport {
    name: String,
    local_id: PeerId,
    remote_id: PeerId,
    format: WireFormat,
    latency: Duration,
    tx: mpsc::Sender<InFlight>,
    metrics: Arc<LinkMetrics>,
}

/// Create a connected host/client pair
///
/// The host end addresses the client as [`CHANNEL_CLIENT_PEER_ID`], the client end
/// addresses the host as [`HOST_PEER_ID`]. Must be called inside a tokio runtime.
pub fn channel_pair(
    config: ChannelLinkConfig,
) -> ((ChannelTransport, Inbox), (ChannelTransport, Inbox)) {
    let (host_inbox_tx, host_inbox) = mpsc::channel(config.capacity);
    let (client_inbox_tx, client_inbox) = mpsc::channel(config.capacity);
    let host_metrics = Arc::new(LinkMetrics::new());
    let client_metrics = Arc::new(LinkMetrics::new());

    let to_client = spawn_direction(client_inbox_tx, Arc::clone(&client_metrics), &config);
    let to_host = spawn_direction(host_inbox_tx, Arc::clone(&host_metrics), &config);

    let host = ChannelTransport {
        name: "channel_host".to_string(),
        local_id: HOST_PEER_ID,
        remote_id: CHANNEL_CLIENT_PEER_ID,
        format: config.format,
        latency: config.latency,
        tx: to_client,
        metrics: host_metrics,
    };
    let client = ChannelTransport {
        name: "channel_client".to_string(),
        local_id: CHANNEL_CLIENT_PEER_ID,
        remote_id: HOST_PEER_ID,
        format: config.format,
        latency: config.latency,
        tx: to_host,
        metrics: client_metrics,
    };

    debug!(latency_ms = config.latency.as_millis() as u64, "Channel link created");
    ((host, host_inbox), (client, client_inbox))
}

fn spawn_direction(
    inbox: mpsc::Sender<Inbound>,
    metrics: Arc<LinkMetrics>,
    config: &ChannelLinkConfig,
) -> mpsc::Sender<InFlight> {
    let (tx, rx) = mpsc::channel(config.capacity);
    tokio::spawn(delivery_worker(rx, inbox, metrics, config.format));
    tx
}

/// Hold each message until its delivery instant, then decode into the inbox
async fn delivery_worker(
    mut rx: mpsc::Receiver<InFlight>,
    inbox: mpsc::Sender<Inbound>,
    metrics: Arc<LinkMetrics>,
    format: WireFormat,
) {
    while let Some(in_flight) = rx.recv().await {
        tokio::time::sleep_until(in_flight.deliver_at).await;

        let message = match codec::decode(&in_flight.payload, format) {
            Ok(message) => message,
            Err(e) => {
                metrics.inc_decode_failures();
                warn!(error = %e, "Dropping undecodable message");
                continue;
            }
        };

        metrics.inc_received();
        let inbound = Inbound {
            from: in_flight.from,
            message,
        };
        if inbox.send(inbound).await.is_err() {
            trace!("Inbox closed, stopping delivery");
            break;
        }
    }
}

impl ChannelTransport {
    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    pub fn metrics(&self) -> &Arc<LinkMetrics> {
        &self.metrics
    }

    async fn enqueue(&self, to: PeerId, message: &PeerMessage) -> Result<(), ContractError> {
        if to != self.remote_id {
            return Err(ContractError::UnknownPeer { peer: to });
        }
        let payload = codec::encode(message, self.format)?;
        self.tx
            .send(InFlight {
                deliver_at: Instant::now() + self.latency,
                from: self.local_id,
                payload,
            })
            .await
            .map_err(|_| ContractError::TransportClosed {
                transport: self.name.clone(),
            })
    }
}

impl PeerTransport for ChannelTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        level = "trace",
        name = "channel_send",
        skip(self, message),
        fields(transport = %self.name, kind = message.kind())
    )]
    async fn send(&mut self, to: PeerId, message: PeerMessage) -> Result<(), ContractError> {
        let result = self.enqueue(to, &message).await;
        let ok = result.is_ok();
        if ok {
            self.metrics.inc_sent();
        } else {
            self.metrics.inc_send_failures();
        }
        observability::record_message_sent(&self.name, message.kind(), ok);
        result
    }
}
