//! UdpTransport - datagram link between real peers
//!
//! One datagram per message. A reader task decodes incoming datagrams into the
//! inbox. The host assigns a `PeerId` to every new source address and forgets the
//! least recently heard one once the table is full; a client only talks to its
//! configured host, addressed as [`HOST_PEER_ID`].

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ContractError, PeerId, PeerMessage, PeerTransport, WireFormat, HOST_PEER_ID};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::codec;
use crate::error::{Result, TransportError};
use crate::metrics::LinkMetrics;
use crate::{Inbound, Inbox, DEFAULT_INBOX_CAPACITY};

const MAX_DATAGRAM: usize = 1500;

/// Clients a host keeps addresses for; the least recently heard one is evicted
const MAX_PEERS: usize = 64;

/// Bidirectional mapping between socket addresses and peer ids
#[derive(Debug, Default)]
struct PeerTable {
    by_addr: HashMap<SocketAddr, PeerId>,
    by_id: HashMap<PeerId, SocketAddr>,
    /// Least recently heard first
    recency: VecDeque<SocketAddr>,
    next_id: PeerId,
    /// Clients accept datagrams only from known peers
    accept_new: bool,
    max_peers: usize,
}

impl PeerTable {
    fn insert(&mut self, id: PeerId, addr: SocketAddr) {
        self.by_addr.insert(addr, id);
        self.by_id.insert(id, addr);
        self.recency.push_back(addr);
    }

    fn touch(&mut self, addr: SocketAddr) {
        if let Some(pos) = self.recency.iter().position(|a| *a == addr) {
            self.recency.remove(pos);
        }
        self.recency.push_back(addr);
    }

    fn evict_oldest(&mut self) -> bool {
        let Some(addr) = self.recency.pop_front() else {
            return false;
        };
        if let Some(id) = self.by_addr.remove(&addr) {
            self.by_id.remove(&id);
            debug!(%addr, peer = id, "Evicting idle peer");
        }
        true
    }

    fn resolve_or_register(&mut self, addr: SocketAddr) -> Option<PeerId> {
        if let Some(id) = self.by_addr.get(&addr).copied() {
            self.touch(addr);
            return Some(id);
        }
        if !self.accept_new {
            return None;
        }
        while self.by_addr.len() >= self.max_peers.max(1) && self.evict_oldest() {}
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.insert(id, addr);
        Some(id)
    }
}

/// UDP endpoint implementing [`PeerTransport`]
pub struct UdpTransport {
    name: String,
    socket: Arc<UdpSocket>,
    peers: Arc<Mutex<PeerTable>>,
    format: WireFormat,
    metrics: Arc<LinkMetrics>,
    reader: JoinHandle<()>,
}

impl UdpTransport {
    /// Host endpoint: accepts any client and assigns ids from 1
    ///
    /// At most [`MAX_PEERS`] client addresses are kept.
    pub async fn bind_host(bind_addr: &str, format: WireFormat) -> Result<(Self, Inbox)> {
        let table = PeerTable {
            next_id: HOST_PEER_ID + 1,
            accept_new: true,
            max_peers: MAX_PEERS,
            ..Default::default()
        };
        Self::bind("udp_host", bind_addr, format, table).await
    }

    /// Client endpoint talking to `host_addr`
    pub async fn bind_client(
        bind_addr: &str,
        host_addr: &str,
        format: WireFormat,
    ) -> Result<(Self, Inbox)> {
        let host = host_addr
            .parse::<SocketAddr>()
            .map_err(|e| TransportError::InvalidAddress {
                addr: host_addr.to_string(),
                message: e.to_string(),
            })?;
        let mut table = PeerTable::default();
        table.insert(HOST_PEER_ID, host);
        Self::bind("udp_client", bind_addr, format, table).await
    }

    #[instrument(name = "udp_transport_bind", skip(table))]
    async fn bind(
        name: &str,
        bind_addr: &str,
        format: WireFormat,
        table: PeerTable,
    ) -> Result<(Self, Inbox)> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;
        let socket = Arc::new(socket);
        let local = socket.local_addr()?;

        let peers = Arc::new(Mutex::new(table));
        let metrics = Arc::new(LinkMetrics::new());
        let (tx, inbox) = mpsc::channel(DEFAULT_INBOX_CAPACITY);

        let reader = tokio::spawn(reader_loop(
            Arc::clone(&socket),
            Arc::clone(&peers),
            tx,
            Arc::clone(&metrics),
            format,
        ));

        info!(transport = name, local = %local, ?format, "UDP transport bound");
        Ok((
            Self {
                name: name.to_string(),
                socket,
                peers,
                format,
                metrics,
                reader,
            },
            inbox,
        ))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn metrics(&self) -> &Arc<LinkMetrics> {
        &self.metrics
    }

    /// Number of known peers
    pub fn peer_count(&self) -> usize {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }

    fn peer_addr(&self, to: PeerId) -> Option<SocketAddr> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(&to)
            .copied()
    }

    async fn transmit(&self, to: PeerId, message: &PeerMessage) -> Result<()> {
        let addr = self
            .peer_addr(to)
            .ok_or(TransportError::UnknownPeer { peer: to })?;
        let data = codec::encode(message, self.format)?;
        let sent = self.socket.send_to(&data, addr).await?;
        trace!(transport = %self.name, %addr, bytes = sent, "Sent");
        Ok(())
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn reader_loop(
    socket: Arc<UdpSocket>,
    peers: Arc<Mutex<PeerTable>>,
    inbox: mpsc::Sender<Inbound>,
    metrics: Arc<LinkMetrics>,
    format: WireFormat,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                // ICMP errors surface here on some platforms; keep reading
                debug!(error = %e, "UDP receive error");
                continue;
            }
        };

        let message = match codec::decode(&buf[..len], format) {
            Ok(message) => message,
            Err(e) => {
                metrics.inc_decode_failures();
                warn!(%addr, error = %e, "Dropping undecodable datagram");
                continue;
            }
        };

        let from = peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve_or_register(addr);
        let Some(from) = from else {
            warn!(%addr, "Dropping datagram from unknown sender");
            continue;
        };

        metrics.inc_received();
        if inbox.send(Inbound { from, message }).await.is_err() {
            debug!("Inbox closed, UDP reader stopping");
            break;
        }
    }
}

impl PeerTransport for UdpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        level = "trace",
        name = "udp_send",
        skip(self, message),
        fields(transport = %self.name, kind = message.kind())
    )]
    async fn send(
        &mut self,
        to: PeerId,
        message: PeerMessage,
    ) -> std::result::Result<(), ContractError> {
        let result = self.transmit(to, &message).await;
        let ok = result.is_ok();
        if ok {
            self.metrics.inc_sent();
        } else {
            self.metrics.inc_send_failures();
        }
        observability::record_message_sent(&self.name, message.kind(), ok);
        result.map_err(ContractError::from)
    }
}
