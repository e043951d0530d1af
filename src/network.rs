//! Peer membership for itemchain
//!
//! A peer is addressed by its base port, which carries membership traffic. The
//! replication endpoints (`/chain-snapshot`, `/inbound-block`) of the same peer
//! listen one port higher.

use crate::error::ChainError;
use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, UdpSocket};
use std::sync::Arc;
use tracing::{debug, info};

/// Offset from a node's base port to its replication endpoints. Fixed by the protocol.
pub const REPLICATION_PORT_OFFSET: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Peer {
    pub host: String,
    /// Base (membership) port.
    pub port: u16,
}

impl Peer {
    pub fn new(host: String, port: u16) -> Self {
        Peer { host, port }
    }

    /// Parse `host:port`.
    pub fn parse(s: &str) -> Result<Self, ChainError> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| ChainError::ConfigError(format!("peer '{}' is not host:port", s)))?;
        if host.is_empty() {
            return Err(ChainError::ConfigError(format!("peer '{}' has no host", s)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| ChainError::ConfigError(format!("peer '{}' has a bad port: {}", s, e)))?;
        Ok(Peer::new(host.to_string(), port))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn replication_port(&self) -> u16 {
        self.port.saturating_add(REPLICATION_PORT_OFFSET)
    }

    pub fn membership_url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }

    pub fn replication_url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.replication_port(), path)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.addr())
    }
}

#[derive(Debug, Default)]
struct Membership {
    me: Option<Peer>,
    first: bool,
    peers: BTreeMap<String, Peer>,
}

/// Thread-safe directory of this node's own address and every other known peer.
#[derive(Debug, Default)]
pub struct PeerBook {
    inner: RwLock<Membership>,
}

impl PeerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register as the first member of a new network. Peers left over from
    /// an earlier failed join are forgotten.
    pub fn start_network(&self, me: Peer) {
        let mut inner = self.inner.write();
        info!(me = %me, "starting new network");
        inner.me = Some(me);
        inner.first = true;
        inner.peers.clear();
    }

    /// Register this node's own address before joining through another member.
    pub fn register_self(&self, me: Peer) {
        let mut inner = self.inner.write();
        inner.me = Some(me);
        inner.first = false;
    }

    pub fn me(&self) -> Option<Peer> {
        self.inner.read().me.clone()
    }

    pub fn is_first(&self) -> bool {
        self.inner.read().first
    }

    /// Record a peer. Returns false for this node's own address or a peer
    /// that was already known.
    pub fn add_peer(&self, peer: Peer) -> bool {
        let mut inner = self.inner.write();
        if inner.me.as_ref() == Some(&peer) {
            return false;
        }
        let added = inner.peers.insert(peer.addr(), peer.clone()).is_none();
        if added {
            debug!(peer = %peer, "peer added");
        }
        added
    }

    pub fn add_peers<I: IntoIterator<Item = Peer>>(&self, peers: I) {
        for peer in peers {
            self.add_peer(peer);
        }
    }

    /// Forget every known peer, keeping this node's own address.
    pub fn clear(&self) {
        self.inner.write().peers.clear();
    }

    /// All other known peers.
    pub fn peers(&self) -> Vec<Peer> {
        self.inner.read().peers.values().cloned().collect()
    }

    pub fn peer_count(&self) -> usize {
        self.inner.read().peers.len()
    }

    /// Every member this node knows about, itself included.
    pub fn members(&self) -> Vec<Peer> {
        let inner = self.inner.read();
        inner.me.iter().chain(inner.peers.values()).cloned().collect()
    }
}

/// The first non-loopback IPv4 address this host routes outbound traffic from.
///
/// Connecting a UDP socket sends nothing; it only asks the OS to pick a route.
pub fn local_ipv4() -> Result<IpAddr, ChainError> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| ChainError::NoLocalAddress(format!("cannot open probe socket: {}", e)))?;
    socket
        .connect("192.0.2.1:80")
        .map_err(|e| ChainError::NoLocalAddress(format!("are you connected to the network? {}", e)))?;
    let ip = socket.local_addr()?.ip();

    if ip.is_loopback() || ip.is_unspecified() || !ip.is_ipv4() {
        return Err(ChainError::NoLocalAddress(format!("only found {}", ip)));
    }
    Ok(ip)
}

// ============================================================================
// Membership endpoints (base port)
// ============================================================================

pub fn membership_router(book: Arc<PeerBook>) -> Router {
    Router::new()
        .route("/membership/join", post(handle_join))
        .route("/membership/announce", post(handle_announce))
        .route("/membership/peers", get(handle_peers))
        .with_state(book)
}

/// Reply with everything we know, then remember the joiner.
async fn handle_join(State(book): State<Arc<PeerBook>>, Json(joiner): Json<Peer>) -> Json<Vec<Peer>> {
    let members = book.members();
    if book.add_peer(joiner.clone()) {
        info!(peer = %joiner, "peer joined through this node");
    }
    Json(members)
}

async fn handle_announce(State(book): State<Arc<PeerBook>>, Json(peer): Json<Peer>) -> StatusCode {
    if book.add_peer(peer.clone()) {
        info!(peer = %peer, "peer announced itself");
    }
    StatusCode::NO_CONTENT
}

async fn handle_peers(State(book): State<Arc<PeerBook>>) -> Json<Vec<Peer>> {
    Json(book.peers())
}
