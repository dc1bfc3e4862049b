//! Outbound send seam.
//!
//! The worker never blocks on I/O: sends are best-effort datagram
//! emits and failures are swallowed after a debug log; the next
//! scheduler tick retries implicitly.

use crate::peer::Peer;
use crate::Result;
use socket2::{Domain, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::debug;

/// Family selector bit: emit on the peer's IPv4 endpoint.
pub const FAMILY_IPV4: u8 = 0x01;
/// Family selector bit: emit on the peer's IPv6 endpoint.
pub const FAMILY_IPV6: u8 = 0x02;

/// Family bits for the family a datagram arrived on.
pub fn family_bit_of(addr: &SocketAddr) -> u8 {
    match addr {
        SocketAddr::V4(_) => FAMILY_IPV4,
        SocketAddr::V6(_) => FAMILY_IPV6,
    }
}

/// Best-effort emitter of control payloads toward a peer's known
/// endpoints on the selected families.
pub trait NodeSender: Send + Sync {
    /// Emit `payload` toward every selected family with a known
    /// endpoint. Unknown endpoints and send failures are skipped.
    fn send_to_node(&self, peer: &Peer, payload: &[u8], families: u8);
}

/// Production sender over the node's pool of bound UDP sockets,
/// indexed by the `socket_idx` recorded with each learned endpoint.
pub struct UdpSender {
    sockets: Vec<Arc<UdpSocket>>,
}

impl UdpSender {
    /// Wrap an existing socket pool.
    pub fn new(sockets: Vec<Arc<UdpSocket>>) -> Self {
        Self { sockets }
    }

    /// Bind one non-blocking socket per listen address, with address
    /// reuse where the platform supports it. Socket order defines the
    /// `socket_idx` space.
    pub async fn bind(listen: &[SocketAddr]) -> Result<Self> {
        let mut sockets = Vec::with_capacity(listen.len());
        for addr in listen {
            let domain = Domain::for_address(*addr);
            let socket = socket2::Socket::new(domain, Type::DGRAM, None)?;
            #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
            socket.set_reuse_port(true)?;
            socket.set_reuse_address(true)?;
            socket.bind(&(*addr).into())?;
            let std_sock: std::net::UdpSocket = socket.into();
            std_sock.set_nonblocking(true)?;
            sockets.push(Arc::new(UdpSocket::from_std(std_sock)?));
        }
        Ok(Self::new(sockets))
    }

    /// The socket at `socket_idx`, if the pool has one.
    pub fn socket(&self, socket_idx: u8) -> Option<Arc<UdpSocket>> {
        self.sockets.get(socket_idx as usize).cloned()
    }

    fn emit(&self, socket_idx: u8, payload: &[u8], dest: SocketAddr) {
        let Some(sock) = self.sockets.get(socket_idx as usize) else {
            debug!(socket_idx, %dest, "send skipped: no such socket");
            return;
        };
        if let Err(e) = sock.try_send_to(payload, dest) {
            debug!(%dest, error = %e, "udp send failed");
        }
    }
}

impl NodeSender for UdpSender {
    fn send_to_node(&self, peer: &Peer, payload: &[u8], families: u8) {
        let live = peer.snapshot();
        if families & FAMILY_IPV4 != 0 && !live.addr4_is_any() {
            self.emit(live.socket4_idx, payload, SocketAddr::V4(live.addr4));
        }
        if families & FAMILY_IPV6 != 0 && !live.addr6_is_any() {
            self.emit(live.socket6_idx, payload, SocketAddr::V6(live.addr6));
        }
    }
}
