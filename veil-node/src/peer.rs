//! Per-peer records and the read-mostly peer table.
//!
//! A record's identity (uuid, public key, type flags) is immutable for
//! the life of the process. The liveness fields mutate on every
//! handshake step and are grouped behind one short-lived mutex: the
//! node worker is the only writer, other workers take brief read
//! snapshots and tolerate staleness until the next handshake.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, SocketAddrV4, SocketAddrV6, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;
use veil_core::NodeId;
use veil_crypto::PUBLIC_KEY_LEN;

/// Peer type flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerFlags(pub u32);

impl PeerFlags {
    /// Rendezvous/index peer with stable, configured endpoints.
    pub const IDX: PeerFlags = PeerFlags(0x01);
    /// Willing to forward traffic on behalf of others.
    pub const FWD: PeerFlags = PeerFlags(0x02);
    /// Do-not-probe; only responds to FWD peers.
    pub const SILENCE: PeerFlags = PeerFlags(0x04);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: PeerFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PeerFlags {
    type Output = PeerFlags;
    fn bitor(self, rhs: PeerFlags) -> PeerFlags {
        PeerFlags(self.0 | rhs.0)
    }
}

/// Handshake progressed to a PING received over IPv4.
pub const STATUS_IPV4_PING: u8 = 0x01;
/// Handshake progressed to a PONG received over IPv4.
pub const STATUS_IPV4_PONG: u8 = 0x02;
/// Handshake progressed to a PING received over IPv6.
pub const STATUS_IPV6_PING: u8 = 0x04;
/// Handshake progressed to a PONG received over IPv6.
pub const STATUS_IPV6_PONG: u8 = 0x08;
/// No usable endpoint; candidate for index-peer address resolution.
pub const STATUS_UNREACHABLE: u8 = 0x10;

/// Address family of an observed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

impl Family {
    /// Family of a socket address.
    pub fn of(addr: &SocketAddr) -> Family {
        match addr.ip() {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}

/// Mutable liveness state of a peer. All fields are owned by the node
/// worker; see the module docs for the sharing discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// Last-known IPv4 endpoint; `0.0.0.0:0` when unknown.
    pub addr4: SocketAddrV4,
    /// Bound socket the IPv4 endpoint was heard on.
    pub socket4_idx: u8,
    /// Last-known IPv6 endpoint; `[::]:0` when unknown.
    pub addr6: SocketAddrV6,
    /// Bound socket the IPv6 endpoint was heard on.
    pub socket6_idx: u8,
    /// Wall-clock second of the last PING/PONG confirming IPv4.
    pub addr4_update_ts: u64,
    /// Wall-clock second of the last PING/PONG confirming IPv6.
    pub addr6_update_ts: u64,
    /// Wall-clock second of the last outbound PING.
    pub ping_ts_sec: u64,
    /// Microsecond stamp of the last outbound PING; doubles as the
    /// nonce a matching PONG must echo.
    pub ping_ts_usec: u64,
    /// Last measured IPv4 round trip, microseconds; 0 = never measured.
    pub addr4_ping_latency_usec: u64,
    /// Last measured IPv6 round trip, microseconds; 0 = never measured.
    pub addr6_ping_latency_usec: u64,
    /// Handshake status bits per family.
    pub status: u8,
    /// Inner-tunnel IPv4 port advertised by the peer's PONG attachment.
    pub tun_sin_port4: u16,
}

impl Liveness {
    const ANY4: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
    const ANY6: SocketAddrV6 = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0);

    fn unknown() -> Self {
        Self {
            addr4: Self::ANY4,
            socket4_idx: 0,
            addr6: Self::ANY6,
            socket6_idx: 0,
            addr4_update_ts: 0,
            addr6_update_ts: 0,
            ping_ts_sec: 0,
            ping_ts_usec: 0,
            addr4_ping_latency_usec: 0,
            addr6_ping_latency_usec: 0,
            status: 0,
            tun_sin_port4: 0,
        }
    }

    /// Whether the IPv4 endpoint is the unknown sentinel.
    pub fn addr4_is_any(&self) -> bool {
        self.addr4.ip().is_unspecified()
    }

    /// Whether the IPv6 endpoint is the unknown sentinel.
    pub fn addr6_is_any(&self) -> bool {
        self.addr6.ip().is_unspecified()
    }
}

/// One remote participant of the overlay.
pub struct Peer {
    /// 32-bit identity.
    pub id: NodeId,
    /// Ed25519 verification key for this peer's control frames.
    pub public_key: [u8; PUBLIC_KEY_LEN],
    /// Type flags.
    pub flags: PeerFlags,
    live: Mutex<Liveness>,
    crypto_key: Mutex<[u8; 32]>,
}

impl Peer {
    /// Create a peer with no known endpoints.
    pub fn new(id: NodeId, public_key: [u8; PUBLIC_KEY_LEN], flags: PeerFlags) -> Self {
        Self {
            id,
            public_key,
            flags,
            live: Mutex::new(Liveness::unknown()),
            crypto_key: Mutex::new([0u8; 32]),
        }
    }

    /// Seed a known endpoint at startup (index peers are configured
    /// with stable addresses).
    pub fn with_endpoint(self, addr: SocketAddr, socket_idx: u8) -> Self {
        self.with_live(|live| match addr {
            SocketAddr::V4(a) => {
                live.addr4 = a;
                live.socket4_idx = socket_idx;
            }
            SocketAddr::V6(a) => {
                live.addr6 = a;
                live.socket6_idx = socket_idx;
            }
        });
        self
    }

    /// Run `f` under the liveness lock. Keep the critical section
    /// short; no I/O, no nested locking.
    pub fn with_live<R>(&self, f: impl FnOnce(&mut Liveness) -> R) -> R {
        let mut guard = match self.live.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Copy of the current liveness state.
    pub fn snapshot(&self) -> Liveness {
        self.with_live(|live| *live)
    }

    /// Record that this peer was observed at `src` on `socket_idx`.
    /// Sets `status_bit`, refreshes the family's update timestamp, and
    /// overwrites the endpoint (together with its socket index) when
    /// the observation differs. Returns whether the endpoint changed.
    pub fn learn_endpoint(
        &self,
        src: SocketAddr,
        socket_idx: u8,
        status_bit: u8,
        now_sec: u64,
    ) -> bool {
        let changed = self.with_live(|live| {
            live.status |= status_bit;
            match src {
                SocketAddr::V4(a) => {
                    live.addr4_update_ts = now_sec;
                    if live.addr4 != a || live.socket4_idx != socket_idx {
                        live.addr4 = a;
                        live.socket4_idx = socket_idx;
                        return true;
                    }
                    false
                }
                SocketAddr::V6(a) => {
                    live.addr6_update_ts = now_sec;
                    if live.addr6 != a || live.socket6_idx != socket_idx {
                        live.addr6 = a;
                        live.socket6_idx = socket_idx;
                        return true;
                    }
                    false
                }
            }
        });
        if changed {
            debug!(peer = %self.id, %src, socket_idx, "endpoint updated");
        }
        changed
    }

    /// Record an outbound PING stamp; the microsecond value is the
    /// nonce a matching PONG must echo.
    pub fn record_ping(&self, now_sec: u64, now_usec: u64) {
        self.with_live(|live| {
            live.ping_ts_sec = now_sec;
            live.ping_ts_usec = now_usec;
        });
    }

    /// Update the family's latency iff `dst_ts_usec` echoes the most
    /// recent PING stamp. The `+1` keeps a measured value distinct from
    /// the never-measured sentinel 0. Returns whether it matched.
    pub fn note_latency(&self, family: Family, dst_ts_usec: u64, now_usec: u64) -> bool {
        self.with_live(|live| {
            if dst_ts_usec != live.ping_ts_usec {
                return false;
            }
            let latency = now_usec.wrapping_sub(dst_ts_usec).wrapping_add(1);
            match family {
                Family::V4 => live.addr4_ping_latency_usec = latency,
                Family::V6 => live.addr6_ping_latency_usec = latency,
            }
            true
        })
    }

    /// Store the inner-tunnel port learned from a PONG attachment.
    pub fn set_tun_port4(&self, port: u16) {
        self.with_live(|live| {
            if live.tun_sin_port4 != port {
                live.tun_sin_port4 = port;
            }
        });
    }

    /// Install the rotated symmetric key for this peer.
    pub fn set_crypto_key(&self, key: [u8; 32]) {
        let mut guard = match self.crypto_key.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = key;
    }

    /// Current symmetric key for this peer.
    pub fn crypto_key(&self) -> [u8; 32] {
        match self.crypto_key.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Read-mostly map of peer identity to record. Structure is mutated
/// only at startup; afterwards records mutate in place.
#[derive(Default)]
pub struct PeerTable {
    peers: RwLock<HashMap<u32, Arc<Peer>>>,
}

impl PeerTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Replaces any previous record with the same id.
    pub fn insert(&self, peer: Arc<Peer>) {
        let mut guard = match self.peers.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(peer.id.get(), peer);
    }

    /// Look up a record by identity.
    pub fn get(&self, id: NodeId) -> Option<Arc<Peer>> {
        let guard = match self.peers.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(&id.get()).cloned()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        let guard = match self.peers.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records, ordered by identity so scheduler walks
    /// are deterministic.
    pub fn iter_snapshot(&self) -> Vec<Arc<Peer>> {
        let guard = match self.peers.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut peers: Vec<_> = guard.values().cloned().collect();
        peers.sort_by_key(|p| p.id);
        peers
    }

    /// Whether any known peer is an index peer.
    pub fn has_index_peer(&self) -> bool {
        let guard = match self.peers.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.values().any(|p| p.flags.contains(PeerFlags::IDX))
    }
}
