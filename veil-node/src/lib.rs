#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! veil node worker: the peer liveness and address-discovery core.
//!
//! * A [`peer::PeerTable`] of per-peer records with dual-stack endpoint
//!   state, handshake status bits and measured latencies.
//! * A bounded SPSC [`ring::FrameRing`] fed by the external ingress
//!   thread with decoded control envelopes.
//! * A [`worker::NodeWorker`] tick loop that drains the ring, drives
//!   the PING/PONG/PONG2 hole-punching handshake, probes peers on a
//!   fixed cadence, decays stale addresses and rotates the time-seeded
//!   per-peer keys.
//!
//! Sends go through the [`send::NodeSender`] seam; time comes from the
//! [`clock::Clock`] seam so the scheduler is testable.

pub mod clock;
pub mod peer;
pub mod ring;
pub mod send;
pub mod worker;

pub use clock::{Clock, SystemClock};
pub use peer::{
    Family, Liveness, Peer, PeerFlags, PeerTable, STATUS_IPV4_PING, STATUS_IPV4_PONG,
    STATUS_IPV6_PING, STATUS_IPV6_PONG, STATUS_UNREACHABLE,
};
pub use ring::{FrameRing, Inbound};
pub use send::{family_bit_of, NodeSender, UdpSender, FAMILY_IPV4, FAMILY_IPV6};
pub use worker::{NodeWorker, WorkerHandle};

/// Crate result alias.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error taxonomy for the node crate. Ingress-path failures are never
/// errors here; they are logged drops. This covers setup only.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket setup failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid worker construction parameters.
    #[error("config: {0}")]
    Config(String),
}
