//! Property checks for the peer-record laws.

use proptest::prelude::*;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use veil_core::NodeId;
use veil_node::{Family, Peer, PeerFlags, STATUS_IPV4_PING};

proptest! {
    /// Receiving the same observation twice leaves the record
    /// bit-identical after the second receipt.
    #[test]
    fn address_learning_is_idempotent(
        a in any::<u8>(),
        b in any::<u8>(),
        port in 1u16..,
        socket_idx in 0u8..4,
        now in 1u64..1_000_000,
    ) {
        let peer = Peer::new(NodeId::new(7), [0u8; 32], PeerFlags::default());
        let src = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(198, 51, a, b), port));

        peer.learn_endpoint(src, socket_idx, STATUS_IPV4_PING, now);
        let first = peer.snapshot();
        peer.learn_endpoint(src, socket_idx, STATUS_IPV4_PING, now);
        let second = peer.snapshot();

        prop_assert_eq!(first, second);
    }

    /// Latency is written iff the echoed stamp matches the recorded
    /// ping nonce, and a written value is never zero.
    #[test]
    fn latency_gate_matches_nonce(
        nonce in 1u64..u64::MAX / 2,
        echo in 1u64..u64::MAX / 2,
        delta in 0u64..10_000_000,
    ) {
        let peer = Peer::new(NodeId::new(7), [0u8; 32], PeerFlags::default());
        peer.record_ping(1, nonce);

        let matched = peer.note_latency(Family::V4, echo, echo + delta);
        let live = peer.snapshot();
        if echo == nonce {
            prop_assert!(matched);
            prop_assert_eq!(live.addr4_ping_latency_usec, delta + 1);
            prop_assert!(live.addr4_ping_latency_usec != 0);
        } else {
            prop_assert!(!matched);
            prop_assert_eq!(live.addr4_ping_latency_usec, 0);
        }
    }
}
