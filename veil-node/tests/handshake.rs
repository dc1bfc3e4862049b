//! End-to-end scenarios for the liveness core: the three-way
//! hole-punching handshake, cold discovery via the index path, address
//! decay, signature filtering, SILENCE policy and NAT loopback. Two
//! workers are wired back to back through recording senders and a
//! manual clock; no sockets are involved.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rand::rngs::OsRng;
use veil_core::NodeId;
use veil_crypto::SigningIdentity;
use veil_node::{
    Clock, FrameRing, Inbound, NodeSender, NodeWorker, Peer, PeerFlags, PeerTable,
    FAMILY_IPV4, FAMILY_IPV6, STATUS_IPV4_PING, STATUS_IPV4_PONG, STATUS_UNREACHABLE,
};
use veil_wire::{
    encode_envelope, parse_envelope, Attachment, PingFrame, PongFrame, TunSockAddress,
    ENVELOPE_HEADER_LEN, PAYLOAD_TYPE_NODE, SIGNATURE_LEN, SUB_TYPE_PING, SUB_TYPE_PONG,
    SUB_TYPE_PONG2,
};

#[derive(Debug)]
struct SentFrame {
    peer: u32,
    wire: Vec<u8>,
    families: u8,
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<SentFrame>>,
}

impl RecordingSender {
    fn take(&self) -> Vec<SentFrame> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }
}

impl NodeSender for RecordingSender {
    fn send_to_node(&self, peer: &Peer, payload: &[u8], families: u8) {
        self.sent.lock().unwrap().push(SentFrame {
            peer: peer.id.get(),
            wire: payload.to_vec(),
            families,
        });
    }
}

#[derive(Default)]
struct ManualClock {
    sec: AtomicU64,
    usec: AtomicU64,
}

impl ManualClock {
    fn set(&self, sec: u64, usec: u64) {
        self.sec.store(sec, Ordering::Relaxed);
        self.usec.store(usec, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> (u64, u64) {
        (
            self.sec.load(Ordering::Relaxed),
            self.usec.load(Ordering::Relaxed),
        )
    }
}

struct TestNode {
    worker: NodeWorker,
    sender: Arc<RecordingSender>,
    clock: Arc<ManualClock>,
    ring: Arc<FrameRing>,
    table: Arc<PeerTable>,
}

fn make_node(
    local: Arc<Peer>,
    identity: SigningIdentity,
    table: Arc<PeerTable>,
    lite_mode: bool,
) -> TestNode {
    make_node_with_tun(local, identity, table, lite_mode, TunSockAddress::zero())
}

fn make_node_with_tun(
    local: Arc<Peer>,
    identity: SigningIdentity,
    table: Arc<PeerTable>,
    lite_mode: bool,
    tun: TunSockAddress,
) -> TestNode {
    let sender = Arc::new(RecordingSender::default());
    let clock = Arc::new(ManualClock::default());
    let ring = Arc::new(FrameRing::with_capacity(64));
    let worker = NodeWorker::new(
        Arc::clone(&local),
        identity,
        Arc::clone(&table),
        Arc::clone(&ring),
        Arc::clone(&sender) as Arc<dyn NodeSender>,
    )
    .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
    .with_lite_mode(lite_mode)
    .with_tun_address(tun);
    TestNode {
        worker,
        sender,
        clock,
        ring,
        table,
    }
}

fn inbound(wire: &[u8], src: SocketAddr, socket_idx: u8) -> Inbound {
    let (_, env) = parse_envelope(wire).unwrap();
    Inbound {
        payload_type: env.payload_type,
        sub_type: env.sub_type,
        data: Bytes::copy_from_slice(env.data),
        src,
        socket_idx,
    }
}

fn seal(identity: Option<&SigningIdentity>, sub_type: u8, data: Vec<u8>) -> Vec<u8> {
    let sig = match identity {
        Some(id) => id.sign_region(&data),
        None => [0u8; SIGNATURE_LEN],
    };
    let mut body = data;
    body.extend_from_slice(&sig);
    let mut wire = Vec::with_capacity(ENVELOPE_HEADER_LEN + body.len());
    encode_envelope(PAYLOAD_TYPE_NODE, sub_type, &body, &mut wire);
    wire
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

const A_ID: u32 = 1001;
const B_ID: u32 = 1002;
const A_ADDR: &str = "203.0.113.4:40000";
const B_ADDR: &str = "198.51.100.9:41000";

/// A and B fully wired: each table holds both records, B's endpoint is
/// seeded in A's table (A learned it out of band), A's is not.
fn wired_pair(lite_mode: bool) -> (TestNode, TestNode) {
    let a_identity = SigningIdentity::generate(&mut OsRng);
    let b_identity = SigningIdentity::generate(&mut OsRng);

    let a_table = Arc::new(PeerTable::new());
    let a_local = Arc::new(Peer::new(
        NodeId::new(A_ID),
        a_identity.public_key_bytes(),
        PeerFlags::default(),
    ));
    a_table.insert(Arc::clone(&a_local));
    a_table.insert(Arc::new(
        Peer::new(
            NodeId::new(B_ID),
            b_identity.public_key_bytes(),
            PeerFlags::default(),
        )
        .with_endpoint(B_ADDR.parse().unwrap(), 0),
    ));

    let b_table = Arc::new(PeerTable::new());
    let b_local = Arc::new(Peer::new(
        NodeId::new(B_ID),
        b_identity.public_key_bytes(),
        PeerFlags::default(),
    ));
    b_table.insert(Arc::clone(&b_local));
    b_table.insert(Arc::new(Peer::new(
        NodeId::new(A_ID),
        a_identity.public_key_bytes(),
        PeerFlags::default(),
    )));

    let a = make_node(a_local, a_identity, a_table, lite_mode);
    let b = make_node_with_tun(
        b_local,
        b_identity,
        b_table,
        lite_mode,
        TunSockAddress {
            tun_port4: 3950,
            ..TunSockAddress::zero()
        },
    );
    (a, b)
}

#[test]
fn three_way_handshake_over_ipv4() {
    init_tracing();
    let (mut a, mut b) = wired_pair(false);
    let b_peer_at_a = a.table.get(NodeId::new(B_ID)).unwrap();
    let a_peer_at_b = b.table.get(NodeId::new(A_ID)).unwrap();

    // A pings B at t0 = 1_000_000 us.
    a.clock.set(1, 1_000_000);
    a.worker.tick();
    a.worker.send_ping(&b_peer_at_a);

    let sent = a.sender.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].peer, B_ID);
    assert_eq!(sent[0].families, FAMILY_IPV4 | FAMILY_IPV6);
    assert_eq!(b_peer_at_a.snapshot().ping_ts_usec, 1_000_000);

    // B receives the PING, learns A's endpoint and answers PONG on
    // IPv4 only.
    b.clock.set(1, 1_010_000);
    b.worker.tick();
    b.worker
        .handle_inbound(inbound(&sent[0].wire, A_ADDR.parse().unwrap(), 0));

    let live = a_peer_at_b.snapshot();
    assert_eq!(live.addr4.to_string(), A_ADDR);
    assert_ne!(live.status & STATUS_IPV4_PING, 0);
    assert_eq!(live.addr4_update_ts, 1);

    let b_sent = b.sender.take();
    assert_eq!(b_sent.len(), 1);
    assert_eq!(b_sent[0].peer, A_ID);
    assert_eq!(b_sent[0].families, FAMILY_IPV4);
    {
        let (_, env) = parse_envelope(&b_sent[0].wire).unwrap();
        assert_eq!(env.sub_type, SUB_TYPE_PONG);
        let pong = PongFrame::parse_data(&env.data[..PongFrame::DATA_LEN]).unwrap();
        assert_eq!(pong.dst_ts_usec, 1_000_000);
        match pong.attachment {
            Attachment::TunSockAddress(tsa) => assert_eq!(tsa.tun_port4, 3950),
            other => panic!("expected tun attachment, got {other:?}"),
        }
    }

    // A receives the PONG at t1 = 1_050_000 us: latency is measured
    // with the +1 floor, the tunnel port is copied, and PONG2 closes
    // the exchange.
    a.clock.set(1, 1_050_000);
    a.worker.tick();
    a.worker
        .handle_inbound(inbound(&b_sent[0].wire, B_ADDR.parse().unwrap(), 0));

    let live = b_peer_at_a.snapshot();
    assert_eq!(live.addr4_ping_latency_usec, 50_001);
    assert_eq!(live.tun_sin_port4, 3950);
    assert_ne!(live.status & STATUS_IPV4_PONG, 0);

    let a_sent = a.sender.take();
    assert_eq!(a_sent.len(), 1);
    assert_eq!(a_sent[0].families, FAMILY_IPV4);
    {
        let (_, env) = parse_envelope(&a_sent[0].wire).unwrap();
        assert_eq!(env.sub_type, SUB_TYPE_PONG2);
        let pong2 = PongFrame::parse_data(&env.data[..PongFrame::DATA_LEN]).unwrap();
        assert_eq!(pong2.attachment, Attachment::Empty);
    }

    // B receives the PONG2 and does not reply; its latency for A stays
    // unmeasured because B never pinged.
    b.clock.set(1, 1_080_000);
    b.worker.tick();
    b.worker
        .handle_inbound(inbound(&a_sent[0].wire, A_ADDR.parse().unwrap(), 0));

    assert!(b.sender.take().is_empty());
    let live = a_peer_at_b.snapshot();
    assert_ne!(live.status & STATUS_IPV4_PONG, 0);
    assert_eq!(live.addr4_ping_latency_usec, 0);
}

#[test]
fn ring_fed_dispatch_reaches_handler() {
    let (mut a, mut b) = wired_pair(false);
    let b_peer_at_a = a.table.get(NodeId::new(B_ID)).unwrap();

    a.clock.set(1, 1_000_000);
    a.worker.tick();
    a.worker.send_ping(&b_peer_at_a);
    let sent = a.sender.take();

    b.ring
        .push(inbound(&sent[0].wire, A_ADDR.parse().unwrap(), 0))
        .unwrap();
    b.clock.set(1, 1_010_000);
    b.worker.tick();

    // Drained and answered within the same tick.
    assert!(b.ring.is_empty());
    assert_eq!(b.sender.take().len(), 1);
}

#[test]
fn cold_discover_defers_to_index_peer() {
    let identity = SigningIdentity::generate(&mut OsRng);
    let table = Arc::new(PeerTable::new());
    let local = Arc::new(Peer::new(
        NodeId::new(1),
        identity.public_key_bytes(),
        PeerFlags::default(),
    ));
    table.insert(Arc::clone(&local));
    // P: no endpoint at all.
    table.insert(Arc::new(Peer::new(
        NodeId::new(7),
        [0u8; 32],
        PeerFlags::default(),
    )));
    // One index peer with a stable endpoint.
    table.insert(Arc::new(
        Peer::new(NodeId::new(2), [0u8; 32], PeerFlags::IDX)
            .with_endpoint("192.0.2.1:4000".parse().unwrap(), 0),
    ));

    let mut node = make_node(local, identity, table, false);
    node.clock.set(100, 100_000_000);
    node.worker.tick();

    let p = node.table.get(NodeId::new(7)).unwrap().snapshot();
    assert_eq!(p.status, STATUS_UNREACHABLE);
    assert_eq!(p.ping_ts_sec, 100);

    // The index peer was probed; P was not.
    let sent = node.sender.take();
    assert!(sent.iter().all(|f| f.peer != 7));
    assert!(sent.iter().any(|f| f.peer == 2));
}

#[test]
fn address_decay_clears_bits_keeps_endpoint() {
    let identity = SigningIdentity::generate(&mut OsRng);
    let table = Arc::new(PeerTable::new());
    let local = Arc::new(Peer::new(
        NodeId::new(1),
        identity.public_key_bytes(),
        PeerFlags::default(),
    ));
    table.insert(Arc::clone(&local));
    let q = Arc::new(
        Peer::new(NodeId::new(5), [0u8; 32], PeerFlags::default())
            .with_endpoint("198.51.100.5:41000".parse().unwrap(), 0),
    );
    q.with_live(|l| {
        l.status = STATUS_IPV4_PING | STATUS_IPV4_PONG;
        l.addr4_update_ts = 40;
    });
    table.insert(Arc::clone(&q));

    let mut node = make_node(local, identity, table, false);
    // Last heard 60 s ago: over the 55 s decay threshold.
    node.clock.set(100, 100_000_000);
    node.worker.tick();

    let live = q.snapshot();
    assert_eq!(live.status & (STATUS_IPV4_PING | STATUS_IPV4_PONG), 0);
    // The stored endpoint survives so the next PING still tries it.
    assert_eq!(live.addr4.to_string(), "198.51.100.5:41000");
    // And the probe itself still went out this tick.
    assert!(node.sender.take().iter().any(|f| f.peer == 5));
}

#[test]
fn index_peer_never_decays() {
    let identity = SigningIdentity::generate(&mut OsRng);
    let table = Arc::new(PeerTable::new());
    let local = Arc::new(Peer::new(
        NodeId::new(1),
        identity.public_key_bytes(),
        PeerFlags::default(),
    ));
    table.insert(Arc::clone(&local));
    let idx = Arc::new(
        Peer::new(NodeId::new(2), [0u8; 32], PeerFlags::IDX)
            .with_endpoint("192.0.2.1:4000".parse().unwrap(), 0),
    );
    idx.with_live(|l| {
        l.status = STATUS_IPV4_PING | STATUS_IPV4_PONG;
        l.addr4_update_ts = 0;
    });
    table.insert(Arc::clone(&idx));

    let mut node = make_node(local, identity, table, false);
    node.clock.set(1000, 1_000_000_000);
    node.worker.tick();

    let live = idx.snapshot();
    assert_eq!(
        live.status & (STATUS_IPV4_PING | STATUS_IPV4_PONG),
        STATUS_IPV4_PING | STATUS_IPV4_PONG
    );
}

#[test]
fn flipped_signature_dropped_unless_lite() {
    let (mut a, mut b) = wired_pair(false);
    let b_peer_at_a = a.table.get(NodeId::new(B_ID)).unwrap();
    let a_peer_at_b = b.table.get(NodeId::new(A_ID)).unwrap();

    a.clock.set(1, 1_000_000);
    a.worker.tick();
    a.worker.send_ping(&b_peer_at_a);
    let mut wire = a.sender.take().remove(0).wire;
    let last = wire.len() - 1;
    wire[last] ^= 0x01; // flip one bit of the signature

    b.clock.set(1, 1_010_000);
    b.worker.tick();
    let before = a_peer_at_b.snapshot();
    b.worker
        .handle_inbound(inbound(&wire, A_ADDR.parse().unwrap(), 0));

    // Dropped: no state change, no reply.
    assert_eq!(a_peer_at_b.snapshot(), before);
    assert!(b.sender.take().is_empty());

    // The same tampered frame is accepted in lite mode.
    let (_, mut b_lite) = wired_pair(true);
    let a_peer_at_b_lite = b_lite.table.get(NodeId::new(A_ID)).unwrap();
    b_lite.clock.set(1, 1_010_000);
    b_lite.worker.tick();
    b_lite
        .worker
        .handle_inbound(inbound(&wire, A_ADDR.parse().unwrap(), 0));
    assert_ne!(a_peer_at_b_lite.snapshot().status & STATUS_IPV4_PING, 0);
    assert_eq!(b_lite.sender.take().len(), 1);
}

#[test]
fn flip_in_signed_region_also_dropped() {
    let (mut a, mut b) = wired_pair(false);
    let b_peer_at_a = a.table.get(NodeId::new(B_ID)).unwrap();
    let a_peer_at_b = b.table.get(NodeId::new(A_ID)).unwrap();

    a.clock.set(1, 1_000_000);
    a.worker.tick();
    a.worker.send_ping(&b_peer_at_a);
    let mut wire = a.sender.take().remove(0).wire;
    // Flip one bit inside the signed data region (the timestamp).
    wire[ENVELOPE_HEADER_LEN + 8] ^= 0x80;

    b.clock.set(1, 1_010_000);
    b.worker.tick();
    let before = a_peer_at_b.snapshot();
    b.worker
        .handle_inbound(inbound(&wire, A_ADDR.parse().unwrap(), 0));
    assert_eq!(a_peer_at_b.snapshot(), before);
    assert!(b.sender.take().is_empty());
}

#[test]
fn silence_policy_filters_probes_and_replies() {
    let local_identity = SigningIdentity::generate(&mut OsRng);
    let m_identity = SigningIdentity::generate(&mut OsRng);
    let n_identity = SigningIdentity::generate(&mut OsRng);

    let table = Arc::new(PeerTable::new());
    let local = Arc::new(Peer::new(
        NodeId::new(1),
        local_identity.public_key_bytes(),
        PeerFlags::SILENCE,
    ));
    table.insert(Arc::clone(&local));
    let m = Arc::new(
        Peer::new(NodeId::new(20), m_identity.public_key_bytes(), PeerFlags::default())
            .with_endpoint("198.51.100.20:41000".parse().unwrap(), 0),
    );
    let n = Arc::new(
        Peer::new(NodeId::new(30), n_identity.public_key_bytes(), PeerFlags::FWD)
            .with_endpoint("198.51.100.30:41000".parse().unwrap(), 0),
    );
    table.insert(Arc::clone(&m));
    table.insert(Arc::clone(&n));

    let mut node = make_node(local, local_identity, table, false);
    node.clock.set(100, 100_000_000);
    node.worker.tick();

    // Sync probes only the FWD peer.
    let sent = node.sender.take();
    assert!(sent.iter().all(|f| f.peer != 20));
    assert!(sent.iter().any(|f| f.peer == 30));

    // Incoming PING from M is dropped without reply.
    let m_ping = PingFrame::new(NodeId::new(20), NodeId::new(1), 100_000_000);
    let wire = seal(Some(&m_identity), SUB_TYPE_PING, m_ping.encode_data());
    node.worker
        .handle_inbound(inbound(&wire, "198.51.100.20:41000".parse().unwrap(), 0));
    assert!(node.sender.take().is_empty());
    assert_eq!(m.snapshot().status, 0);

    // Incoming PING from N is answered.
    let n_ping = PingFrame::new(NodeId::new(30), NodeId::new(1), 100_000_000);
    let wire = seal(Some(&n_identity), SUB_TYPE_PING, n_ping.encode_data());
    node.worker
        .handle_inbound(inbound(&wire, "198.51.100.30:41000".parse().unwrap(), 0));
    assert_eq!(node.sender.take().len(), 1);
    assert_ne!(n.snapshot().status & STATUS_IPV4_PING, 0);
}

#[test]
fn silenced_peer_is_never_answered() {
    let local_identity = SigningIdentity::generate(&mut OsRng);
    let s_identity = SigningIdentity::generate(&mut OsRng);

    let table = Arc::new(PeerTable::new());
    let local = Arc::new(Peer::new(
        NodeId::new(1),
        local_identity.public_key_bytes(),
        PeerFlags::default(),
    ));
    table.insert(Arc::clone(&local));
    let s = Arc::new(
        Peer::new(NodeId::new(40), s_identity.public_key_bytes(), PeerFlags::SILENCE)
            .with_endpoint("198.51.100.40:41000".parse().unwrap(), 0),
    );
    table.insert(Arc::clone(&s));

    let mut node = make_node(local, local_identity, table, false);
    node.clock.set(100, 100_000_000);
    node.worker.tick();
    assert!(node.sender.take().iter().all(|f| f.peer != 40));

    let ping = PingFrame::new(NodeId::new(40), NodeId::new(1), 100_000_000);
    let wire = seal(Some(&s_identity), SUB_TYPE_PING, ping.encode_data());
    node.worker
        .handle_inbound(inbound(&wire, "198.51.100.40:41000".parse().unwrap(), 0));
    assert!(node.sender.take().is_empty());
    assert_eq!(s.snapshot().status, 0);
}

#[test]
fn own_ping_via_hairpin_nat_is_inert() {
    let (mut a, _b) = wired_pair(true);
    a.clock.set(1, 1_000_000);
    a.worker.tick();

    let looped = PingFrame::new(NodeId::new(A_ID), NodeId::new(B_ID), 1_000_000);
    let wire = seal(None, SUB_TYPE_PING, looped.encode_data());
    let b_before = a.table.get(NodeId::new(B_ID)).unwrap().snapshot();
    let a_before = a.table.get(NodeId::new(A_ID)).unwrap().snapshot();

    a.worker
        .handle_inbound(inbound(&wire, A_ADDR.parse().unwrap(), 0));

    assert!(a.sender.take().is_empty());
    assert_eq!(a.table.get(NodeId::new(B_ID)).unwrap().snapshot(), b_before);
    assert_eq!(a.table.get(NodeId::new(A_ID)).unwrap().snapshot(), a_before);
}

#[test]
fn misrouted_pong_dropped() {
    let (mut a, mut b) = wired_pair(true);
    a.clock.set(1, 1_000_000);
    a.worker.tick();
    b.clock.set(1, 1_000_000);
    b.worker.tick();

    // PONG addressed to some third node arrives at B.
    let pong = PongFrame::pong(
        NodeId::new(A_ID),
        NodeId::new(7777),
        1_000_000,
        999,
        Attachment::Empty,
    );
    let wire = seal(None, SUB_TYPE_PONG, pong.encode_data());
    let before = b.table.get(NodeId::new(A_ID)).unwrap().snapshot();
    b.worker
        .handle_inbound(inbound(&wire, A_ADDR.parse().unwrap(), 0));
    assert!(b.sender.take().is_empty());
    assert_eq!(b.table.get(NodeId::new(A_ID)).unwrap().snapshot(), before);
}

#[test]
fn stale_pong_does_not_update_latency() {
    let (mut a, mut b) = wired_pair(true);
    let b_peer_at_a = a.table.get(NodeId::new(B_ID)).unwrap();

    // First ping at t0, then a second ping supersedes it.
    a.clock.set(1, 1_000_000);
    a.worker.tick();
    a.worker.send_ping(&b_peer_at_a);
    let first = a.sender.take().remove(0).wire;

    a.clock.set(26, 26_000_000);
    a.worker.tick();
    a.worker.send_ping(&b_peer_at_a);
    a.sender.take();

    // B answers the first (stale) ping.
    b.clock.set(26, 26_010_000);
    b.worker.tick();
    b.worker
        .handle_inbound(inbound(&first, A_ADDR.parse().unwrap(), 0));
    let b_reply = b.sender.take().remove(0).wire;

    a.clock.set(26, 26_050_000);
    a.worker.tick();
    a.worker
        .handle_inbound(inbound(&b_reply, B_ADDR.parse().unwrap(), 0));

    // The echo matches the superseded stamp, so latency stays unset;
    // the address bits still refresh.
    let live = b_peer_at_a.snapshot();
    assert_eq!(live.addr4_ping_latency_usec, 0);
    assert_ne!(live.status & STATUS_IPV4_PONG, 0);
}

#[test]
fn repeated_ping_leaves_record_identical() {
    let (mut a, mut b) = wired_pair(false);
    let b_peer_at_a = a.table.get(NodeId::new(B_ID)).unwrap();
    let a_peer_at_b = b.table.get(NodeId::new(A_ID)).unwrap();

    a.clock.set(1, 1_000_000);
    a.worker.tick();
    a.worker.send_ping(&b_peer_at_a);
    let wire = a.sender.take().remove(0).wire;

    b.clock.set(1, 1_010_000);
    b.worker.tick();
    let env = inbound(&wire, A_ADDR.parse().unwrap(), 0);
    b.worker.handle_inbound(env.clone());
    let after_first = a_peer_at_b.snapshot();
    b.worker.handle_inbound(env);
    let after_second = a_peer_at_b.snapshot();

    assert_eq!(after_first, after_second);
    // Both receipts were answered; address learning itself is
    // idempotent.
    assert_eq!(b.sender.take().len(), 2);
}

#[test]
fn ping_interval_throttles_sync() {
    let identity = SigningIdentity::generate(&mut OsRng);
    let table = Arc::new(PeerTable::new());
    let local = Arc::new(Peer::new(
        NodeId::new(1),
        identity.public_key_bytes(),
        PeerFlags::default(),
    ));
    table.insert(Arc::clone(&local));
    table.insert(Arc::new(
        Peer::new(NodeId::new(5), [0u8; 32], PeerFlags::default())
            .with_endpoint("198.51.100.5:41000".parse().unwrap(), 0),
    ));

    let mut node = make_node(local, identity, table, false);
    node.clock.set(100, 100_000_000);
    node.worker.tick();
    assert_eq!(node.sender.take().len(), 1);

    // 11 s later the sync runs again but the 25 s ping gate holds.
    node.clock.set(111, 111_000_000);
    node.worker.tick();
    assert!(node.sender.take().is_empty());

    // Past the gate, the peer is probed again.
    node.clock.set(126, 126_000_000);
    node.worker.tick();
    assert_eq!(node.sender.take().len(), 1);
}
