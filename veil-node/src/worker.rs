//! The node worker: tick loop, ingress dispatcher, handshake engine,
//! sync scheduler and key rotation.
//!
//! One worker owns all mutation of peer liveness state. The external
//! receive thread only pushes into the ingress ring; dispatch,
//! handshake replies, scheduled probes, address decay and key rebuilds
//! all happen on the tick loop. Every ingress-path failure is a logged
//! drop, never an error: the next tick retries implicitly.

use crate::clock::{Clock, SystemClock};
use crate::peer::{
    Family, Peer, PeerFlags, PeerTable, STATUS_IPV4_PING, STATUS_IPV4_PONG, STATUS_IPV6_PING,
    STATUS_IPV6_PONG, STATUS_UNREACHABLE,
};
use crate::ring::{FrameRing, Inbound};
use crate::send::{family_bit_of, NodeSender, FAMILY_IPV4, FAMILY_IPV6};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use veil_crypto::{derive_peer_key, verify_region, SigningIdentity, TimeSeed};
use veil_wire::{
    encode_envelope, split_signed_region, Attachment, PingFrame, PongFrame, TunSockAddress,
    ENVELOPE_HEADER_LEN, PAYLOAD_TYPE_NODE, SIGNATURE_LEN, SUB_TYPE_PING, SUB_TYPE_PONG,
    SUB_TYPE_PONG2,
};

/// Seconds between sync-scheduler runs.
pub const SYNC_INTERVAL_SEC: u64 = 10;

/// Seconds between outbound PINGs to the same peer.
pub const PING_INTERVAL_SEC: u64 = 25;

/// Seconds of silence after which a non-index peer's family liveness
/// bits decay. Greater than twice the ping interval, so one lost PING
/// cannot decay an address.
pub const ADDR_UPDATE_INTERVAL_SEC: u64 = 55;

/// Upper bound on envelopes drained per tick; bounds sync latency
/// under an ingress burst.
pub const INGRESS_BATCH: usize = 1024;

/// Inter-tick sleep.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// The liveness core. Construct with [`NodeWorker::new`], adjust with
/// the `with_*` builders, then either drive ticks manually or hand the
/// worker to the runtime with [`NodeWorker::start`].
pub struct NodeWorker {
    local: Arc<Peer>,
    identity: SigningIdentity,
    lite_mode: bool,
    table: Arc<PeerTable>,
    ring: Arc<FrameRing>,
    sender: Arc<dyn NodeSender>,
    clock: Arc<dyn Clock>,
    seed: TimeSeed,
    tun_address: TunSockAddress,
    now_sec: u64,
    now_usec: u64,
    last_sync_ts_sec: u64,
}

impl NodeWorker {
    /// Create a worker with the system clock, signing enabled, no
    /// advertised tunnel address and a zero-passcode seed. Override
    /// with the `with_*` builders.
    pub fn new(
        local: Arc<Peer>,
        identity: SigningIdentity,
        table: Arc<PeerTable>,
        ring: Arc<FrameRing>,
        sender: Arc<dyn NodeSender>,
    ) -> Self {
        Self {
            local,
            identity,
            lite_mode: false,
            table,
            ring,
            sender,
            clock: Arc::new(SystemClock),
            seed: TimeSeed::new([0u8; 32], 3600),
            tun_address: TunSockAddress::zero(),
            now_sec: 0,
            now_usec: 0,
            last_sync_ts_sec: 0,
        }
    }

    /// Build a worker and its ingress ring from a loaded
    /// configuration: ring capacity, lite mode and the seed rotation
    /// interval come from the config, the seed passcode is handed in
    /// separately because it never lives in a config file.
    pub fn from_config(
        cfg: &veil_core::NodeConfig,
        local: Arc<Peer>,
        identity: SigningIdentity,
        table: Arc<PeerTable>,
        sender: Arc<dyn NodeSender>,
        passcode: [u8; 32],
    ) -> (Self, Arc<FrameRing>) {
        let ring = Arc::new(FrameRing::with_capacity(cfg.queue_length));
        let worker = Self::new(local, identity, table, Arc::clone(&ring), sender)
            .with_lite_mode(cfg.lite_mode)
            .with_seed(TimeSeed::new(passcode, cfg.seed_interval_secs));
        (worker, ring)
    }

    /// Replace the clock source (tests drive a manual clock).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Disable signing and verification of control frames.
    pub fn with_lite_mode(mut self, lite_mode: bool) -> Self {
        self.lite_mode = lite_mode;
        self
    }

    /// Install the shared-passcode time seed.
    pub fn with_seed(mut self, seed: TimeSeed) -> Self {
        self.seed = seed;
        self
    }

    /// Advertise this inner-tunnel address in PONG attachments.
    pub fn with_tun_address(mut self, tun_address: TunSockAddress) -> Self {
        self.tun_address = tun_address;
        self
    }

    /// One scheduler iteration: refresh the clock, rotate keys, drain
    /// the ingress ring, and run the sync scheduler when due.
    pub fn tick(&mut self) {
        let (sec, usec) = self.clock.now();
        self.now_sec = sec;
        self.now_usec = usec;

        self.rotate_keys();
        self.drain_ingress();

        if self.now_sec.saturating_sub(self.last_sync_ts_sec) > SYNC_INTERVAL_SEC {
            self.sync_peers();
            self.last_sync_ts_sec = self.now_sec;
        }
    }

    fn drain_ingress(&self) {
        for _ in 0..INGRESS_BATCH {
            match self.ring.pop() {
                Some(inbound) => self.handle_inbound(inbound),
                None => break,
            }
        }
    }

    /// Route one decoded envelope. Anything that is not node liveness
    /// traffic is dropped.
    pub fn handle_inbound(&self, inbound: Inbound) {
        if inbound.payload_type != PAYLOAD_TYPE_NODE {
            debug!(payload_type = inbound.payload_type, "dropping non-node payload");
            return;
        }
        match inbound.sub_type {
            SUB_TYPE_PING => self.handle_ping(&inbound),
            SUB_TYPE_PONG | SUB_TYPE_PONG2 => self.handle_pong(&inbound),
            other => debug!(sub_type = other, "dropping unknown node sub-type"),
        }
    }

    fn handle_ping(&self, inbound: &Inbound) {
        let (data, sig) = match split_signed_region(&inbound.data, PingFrame::DATA_LEN) {
            Ok(parts) => parts,
            Err(e) => {
                debug!(error = %e, "dropping malformed ping");
                return;
            }
        };
        let frame = match PingFrame::parse_data(data) {
            Ok(f) => f,
            Err(e) => {
                debug!(error = %e, "dropping malformed ping");
                return;
            }
        };

        if frame.src_id == self.local.id {
            // Own PING hairpinned back through the NAT.
            debug!(src = %frame.src_id, dst = %frame.dst_id, "own ping looped back");
            return;
        }
        let Some(peer) = self.table.get(frame.src_id) else {
            debug!(src = %frame.src_id, "ping from unknown peer");
            return;
        };
        if peer.flags.contains(PeerFlags::SILENCE) {
            return;
        }
        if self.local.flags.contains(PeerFlags::SILENCE) && !peer.flags.contains(PeerFlags::FWD) {
            return;
        }
        if !self.lite_mode && !verify_region(&peer.public_key, data, sig) {
            warn!(src = %frame.src_id, addr = %inbound.src, "invalid ping signature");
            return;
        }

        let family = Family::of(&inbound.src);
        let status_bit = match family {
            Family::V4 => STATUS_IPV4_PING,
            Family::V6 => STATUS_IPV6_PING,
        };
        peer.learn_endpoint(inbound.src, inbound.socket_idx, status_bit, self.now_sec);
        debug!(
            src = %frame.src_id,
            dst = %frame.dst_id,
            addr = %inbound.src,
            socket_idx = inbound.socket_idx,
            src_ts = frame.src_ts_usec,
            "ping received"
        );

        // Answer on the family the PING arrived on, advertising the
        // local inner-tunnel socket address.
        let pong = PongFrame::pong(
            self.local.id,
            peer.id,
            self.now_usec,
            frame.src_ts_usec,
            Attachment::TunSockAddress(self.tun_address),
        );
        let wire = self.seal(SUB_TYPE_PONG, pong.encode_data());
        self.sender
            .send_to_node(&peer, &wire, family_bit_of(&inbound.src));
    }

    fn handle_pong(&self, inbound: &Inbound) {
        let (data, sig) = match split_signed_region(&inbound.data, PongFrame::DATA_LEN) {
            Ok(parts) => parts,
            Err(e) => {
                debug!(error = %e, "dropping malformed pong");
                return;
            }
        };
        let frame = match PongFrame::parse_data(data) {
            Ok(f) => f,
            Err(e) => {
                debug!(error = %e, "dropping malformed pong");
                return;
            }
        };

        if frame.dst_id != self.local.id {
            debug!(dst = %frame.dst_id, local = %self.local.id, "misrouted pong");
            return;
        }
        let Some(peer) = self.table.get(frame.src_id) else {
            debug!(src = %frame.src_id, "pong from unknown peer");
            return;
        };
        if peer.flags.contains(PeerFlags::SILENCE) {
            return;
        }
        if self.local.flags.contains(PeerFlags::SILENCE) && !peer.flags.contains(PeerFlags::FWD) {
            return;
        }
        if !self.lite_mode && !verify_region(&peer.public_key, data, sig) {
            warn!(src = %frame.src_id, addr = %inbound.src, "invalid pong signature");
            return;
        }

        let family = Family::of(&inbound.src);
        let status_bit = match family {
            Family::V4 => STATUS_IPV4_PONG,
            Family::V6 => STATUS_IPV6_PONG,
        };
        peer.learn_endpoint(inbound.src, inbound.socket_idx, status_bit, self.now_sec);

        // Only a PONG echoing the most recent PING stamp measures
        // latency; anything else was superseded.
        let matched = peer.note_latency(family, frame.dst_ts_usec, self.now_usec);
        debug!(
            src = %frame.src_id,
            addr = %inbound.src,
            socket_idx = inbound.socket_idx,
            dst_ts = frame.dst_ts_usec,
            latency_matched = matched,
            "pong received"
        );

        if let Attachment::TunSockAddress(tsa) = frame.attachment {
            peer.set_tun_port4(tsa.tun_port4);
        }

        if inbound.sub_type == SUB_TYPE_PONG2 {
            // Third leg observed; the exchange is complete.
            debug!(src = %frame.src_id, "handshake closed");
            return;
        }

        // Close the handshake so the peer also sees a message arriving
        // after its address was learned.
        let pong2 = PongFrame::pong2(self.local.id, peer.id, self.now_usec);
        let wire = self.seal(SUB_TYPE_PONG2, pong2.encode_data());
        self.sender
            .send_to_node(&peer, &wire, family_bit_of(&inbound.src));
    }

    /// Probe a peer on every family with a known endpoint and record
    /// the ping stamp. No-op while both endpoints are unknown.
    pub fn send_ping(&self, peer: &Peer) {
        let live = peer.snapshot();
        if live.addr4_is_any() && live.addr6_is_any() {
            return;
        }

        let frame = PingFrame::new(self.local.id, peer.id, self.now_usec);
        let wire = self.seal(SUB_TYPE_PING, frame.encode_data());
        debug!(
            src = %self.local.id,
            dst = %peer.id,
            addr4 = %live.addr4,
            addr6 = %live.addr6,
            last_ping_ts = live.ping_ts_sec,
            "ping"
        );
        self.sender
            .send_to_node(peer, &wire, FAMILY_IPV4 | FAMILY_IPV6);
        peer.record_ping(self.now_sec, self.now_usec);
    }

    /// Walk the peer table: probe peers whose ping interval elapsed,
    /// defer endpoint-less peers to the index lookup, and decay family
    /// liveness bits that went unheard past the update interval.
    pub fn sync_peers(&self) {
        let peers = self.table.iter_snapshot();
        if peers.is_empty() {
            return;
        }
        let local_silence = self.local.flags.contains(PeerFlags::SILENCE);

        for peer in peers {
            if peer.id == self.local.id {
                continue;
            }
            if peer.flags.contains(PeerFlags::SILENCE) {
                continue;
            }
            if local_silence && !peer.flags.contains(PeerFlags::FWD) {
                continue;
            }

            let live = peer.snapshot();
            if self.now_sec.saturating_sub(live.ping_ts_sec) < PING_INTERVAL_SEC {
                continue;
            }

            if live.addr4_is_any() && live.addr6_is_any() && self.table.has_index_peer() {
                // Nothing to probe; the index-query worker picks this
                // up. Stamping ping_ts throttles re-entry.
                peer.with_live(|l| {
                    l.status = STATUS_UNREACHABLE;
                    l.ping_ts_sec = self.now_sec;
                });
                debug!(peer = %peer.id, "no endpoint known, deferring to index lookup");
                continue;
            }

            self.send_ping(&peer);

            // Index peers have stable configured endpoints and never decay.
            if !peer.flags.contains(PeerFlags::IDX) {
                if self.now_sec.saturating_sub(live.addr4_update_ts) > ADDR_UPDATE_INTERVAL_SEC {
                    peer.with_live(|l| l.status &= !(STATUS_IPV4_PING | STATUS_IPV4_PONG));
                }
                if self.now_sec.saturating_sub(live.addr6_update_ts) > ADDR_UPDATE_INTERVAL_SEC {
                    peer.with_live(|l| l.status &= !(STATUS_IPV6_PING | STATUS_IPV6_PONG));
                }
            }
        }
    }

    /// Advance the time seed when its epoch rolled over and rebuild
    /// every per-peer symmetric key from the new seed.
    pub fn rotate_keys(&mut self) {
        if self.table.is_empty() {
            return;
        }
        if !self.seed.needs_refresh(self.now_sec) {
            return;
        }
        self.seed.refresh(self.now_sec);

        let mut rebuilt = 0usize;
        for peer in self.table.iter_snapshot() {
            if peer.id == self.local.id {
                continue;
            }
            peer.set_crypto_key(derive_peer_key(self.seed.seed(), self.local.id, peer.id));
            rebuilt += 1;
        }
        debug!(epoch = self.seed.epoch(), rebuilt, "time seed advanced, peer keys rebuilt");
    }

    fn seal(&self, sub_type: u8, data: Vec<u8>) -> Vec<u8> {
        let sig = if self.lite_mode {
            [0u8; SIGNATURE_LEN]
        } else {
            self.identity.sign_region(&data)
        };
        let mut body = data;
        body.extend_from_slice(&sig);
        let mut wire = Vec::with_capacity(ENVELOPE_HEADER_LEN + body.len());
        encode_envelope(PAYLOAD_TYPE_NODE, sub_type, &body, &mut wire);
        wire
    }

    /// Spawn the tick loop onto the runtime. The returned handle is
    /// the worker's stop/notify surface.
    pub fn start(mut self) -> WorkerHandle {
        let stop = Arc::new(Notify::new());
        let wake = Arc::new(Notify::new());
        let running = Arc::new(AtomicBool::new(true));

        let stop_rx = Arc::clone(&stop);
        let wake_rx = Arc::clone(&wake);
        let running_rx = Arc::clone(&running);

        let task = tokio::spawn(async move {
            info!(local = %self.local.id, "node worker started");
            while running_rx.load(Ordering::Acquire) {
                self.tick();
                tokio::select! {
                    biased;
                    _ = stop_rx.notified() => break,
                    _ = wake_rx.notified() => {}
                    _ = sleep(TICK_INTERVAL) => {}
                }
            }
            info!("node worker stopped");
        });

        WorkerHandle {
            stop,
            wake,
            running,
            task,
        }
    }
}

/// Stop/notify surface of a running worker.
pub struct WorkerHandle {
    stop: Arc<Notify>,
    wake: Arc<Notify>,
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Interrupt the inter-tick sleep so the next tick runs promptly.
    pub fn notify(&self) {
        self.wake.notify_one();
    }

    /// Graceful stop: clear the run flag, interrupt the sleep, wait
    /// for the loop to exit.
    pub async fn stop(self) {
        self.running.store(false, Ordering::Release);
        self.stop.notify_waiters();
        let _ = self.task.await;
    }
}
