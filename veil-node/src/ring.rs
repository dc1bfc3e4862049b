//! Bounded single-producer / single-consumer ingress ring.
//!
//! The external receive thread pushes decoded envelopes; the node
//! worker pops them in batches. Both operations are non-blocking: push
//! on a full ring hands the envelope back to the producer (drop policy
//! is the producer's call), pop on an empty ring returns `None`. The
//! slot array is allocated once at construction; steady state does not
//! allocate.

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A decoded inbound control envelope.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Outer payload type.
    pub payload_type: u8,
    /// Sub-type within the payload type.
    pub sub_type: u8,
    /// Envelope data region.
    pub data: Bytes,
    /// Source address of the datagram.
    pub src: SocketAddr,
    /// Index of the bound socket the datagram arrived on.
    pub socket_idx: u8,
}

impl Inbound {
    /// Decode a raw datagram into an envelope ready for the ring.
    /// Returns `None` when the datagram does not carry a complete
    /// envelope; the ingress thread drops such input.
    pub fn from_datagram(datagram: &[u8], src: SocketAddr, socket_idx: u8) -> Option<Self> {
        let (_, env) = veil_wire::parse_envelope(datagram).ok()?;
        Some(Self {
            payload_type: env.payload_type,
            sub_type: env.sub_type,
            data: Bytes::copy_from_slice(env.data),
            src,
            socket_idx,
        })
    }
}

/// Fixed-capacity SPSC ring of [`Inbound`] envelopes.
///
/// Indices grow monotonically; the slot is `index & (capacity - 1)`,
/// so the capacity must be a power of two. The producer owns `tail`,
/// the consumer owns `head`; each publishes with release ordering and
/// observes the other with acquire ordering. The per-slot lock is
/// uncontended in correct SPSC use.
pub struct FrameRing {
    slots: Box<[Mutex<Option<Inbound>>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl FrameRing {
    /// Create a ring with the given capacity (rounded up to a power of
    /// two, minimum 2).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let slots = (0..capacity)
            .map(|_| Mutex::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Slot count.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Envelopes currently queued.
    pub fn len(&self) -> usize {
        self.tail
            .load(Ordering::Acquire)
            .wrapping_sub(self.head.load(Ordering::Acquire))
    }

    /// Whether the ring is drained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Producer side: enqueue an envelope. On a full ring the envelope
    /// comes back to the caller.
    pub fn push(&self, inbound: Inbound) -> Result<(), Inbound> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.capacity() {
            return Err(inbound);
        }
        if let Ok(mut slot) = self.slots[tail & self.mask].lock() {
            *slot = Some(inbound);
        } else {
            return Err(inbound);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Consumer side: dequeue the oldest envelope, if any.
    pub fn pop(&self) -> Option<Inbound> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let taken = self.slots[head & self.mask].lock().ok()?.take();
        self.head.store(head.wrapping_add(1), Ordering::Release);
        taken
    }
}
