#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! veil control-plane wire codec.
//!
//! Every control message travels inside an outer [`envelope`] of
//! `{type, sub_type, data_len, data}`. The node sub-protocol carries
//! the PING/PONG/PONG2 hole-punching frames defined in
//! [`node_frame`], each a fixed-size data region followed by a
//! detached Ed25519 signature over exactly that region. Multi-byte
//! integers are network byte order throughout; layouts are defined by
//! explicit byte offsets, never by struct memory tricks.

pub mod attachment;
pub mod envelope;
pub mod node_frame;

pub use attachment::{
    Attachment, TunSockAddress, ATTACHMENT_REGION_LEN, ATTACHMENT_TUN_EMPTY,
    ATTACHMENT_TUN_SOCKADDRESS,
};
pub use envelope::{encode_envelope, parse_envelope, Envelope, ENVELOPE_HEADER_LEN};
pub use node_frame::{split_signed_region, PingFrame, PongFrame, SIGNATURE_LEN, TEXT_LEN};

/// Payload type of all node liveness traffic in the outer envelope.
pub const PAYLOAD_TYPE_NODE: u8 = 0x02;

/// Sub-type: hole-punching probe, opens the three-way handshake.
pub const SUB_TYPE_PING: u8 = 0x1;
/// Sub-type: probe response echoing the initiator's timestamp.
pub const SUB_TYPE_PONG: u8 = 0x2;
/// Sub-type: handshake close, never answered.
pub const SUB_TYPE_PONG2: u8 = 0x3;

/// Crate result alias.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error taxonomy for the wire codec.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Input shorter than the layout demands.
    #[error("truncated: need {need} bytes, got {got}")]
    Truncated {
        /// Bytes the layout requires.
        need: usize,
        /// Bytes actually present.
        got: usize,
    },
    /// Structurally invalid frame.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
