//! PING / PONG / PONG2 frame codec.
//!
//! Both frames are a fixed-size data region followed by a detached
//! 64-byte Ed25519 signature over exactly that region. PONG differs
//! from PING only by the extra `dst_ts_usec` echo immediately after
//! `src_ts_usec`; every later field shifts by eight bytes. The
//! `dst_addr*`/`dst_port*` and `crypto_seed` fields are reserved:
//! zero on encode, ignored on decode.

use crate::attachment::{Attachment, ATTACHMENT_REGION_LEN};
use crate::{Error, Result};
use nom::{
    bytes::complete::take,
    number::complete::{be_u32, be_u64},
    IResult,
};
use veil_core::NodeId;

/// Detached signature length appended to each data region.
pub const SIGNATURE_LEN: usize = 64;

/// Length of the human-readable trace tag, NUL padded.
pub const TEXT_LEN: usize = 32;

/// Reserved destination-address block: addr4(4) port4(2) addr6(16) port6(2).
const RESERVED_ADDR_LEN: usize = 24;

/// Reserved seed field length.
const CRYPTO_SEED_LEN: usize = 64;

/// Split a wire frame into its signed data region and signature.
pub fn split_signed_region(wire: &[u8], data_len: usize) -> Result<(&[u8], &[u8; SIGNATURE_LEN])> {
    let need = data_len + SIGNATURE_LEN;
    if wire.len() < need {
        return Err(Error::Truncated {
            need,
            got: wire.len(),
        });
    }
    let sig: &[u8; SIGNATURE_LEN] = wire[data_len..need]
        .try_into()
        .map_err(|_| Error::InvalidFrame("signature range".into()))?;
    Ok((&wire[..data_len], sig))
}

/// Render the `"<src> --VERB-> <dst>"` trace tag, truncated and
/// NUL-padded to [`TEXT_LEN`].
fn trace_tag(src: NodeId, verb: &str, dst: NodeId) -> [u8; TEXT_LEN] {
    let tag = format!("{src} --{verb}-> {dst}");
    let mut out = [0u8; TEXT_LEN];
    let n = tag.len().min(TEXT_LEN - 1);
    out[..n].copy_from_slice(&tag.as_bytes()[..n]);
    out
}

fn text_to_string(text: &[u8; TEXT_LEN]) -> String {
    let end = text.iter().position(|&b| b == 0).unwrap_or(TEXT_LEN);
    String::from_utf8_lossy(&text[..end]).into_owned()
}

/// Hole-punching probe frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingFrame {
    /// Sender identity.
    pub src_id: NodeId,
    /// Intended receiver identity.
    pub dst_id: NodeId,
    /// Sender's send timestamp in microseconds; echoed back by PONG
    /// and used as the latency nonce.
    pub src_ts_usec: u64,
    /// Trace tag.
    pub text: [u8; TEXT_LEN],
}

impl PingFrame {
    /// Signed data-region length.
    pub const DATA_LEN: usize = 328;
    /// Data region plus detached signature.
    pub const WIRE_LEN: usize = Self::DATA_LEN + SIGNATURE_LEN;

    /// Build a PING with the standard trace tag.
    pub fn new(src_id: NodeId, dst_id: NodeId, src_ts_usec: u64) -> Self {
        Self {
            src_id,
            dst_id,
            src_ts_usec,
            text: trace_tag(src_id, "PING", dst_id),
        }
    }

    /// Encode the signed data region.
    pub fn encode_data(&self) -> Vec<u8> {
        let mut data = vec![0u8; Self::DATA_LEN];
        data[0..4].copy_from_slice(&self.src_id.get().to_be_bytes());
        data[4..8].copy_from_slice(&self.dst_id.get().to_be_bytes());
        data[8..16].copy_from_slice(&self.src_ts_usec.to_be_bytes());
        // 16..104 reserved (dst addr block + crypto seed), left zero.
        // 104..296 attachment region, unused in PING.
        data[296..328].copy_from_slice(&self.text);
        data
    }

    /// Parse a signed data region.
    pub fn parse_data(data: &[u8]) -> Result<Self> {
        let (_, frame) = parse_ping(data).map_err(|_| Error::Truncated {
            need: Self::DATA_LEN,
            got: data.len(),
        })?;
        Ok(frame)
    }

    /// Trace tag as a string, for logging.
    pub fn text_str(&self) -> String {
        text_to_string(&self.text)
    }
}

fn parse_ping(input: &[u8]) -> IResult<&[u8], PingFrame> {
    let (input, src) = be_u32(input)?;
    let (input, dst) = be_u32(input)?;
    let (input, src_ts_usec) = be_u64(input)?;
    let (input, _reserved) = take(RESERVED_ADDR_LEN)(input)?;
    let (input, _seed) = take(CRYPTO_SEED_LEN)(input)?;
    let (input, _attachment) = take(ATTACHMENT_REGION_LEN)(input)?;
    let (input, text) = take(TEXT_LEN)(input)?;
    let mut tag = [0u8; TEXT_LEN];
    tag.copy_from_slice(text);
    Ok((
        input,
        PingFrame {
            src_id: NodeId::new(src),
            dst_id: NodeId::new(dst),
            src_ts_usec,
            text: tag,
        },
    ))
}

/// Probe response frame, also used for the closing PONG2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongFrame {
    /// Sender identity.
    pub src_id: NodeId,
    /// Intended receiver identity.
    pub dst_id: NodeId,
    /// Sender's send timestamp in microseconds.
    pub src_ts_usec: u64,
    /// Echo of the timestamp carried by the PING being answered.
    pub dst_ts_usec: u64,
    /// Attachment region content.
    pub attachment: Attachment,
    /// Trace tag.
    pub text: [u8; TEXT_LEN],
}

impl PongFrame {
    /// Signed data-region length.
    pub const DATA_LEN: usize = 336;
    /// Data region plus detached signature.
    pub const WIRE_LEN: usize = Self::DATA_LEN + SIGNATURE_LEN;

    /// Build a PONG answering a PING that carried `echo_ts_usec`.
    pub fn pong(
        src_id: NodeId,
        dst_id: NodeId,
        src_ts_usec: u64,
        echo_ts_usec: u64,
        attachment: Attachment,
    ) -> Self {
        Self {
            src_id,
            dst_id,
            src_ts_usec,
            dst_ts_usec: echo_ts_usec,
            attachment,
            text: trace_tag(src_id, "PONG", dst_id),
        }
    }

    /// Build the closing PONG2. It carries no attachment and stamps
    /// `dst_ts_usec` with its own send time, so it can never match a
    /// recorded ping nonce on the receiver.
    pub fn pong2(src_id: NodeId, dst_id: NodeId, src_ts_usec: u64) -> Self {
        Self {
            src_id,
            dst_id,
            src_ts_usec,
            dst_ts_usec: src_ts_usec,
            attachment: Attachment::Empty,
            text: trace_tag(src_id, "PONG2", dst_id),
        }
    }

    /// Encode the signed data region.
    pub fn encode_data(&self) -> Vec<u8> {
        let mut data = vec![0u8; Self::DATA_LEN];
        data[0..4].copy_from_slice(&self.src_id.get().to_be_bytes());
        data[4..8].copy_from_slice(&self.dst_id.get().to_be_bytes());
        data[8..16].copy_from_slice(&self.src_ts_usec.to_be_bytes());
        data[16..24].copy_from_slice(&self.dst_ts_usec.to_be_bytes());
        // 24..112 reserved (dst addr block + crypto seed), left zero.
        self.attachment.encode_into(&mut data[112..304]);
        data[304..336].copy_from_slice(&self.text);
        data
    }

    /// Parse a signed data region.
    pub fn parse_data(data: &[u8]) -> Result<Self> {
        let (_, frame) = parse_pong(data).map_err(|_| Error::Truncated {
            need: Self::DATA_LEN,
            got: data.len(),
        })?;
        Ok(frame)
    }

    /// Trace tag as a string, for logging.
    pub fn text_str(&self) -> String {
        text_to_string(&self.text)
    }
}

fn parse_pong(input: &[u8]) -> IResult<&[u8], PongFrame> {
    let (input, src) = be_u32(input)?;
    let (input, dst) = be_u32(input)?;
    let (input, src_ts_usec) = be_u64(input)?;
    let (input, dst_ts_usec) = be_u64(input)?;
    let (input, _reserved) = take(RESERVED_ADDR_LEN)(input)?;
    let (input, _seed) = take(CRYPTO_SEED_LEN)(input)?;
    let (input, attachment_region) = take(ATTACHMENT_REGION_LEN)(input)?;
    let (input, text) = take(TEXT_LEN)(input)?;
    // A garbled attachment never fails the frame; it degrades to Empty.
    let attachment = Attachment::parse(attachment_region).unwrap_or(Attachment::Empty);
    let mut tag = [0u8; TEXT_LEN];
    tag.copy_from_slice(text);
    Ok((
        input,
        PongFrame {
            src_id: NodeId::new(src),
            dst_id: NodeId::new(dst),
            src_ts_usec,
            dst_ts_usec,
            attachment,
            text: tag,
        },
    ))
}
