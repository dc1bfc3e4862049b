//! Outer `payload16` envelope.
//!
//! Wire layout (4-byte header, network byte order):
//! - Byte 0: payload type
//! - Byte 1: sub-type
//! - Bytes 2-3: data length (u16 BE)
//! - Bytes 4..: data
//!
//! The same shape is reused for the inner attachment envelope carried
//! inside PONG frames.

use bytes::BufMut;
use nom::{
    bytes::complete::take,
    number::complete::{be_u16, u8 as nom_u8},
    IResult,
};

/// Size of the envelope header preceding the data bytes.
pub const ENVELOPE_HEADER_LEN: usize = 4;

/// A decoded envelope borrowing its data from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    /// Payload type (routing key of the outer dispatcher).
    pub payload_type: u8,
    /// Sub-type within the payload type.
    pub sub_type: u8,
    /// Data region, exactly `data_len` bytes.
    pub data: &'a [u8],
}

/// Parse an envelope from the front of `input`.
///
/// Returns the remaining bytes after the envelope, so several envelopes
/// can be packed back to back.
pub fn parse_envelope(input: &[u8]) -> IResult<&[u8], Envelope<'_>> {
    let (input, payload_type) = nom_u8(input)?;
    let (input, sub_type) = nom_u8(input)?;
    let (input, data_len) = be_u16(input)?;
    let (input, data) = take(data_len)(input)?;
    Ok((
        input,
        Envelope {
            payload_type,
            sub_type,
            data,
        },
    ))
}

/// Append an envelope to `out`.
pub fn encode_envelope(payload_type: u8, sub_type: u8, data: &[u8], out: &mut Vec<u8>) {
    debug_assert!(data.len() <= u16::MAX as usize);
    out.reserve(ENVELOPE_HEADER_LEN + data.len());
    out.put_u8(payload_type);
    out.put_u8(sub_type);
    out.put_u16(data.len() as u16);
    out.put_slice(data);
}
