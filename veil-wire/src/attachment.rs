//! PONG attachment: the sender's inner-tunnel socket address.
//!
//! The 192-byte attachment region of a PONG frame carries an inner
//! envelope whose body, for type `TUN_SOCKADDRESS`, is the 28-byte
//! layout below. PONG2 re-asserts the region as `TUN_EMPTY` with a
//! zero-length body.

use crate::envelope::{encode_envelope, parse_envelope};
use crate::{Error, Result};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Size of the fixed attachment region inside PONG frames.
pub const ATTACHMENT_REGION_LEN: usize = 192;

/// Attachment type: nothing attached.
pub const ATTACHMENT_TUN_EMPTY: u8 = 0x0;
/// Attachment type: inner-tunnel socket address follows.
pub const ATTACHMENT_TUN_SOCKADDRESS: u8 = 0x1;

/// Body length of a `TUN_SOCKADDRESS` attachment.
pub const TUN_SOCKADDRESS_LEN: usize = 28;

/// Inner-tunnel socket address advertised by a peer.
///
/// Byte layout: addr4 (4), port4 (2), addr6 (16), port6 (2),
/// es_port4 (2), es_port6 (2); ports big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunSockAddress {
    /// IPv4 tunnel address.
    pub tun_addr4: Ipv4Addr,
    /// IPv4 tunnel port.
    pub tun_port4: u16,
    /// IPv6 tunnel address.
    pub tun_addr6: Ipv6Addr,
    /// IPv6 tunnel port.
    pub tun_port6: u16,
    /// Extra service port, IPv4.
    pub es_port4: u16,
    /// Extra service port, IPv6.
    pub es_port6: u16,
}

impl TunSockAddress {
    /// An all-zero address, used when the local tunnel is not yet up.
    pub fn zero() -> Self {
        Self {
            tun_addr4: Ipv4Addr::UNSPECIFIED,
            tun_port4: 0,
            tun_addr6: Ipv6Addr::UNSPECIFIED,
            tun_port6: 0,
            es_port4: 0,
            es_port6: 0,
        }
    }

    fn encode_body(&self) -> [u8; TUN_SOCKADDRESS_LEN] {
        let mut body = [0u8; TUN_SOCKADDRESS_LEN];
        body[0..4].copy_from_slice(&self.tun_addr4.octets());
        body[4..6].copy_from_slice(&self.tun_port4.to_be_bytes());
        body[6..22].copy_from_slice(&self.tun_addr6.octets());
        body[22..24].copy_from_slice(&self.tun_port6.to_be_bytes());
        body[24..26].copy_from_slice(&self.es_port4.to_be_bytes());
        body[26..28].copy_from_slice(&self.es_port6.to_be_bytes());
        body
    }

    fn parse_body(body: &[u8]) -> Result<Self> {
        if body.len() < TUN_SOCKADDRESS_LEN {
            return Err(Error::Truncated {
                need: TUN_SOCKADDRESS_LEN,
                got: body.len(),
            });
        }
        let mut addr4 = [0u8; 4];
        addr4.copy_from_slice(&body[0..4]);
        let mut addr6 = [0u8; 16];
        addr6.copy_from_slice(&body[6..22]);
        Ok(Self {
            tun_addr4: Ipv4Addr::from(addr4),
            tun_port4: u16::from_be_bytes([body[4], body[5]]),
            tun_addr6: Ipv6Addr::from(addr6),
            tun_port6: u16::from_be_bytes([body[22], body[23]]),
            es_port4: u16::from_be_bytes([body[24], body[25]]),
            es_port6: u16::from_be_bytes([body[26], body[27]]),
        })
    }
}

/// Decoded attachment region of a PONG/PONG2 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// No attachment.
    Empty,
    /// Sender's inner-tunnel socket address.
    TunSockAddress(TunSockAddress),
}

impl Attachment {
    /// Encode into a fixed attachment region of `region.len()` bytes;
    /// unused tail bytes stay zero.
    pub fn encode_into(&self, region: &mut [u8]) {
        let mut buf = Vec::new();
        match self {
            Attachment::Empty => encode_envelope(ATTACHMENT_TUN_EMPTY, 0, &[], &mut buf),
            Attachment::TunSockAddress(tsa) => {
                encode_envelope(ATTACHMENT_TUN_SOCKADDRESS, 0, &tsa.encode_body(), &mut buf)
            }
        }
        debug_assert!(buf.len() <= region.len());
        region[..buf.len()].copy_from_slice(&buf);
    }

    /// Decode the attachment region. Unknown types decode as
    /// [`Attachment::Empty`] so future attachment kinds do not break
    /// old receivers.
    pub fn parse(region: &[u8]) -> Result<Self> {
        let (_, inner) = parse_envelope(region)
            .map_err(|_| Error::InvalidFrame("attachment envelope".into()))?;
        match inner.payload_type {
            ATTACHMENT_TUN_SOCKADDRESS => {
                Ok(Attachment::TunSockAddress(TunSockAddress::parse_body(
                    inner.data,
                )?))
            }
            _ => Ok(Attachment::Empty),
        }
    }
}
