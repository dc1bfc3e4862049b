#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! veil cryptography engine.
//!
//! Two concerns live here, both consumed by the node worker:
//! * Ed25519 signing and verification of control-frame data regions
//!   ([`sign`]). The signed region is always an explicit byte slice;
//!   callers define its boundary.
//! * Time-bound seed rotation and per-peer symmetric key derivation
//!   ([`seed`]). The seed advances once per configured interval and
//!   every per-peer key is rebuilt from it.

pub mod seed;
pub mod sign;

pub use seed::{derive_peer_key, TimeSeed};
pub use sign::{verify_region, SigningIdentity, PUBLIC_KEY_LEN, SIGNATURE_LEN};

/// Crate result alias.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error taxonomy for the crypto crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or rejected key material.
    #[error("key: {0}")]
    Key(String),
}
