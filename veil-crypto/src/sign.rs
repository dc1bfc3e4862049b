//! Ed25519 signing of control-frame data regions.
//!
//! Frames carry a detached 64-byte signature over exactly the data
//! region; the envelope and the signature itself are never covered.
//! Verification is total: malformed keys or signatures verify as
//! `false` rather than erroring, because on the ingress path every
//! failure is just a drop.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::{Error, Result};

/// Length of an Ed25519 public key on the wire.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of a detached Ed25519 signature on the wire.
pub const SIGNATURE_LEN: usize = 64;

/// Local node signing identity.
pub struct SigningIdentity {
    signing: SigningKey,
}

impl SigningIdentity {
    /// Generate a fresh identity from a cryptographically secure RNG.
    pub fn generate<R: rand::CryptoRng + rand::RngCore>(rng: &mut R) -> Self {
        Self {
            signing: SigningKey::generate(rng),
        }
    }

    /// Restore an identity from its 32-byte secret key.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(secret),
        }
    }

    /// Public verification key, wire form.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing.verifying_key().to_bytes()
    }

    /// Sign a data region, returning the detached signature.
    pub fn sign_region(&self, region: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing.sign(region).to_bytes()
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret key is deliberately not printed.
        f.debug_struct("SigningIdentity")
            .field("public", &hex_fmt(&self.public_key_bytes()))
            .finish()
    }
}

fn hex_fmt(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a wire-form public key.
pub fn parse_public_key(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<VerifyingKey> {
    VerifyingKey::from_bytes(bytes).map_err(|e| Error::Key(e.to_string()))
}

/// Verify a detached signature over a data region.
///
/// Returns `false` on any failure, including a public key that does not
/// decode to a curve point.
pub fn verify_region(
    public_key: &[u8; PUBLIC_KEY_LEN],
    region: &[u8],
    signature: &[u8; SIGNATURE_LEN],
) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    key.verify(region, &sig).is_ok()
}
