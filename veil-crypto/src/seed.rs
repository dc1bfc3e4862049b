//! Time-bound seed rotation and per-peer key derivation.
//!
//! The overlay shares a passcode out of band. Each node derives a seed
//! from the passcode and the current time epoch, then expands one
//! symmetric key per remote peer from that seed. When the wall clock
//! crosses an epoch boundary the seed advances and every per-peer key
//! is rebuilt by the node worker.

use hkdf::Hkdf;
use sha2::Sha256;
use veil_core::NodeId;
use zeroize::Zeroize;

/// Length of the rotating seed and of every derived per-peer key.
pub const KEY_LEN: usize = 32;

const SEED_CONTEXT: &str = "veil/time-seed/v1";
const PEER_KEY_SALT: &[u8] = b"veil/peer-key/v1";

/// Rotating time-bound seed.
///
/// `epoch = now_sec / interval_secs`; the seed is a keyed BLAKE3 hash of
/// the epoch under the shared passcode, so all nodes that agree on the
/// passcode and the clock agree on the seed.
pub struct TimeSeed {
    passcode: [u8; KEY_LEN],
    interval_secs: u64,
    epoch: u64,
    seed: [u8; KEY_LEN],
}

impl TimeSeed {
    /// Create a seed source from the shared passcode. The seed is
    /// initialized for epoch zero; call [`TimeSeed::refresh`] with the
    /// current time before first use.
    pub fn new(passcode: [u8; KEY_LEN], interval_secs: u64) -> Self {
        let interval_secs = interval_secs.max(1);
        let mut ts = Self {
            passcode,
            interval_secs,
            epoch: 0,
            seed: [0u8; KEY_LEN],
        };
        ts.seed = ts.seed_for_epoch(0);
        ts
    }

    /// Whether the seed for `now_sec` differs from the current one.
    pub fn needs_refresh(&self, now_sec: u64) -> bool {
        now_sec / self.interval_secs != self.epoch
    }

    /// Advance the seed to the epoch containing `now_sec`.
    pub fn refresh(&mut self, now_sec: u64) {
        let epoch = now_sec / self.interval_secs;
        self.seed = self.seed_for_epoch(epoch);
        self.epoch = epoch;
    }

    /// Current epoch index.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current seed bytes.
    pub fn seed(&self) -> &[u8; KEY_LEN] {
        &self.seed
    }

    fn seed_for_epoch(&self, epoch: u64) -> [u8; KEY_LEN] {
        let key = blake3::derive_key(SEED_CONTEXT, &self.passcode);
        *blake3::keyed_hash(&key, &epoch.to_be_bytes()).as_bytes()
    }
}

impl Drop for TimeSeed {
    fn drop(&mut self) {
        self.passcode.zeroize();
        self.seed.zeroize();
    }
}

impl std::fmt::Debug for TimeSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSeed")
            .field("interval_secs", &self.interval_secs)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Derive the symmetric key for a peer pair from the current seed.
///
/// The two node ids are ordered before derivation so both endpoints of
/// the pair compute the same key.
pub fn derive_peer_key(seed: &[u8; KEY_LEN], a: NodeId, b: NodeId) -> [u8; KEY_LEN] {
    let (lo, hi) = if a.get() <= b.get() { (a, b) } else { (b, a) };
    let mut info = [0u8; 8];
    info[..4].copy_from_slice(&lo.get().to_be_bytes());
    info[4..].copy_from_slice(&hi.get().to_be_bytes());

    let hk = Hkdf::<Sha256>::new(Some(PEER_KEY_SALT), seed);
    let mut okm = [0u8; KEY_LEN];
    // Expand cannot fail for a 32-byte output with SHA-256.
    let _ = hk.expand(&info, &mut okm);
    okm
}
