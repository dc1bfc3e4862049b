#![forbid(unsafe_code)]

//! veil configuration handling. Parses a TOML file into a strongly-typed
//! structure and validates it on load. The liveness timing constants
//! (sync/ping/decay) are fixed by the protocol and deliberately not
//! configurable here.

use serde::Deserialize;
use std::{fs, path::Path};

use crate::types::NodeId;
use crate::{Error, Result};

/// Default capacity of the node-worker ingress ring.
pub const DEFAULT_QUEUE_LENGTH: usize = 1024;

/// Default interval between time-seed rotations, in seconds.
pub const DEFAULT_SEED_INTERVAL_SECS: u64 = 3600;

/// Node-worker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Local node identity (the 32-bit UUID).
    pub local_id: u32,

    /// When set, control frames are neither signed nor verified.
    pub lite_mode: bool,

    /// Capacity of the ingress ring between the receive thread and the
    /// node worker. Must be a power of two.
    pub queue_length: usize,

    /// Interval between time-seed rotations in seconds.
    pub seed_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            local_id: 0,
            lite_mode: false,
            queue_length: DEFAULT_QUEUE_LENGTH,
            seed_interval_secs: DEFAULT_SEED_INTERVAL_SECS,
        }
    }
}

impl NodeConfig {
    /// Load a configuration from a TOML file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Parse a configuration from a TOML string and validate it.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let cfg: NodeConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check invariants the rest of the workspace relies on.
    pub fn validate(&self) -> Result<()> {
        if self.local_id == 0 {
            return Err(Error::config("local_id must be non-zero"));
        }
        if self.queue_length == 0 || !self.queue_length.is_power_of_two() {
            return Err(Error::config(format!(
                "queue_length must be a non-zero power of two, got {}",
                self.queue_length
            )));
        }
        if self.seed_interval_secs == 0 {
            return Err(Error::config("seed_interval_secs must be non-zero"));
        }
        Ok(())
    }

    /// Typed accessor for the local identity.
    pub fn local_node_id(&self) -> NodeId {
        NodeId::new(self.local_id)
    }
}
