use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error taxonomy for the core crate.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure bubbling up from the filesystem or sockets.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid or unsatisfiable configuration.
    #[error("config: {0}")]
    Config(String),
    /// Protocol-level violation.
    #[error("protocol: {0}")]
    Protocol(String),
}

impl Error {
    /// Build a [`Error::Config`] from any message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
    /// Build a [`Error::Protocol`] from any message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

// Map TOML deserialization errors into the config error domain without adding a new variant
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
