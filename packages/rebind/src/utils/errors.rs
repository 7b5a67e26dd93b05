// packages/rebind/src/utils/errors.rs
//! Error types for the rebind shim
//!
//! Only [`RebindError::SymbolNotFound`] is fatal. Every other variant is
//! turned into a pass-through decision or a log line by the bind path.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RebindError>;

#[derive(Debug, Error)]
pub enum RebindError {
    /// The next definition of a symbol could not be found by the dynamic loader
    #[error("symbol `{symbol}` not found: {reason}")]
    SymbolNotFound { symbol: String, reason: String },

    /// A port variable is unset or empty
    #[error("{var} is not set")]
    NotConfigured { var: &'static str },

    /// A port variable is set but is not a non-zero port number
    #[error("{var}={value:?} is not a valid port")]
    InvalidPort { var: &'static str, value: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Changing a socket option failed
    #[error("socket option error: {0}")]
    SocketOption(#[from] nix::errno::Errno),

    #[error("observability error: {0}")]
    Observability(String),
}

impl RebindError {
    /// Whether this error means the host environment is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, RebindError::SymbolNotFound { .. })
    }
}
