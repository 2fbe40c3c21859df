//! Error types for the connection engine.

use std::net::SocketAddr;

use horizon_linewire_core::CoreError;

/// A specialized Result type for connection operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors surfaced to the control thread.
///
/// Per-connection read/write failures never appear here: the I/O loop
/// handles them locally and reports them on the Debug stream.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Address, port or interval text failed validation.
    #[error("{0}")]
    InvalidConfig(String),

    /// Outbound connection could not be established.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Poll or waker setup failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The I/O loop thread could not be started.
    #[error("Failed to spawn I/O thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The session is not running.
    #[error("Not connected")]
    NotRunning,

    /// A session is already running on this endpoint.
    #[error("Already running")]
    AlreadyRunning,

    /// Manual sends are locked out while repeat is armed.
    #[error("Manual send is disabled while repeat is armed")]
    RepeatArmed,

    /// Repeat could not be enabled.
    #[error("Repeat rejected: {0}")]
    RepeatRejected(String),

    /// No connected peer to address.
    #[error("No client selected")]
    NoAddressee,

    /// The named peer is not connected.
    #[error("Unknown peer {0}")]
    UnknownPeer(SocketAddr),

    /// The peer address is already registered.
    #[error("Peer {0} is already registered")]
    DuplicatePeer(SocketAddr),

    /// Core primitive failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl NetworkError {
    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a connect error.
    pub fn connect(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            addr: addr.into(),
            source,
        }
    }

    /// Create a bind error.
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}
