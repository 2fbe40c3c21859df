//! Error types for the Linewire tools.

use std::io;
use std::path::PathBuf;

/// A specialized Result type for settings and logging setup.
pub type Result<T> = std::result::Result<T, LinewireError>;

/// Errors raised around the engine: persisted settings and log setup.
#[derive(Debug, thiserror::Error)]
pub enum LinewireError {
    /// The platform has no usable configuration directory.
    #[error("could not determine the configuration directory")]
    NoConfigDir,

    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A settings file exists but is not valid TOML for its type.
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Settings could not be serialized.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The tracing subscriber could not be installed.
    #[error("failed to install logging: {0}")]
    Logging(String),

    /// Engine error.
    #[error(transparent)]
    Network(#[from] horizon_linewire_net::NetworkError),
}

impl LinewireError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
