//! Error types for Horizon Linewire core primitives.

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the core primitives.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The operating system refused to start a background thread.
    #[error("Failed to spawn thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A periodic task was given a zero interval.
    #[error("Periodic interval must be greater than zero")]
    InvalidInterval,
}

impl CoreError {
    /// Create a thread spawn error.
    pub fn thread_spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::ThreadSpawn {
            name: name.into(),
            source,
        }
    }
}
