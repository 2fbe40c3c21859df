//! Session lifecycle state.

/// Lifecycle of one client connection or server listener.
///
/// ```text
/// Idle ──open──▶ Running ──close──▶ StoppingRequested ──loop exit──▶ Stopped
///                   └────────────── peer lost / fatal ─────────────────▲
/// ```
///
/// `Stopped` is only ever entered from the I/O loop thread once every socket
/// has been closed. A new open starts over from a fresh `Idle` session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been opened.
    #[default]
    Idle,
    /// The I/O loop is running.
    Running,
    /// A close was requested; the I/O loop has not finished tearing down.
    StoppingRequested,
    /// The I/O loop has exited and released all sockets.
    Stopped,
}

impl SessionState {
    /// Whether the session accepts sends.
    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    /// Whether the I/O loop thread may still be alive.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::StoppingRequested)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::StoppingRequested => write!(f, "StoppingRequested"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}
