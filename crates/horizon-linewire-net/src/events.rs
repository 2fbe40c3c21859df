//! The three event streams a session publishes.

use std::net::SocketAddr;
use std::sync::Arc;

use horizon_linewire_core::logging::targets;
use horizon_linewire_core::{Pane, Signal, Transcript};

/// A line with its peer tag. The tag is `None` for the client's received lines.
pub type LineEvent = (Option<SocketAddr>, String);

/// Received, Sent and Debug streams of one endpoint.
///
/// Every emission is also logged through `tracing`: received and sent lines at
/// `info`, debug lines at `debug` (`warn` for broken connections, emitted by
/// the I/O loop directly). Slots run on the emitting thread, which is the I/O
/// loop for everything except configuration and control errors.
#[derive(Debug, Default)]
pub struct LineEvents {
    /// Emitted for each non-empty inbound line.
    pub received: Signal<LineEvent>,
    /// Emitted after a line has been handed to a socket.
    pub sent: Signal<LineEvent>,
    /// Lifecycle and error messages.
    pub debug: Signal<String>,
}

impl LineEvents {
    /// Create streams with no connected slots.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn emit_received(&self, role: &'static str, peer: Option<SocketAddr>, text: String) {
        match peer {
            Some(peer) => tracing::info!(target: targets::RECEIVED, role, %peer, "{text}"),
            None => tracing::info!(target: targets::RECEIVED, role, "{text}"),
        }
        self.received.emit((peer, text));
    }

    pub(crate) fn emit_sent(&self, role: &'static str, peer: Option<SocketAddr>, text: String) {
        match peer {
            Some(peer) => tracing::info!(target: targets::SENT, role, %peer, "{text}"),
            None => tracing::info!(target: targets::SENT, role, "{text}"),
        }
        self.sent.emit((peer, text));
    }

    pub(crate) fn emit_debug(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!(target: targets::IO_LOOP, "{text}");
        self.debug.emit(text);
    }

    /// Mirror all three streams into `transcript`, tagging lines with their peer.
    ///
    /// The slots stay connected for the lifetime of these streams.
    pub fn attach_transcript(&self, transcript: Arc<Transcript>) {
        let received = transcript.clone();
        self.received.connect(move |(peer, text)| {
            received.push(Pane::Received, peer.map(|p| p.to_string()), text.as_str());
        });
        let sent = transcript.clone();
        self.sent.connect(move |(peer, text)| {
            sent.push(Pane::Sent, peer.map(|p| p.to_string()), text.as_str());
        });
        self.debug.connect(move |text| {
            transcript.push(Pane::Debug, None, text.as_str());
        });
    }
}
