//! FIFO hand-off of outbound lines to the I/O loop.

use std::net::SocketAddr;

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

/// A line waiting to be transmitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundLine {
    /// Text without terminator.
    pub text: String,
    /// Destination peer. `None` means the session's only peer (client side).
    pub addressee: Option<SocketAddr>,
}

impl OutboundLine {
    /// A line for the session's single peer.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            addressee: None,
        }
    }

    /// A line for a specific peer.
    pub fn to(text: impl Into<String>, addressee: SocketAddr) -> Self {
        Self {
            text: text.into(),
            addressee: Some(addressee),
        }
    }
}

/// Unbounded multi-producer FIFO of [`OutboundLine`]s.
///
/// Producers (control thread, repeat ticks) never block the consumer (the
/// I/O loop) or each other. Each line is handed out exactly once.
#[derive(Clone, Debug)]
pub struct OutboundQueue {
    tx: Sender<OutboundLine>,
    rx: Receiver<OutboundLine>,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Append a line at the tail. Always succeeds.
    pub fn enqueue(&self, line: OutboundLine) {
        // Both ends live in `self`, so the channel cannot be disconnected here.
        let _ = self.tx.send(line);
    }

    /// Remove and return the head, if any. Never blocks.
    pub fn try_dequeue(&self) -> Option<OutboundLine> {
        match self.rx.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Remove every line currently queued, in order.
    pub fn drain(&self) -> Vec<OutboundLine> {
        self.rx.try_iter().collect()
    }

    /// Number of queued lines.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discard everything queued, returning how many lines were dropped.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }
}
