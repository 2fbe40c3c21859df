//! Timestamped text transcripts.
//!
//! A [`Transcript`] keeps three panes of lines, one per event stream of a
//! connection session: what arrived, what was sent, and diagnostic chatter.
//! Each pane can be cleared on its own. Rendering matches the classic tool
//! output, one entry per line:
//!
//! ```text
//! <2024-03-01 14:05:09> <hello>
//! <2024-03-01 14:05:10> <127.0.0.1:50412> <world>
//! ```

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::logging::{TIMESTAMP_FORMAT, targets};

/// One of the three transcript panes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pane {
    /// Lines received from peers.
    Received,
    /// Lines transmitted to peers.
    Sent,
    /// Connection lifecycle and error messages.
    Debug,
}

impl Pane {
    /// All panes in display order.
    pub const ALL: [Pane; 3] = [Pane::Received, Pane::Sent, Pane::Debug];

    fn index(self) -> usize {
        match self {
            Self::Received => 0,
            Self::Sent => 1,
            Self::Debug => 2,
        }
    }
}

impl fmt::Display for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Sent => write!(f, "sent"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

impl std::str::FromStr for Pane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "received" | "rx" => Ok(Self::Received),
            "sent" | "tx" => Ok(Self::Sent),
            "debug" | "log" => Ok(Self::Debug),
            other => Err(format!("unknown pane '{other}'")),
        }
    }
}

/// A single timestamped transcript line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// When the entry was recorded.
    pub at: DateTime<Local>,
    /// Optional peer tag.
    pub tag: Option<String>,
    /// The line text.
    pub text: String,
}

impl TranscriptEntry {
    /// Create an entry stamped with the current local time.
    pub fn now(tag: Option<String>, text: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            tag,
            text: text.into(),
        }
    }
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.at.format(TIMESTAMP_FORMAT))?;
        if let Some(tag) = &self.tag {
            write!(f, " <{tag}>")?;
        }
        write!(f, " <{}>", self.text)
    }
}

/// Three-pane, thread-safe transcript.
#[derive(Debug, Default)]
pub struct Transcript {
    panes: Mutex<[VecDeque<TranscriptEntry>; 3]>,
    capacity: Option<usize>,
}

impl Transcript {
    /// Create an unbounded transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transcript that keeps at most `capacity` entries per pane.
    ///
    /// When a pane is full the oldest entry is dropped.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            panes: Mutex::default(),
            capacity: Some(capacity.max(1)),
        }
    }

    /// The per-pane capacity limit, if any.
    pub fn capacity_limit(&self) -> Option<usize> {
        self.capacity
    }

    /// Append a line stamped with the current time.
    pub fn push(&self, pane: Pane, tag: Option<String>, text: impl Into<String>) {
        self.push_entry(pane, TranscriptEntry::now(tag, text));
    }

    /// Append a pre-built entry.
    pub fn push_entry(&self, pane: Pane, entry: TranscriptEntry) {
        let mut panes = self.panes.lock();
        let lines = &mut panes[pane.index()];
        if let Some(capacity) = self.capacity {
            while lines.len() >= capacity {
                lines.pop_front();
            }
        }
        lines.push_back(entry);
    }

    /// Snapshot of a pane's entries, oldest first.
    pub fn entries(&self, pane: Pane) -> Vec<TranscriptEntry> {
        self.panes.lock()[pane.index()].iter().cloned().collect()
    }

    /// Texts of a pane's entries, oldest first.
    pub fn texts(&self, pane: Pane) -> Vec<String> {
        self.panes.lock()[pane.index()]
            .iter()
            .map(|entry| entry.text.clone())
            .collect()
    }

    /// Number of entries in a pane.
    pub fn len(&self, pane: Pane) -> usize {
        self.panes.lock()[pane.index()].len()
    }

    /// Whether every pane is empty.
    pub fn is_empty(&self) -> bool {
        self.panes.lock().iter().all(VecDeque::is_empty)
    }

    /// Clear one pane.
    pub fn clear(&self, pane: Pane) {
        self.panes.lock()[pane.index()].clear();
        tracing::trace!(target: targets::TRANSCRIPT, %pane, "pane cleared");
    }

    /// Clear every pane.
    pub fn clear_all(&self) {
        for lines in self.panes.lock().iter_mut() {
            lines.clear();
        }
    }

    /// Render a pane as display text, one entry per line.
    pub fn render(&self, pane: Pane) -> String {
        let panes = self.panes.lock();
        let mut out = String::new();
        for entry in &panes[pane.index()] {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }
}
