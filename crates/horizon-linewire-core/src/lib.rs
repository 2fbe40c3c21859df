//! Core systems for Horizon Linewire.
//!
//! This crate provides the building blocks shared by the line-oriented TCP
//! client and server tools:
//!
//! - **Signal/Slot System**: Type-safe fan-out of session events
//! - **Periodic Tasks**: Cancellable repeating work on a dedicated thread
//! - **Transcripts**: Timestamped, clearable Received/Sent/Debug panes
//! - **Logging**: `tracing` targets for every subsystem
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_linewire_core::Signal;
//!
//! let line_received = Signal::<String>::new();
//!
//! let conn_id = line_received.connect(|line| {
//!     println!("Received: {}", line);
//! });
//!
//! line_received.emit("hello".to_string());
//! line_received.disconnect(conn_id);
//! ```
//!
//! # Transcript Example
//!
//! ```
//! use horizon_linewire_core::{Pane, Transcript};
//!
//! let transcript = Transcript::new();
//! transcript.push(Pane::Received, None, "hello");
//! assert_eq!(transcript.texts(Pane::Received), vec!["hello"]);
//! ```

mod error;
pub mod logging;
pub mod periodic;
pub mod signal;
pub mod transcript;

pub use error::{CoreError, Result};
pub use periodic::PeriodicTask;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use transcript::{Pane, Transcript, TranscriptEntry};
