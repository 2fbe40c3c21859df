//! Connection I/O engine for Horizon Linewire.
//!
//! This crate drives line-oriented TCP sessions for the Linewire tools:
//!
//! - **Client**: One outbound connection with an optional timed repeat
//! - **Server**: One listener multiplexing any number of accepted peers
//! - **Events**: Received, Sent and Debug streams exposed as signals
//!
//! Every session runs a single readiness loop (`mio`) on a dedicated thread.
//! The control thread never touches a socket: it queues lines, flips the
//! keep-running flag and waits for the loop to confirm teardown.
//!
//! # Wire Format
//!
//! Newline-terminated UTF-8 text. Outbound lines get one terminator (CRLF by
//! default); inbound bytes are split on CR and LF and empty pieces dropped.
//!
//! # Server
//!
//! ```no_run
//! use horizon_linewire_net::{ServerConfig, TcpLineServer};
//!
//! let server = TcpLineServer::new();
//! server.events().received.connect(|(peer, line)| {
//!     println!("{peer:?}: {line}");
//! });
//! server.events().debug.connect(|text| println!("{text}"));
//!
//! server.listen(&ServerConfig::any(7000))?;
//! // ... once a client is connected and selected:
//! server.send("world")?;
//! server.stop();
//! # Ok::<(), horizon_linewire_net::NetworkError>(())
//! ```
//!
//! # Client
//!
//! ```no_run
//! use horizon_linewire_net::TcpLineClient;
//!
//! let client = TcpLineClient::new();
//! client.events().received.connect(|(_, line)| println!("{line}"));
//!
//! client.open_with("127.0.0.1", "7000")?;
//! client.send("hello")?;
//!
//! // Resend every 500 ms; manual sends are rejected meanwhile.
//! client.enable_repeat("500", "ping")?;
//! client.disable_repeat();
//!
//! client.close();
//! # Ok::<(), horizon_linewire_net::NetworkError>(())
//! ```

mod client;
pub mod codec;
pub mod config;
pub mod connection;
mod error;
pub mod events;
mod io_loop;
pub mod queue;
pub mod registry;
pub mod repeat;
mod server;
pub mod shutdown;
pub mod state;

pub use error::{NetworkError, Result};

// Re-export commonly used types at the crate root
pub use client::TcpLineClient;
pub use codec::{LineDecoder, LineTerminator};
pub use config::{ClientConfig, ServerConfig, SocketConfig};
pub use events::{LineEvent, LineEvents};
pub use queue::{OutboundLine, OutboundQueue};
pub use registry::ClientRegistry;
pub use repeat::{MIN_REPEAT_INTERVAL, RepeatScheduler};
pub use server::TcpLineServer;
pub use shutdown::ShutdownCoordinator;
pub use state::SessionState;
