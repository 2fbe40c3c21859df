//! Horizon Linewire - line-oriented TCP client and server tools.
//!
//! This is the umbrella crate. It re-exports the engine and adds what the two
//! binaries need around it: product identity, persisted settings, log setup
//! and a terminal front-end.
//!
//! # Example
//!
//! ```no_run
//! use horizon_linewire::net::{ClientConfig, ServerConfig, TcpLineClient, TcpLineServer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = TcpLineServer::new();
//!     let addr = server.listen(&ServerConfig::new("127.0.0.1", 0))?;
//!
//!     let client = TcpLineClient::new();
//!     client.open(&ClientConfig::new("127.0.0.1", addr.port()))?;
//!     client.send("hello")?;
//!
//!     client.close();
//!     server.stop();
//!     Ok(())
//! }
//! ```

pub use horizon_linewire_core::*;

/// Connection I/O engine.
pub mod net {
    pub use horizon_linewire_net::*;
}

pub mod console;
mod error;
pub mod logging;
pub mod product;
pub mod settings;

pub use error::{LinewireError, Result};
pub use product::ProductInfo;
