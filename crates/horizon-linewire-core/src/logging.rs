//! Logging facilities for Horizon Linewire.
//!
//! Horizon Linewire uses the `tracing` crate for instrumentation. Install a
//! subscriber in your application to see the output:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! The constants in [`targets`] name the subsystem each event comes from, so
//! a filter like `horizon_linewire_net::io_loop=debug` isolates the socket loop.

/// Target names for log filtering.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_linewire_core::signal";
    /// Periodic task target.
    pub const PERIODIC: &str = "horizon_linewire_core::periodic";
    /// Transcript target.
    pub const TRANSCRIPT: &str = "horizon_linewire_core::transcript";
    /// Connection I/O loop target.
    pub const IO_LOOP: &str = "horizon_linewire_net::io_loop";
    /// Client session target.
    pub const CLIENT: &str = "horizon_linewire_net::client";
    /// Server session target.
    pub const SERVER: &str = "horizon_linewire_net::server";
    /// Repeat scheduler target.
    pub const REPEAT: &str = "horizon_linewire_net::repeat";
    /// Inbound line traffic.
    pub const RECEIVED: &str = "horizon_linewire_net::received";
    /// Outbound line traffic.
    pub const SENT: &str = "horizon_linewire_net::sent";
}

/// Timestamp format used by transcripts, e.g. `2024-03-01 14:05:09`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used in per-run log file names, e.g. `20240301-140509`.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
