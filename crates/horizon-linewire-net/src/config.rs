//! Configuration types for line client and server sessions.

use std::time::Duration;

use crate::codec::LineTerminator;
use crate::error::{NetworkError, Result};

/// Default receive buffer size in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024;

/// Default bound on the readiness wait.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Default readiness event buffer capacity.
pub const DEFAULT_EVENTS_CAPACITY: usize = 64;

/// Default cap on bytes waiting to be written to one connection.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Socket-level and loop-level options.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Receive buffer size in bytes.
    pub read_buffer_size: usize,
    /// Upper bound on one readiness wait. Also bounds shutdown latency.
    pub poll_timeout: Duration,
    /// Terminator appended to every sent line.
    pub line_terminator: LineTerminator,
    /// Capacity of the readiness event buffer.
    pub events_capacity: usize,
    /// Bytes one connection may hold unsent before further lines for it are
    /// discarded.
    pub max_pending_bytes: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            no_delay: true,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            line_terminator: LineTerminator::CrLf,
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
        }
    }
}

impl SocketConfig {
    /// Create a new socket configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the receive buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the readiness wait bound.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the terminator appended to sent lines.
    pub fn line_terminator(mut self, terminator: LineTerminator) -> Self {
        self.line_terminator = terminator;
        self
    }

    /// Set the readiness event buffer capacity.
    pub fn events_capacity(mut self, capacity: usize) -> Self {
        self.events_capacity = capacity.max(1);
        self
    }

    /// Set the per-connection cap on unsent bytes.
    pub fn max_pending_bytes(mut self, bytes: usize) -> Self {
        self.max_pending_bytes = bytes.max(1);
        self
    }
}

/// Configuration for a client connection.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// The host to connect to.
    pub host: String,
    /// The port to connect to.
    pub port: u16,
    /// Socket-level options.
    pub socket: SocketConfig,
}

impl ClientConfig {
    /// Create a new client configuration.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            socket: SocketConfig::default(),
        }
    }

    /// Validate raw address and port text, as typed by an operator.
    pub fn parse(address: &str, port: &str) -> Result<Self> {
        let host = address.trim();
        if host.is_empty() {
            return Err(NetworkError::invalid_config("Address is empty."));
        }
        let port = parse_port(port)?;
        if port == 0 {
            return Err(NetworkError::invalid_config("Port 0 cannot be connected to."));
        }
        Ok(Self::new(host, port))
    }

    /// Set socket options.
    pub fn socket_config(mut self, config: SocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Enable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Set the readiness wait bound.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.socket.poll_timeout = timeout;
        self
    }

    /// Get the address string (host:port, IPv6 literals bracketed).
    pub fn address(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

/// Configuration for a server listener.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// The address to bind to.
    pub bind_address: String,
    /// The port to listen on. Zero picks an ephemeral port.
    pub port: u16,
    /// Socket-level options for accepted connections.
    pub socket: SocketConfig,
}

impl ServerConfig {
    /// Create a new server configuration.
    pub fn new(bind_address: impl Into<String>, port: u16) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
            socket: SocketConfig::default(),
        }
    }

    /// Listen on every IPv4 interface.
    pub fn any(port: u16) -> Self {
        Self::new("0.0.0.0", port)
    }

    /// Validate raw port text, as typed by an operator.
    pub fn parse(port: &str) -> Result<Self> {
        Ok(Self::any(parse_port(port)?))
    }

    /// Set socket options for accepted connections.
    pub fn socket_config(mut self, config: SocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Enable TCP_NODELAY for accepted connections.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Set the readiness wait bound.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.socket.poll_timeout = timeout;
        self
    }

    /// Get the bind address string (address:port, IPv6 literals bracketed).
    pub fn bind_addr(&self) -> String {
        join_host_port(&self.bind_address, self.port)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn parse_port(text: &str) -> Result<u16> {
    let text = text.trim();
    if text.is_empty() {
        return Err(NetworkError::invalid_config("Port is empty."));
    }
    text.parse::<u16>()
        .map_err(|_| NetworkError::invalid_config(format!("Port '{text}' is not a valid port number.")))
}
