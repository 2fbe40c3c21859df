//! Line client: one outbound connection, optional timed repeat.

use std::net::{SocketAddr, TcpStream as StdTcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use horizon_linewire_core::logging::targets;
use parking_lot::Mutex;

use crate::config::ClientConfig;
use crate::error::{NetworkError, Result};
use crate::events::LineEvents;
use crate::io_loop::{IoLoop, Session};
use crate::queue::OutboundLine;
use crate::repeat::RepeatScheduler;
use crate::state::SessionState;

/// Line-oriented TCP client.
///
/// Each [`open`](Self::open) starts a fresh session with its own I/O loop
/// thread. Sends are queued and return immediately; the loop transmits them
/// on its next cycle. [`close`](Self::close) blocks until the loop has closed
/// the socket.
///
/// # Example
///
/// ```no_run
/// use horizon_linewire_net::{ClientConfig, TcpLineClient};
///
/// let client = TcpLineClient::new();
/// client.events().received.connect(|(_, line)| println!("<- {line}"));
///
/// client.open(&ClientConfig::new("127.0.0.1", 7000))?;
/// client.send("hello")?;
/// client.close();
/// # Ok::<(), horizon_linewire_net::NetworkError>(())
/// ```
pub struct TcpLineClient {
    events: Arc<LineEvents>,
    session: Mutex<Option<Arc<Session>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    repeat: Arc<RepeatScheduler>,
}

impl Default for TcpLineClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpLineClient {
    /// Create an idle client.
    pub fn new() -> Self {
        Self {
            events: Arc::new(LineEvents::new()),
            session: Mutex::new(None),
            thread: Mutex::new(None),
            repeat: Arc::new(RepeatScheduler::new()),
        }
    }

    /// Received, Sent and Debug streams. Shared across sessions.
    pub fn events(&self) -> &Arc<LineEvents> {
        &self.events
    }

    /// Validate operator text and open a connection.
    pub fn open_with(&self, address: &str, port: &str) -> Result<SocketAddr> {
        let config = ClientConfig::parse(address, port).inspect_err(|e| self.report(e))?;
        self.open(&config)
    }

    /// Connect and start the I/O loop. Returns the peer address.
    pub fn open(&self, config: &ClientConfig) -> Result<SocketAddr> {
        if self.current().is_some_and(|s| s.state().is_active()) {
            return Err(NetworkError::AlreadyRunning);
        }
        // A session that ended on its own still has a thread to reap.
        self.join_thread();
        self.repeat.disarm();

        let address = config.address();
        let stream = connect(&address).inspect_err(|e| self.report(e))?;
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| NetworkError::connect(&address, e))
            .inspect_err(|e| self.report(e))?;
        stream.set_nonblocking(true)?;

        let mut io_loop = IoLoop::client(
            mio::net::TcpStream::from_std(stream),
            peer_addr,
            config.socket.clone(),
            self.events.clone(),
        )?;
        // Connection loss disarms repeat before the session reads as stopped.
        let repeat = self.repeat.clone();
        io_loop.on_teardown(move || {
            if repeat.disarm() {
                tracing::info!(target: targets::CLIENT, "repeat stopped with the connection");
            }
        });
        let session = io_loop.session().clone();
        session.coordinator.begin();

        let handle = thread::Builder::new()
            .name("linewire-client-io".into())
            .spawn(move || io_loop.run())
            .map_err(|e| {
                session.coordinator.reset();
                NetworkError::ThreadSpawn(e)
            })?;

        tracing::info!(target: targets::CLIENT, %peer_addr, "client connected");
        *self.session.lock() = Some(session);
        *self.thread.lock() = Some(handle);
        Ok(peer_addr)
    }

    /// Stop repeat, close the connection and wait for the loop to exit.
    ///
    /// Returns whether a session was open.
    pub fn close(&self) -> bool {
        self.repeat.disarm();
        let session = self.session.lock().take();
        let Some(session) = session else {
            return false;
        };
        session.stop_and_wait();
        self.join_thread();
        tracing::info!(target: targets::CLIENT, "client closed");
        true
    }

    /// Queue a line for the peer.
    ///
    /// Rejected while repeat is armed.
    pub fn send(&self, text: &str) -> Result<()> {
        if self.repeat.is_armed() {
            return Err(NetworkError::RepeatArmed);
        }
        let session = self.current().ok_or(NetworkError::NotRunning)?;
        deliver(&session, text)
    }

    /// Start resending `text` every `interval_text` milliseconds.
    ///
    /// Requires a running connection and an interval of at least 100 ms.
    /// Rejections are reported on the Debug stream.
    pub fn enable_repeat(&self, interval_text: &str, text: &str) -> Result<Duration> {
        let interval = RepeatScheduler::parse_interval(interval_text).inspect_err(|e| self.report(e))?;
        self.enable_repeat_every(interval, text)?;
        Ok(interval)
    }

    /// Start resending `text` every `interval`.
    pub fn enable_repeat_every(&self, interval: Duration, text: &str) -> Result<()> {
        let session = self
            .current()
            .filter(|s| s.state().is_running())
            .ok_or_else(|| NetworkError::RepeatRejected("Not connected.".into()))
            .inspect_err(|e| self.report(e))?;

        let tick_session = session.clone();
        self.repeat
            .arm(interval, text, move |line| deliver(&tick_session, line))
            .inspect_err(|e| self.report(e))?;
        // The connection may have dropped while arming; teardown has then
        // already run its disarm.
        if !session.state().is_running() {
            self.repeat.disarm();
            let error = NetworkError::RepeatRejected("Not connected.".into());
            self.report(&error);
            return Err(error);
        }
        tracing::info!(target: targets::CLIENT, interval_ms = interval.as_millis() as u64, "repeat enabled");
        Ok(())
    }

    /// Stop the repeat and restore manual sending.
    pub fn disable_repeat(&self) -> bool {
        self.repeat.disarm()
    }

    /// Whether repeat ticks are being produced.
    pub fn is_repeat_armed(&self) -> bool {
        self.repeat.is_armed()
    }

    /// Interval of the live repeat.
    pub fn repeat_interval(&self) -> Option<Duration> {
        self.repeat.interval()
    }

    /// Lifecycle state of the current session.
    pub fn state(&self) -> SessionState {
        self.current().map_or(SessionState::Idle, |s| s.state())
    }

    /// Whether the connection is up.
    pub fn is_connected(&self) -> bool {
        self.state().is_running()
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.current()
            .filter(|s| s.state().is_running())
            .and_then(|s| s.peer_addr)
    }

    /// Local address of the connection.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.current()
            .filter(|s| s.state().is_running())
            .map(|s| s.local_addr)
    }

    fn current(&self) -> Option<Arc<Session>> {
        self.session.lock().clone()
    }

    fn join_thread(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::error!(target: targets::CLIENT, "client I/O thread panicked");
        }
    }

    fn report(&self, error: &NetworkError) {
        tracing::warn!(target: targets::CLIENT, %error, "client request failed");
        self.events.debug.emit(error.to_string());
    }
}

impl Drop for TcpLineClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TcpLineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpLineClient")
            .field("state", &self.state())
            .field("peer_addr", &self.peer_addr())
            .field("repeat", &self.repeat)
            .finish()
    }
}

/// The one send path shared by manual sends and repeat ticks.
fn deliver(session: &Session, text: &str) -> Result<()> {
    if !session.state().is_running() {
        return Err(NetworkError::NotRunning);
    }
    session.enqueue(OutboundLine::new(text));
    Ok(())
}

fn connect(address: &str) -> Result<StdTcpStream> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|e| NetworkError::connect(address, e))?;

    let mut last_error = None;
    for addr in addrs {
        match StdTcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    let source = last_error.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "address resolved to nothing")
    });
    Err(NetworkError::connect(address, source))
}
