//! Line server: one listener, many peers, unicast to a selected peer.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use horizon_linewire_core::logging::targets;
use mio::net::TcpListener;
use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::error::{NetworkError, Result};
use crate::events::LineEvents;
use crate::io_loop::{IoLoop, Session};
use crate::queue::OutboundLine;
use crate::registry::ClientRegistry;
use crate::state::SessionState;

/// Line-oriented TCP server.
///
/// A single I/O loop thread multiplexes the listener and every accepted peer.
/// Received lines are tagged with the peer address. Sends go to one peer:
/// [`send`](Self::send) targets the current selection, [`send_to`](Self::send_to)
/// names the peer. The addressee is fixed when the line is queued.
///
/// # Example
///
/// ```no_run
/// use horizon_linewire_net::{ServerConfig, TcpLineServer};
///
/// let server = TcpLineServer::new();
/// server.events().received.connect(|(peer, line)| {
///     println!("{peer:?} -> {line}");
/// });
///
/// let addr = server.listen(&ServerConfig::new("127.0.0.1", 0))?;
/// println!("listening on {addr}");
/// # server.stop();
/// # Ok::<(), horizon_linewire_net::NetworkError>(())
/// ```
pub struct TcpLineServer {
    events: Arc<LineEvents>,
    registry: Arc<ClientRegistry>,
    session: Mutex<Option<Arc<Session>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Default for TcpLineServer {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpLineServer {
    /// Create an idle server.
    pub fn new() -> Self {
        Self {
            events: Arc::new(LineEvents::new()),
            registry: Arc::new(ClientRegistry::new()),
            session: Mutex::new(None),
            thread: Mutex::new(None),
        }
    }

    /// Received, Sent and Debug streams. Shared across sessions.
    pub fn events(&self) -> &Arc<LineEvents> {
        &self.events
    }

    /// Validate operator port text and start listening on every interface.
    pub fn listen_with(&self, port: &str) -> Result<SocketAddr> {
        let config = ServerConfig::parse(port).inspect_err(|e| self.report(e))?;
        self.listen(&config)
    }

    /// Bind the listener and start the I/O loop. Returns the bound address.
    pub fn listen(&self, config: &ServerConfig) -> Result<SocketAddr> {
        if self.current().is_some_and(|s| s.state().is_active()) {
            return Err(NetworkError::AlreadyRunning);
        }
        self.join_thread();

        let bind_addr = config.bind_addr();
        let listener = bind(&bind_addr).inspect_err(|e| self.report(e))?;
        let io_loop = IoLoop::server(
            listener,
            config.socket.clone(),
            self.events.clone(),
            self.registry.clone(),
        )?;
        let session = io_loop.session().clone();
        let local_addr = session.local_addr;
        session.coordinator.begin();

        tracing::info!(target: targets::SERVER, %local_addr, "server listening");
        self.events
            .emit_debug(format!("Server listening on {local_addr} ..."));

        let handle = thread::Builder::new()
            .name("linewire-server-io".into())
            .spawn(move || io_loop.run())
            .map_err(|e| {
                session.coordinator.reset();
                NetworkError::ThreadSpawn(e)
            })
            .inspect_err(|e| self.report(e))?;

        *self.session.lock() = Some(session);
        *self.thread.lock() = Some(handle);
        Ok(local_addr)
    }

    /// Close the listener and every peer, waiting for the loop to exit.
    ///
    /// Returns whether a session was open.
    pub fn stop(&self) -> bool {
        let session = self.session.lock().take();
        let Some(session) = session else {
            return false;
        };
        session.stop_and_wait();
        self.join_thread();
        tracing::info!(target: targets::SERVER, "server stopped");
        true
    }

    /// Queue a line for the selected peer.
    pub fn send(&self, text: &str) -> Result<()> {
        let session = self.running()?;
        let addressee = self.registry.selected().ok_or(NetworkError::NoAddressee)?;
        session.enqueue(OutboundLine::to(text, addressee));
        Ok(())
    }

    /// Queue a line for a specific peer.
    pub fn send_to(&self, text: &str, addressee: SocketAddr) -> Result<()> {
        let session = self.running()?;
        if !self.registry.contains(addressee) {
            return Err(NetworkError::UnknownPeer(addressee));
        }
        session.enqueue(OutboundLine::to(text, addressee));
        Ok(())
    }

    /// Make `addr` the target of [`send`](Self::send).
    pub fn select(&self, addr: SocketAddr) -> Result<()> {
        self.registry.select(addr)
    }

    /// The current unicast addressee.
    pub fn selected(&self) -> Option<SocketAddr> {
        self.registry.selected()
    }

    /// Connected peers in accept order.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.registry.peers()
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.registry.len()
    }

    /// Lifecycle state of the current session.
    pub fn state(&self) -> SessionState {
        self.current().map_or(SessionState::Idle, |s| s.state())
    }

    /// Whether the listener is accepting.
    pub fn is_listening(&self) -> bool {
        self.state().is_running()
    }

    /// Bound address of the listener. Reports the real port after binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.current()
            .filter(|s| s.state().is_running())
            .map(|s| s.local_addr)
    }

    fn running(&self) -> Result<Arc<Session>> {
        self.current()
            .filter(|s| s.state().is_running())
            .ok_or(NetworkError::NotRunning)
    }

    fn current(&self) -> Option<Arc<Session>> {
        self.session.lock().clone()
    }

    fn join_thread(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::error!(target: targets::SERVER, "server I/O thread panicked");
        }
    }

    fn report(&self, error: &NetworkError) {
        tracing::warn!(target: targets::SERVER, %error, "server request failed");
        self.events.debug.emit(error.to_string());
    }
}

impl Drop for TcpLineServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TcpLineServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpLineServer")
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .field("peers", &self.peers())
            .field("selected", &self.selected())
            .finish()
    }
}

fn bind(address: &str) -> Result<TcpListener> {
    let addr = address
        .to_socket_addrs()
        .map_err(|e| NetworkError::bind(address, e))?
        .next()
        .ok_or_else(|| {
            NetworkError::bind(
                address,
                std::io::Error::new(std::io::ErrorKind::NotFound, "address resolved to nothing"),
            )
        })?;
    TcpListener::bind(addr).map_err(|e| NetworkError::bind(address, e))
}
