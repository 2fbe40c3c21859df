//! The readiness-multiplexed socket loop.
//!
//! One [`IoLoop`] drives every socket of one session on a dedicated thread:
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                           IoLoop                             |
//! |   mio::Poll (bounded by SocketConfig::poll_timeout)          |
//! |     - listener (server only)  -> accept, register peer       |
//! |     - peer streams            -> read lines / flush outbox   |
//! |     - waker                   -> a send was enqueued         |
//! |                              |                               |
//! |   OutboundQueue drain  ->  route by addressee  ->  outbox    |
//! |                              |                               |
//! |   LineEvents: Received / Sent / Debug  (+ tracing)           |
//! +--------------------------------------------------------------+
//! ```
//!
//! The loop continues while the session's keep-running flag is set and at
//! least one socket is open. On exit it closes everything, clears the
//! registry and marks the [`ShutdownCoordinator`] stopped.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use horizon_linewire_core::logging::targets;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};

use crate::config::SocketConfig;
use crate::connection::{ConnectionHandle, ReadStatus};
use crate::events::LineEvents;
use crate::queue::{OutboundLine, OutboundQueue};
use crate::registry::ClientRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::state::SessionState;

/// Token for the listening socket.
const LISTENER_TOKEN: Token = Token(0);

/// Token for the waker.
const WAKER_TOKEN: Token = Token(1);

/// First token handed to a connection.
const CONNECTION_TOKEN_START: usize = 2;

/// Which endpoint a loop serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    Client,
    Server,
}

impl Role {
    fn name(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }

    fn stopped_message(self) -> &'static str {
        match self {
            Self::Client => "Client stopped running.",
            Self::Server => "Server stopped running.",
        }
    }
}

/// State shared by the control thread and the loop thread of one session.
///
/// A fresh session is created for every open/listen, so nothing here
/// outlives the loop it belongs to.
#[derive(Debug)]
pub(crate) struct Session {
    pub coordinator: ShutdownCoordinator,
    pub queue: OutboundQueue,
    pub events: Arc<LineEvents>,
    pub registry: Option<Arc<ClientRegistry>>,
    pub local_addr: SocketAddr,
    pub peer_addr: Option<SocketAddr>,
    waker: Waker,
}

impl Session {
    /// Queue a line and wake the loop.
    pub fn enqueue(&self, line: OutboundLine) {
        self.queue.enqueue(line);
        if let Err(e) = self.waker.wake() {
            // The loop still picks the line up on its next timeout.
            tracing::debug!(target: targets::IO_LOOP, error = %e, "failed to wake I/O loop");
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.coordinator.state()
    }

    /// Ask the loop to stop and block until it has torn down.
    pub fn stop_and_wait(&self) {
        self.coordinator.request_stop();
        if let Err(e) = self.waker.wake() {
            tracing::debug!(target: targets::IO_LOOP, error = %e, "failed to wake I/O loop for stop");
        }
        self.coordinator.request_stop_and_wait();
    }
}

/// Runs on the loop thread once every socket is closed, before the session
/// is marked stopped.
pub(crate) type TeardownHook = Box<dyn FnOnce() + Send>;

/// The per-session socket loop.
pub(crate) struct IoLoop {
    role: Role,
    poll: Poll,
    events: Events,
    listener: Option<TcpListener>,
    connections: HashMap<Token, ConnectionHandle>,
    by_addr: HashMap<SocketAddr, Token>,
    next_token: usize,
    config: SocketConfig,
    read_buf: Vec<u8>,
    session: Arc<Session>,
    on_teardown: Option<TeardownHook>,
}

impl IoLoop {
    /// Build a client loop around an established stream.
    pub fn client(
        stream: TcpStream,
        peer_addr: SocketAddr,
        config: SocketConfig,
        events: Arc<LineEvents>,
    ) -> io::Result<Self> {
        let local_addr = stream.local_addr()?;
        let mut io_loop = Self::new(Role::Client, local_addr, Some(peer_addr), None, config, events)?;
        io_loop.add_connection(stream, peer_addr)?;
        Ok(io_loop)
    }

    /// Build a server loop around a bound listener.
    pub fn server(
        mut listener: TcpListener,
        config: SocketConfig,
        events: Arc<LineEvents>,
        registry: Arc<ClientRegistry>,
    ) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let mut io_loop = Self::new(Role::Server, local_addr, None, Some(registry), config, events)?;
        io_loop
            .poll
            .registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        io_loop.listener = Some(listener);
        Ok(io_loop)
    }

    fn new(
        role: Role,
        local_addr: SocketAddr,
        peer_addr: Option<SocketAddr>,
        registry: Option<Arc<ClientRegistry>>,
        config: SocketConfig,
        events: Arc<LineEvents>,
    ) -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;
        let session = Arc::new(Session {
            coordinator: ShutdownCoordinator::new(),
            queue: OutboundQueue::new(),
            events,
            registry,
            local_addr,
            peer_addr,
            waker,
        });

        Ok(Self {
            role,
            poll,
            events: Events::with_capacity(config.events_capacity),
            listener: None,
            connections: HashMap::new(),
            by_addr: HashMap::new(),
            next_token: CONNECTION_TOKEN_START,
            read_buf: vec![0; config.read_buffer_size],
            config,
            session,
            on_teardown: None,
        })
    }

    /// Run `hook` during teardown, before waiters on the session are released.
    pub fn on_teardown(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.on_teardown = Some(Box::new(hook));
    }

    /// The session this loop serves.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run until stopped or out of sockets, then tear down.
    pub fn run(mut self) {
        tracing::debug!(target: targets::IO_LOOP, role = self.role.name(), "I/O loop started");
        if let Err(e) = self.drive() {
            tracing::error!(target: targets::IO_LOOP, role = self.role.name(), error = ?e, "I/O loop failed");
            self.session.events.emit_debug(format!("I/O loop failed: {e}"));
        }
        self.teardown();
    }

    fn drive(&mut self) -> io::Result<()> {
        // Lines queued before the thread started.
        self.drain_queue();

        while self.session.coordinator.keep_running() && self.has_open_sockets() {
            match self.poll.poll(&mut self.events, Some(self.config.poll_timeout)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let ready: Vec<(Token, bool, bool)> = self
                .events
                .iter()
                .map(|event| {
                    let readable = event.is_readable() || event.is_read_closed() || event.is_error();
                    (event.token(), readable, event.is_writable())
                })
                .collect();

            for (token, readable, writable) in ready {
                match token {
                    LISTENER_TOKEN => self.accept_all()?,
                    WAKER_TOKEN => {}
                    token => {
                        if readable {
                            self.read_from(token);
                        }
                        if writable {
                            self.flush(token);
                        }
                    }
                }
            }

            self.drain_queue();
        }
        Ok(())
    }

    fn has_open_sockets(&self) -> bool {
        self.listener.is_some() || !self.connections.is_empty()
    }

    fn accept_all(&mut self) -> io::Result<()> {
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return Ok(());
            };
            match listener.accept() {
                Ok((stream, peer_addr)) => self.add_connection(stream, peer_addr)?,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Aborted handshakes and descriptor exhaustion leave the
                    // listener usable.
                    tracing::warn!(target: targets::IO_LOOP, error = %e, "accept failed");
                    self.session.events.emit_debug(format!("Accept failed: {e}"));
                    return Ok(());
                }
            }
        }
    }

    fn add_connection(&mut self, mut stream: TcpStream, peer_addr: SocketAddr) -> io::Result<()> {
        if let Err(e) = stream.set_nodelay(self.config.no_delay) {
            tracing::debug!(target: targets::IO_LOOP, %peer_addr, error = %e, "failed to set TCP_NODELAY");
        }

        let token = Token(self.next_token);
        self.next_token += 1;

        if let Some(registry) = &self.session.registry
            && let Err(e) = registry.add(peer_addr, token)
        {
            tracing::warn!(target: targets::IO_LOOP, %peer_addr, error = %e, "rejecting connection");
            self.session.events.emit_debug(e.to_string());
            return Ok(());
        }

        self.poll
            .registry()
            .register(&mut stream, token, Interest::READABLE | Interest::WRITABLE)?;

        let handle = ConnectionHandle::new(stream, token, peer_addr, self.config.line_terminator)
            .with_pending_limit(self.config.max_pending_bytes);
        self.connections.insert(token, handle);
        self.by_addr.insert(peer_addr, token);

        tracing::info!(target: targets::IO_LOOP, role = self.role.name(), %peer_addr, "connection established");
        self.session
            .events
            .emit_debug(format!("Connection[{peer_addr}] established."));
        Ok(())
    }

    fn read_from(&mut self, token: Token) {
        let Some(handle) = self.connections.get_mut(&token) else {
            return;
        };
        let peer = handle.peer_addr();
        let outcome = handle.read_lines(&mut self.read_buf);

        let tag = match self.role {
            Role::Client => None,
            Role::Server => Some(peer),
        };
        for line in outcome.lines {
            self.session.events.emit_received(self.role.name(), tag, line);
        }

        match outcome.status {
            ReadStatus::Open => {}
            ReadStatus::Closed => self.close_connection(token, None),
            ReadStatus::Broken(e) => self.close_connection(token, Some(e)),
        }
    }

    fn flush(&mut self, token: Token) {
        let Some(handle) = self.connections.get_mut(&token) else {
            return;
        };
        if !handle.wants_write() {
            return;
        }
        let peer = handle.peer_addr();
        match handle.flush() {
            Ok(done) => self.emit_sent(peer, done),
            Err(e) => self.close_connection(token, Some(e)),
        }
    }

    fn emit_sent(&self, peer: SocketAddr, lines: Vec<String>) {
        for text in lines {
            self.session.events.emit_sent(self.role.name(), Some(peer), text);
        }
    }

    fn route(&self, line: &OutboundLine) -> Option<Token> {
        match (line.addressee, self.role) {
            (Some(addr), _) => self.by_addr.get(&addr).copied(),
            (None, Role::Client) => self.connections.keys().next().copied(),
            (None, Role::Server) => {
                let selected = self.session.registry.as_ref()?.selected()?;
                self.by_addr.get(&selected).copied()
            }
        }
    }

    fn drain_queue(&mut self) {
        while let Some(line) = self.session.queue.try_dequeue() {
            let Some(token) = self.route(&line) else {
                let target = line
                    .addressee
                    .map_or_else(|| "peer".to_string(), |addr| addr.to_string());
                tracing::debug!(target: targets::IO_LOOP, %target, "discarding line for departed peer");
                self.session
                    .events
                    .emit_debug(format!("Connection[{target}] is gone, line discarded."));
                continue;
            };
            let Some(handle) = self.connections.get_mut(&token) else {
                continue;
            };

            let peer = handle.peer_addr();
            if !handle.queue_line(&line.text) {
                let pending = handle.pending_bytes();
                tracing::warn!(target: targets::IO_LOOP, %peer, pending, "peer is not reading, line discarded");
                self.session
                    .events
                    .emit_debug(format!("Connection[{peer}] is not keeping up, line discarded."));
                continue;
            }
            match handle.flush() {
                Ok(done) => self.emit_sent(peer, done),
                Err(e) => self.close_connection(token, Some(e)),
            }
        }
    }

    /// Drop one connection. `error` is `None` for an orderly close.
    fn close_connection(&mut self, token: Token, error: Option<io::Error>) {
        let Some(mut handle) = self.connections.remove(&token) else {
            return;
        };
        let peer = handle.peer_addr();
        self.by_addr.remove(&peer);
        if let Err(e) = self.poll.registry().deregister(handle.stream_mut()) {
            tracing::debug!(target: targets::IO_LOOP, %peer, error = %e, "deregister failed");
        }
        if let Err(e) = handle.shutdown() {
            tracing::debug!(target: targets::IO_LOOP, %peer, error = %e, "close failed");
        }
        if handle.pending_lines() > 0 {
            tracing::debug!(target: targets::IO_LOOP, %peer, lines = handle.pending_lines(), "discarded unsent lines");
        }
        if let Some(registry) = &self.session.registry {
            registry.remove(peer);
        }

        match error {
            None => {
                tracing::info!(target: targets::IO_LOOP, role = self.role.name(), %peer, "connection closed");
                self.session.events.emit_debug(format!("Connection[{peer}] closed."));
            }
            Some(e) => {
                tracing::warn!(target: targets::IO_LOOP, role = self.role.name(), %peer, error = %e, "connection broken");
                self.session.events.emit_debug(format!("Connection[{peer}] broken."));
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(mut listener) = self.listener.take()
            && let Err(e) = self.poll.registry().deregister(&mut listener)
        {
            tracing::debug!(target: targets::IO_LOOP, error = %e, "listener deregister failed");
        }

        for (_, mut handle) in self.connections.drain() {
            if let Err(e) = self.poll.registry().deregister(handle.stream_mut()) {
                tracing::debug!(target: targets::IO_LOOP, peer = %handle.peer_addr(), error = %e, "deregister failed");
            }
            if let Err(e) = handle.shutdown() {
                tracing::debug!(target: targets::IO_LOOP, peer = %handle.peer_addr(), error = %e, "close failed");
            }
        }
        self.by_addr.clear();
        if let Some(registry) = &self.session.registry {
            registry.clear();
        }

        let dropped = self.session.queue.clear();
        if dropped > 0 {
            tracing::debug!(target: targets::IO_LOOP, dropped, "discarded unsent lines");
        }

        if let Some(hook) = self.on_teardown.take() {
            hook();
        }

        tracing::debug!(target: targets::IO_LOOP, role = self.role.name(), "I/O loop stopped");
        self.session.coordinator.mark_stopped();
        self.session.events.emit_debug(self.role.stopped_message());
    }
}
