//! One established TCP socket owned by the I/O loop.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::time::Instant;

use mio::Token;
use mio::net::TcpStream;

use crate::codec::{LineDecoder, LineTerminator};
use crate::config::DEFAULT_MAX_PENDING_BYTES;

/// How a read pass ended.
#[derive(Debug)]
pub enum ReadStatus {
    /// The socket drained to `WouldBlock` and stays open.
    Open,
    /// The peer performed an orderly close (zero-length read).
    Closed,
    /// The read failed.
    Broken(io::Error),
}

/// Lines decoded during one read pass, plus how the pass ended.
#[derive(Debug)]
pub struct ReadOutcome {
    pub lines: Vec<String>,
    pub status: ReadStatus,
}

/// A line waiting in the outbox, with how much of it the socket has taken.
#[derive(Debug)]
struct PendingLine {
    text: String,
    bytes: Vec<u8>,
    written: usize,
}

/// An established connection.
///
/// Created on connect or accept, mutated only by the I/O loop thread, and
/// dropped (closing the socket) on read failure, orderly close, write failure
/// or shutdown. Outbound lines the socket could not take yet stay in the
/// outbox and are flushed on the next writable event, so the loop never
/// blocks on a slow reader. The outbox holds at most `pending_limit` bytes;
/// a line that would exceed it is refused.
#[derive(Debug)]
pub struct ConnectionHandle {
    stream: TcpStream,
    token: Token,
    peer_addr: SocketAddr,
    established_at: Instant,
    decoder: LineDecoder,
    terminator: LineTerminator,
    outbox: VecDeque<PendingLine>,
    pending_bytes: usize,
    pending_limit: usize,
}

impl ConnectionHandle {
    /// Wrap an already-connected (or connecting) stream.
    pub fn new(stream: TcpStream, token: Token, peer_addr: SocketAddr, terminator: LineTerminator) -> Self {
        Self {
            stream,
            token,
            peer_addr,
            established_at: Instant::now(),
            decoder: LineDecoder::new(),
            terminator,
            outbox: VecDeque::new(),
            pending_bytes: 0,
            pending_limit: DEFAULT_MAX_PENDING_BYTES,
        }
    }

    /// Cap the bytes the outbox may hold.
    pub fn with_pending_limit(mut self, limit: usize) -> Self {
        self.pending_limit = limit.max(1);
        self
    }

    /// Poll token of this connection.
    pub fn token(&self) -> Token {
        self.token
    }

    /// Remote address. Fixed for the handle's lifetime.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// When the handle was created.
    pub fn established_at(&self) -> Instant {
        self.established_at
    }

    /// Local address of the socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// The underlying stream, for poll registration.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Read until the socket would block, decoding lines as they arrive.
    pub fn read_lines(&mut self, buf: &mut [u8]) -> ReadOutcome {
        let mut lines = Vec::new();
        let status = loop {
            match self.stream.read(buf) {
                Ok(0) => break ReadStatus::Closed,
                Ok(n) => lines.extend(self.decoder.decode(&buf[..n])),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break ReadStatus::Open,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break ReadStatus::Broken(e),
            }
        };
        if !matches!(status, ReadStatus::Open) {
            lines.extend(self.decoder.finish());
        }
        ReadOutcome { lines, status }
    }

    /// Append one terminated line to the outbox.
    ///
    /// Returns `false` and leaves the outbox untouched when the line would
    /// push it past the pending limit. An empty outbox always takes the line.
    pub fn queue_line(&mut self, text: &str) -> bool {
        let bytes = self.terminator.encode(text);
        if !self.outbox.is_empty() && self.pending_bytes + bytes.len() > self.pending_limit {
            return false;
        }
        self.pending_bytes += bytes.len();
        self.outbox.push_back(PendingLine {
            text: text.to_string(),
            bytes,
            written: 0,
        });
        true
    }

    /// Write as much of the outbox as the socket accepts.
    ///
    /// Returns the lines whose last byte was written during this call, in
    /// order. `WouldBlock` is not an error: the remainder waits for the next
    /// writable event.
    pub fn flush(&mut self) -> io::Result<Vec<String>> {
        let mut done = Vec::new();
        while let Some(line) = self.outbox.front_mut() {
            match self.stream.write(&line.bytes[line.written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    line.written += n;
                    self.pending_bytes -= n;
                    let finished = line.written == line.bytes.len();
                    if finished && let Some(line) = self.outbox.pop_front() {
                        done.push(line.text);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(done)
    }

    /// Whether unflushed bytes remain.
    pub fn wants_write(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Bytes waiting in the outbox.
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Lines not yet fully written.
    pub fn pending_lines(&self) -> usize {
        self.outbox.len()
    }

    /// Best-effort close of both directions.
    pub fn shutdown(&self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Duration;

    fn pair() -> (ConnectionHandle, std::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server_side, peer) = listener.accept().unwrap();
        server_side.set_nonblocking(true).unwrap();
        let handle = ConnectionHandle::new(
            TcpStream::from_std(server_side),
            Token(2),
            peer,
            LineTerminator::CrLf,
        );
        (handle, client)
    }

    fn read_until(handle: &mut ConnectionHandle, want: usize) -> ReadOutcome {
        let mut buf = [0u8; 16];
        let mut lines = Vec::new();
        for _ in 0..200 {
            let outcome = handle.read_lines(&mut buf);
            lines.extend(outcome.lines);
            if lines.len() >= want || !matches!(outcome.status, ReadStatus::Open) {
                return ReadOutcome {
                    lines,
                    status: outcome.status,
                };
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        ReadOutcome {
            lines,
            status: ReadStatus::Open,
        }
    }

    #[test]
    fn test_reads_lines_across_small_buffer() {
        let (mut handle, mut peer) = pair();
        peer.write_all(b"first line is long\r\nsecond\n").unwrap();

        let outcome = read_until(&mut handle, 2);
        assert_eq!(outcome.lines, vec!["first line is long", "second"]);
        assert!(matches!(outcome.status, ReadStatus::Open));
    }

    #[test]
    fn test_orderly_close_is_reported() {
        let (mut handle, peer) = pair();
        drop(peer);

        let mut buf = [0u8; 64];
        let mut status = handle.read_lines(&mut buf).status;
        for _ in 0..200 {
            if !matches!(status, ReadStatus::Open) {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
            status = handle.read_lines(&mut buf).status;
        }
        assert!(matches!(status, ReadStatus::Closed | ReadStatus::Broken(_)));
    }

    #[test]
    fn test_flush_writes_terminated_lines() {
        let (mut handle, mut peer) = pair();
        assert!(handle.queue_line("hello"));
        assert!(handle.queue_line("world"));
        assert!(handle.wants_write());
        assert_eq!(handle.pending_bytes(), 14);

        assert_eq!(handle.flush().unwrap(), vec!["hello", "world"]);
        assert!(!handle.wants_write());
        assert_eq!(handle.pending_bytes(), 0);

        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        while received.len() < 14 {
            let n = peer.read(&mut buf).unwrap();
            assert!(n > 0);
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"hello\r\nworld\r\n");
    }

    #[test]
    fn test_pending_limit_refuses_lines() {
        let (handle, _peer) = pair();
        let mut handle = handle.with_pending_limit(1024);
        let line = "x".repeat(600);

        assert!(handle.queue_line(&line));
        assert!(!handle.queue_line(&line));
        assert_eq!(handle.pending_lines(), 1);
        assert_eq!(handle.pending_bytes(), 602);

        // A line larger than the limit still goes out when nothing is pending.
        let (handle, _peer) = pair();
        let mut handle = handle.with_pending_limit(16);
        assert!(handle.queue_line(&line));
    }

    #[test]
    fn test_unread_peer_keeps_lines_pending() {
        let (handle, _peer) = pair();
        let mut handle = handle.with_pending_limit(64 * 1024 * 1024);
        let line = "y".repeat(64 * 1024);

        // Far more than the loopback buffers hold while nobody reads.
        let mut sent = 0;
        for _ in 0..512 {
            assert!(handle.queue_line(&line));
            sent += handle.flush().unwrap().len();
        }

        assert!(sent < 512);
        assert!(handle.wants_write());
        assert_eq!(sent + handle.pending_lines(), 512);
    }
}
