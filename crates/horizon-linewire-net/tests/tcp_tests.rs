//! Tests for the line client and server sessions over loopback.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use horizon_linewire_net::{
    ClientConfig, LineTerminator, NetworkError, ServerConfig, SessionState, SocketConfig,
    TcpLineClient, TcpLineServer,
};

type Lines = Arc<Mutex<Vec<(Option<SocketAddr>, String)>>>;
type Texts = Arc<Mutex<Vec<String>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("horizon_linewire_net=debug")
        .try_init();
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn collect_received(events: &horizon_linewire_net::LineEvents) -> Lines {
    let lines: Lines = Arc::new(Mutex::new(Vec::new()));
    let l = lines.clone();
    events.received.connect(move |(peer, text)| l.lock().push((*peer, text.clone())));
    lines
}

fn collect_sent(events: &horizon_linewire_net::LineEvents) -> Lines {
    let lines: Lines = Arc::new(Mutex::new(Vec::new()));
    let l = lines.clone();
    events.sent.connect(move |(peer, text)| l.lock().push((*peer, text.clone())));
    lines
}

fn collect_debug(events: &horizon_linewire_net::LineEvents) -> Texts {
    let texts: Texts = Arc::new(Mutex::new(Vec::new()));
    let t = texts.clone();
    events.debug.connect(move |text| t.lock().push(text.clone()));
    texts
}

fn start_server() -> (TcpLineServer, SocketAddr) {
    let server = TcpLineServer::new();
    let addr = server
        .listen(&ServerConfig::new("127.0.0.1", 0))
        .expect("listen on loopback");
    (server, addr)
}

#[test]
fn test_socket_config_builder() {
    let config = SocketConfig::new()
        .no_delay(false)
        .read_buffer_size(16384)
        .poll_timeout(Duration::from_millis(20))
        .line_terminator(LineTerminator::Lf)
        .events_capacity(8);

    assert!(!config.no_delay);
    assert_eq!(config.read_buffer_size, 16384);
    assert_eq!(config.poll_timeout, Duration::from_millis(20));
    assert_eq!(config.line_terminator, LineTerminator::Lf);
    assert_eq!(config.events_capacity, 8);
}

#[test]
fn test_client_config_builder() {
    let config = ClientConfig::new("localhost", 8080)
        .no_delay(true)
        .poll_timeout(Duration::from_millis(50));

    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 8080);
    assert_eq!(config.address(), "localhost:8080");
    assert!(config.socket.no_delay);
    assert_eq!(config.socket.poll_timeout, Duration::from_millis(50));
}

#[test]
fn test_server_config_builder() {
    let config = ServerConfig::new("0.0.0.0", 9000).no_delay(true);

    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.port, 9000);
    assert_eq!(config.bind_addr(), "0.0.0.0:9000");
    assert!(config.socket.no_delay);
}

#[test]
fn test_client_initial_state() {
    let client = TcpLineClient::new();

    assert_eq!(client.state(), SessionState::Idle);
    assert!(!client.is_connected());
    assert_eq!(client.peer_addr(), None);
    assert_eq!(client.local_addr(), None);
    assert!(!client.is_repeat_armed());
    assert!(!client.close());
}

#[test]
fn test_server_initial_state() {
    let server = TcpLineServer::new();

    assert_eq!(server.state(), SessionState::Idle);
    assert!(!server.is_listening());
    assert_eq!(server.local_addr(), None);
    assert_eq!(server.peer_count(), 0);
    assert_eq!(server.selected(), None);
    assert!(!server.stop());
}

#[test]
fn test_send_before_open_fails() {
    let client = TcpLineClient::new();
    assert!(matches!(client.send("hello"), Err(NetworkError::NotRunning)));

    let server = TcpLineServer::new();
    assert!(matches!(server.send("hello"), Err(NetworkError::NotRunning)));
}

#[test]
fn test_invalid_client_input_reported_once() {
    let client = TcpLineClient::new();
    let debug = collect_debug(client.events());

    let err = client.open_with("127.0.0.1", "").unwrap_err();
    assert_eq!(err.to_string(), "Port is empty.");
    assert_eq!(*debug.lock(), vec!["Port is empty.".to_string()]);
    assert_eq!(client.state(), SessionState::Idle);
}

#[test]
fn test_connect_refused_leaves_client_idle() {
    // Bind then drop to find a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let client = TcpLineClient::new();
    let result = client.open(&ClientConfig::new("127.0.0.1", port));
    assert!(matches!(result, Err(NetworkError::Connect { .. })));
    assert_eq!(client.state(), SessionState::Idle);
}

#[test]
fn test_server_listens_on_ephemeral_port() {
    init_tracing();
    let server = TcpLineServer::new();
    let debug = collect_debug(server.events());

    let addr = server.listen(&ServerConfig::new("127.0.0.1", 0)).unwrap();
    assert_ne!(addr.port(), 0);
    assert_eq!(server.local_addr(), Some(addr));
    assert!(server.is_listening());
    assert_eq!(debug.lock()[0], format!("Server listening on {addr} ..."));

    assert!(matches!(
        server.listen(&ServerConfig::new("127.0.0.1", 0)),
        Err(NetworkError::AlreadyRunning)
    ));

    assert!(server.stop());
    assert_eq!(server.state(), SessionState::Idle);
}

#[test]
fn test_end_to_end_hello_world() {
    init_tracing();
    let (server, server_addr) = start_server();
    let server_received = collect_received(server.events());
    let server_debug = collect_debug(server.events());

    let client = TcpLineClient::new();
    let client_received = collect_received(client.events());
    client
        .open(&ClientConfig::new("127.0.0.1", server_addr.port()))
        .unwrap();
    let client_addr = client.local_addr().unwrap();
    assert_eq!(client.peer_addr(), Some(server_addr));

    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 1));
    assert_eq!(server.peers(), vec![client_addr]);

    client.send("hello").unwrap();
    assert!(wait_until(Duration::from_secs(5), || !server_received.lock().is_empty()));
    assert_eq!(
        server_received.lock()[0],
        (Some(client_addr), "hello".to_string())
    );

    server.select(client_addr).unwrap();
    server.send("world").unwrap();
    assert!(wait_until(Duration::from_secs(5), || !client_received.lock().is_empty()));
    assert_eq!(client_received.lock()[0], (None, "world".to_string()));

    assert!(client.close());
    assert_eq!(client.state(), SessionState::Idle);

    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 0));
    let closing: Vec<String> = server_debug
        .lock()
        .iter()
        .filter(|line| line.ends_with("closed.") || line.ends_with("broken."))
        .cloned()
        .collect();
    assert_eq!(closing.len(), 1);
    assert!(closing[0].starts_with(&format!("Connection[{client_addr}]")));
    assert_eq!(server.selected(), None);

    server.stop();
}

#[test]
fn test_client_sent_stream_is_tagged_with_peer() {
    let (server, server_addr) = start_server();
    let client = TcpLineClient::new();
    let sent: Lines = Arc::new(Mutex::new(Vec::new()));
    let s = sent.clone();
    client
        .events()
        .sent
        .connect(move |(peer, text)| s.lock().push((*peer, text.clone())));

    client
        .open(&ClientConfig::new("127.0.0.1", server_addr.port()))
        .unwrap();
    client.send("one").unwrap();
    client.send("two").unwrap();

    assert!(wait_until(Duration::from_secs(5), || sent.lock().len() == 2));
    assert_eq!(
        *sent.lock(),
        vec![
            (Some(server_addr), "one".to_string()),
            (Some(server_addr), "two".to_string())
        ]
    );

    client.close();
    server.stop();
}

#[test]
fn test_raw_peer_receives_crlf_lines_in_order() {
    let (server, server_addr) = start_server();

    let raw = TcpStream::connect(server_addr).unwrap();
    raw.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let raw_addr = raw.local_addr().unwrap();
    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 1));

    for i in 0..20 {
        server.send_to(&format!("line {i}"), raw_addr).unwrap();
    }

    let mut reader = BufReader::new(raw);
    for i in 0..20 {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, format!("line {i}\r\n"));
    }

    server.stop();
}

#[test]
fn test_server_splits_mixed_terminators() {
    let (server, server_addr) = start_server();
    let received = collect_received(server.events());

    let mut raw = TcpStream::connect(server_addr).unwrap();
    raw.write_all(b"alpha\r\nbeta\ngamma\r\r\n").unwrap();

    assert!(wait_until(Duration::from_secs(5), || received.lock().len() >= 3));
    let texts: Vec<String> = received.lock().iter().map(|(_, t)| t.clone()).collect();
    assert_eq!(texts, vec!["alpha", "beta", "gamma"]);

    server.stop();
}

#[test]
fn test_multiple_clients_and_selection_advance() {
    let (server, server_addr) = start_server();
    let received = collect_received(server.events());

    let a = TcpLineClient::new();
    a.open(&ClientConfig::new("127.0.0.1", server_addr.port())).unwrap();
    let a_addr = a.local_addr().unwrap();
    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 1));

    let b = TcpLineClient::new();
    let b_received = collect_received(b.events());
    b.open(&ClientConfig::new("127.0.0.1", server_addr.port())).unwrap();
    let b_addr = b.local_addr().unwrap();
    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 2));

    assert_eq!(server.selected(), Some(a_addr));

    a.send("from a").unwrap();
    b.send("from b").unwrap();
    assert!(wait_until(Duration::from_secs(5), || received.lock().len() == 2));
    let tags: Vec<Option<SocketAddr>> = received.lock().iter().map(|(p, _)| *p).collect();
    assert!(tags.contains(&Some(a_addr)));
    assert!(tags.contains(&Some(b_addr)));

    a.close();
    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 1));
    assert_eq!(server.selected(), Some(b_addr));
    assert!(b.is_connected());

    server.send("only b").unwrap();
    assert!(wait_until(Duration::from_secs(5), || !b_received.lock().is_empty()));
    assert_eq!(b_received.lock()[0].1, "only b");

    b.close();
    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 0));
    assert_eq!(server.selected(), None);
    assert!(matches!(server.send("nobody"), Err(NetworkError::NoAddressee)));

    server.stop();
}

#[test]
fn test_send_to_unknown_peer_fails() {
    let (server, _) = start_server();
    let stranger: SocketAddr = "127.0.0.1:1".parse().unwrap();
    assert!(matches!(
        server.send_to("hi", stranger),
        Err(NetworkError::UnknownPeer(a)) if a == stranger
    ));
    assert!(matches!(server.select(stranger), Err(NetworkError::UnknownPeer(_))));
    server.stop();
}

#[test]
fn test_client_ends_session_when_server_stops() {
    let (server, server_addr) = start_server();
    let client = TcpLineClient::new();
    let debug = collect_debug(client.events());
    client
        .open(&ClientConfig::new("127.0.0.1", server_addr.port()))
        .unwrap();
    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 1));

    server.stop();
    assert_eq!(server.peer_count(), 0);

    assert!(wait_until(Duration::from_secs(5), || client.state()
        == SessionState::Stopped));
    assert!(!client.is_connected());
    assert!(matches!(client.send("late"), Err(NetworkError::NotRunning)));
    assert!(wait_until(Duration::from_secs(5), || debug
        .lock()
        .iter()
        .any(|line| line == "Client stopped running.")));

    // The finished session can be replaced by a new one.
    let (server, server_addr) = start_server();
    client
        .open(&ClientConfig::new("127.0.0.1", server_addr.port()))
        .unwrap();
    assert!(client.is_connected());
    client.close();
    server.stop();
}

#[test]
fn test_stop_with_zero_peers_returns_promptly() {
    let (server, _) = start_server();
    let debug = collect_debug(server.events());

    let started = Instant::now();
    assert!(server.stop());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(server.state(), SessionState::Idle);
    assert!(wait_until(Duration::from_secs(1), || debug
        .lock()
        .iter()
        .any(|line| line == "Server stopped running.")));
}

#[test]
fn test_repeat_gating() {
    let (server, server_addr) = start_server();
    let received = collect_received(server.events());

    let client = TcpLineClient::new();
    let debug = collect_debug(client.events());

    // Not connected yet.
    assert!(matches!(
        client.enable_repeat("100", "ping"),
        Err(NetworkError::RepeatRejected(_))
    ));

    client
        .open(&ClientConfig::new("127.0.0.1", server_addr.port()))
        .unwrap();

    let before = debug.lock().len();
    assert!(matches!(
        client.enable_repeat("50", "ping"),
        Err(NetworkError::RepeatRejected(_))
    ));
    assert!(!client.is_repeat_armed());
    assert_eq!(debug.lock().len(), before + 1);

    assert_eq!(
        client.enable_repeat("100", "ping").unwrap(),
        Duration::from_millis(100)
    );
    assert!(client.is_repeat_armed());
    assert_eq!(client.repeat_interval(), Some(Duration::from_millis(100)));
    assert!(matches!(client.send("manual"), Err(NetworkError::RepeatArmed)));

    assert!(wait_until(Duration::from_secs(5), || received.lock().len() >= 3));
    assert!(received.lock().iter().all(|(_, text)| text == "ping"));

    assert!(client.disable_repeat());
    assert!(!client.is_repeat_armed());
    client.send("manual").unwrap();

    client.close();
    server.stop();
}

#[test]
fn test_repeat_stops_when_connection_lost() {
    let (server, server_addr) = start_server();
    let client = TcpLineClient::new();
    client
        .open(&ClientConfig::new("127.0.0.1", server_addr.port()))
        .unwrap();
    client.enable_repeat("100", "tick").unwrap();

    server.stop();
    assert!(wait_until(Duration::from_secs(5), || !client.is_repeat_armed()));
    client.close();
}

#[test]
fn test_repeat_disarmed_as_soon_as_session_stops() {
    let (server, server_addr) = start_server();
    let client = TcpLineClient::new();
    client
        .open(&ClientConfig::new("127.0.0.1", server_addr.port()))
        .unwrap();
    client.enable_repeat("5000", "slow tick").unwrap();
    assert!(client.is_repeat_armed());

    server.stop();
    assert!(wait_until(Duration::from_secs(5), || {
        client.state() == SessionState::Stopped
    }));
    assert!(!client.is_repeat_armed());
    assert_eq!(client.repeat_interval(), None);

    // A new connection starts with manual sending and can arm again.
    let (server, server_addr) = start_server();
    let received = collect_received(server.events());
    client
        .open(&ClientConfig::new("127.0.0.1", server_addr.port()))
        .unwrap();
    client.send("manual").unwrap();
    assert!(wait_until(Duration::from_secs(5), || received.lock().len() == 1));
    assert_eq!(
        client.enable_repeat("5000", "slow tick").unwrap(),
        Duration::from_millis(5000)
    );
    assert!(matches!(client.send("blocked"), Err(NetworkError::RepeatArmed)));

    client.close();
    assert!(!client.is_repeat_armed());
    server.stop();
}

#[test]
fn test_sent_stream_waits_for_transmission() {
    let (server, _) = start_server();
    let sent = collect_sent(server.events());
    let debug = collect_debug(server.events());

    // Connects but never reads.
    let raw = TcpStream::connect(server.local_addr().unwrap()).unwrap();
    let raw_addr = raw.local_addr().unwrap();
    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 1));

    let line = "q".repeat(64 * 1024);
    for _ in 0..400 {
        server.send_to(&line, raw_addr).unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        debug
            .lock()
            .iter()
            .any(|text| text == &format!("Connection[{raw_addr}] is not keeping up, line discarded."))
    }));
    thread::sleep(Duration::from_millis(200));
    let reported = sent.lock().len();
    assert!(reported < 400, "{reported} lines reported sent to a peer that reads nothing");

    drop(raw);
    server.stop();
}

#[test]
fn test_reset_peer_is_broken_and_others_continue() {
    init_tracing();
    let (server, server_addr) = start_server();
    let sent = collect_sent(server.events());
    let debug = collect_debug(server.events());

    let client = TcpLineClient::new();
    let client_received = collect_received(client.events());
    client
        .open(&ClientConfig::new("127.0.0.1", server_addr.port()))
        .unwrap();
    let client_addr = client.local_addr().unwrap();

    let raw = TcpStream::connect(server_addr).unwrap();
    let raw_addr = raw.local_addr().unwrap();
    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 2));

    // Closing with unread data makes the kernel answer with a reset.
    server.send_to("never read", raw_addr).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        sent.lock().iter().any(|(peer, _)| *peer == Some(raw_addr))
    }));
    thread::sleep(Duration::from_millis(50));
    drop(raw);

    assert!(wait_until(Duration::from_secs(5), || server.peer_count() == 1));
    let ending: Vec<String> = debug
        .lock()
        .iter()
        .filter(|text| text.starts_with(&format!("Connection[{raw_addr}]")))
        .filter(|text| text.ends_with("closed.") || text.ends_with("broken."))
        .cloned()
        .collect();
    assert_eq!(ending.len(), 1);
    #[cfg(target_os = "linux")]
    assert_eq!(ending[0], format!("Connection[{raw_addr}] broken."));

    assert_eq!(server.peers(), vec![client_addr]);
    assert_eq!(server.selected(), Some(client_addr));
    assert!(matches!(
        server.send_to("late", raw_addr),
        Err(NetworkError::UnknownPeer(addr)) if addr == raw_addr
    ));

    server.send("still here").unwrap();
    assert!(wait_until(Duration::from_secs(5), || !client_received.lock().is_empty()));
    assert_eq!(client_received.lock()[0], (None, "still here".to_string()));
    assert!(client.is_connected());

    client.close();
    server.stop();
}

#[test]
fn test_session_state_display() {
    assert_eq!(SessionState::Idle.to_string(), "Idle");
    assert_eq!(SessionState::Running.to_string(), "Running");
    assert_eq!(SessionState::StoppingRequested.to_string(), "StoppingRequested");
    assert_eq!(SessionState::Stopped.to_string(), "Stopped");
}
