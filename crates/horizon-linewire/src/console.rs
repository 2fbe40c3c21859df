//! Line-oriented terminal front-end for the client and server.
//!
//! A plain input line is sent as-is (start it with `//` to send a line that
//! begins with `/`). Commands start with `/`:
//!
//! | Command              | Client                           | Server                          |
//! |----------------------|----------------------------------|---------------------------------|
//! | `/open [addr port]`  | connect (defaults from settings) | `/open [port]`: start listening |
//! | `/close`             | disconnect                       | stop listening                  |
//! | `/repeat <ms> [text]`| resend every `ms` milliseconds   | n/a                             |
//! | `/norepeat`          | stop resending                   | n/a                             |
//! | `/peers`             | n/a                              | list connected peers            |
//! | `/select <addr>`     | n/a                              | choose the addressee            |
//! | `/clear [pane]`      | clear received, sent or debug    | same                            |
//! | `/state`             | session summary                  | same                            |
//! | `/help`, `/quit`     |                                  |                                 |

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use horizon_linewire_core::{Pane, Transcript, TranscriptEntry};
use horizon_linewire_net::{LineEvents, NetworkError, TcpLineClient, TcpLineServer};

use crate::settings::{ClientSettings, ServerSettings};

/// Transcript entries kept per pane.
pub const TRANSCRIPT_CAPACITY: usize = 10_000;

/// One parsed input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Send a line.
    Send(String),
    /// Open a session with optional arguments.
    Open(Vec<String>),
    Close,
    /// Arm repeat with an interval in milliseconds and optional text.
    Repeat { interval: String, text: Option<String> },
    NoRepeat,
    Peers,
    Select(String),
    /// Clear one pane, or all of them.
    Clear(Option<Pane>),
    State,
    Help,
    Quit,
}

/// Whether the input loop should keep reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    if let Some(escaped) = line.strip_prefix("//") {
        return Ok(Some(Command::Send(format!("/{escaped}"))));
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<String> = words.map(str::to_owned).collect();

    let command = match name.as_str() {
        "open" | "connect" | "listen" => Command::Open(args),
        "close" | "disconnect" | "stop" => Command::Close,
        "repeat" => {
            let Some(interval) = args.first().cloned() else {
                return Err("Usage: /repeat <ms> [text]".into());
            };
            // Keep the text exactly as typed after the interval.
            let text = rest
                .trim_start()
                .split_once(char::is_whitespace)
                .map(|(_, tail)| tail.trim_start())
                .and_then(|tail| tail.split_once(char::is_whitespace))
                .map(|(_, text)| text.trim_start().to_string())
                .filter(|text| !text.is_empty());
            Command::Repeat { interval, text }
        }
        "norepeat" => Command::NoRepeat,
        "peers" => Command::Peers,
        "select" => match args.as_slice() {
            [addr] => Command::Select(addr.clone()),
            _ => return Err("Usage: /select <addr:port>".into()),
        },
        "clear" => match args.as_slice() {
            [] => Command::Clear(None),
            [pane] => Command::Clear(Some(pane.parse()?)),
            _ => return Err("Usage: /clear [received|sent|debug]".into()),
        },
        "state" | "status" => Command::State,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Unknown command '/{other}'. Type /help for a list.")),
    };
    Ok(Some(command))
}

/// Print every event of `events` to stdout as it happens.
pub fn print_events(events: &LineEvents) {
    events.received.connect(|(peer, text)| {
        print_entry("rx", TranscriptEntry::now(peer.map(|p| p.to_string()), text.as_str()));
    });
    events.sent.connect(|(peer, text)| {
        print_entry("tx", TranscriptEntry::now(peer.map(|p| p.to_string()), text.as_str()));
    });
    events.debug.connect(|text| {
        print_entry("--", TranscriptEntry::now(None, text.as_str()));
    });
}

fn print_entry(label: &str, entry: TranscriptEntry) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{label} {entry}");
}

fn clear<W: Write>(transcript: &Transcript, pane: Option<Pane>, out: &mut W) -> io::Result<()> {
    match pane {
        Some(pane) => {
            transcript.clear(pane);
            writeln!(out, "Cleared {pane}.")
        }
        None => {
            transcript.clear_all();
            writeln!(out, "Cleared all panes.")
        }
    }
}

fn report<W: Write>(out: &mut W, result: Result<(), NetworkError>) -> io::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) => writeln!(out, "error: {e}"),
    }
}

/// A front-end that turns parsed commands into engine calls.
pub trait Console {
    /// Run one command, writing feedback to `out`.
    fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<Flow>;
}

/// Read lines from `input` and execute them until EOF or `/quit`.
pub fn run<C, R, W>(console: &mut C, input: R, out: &mut W) -> io::Result<()>
where
    C: Console,
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line?;
        match parse_command(&line) {
            Ok(Some(command)) => {
                if console.execute(command, out)? == Flow::Quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => writeln!(out, "{message}")?,
        }
        out.flush()?;
    }
    Ok(())
}

const CLIENT_HELP: &str = "\
Type a line and press Enter to send it.
  /open [addr port]     connect (default: last used)
  /close                disconnect
  /repeat <ms> [text]   resend text every ms milliseconds (minimum 100)
  /norepeat             stop resending
  /clear [pane]         clear received, sent or debug (default: all)
  /state                show the connection state
  /quit                 disconnect and exit";

const SERVER_HELP: &str = "\
Type a line and press Enter to send it to the selected peer.
  /open [port]          start listening (default: last used)
  /close                stop listening and drop every peer
  /peers                list connected peers (* marks the addressee)
  /select <addr:port>   choose the addressee
  /clear [pane]         clear received, sent or debug (default: all)
  /state                show the listener state
  /quit                 stop and exit";

/// Console session driving a [`TcpLineClient`].
pub struct ClientConsole {
    client: TcpLineClient,
    settings: ClientSettings,
    transcript: Arc<Transcript>,
}

impl ClientConsole {
    /// Create a console with a fresh client and transcript.
    pub fn new(settings: ClientSettings) -> Self {
        let client = TcpLineClient::new();
        let transcript = Arc::new(Transcript::with_capacity_limit(TRANSCRIPT_CAPACITY));
        client.events().attach_transcript(transcript.clone());
        Self {
            client,
            settings,
            transcript,
        }
    }

    /// The engine behind this console.
    pub fn client(&self) -> &TcpLineClient {
        &self.client
    }

    /// Settings as last edited.
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// The Received/Sent/Debug transcript.
    pub fn transcript(&self) -> &Arc<Transcript> {
        &self.transcript
    }

    /// Close the connection and hand back the settings to persist.
    pub fn shutdown(self) -> ClientSettings {
        self.client.close();
        self.settings
    }
}

impl Console for ClientConsole {
    fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<Flow> {
        match command {
            Command::Send(text) => {
                let result = self.client.send(&text);
                self.settings.send_text = text;
                report(out, result)?;
            }
            Command::Open(args) => {
                let (address, port) = match args.as_slice() {
                    [] => (self.settings.address.clone(), self.settings.port.to_string()),
                    [address, port] => (address.clone(), port.clone()),
                    _ => {
                        writeln!(out, "Usage: /open [addr port]")?;
                        return Ok(Flow::Continue);
                    }
                };
                match self.client.open_with(&address, &port) {
                    Ok(peer) => {
                        self.settings.address = address.trim().to_string();
                        self.settings.port = peer.port();
                    }
                    Err(e) => writeln!(out, "error: {e}")?,
                }
            }
            Command::Close => {
                if !self.client.close() {
                    writeln!(out, "Not connected.")?;
                }
            }
            Command::Repeat { interval, text } => {
                let text = text.unwrap_or_else(|| self.settings.send_text.clone());
                match self.client.enable_repeat(&interval, &text) {
                    Ok(every) => {
                        self.settings.repeat_interval_ms = every.as_millis() as u64;
                        self.settings.send_text = text;
                        writeln!(out, "Repeating every {} ms.", every.as_millis())?;
                    }
                    Err(e) => writeln!(out, "error: {e}")?,
                }
            }
            Command::NoRepeat => {
                if self.client.disable_repeat() {
                    writeln!(out, "Repeat stopped.")?;
                } else {
                    writeln!(out, "Repeat is not running.")?;
                }
            }
            Command::Peers | Command::Select(_) => {
                writeln!(out, "Peer selection is only available on the server.")?;
            }
            Command::Clear(pane) => clear(&self.transcript, pane, out)?,
            Command::State => {
                write!(out, "{}", self.client.state())?;
                if let Some(peer) = self.client.peer_addr() {
                    write!(out, ", peer {peer}")?;
                }
                if let Some(local) = self.client.local_addr() {
                    write!(out, ", local {local}")?;
                }
                if let Some(every) = self.client.repeat_interval() {
                    write!(out, ", repeating every {} ms", every.as_millis())?;
                }
                writeln!(out)?;
            }
            Command::Help => writeln!(out, "{CLIENT_HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
}

/// Console session driving a [`TcpLineServer`].
pub struct ServerConsole {
    server: TcpLineServer,
    settings: ServerSettings,
    transcript: Arc<Transcript>,
}

impl ServerConsole {
    /// Create a console with a fresh server and transcript.
    pub fn new(settings: ServerSettings) -> Self {
        let server = TcpLineServer::new();
        let transcript = Arc::new(Transcript::with_capacity_limit(TRANSCRIPT_CAPACITY));
        server.events().attach_transcript(transcript.clone());
        Self {
            server,
            settings,
            transcript,
        }
    }

    /// The engine behind this console.
    pub fn server(&self) -> &TcpLineServer {
        &self.server
    }

    /// Settings as last edited.
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// The Received/Sent/Debug transcript.
    pub fn transcript(&self) -> &Arc<Transcript> {
        &self.transcript
    }

    /// Stop listening and hand back the settings to persist.
    pub fn shutdown(self) -> ServerSettings {
        self.server.stop();
        self.settings
    }
}

impl Console for ServerConsole {
    fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<Flow> {
        match command {
            Command::Send(text) => {
                let result = self.server.send(&text);
                self.settings.send_text = text;
                report(out, result)?;
            }
            Command::Open(args) => {
                let port = match args.as_slice() {
                    [] => self.settings.port.to_string(),
                    [port] => port.clone(),
                    _ => {
                        writeln!(out, "Usage: /open [port]")?;
                        return Ok(Flow::Continue);
                    }
                };
                match self.server.listen_with(&port) {
                    Ok(local) => self.settings.port = local.port(),
                    Err(e) => writeln!(out, "error: {e}")?,
                }
            }
            Command::Close => {
                if !self.server.stop() {
                    writeln!(out, "Not listening.")?;
                }
            }
            Command::Repeat { .. } | Command::NoRepeat => {
                writeln!(out, "Repeat is only available on the client.")?;
            }
            Command::Peers => {
                let peers = self.server.peers();
                if peers.is_empty() {
                    writeln!(out, "No peers connected.")?;
                }
                let selected = self.server.selected();
                for peer in peers {
                    let marker = if Some(peer) == selected { '*' } else { ' ' };
                    writeln!(out, "{marker} {peer}")?;
                }
            }
            Command::Select(addr) => match addr.parse::<SocketAddr>() {
                Ok(addr) => report(out, self.server.select(addr))?,
                Err(_) => writeln!(out, "error: '{addr}' is not an address:port")?,
            },
            Command::Clear(pane) => clear(&self.transcript, pane, out)?,
            Command::State => {
                write!(out, "{}", self.server.state())?;
                if let Some(local) = self.server.local_addr() {
                    write!(out, ", listening on {local}")?;
                }
                write!(out, ", {} peer(s)", self.server.peer_count())?;
                if let Some(selected) = self.server.selected() {
                    write!(out, ", addressee {selected}")?;
                }
                writeln!(out)?;
            }
            Command::Help => writeln!(out, "{SERVER_HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
}
