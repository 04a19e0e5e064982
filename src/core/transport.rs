//! Direct TCP transport
//!
//! Carries out [`OutboundIntent`]s against a MUSH server over plain TCP and
//! reports what happens as [`InboundEvent`]s on a channel. Connecting and
//! reading happen on a background thread; the front end drains the channel
//! from its own loop.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::events::{InboundEvent, OutboundIntent, Target};

/// Upper bound for the connect timeout per resolved address
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);
/// Lower bound for the connect timeout
const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Connect timeout that lets an attempt fail before the next reconnect tick
pub fn connect_timeout_for(reconnect_delay: Duration) -> Duration {
    (reconnect_delay * 4 / 5).clamp(MIN_CONNECT_TIMEOUT, CONNECT_TIMEOUT)
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to resolve {0}")]
    Resolve(String, #[source] io::Error),

    #[error("No address found for {0}")]
    NoAddress(String),

    #[error("Failed to connect to {0}")]
    Connect(String, #[source] io::Error),

    #[error("Failed to write to server: {0}")]
    Write(#[source] io::Error),

    #[error("Not connected to any server")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Splits a byte stream into text lines.
///
/// Lines are decoded as UTF-8, falling back to Latin-1 for servers that send
/// 8-bit text. A trailing CR is removed.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes and return every completed line
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(decode_line(&line));
        }
        lines
    }

    /// Bytes received after the last newline
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|b| *b as char).collect(),
    }
}

/// One live connection
struct Connection {
    target: Target,
    /// Set when the connection is being closed on purpose
    stop: Arc<AtomicBool>,
    writer: Arc<Mutex<Option<TcpStream>>>,
    thread: Option<JoinHandle<()>>,
}

impl Connection {
    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.writer.lock() {
            if let Some(stream) = slot.take() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
        if let Some(handle) = self.thread.take() {
            // The reader may still be inside connect_timeout; don't block on it
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

/// TCP transport with a background reader thread
pub struct TcpTransport {
    connection: Option<Connection>,
    connect_timeout: Duration,
    events_tx: Sender<InboundEvent>,
    events_rx: Receiver<InboundEvent>,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::with_connect_timeout(CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            connection: None,
            connect_timeout,
            events_tx,
            events_rx,
        }
    }

    /// Carry out an intent. Failures are reported as inbound events.
    pub fn deliver(&mut self, intent: &OutboundIntent) {
        match intent {
            OutboundIntent::ConnectToServer {
                host,
                port,
                auto_log,
                ..
            } => {
                if *auto_log {
                    debug!("auto_log requested; session logging is handled elsewhere");
                }
                self.connect(Target::new(host.clone(), *port));
            }
            OutboundIntent::DisconnectFromServer {} => self.disconnect(),
            OutboundIntent::SendCommand { command } => {
                if let Err(e) = self.send(command) {
                    warn!("Send failed: {}", e);
                    let error = match e {
                        TransportError::NotConnected => e.to_string(),
                        _ => "Failed to send command".to_string(),
                    };
                    self.emit(InboundEvent::ConnectionError { error });
                }
            }
        }
    }

    /// Next pending event, if any
    pub fn try_recv(&self) -> Option<InboundEvent> {
        match self.events_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<InboundEvent> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn emit(&self, event: InboundEvent) {
        let _ = self.events_tx.send(event);
    }

    fn connect(&mut self, target: Target) {
        if let Some(mut old) = self.connection.take() {
            debug!("Replacing connection to {}", old.target);
            old.close();
        }

        info!("Opening TCP connection to {}", target);
        let stop = Arc::new(AtomicBool::new(false));
        let writer = Arc::new(Mutex::new(None));
        let events = self.events_tx.clone();

        let thread = {
            let target = target.clone();
            let stop = stop.clone();
            let writer = writer.clone();
            let timeout = self.connect_timeout;
            thread::spawn(move || run_connection(target, timeout, stop, writer, events))
        };

        self.connection = Some(Connection {
            target,
            stop,
            writer,
            thread: Some(thread),
        });
    }

    fn disconnect(&mut self) {
        match self.connection.take() {
            Some(mut connection) => {
                info!("Closing connection to {}", connection.target);
                connection.close();
                self.emit(InboundEvent::ServerDisconnected { message: None });
            }
            None => self.emit(InboundEvent::ConnectionError {
                error: TransportError::NotConnected.to_string(),
            }),
        }
    }

    fn send(&self, command: &str) -> Result<()> {
        let connection = self.connection.as_ref().ok_or(TransportError::NotConnected)?;
        let mut slot = connection
            .writer
            .lock()
            .map_err(|_| TransportError::NotConnected)?;
        let stream = slot.as_mut().ok_or(TransportError::NotConnected)?;

        let mut line = command.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        stream.write_all(line.as_bytes()).map_err(TransportError::Write)?;
        stream.flush().map_err(TransportError::Write)
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }
}

fn open_stream(target: &Target, timeout: Duration) -> Result<TcpStream> {
    let addrs = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Resolve(target.to_string(), e))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) => TransportError::Connect(target.to_string(), e),
        None => TransportError::NoAddress(target.to_string()),
    })
}

/// Connection thread: connect, then read lines until closed
fn run_connection(
    target: Target,
    timeout: Duration,
    stop: Arc<AtomicBool>,
    writer: Arc<Mutex<Option<TcpStream>>>,
    events: Sender<InboundEvent>,
) {
    let mut stream = match open_stream(&target, timeout) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Connection error: {}", e);
            if !stop.load(Ordering::SeqCst) {
                let _ = events.send(InboundEvent::ConnectionError {
                    error: format!("Failed to connect to {}", target),
                });
            }
            return;
        }
    };

    let write_half = match stream.try_clone() {
        Ok(clone) => clone,
        Err(e) => {
            error!("Failed to clone stream: {}", e);
            let _ = events.send(InboundEvent::ConnectionError {
                error: format!("Failed to connect to {}", target),
            });
            return;
        }
    };

    if stop.load(Ordering::SeqCst) {
        let _ = stream.shutdown(Shutdown::Both);
        return;
    }
    if let Ok(mut slot) = writer.lock() {
        *slot = Some(write_half);
    }
    let _ = events.send(InboundEvent::ServerConnected {
        host: target.host.clone(),
        port: target.port,
    });

    let mut decoder = LineDecoder::new();
    let mut buffer = vec![0u8; 4096];

    loop {
        match stream.read(&mut buffer) {
            Ok(0) => {
                if !stop.load(Ordering::SeqCst) {
                    info!("Server closed the connection");
                    let _ = events.send(InboundEvent::ServerDisconnected {
                        message: Some("Server closed the connection".to_string()),
                    });
                    // An unrequested close is a lost connection as well
                    let _ = events.send(InboundEvent::ConnectionLost {
                        host: Some(target.host.clone()),
                        port: Some(target.port),
                    });
                }
                break;
            }
            Ok(n) => {
                for text in decoder.feed(&buffer[..n]) {
                    if events.send(InboundEvent::ServerMessage { text }).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if !stop.load(Ordering::SeqCst) {
                    error!("Error reading from server: {}", e);
                    let _ = events.send(InboundEvent::ConnectionLost {
                        host: Some(target.host.clone()),
                        port: Some(target.port),
                    });
                }
                break;
            }
        }
    }

    if let Ok(mut slot) = writer.lock() {
        slot.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{ConnectionState, Effect, SessionMachine};
    use std::net::TcpListener;
    use std::time::Instant;

    #[test]
    fn test_line_decoder_splits_and_buffers() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.feed(b"Welcome\r\nto the"), vec!["Welcome".to_string()]);
        assert_eq!(decoder.pending(), b"to the");
        assert_eq!(
            decoder.feed(b" game\n\n"),
            vec!["to the game".to_string(), String::new()]
        );
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn test_line_decoder_latin1_fallback() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.feed(b"caf\xe9\n"), vec!["caf\u{e9}".to_string()]);
        assert_eq!(
            decoder.feed("caf\u{e9}\n".as_bytes()),
            vec!["caf\u{e9}".to_string()]
        );
    }

    #[test]
    fn test_send_without_connection() {
        let mut transport = TcpTransport::new();
        transport.deliver(&OutboundIntent::SendCommand {
            command: "look".to_string(),
        });
        assert_eq!(
            transport.try_recv(),
            Some(InboundEvent::ConnectionError {
                error: "Not connected to any server".to_string()
            })
        );
    }

    #[test]
    fn test_connect_read_and_send() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut transport = TcpTransport::new();
        transport.deliver(&OutboundIntent::ConnectToServer {
            host: "127.0.0.1".to_string(),
            port,
            auto_log: false,
            log_filename: None,
        });

        let (mut server, _) = listener.accept().unwrap();
        assert_eq!(
            transport.recv_timeout(Duration::from_secs(5)),
            Some(InboundEvent::ServerConnected {
                host: "127.0.0.1".to_string(),
                port
            })
        );

        server.write_all(b"Hello\r\n").unwrap();
        assert_eq!(
            transport.recv_timeout(Duration::from_secs(5)),
            Some(InboundEvent::ServerMessage {
                text: "Hello".to_string()
            })
        );

        transport.deliver(&OutboundIntent::SendCommand {
            command: "look".to_string(),
        });
        let mut received = [0u8; 5];
        server.read_exact(&mut received).unwrap();
        assert_eq!(&received, b"look\n");

        drop(server);
        assert_eq!(
            transport.recv_timeout(Duration::from_secs(5)),
            Some(InboundEvent::ServerDisconnected {
                message: Some("Server closed the connection".to_string())
            })
        );
        assert_eq!(
            transport.recv_timeout(Duration::from_secs(5)),
            Some(InboundEvent::ConnectionLost {
                host: Some("127.0.0.1".to_string()),
                port: Some(port)
            })
        );
    }

    #[test]
    fn test_server_close_starts_auto_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let start = Instant::now();

        let mut session = SessionMachine::default();
        let mut transport = TcpTransport::new();
        for effect in session.connect("127.0.0.1", &port.to_string()).unwrap() {
            if let Effect::Send(intent) = effect {
                transport.deliver(&intent);
            }
        }

        let (server, _) = listener.accept().unwrap();
        let connected = transport.recv_timeout(Duration::from_secs(5)).unwrap();
        session.handle(&connected, start);
        assert!(session.can_submit());

        drop(server);
        while let Some(event) = transport.recv_timeout(Duration::from_secs(2)) {
            session.handle(&event, start);
        }

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.reconnect_running());
        assert_eq!(session.policy().last_target(), Some(&Target::new("127.0.0.1", port)));
    }

    #[test]
    fn test_requested_disconnect_is_not_a_loss() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut transport = TcpTransport::new();
        transport.deliver(&OutboundIntent::ConnectToServer {
            host: "127.0.0.1".to_string(),
            port,
            auto_log: false,
            log_filename: None,
        });
        let (_server, _) = listener.accept().unwrap();
        assert!(matches!(
            transport.recv_timeout(Duration::from_secs(5)),
            Some(InboundEvent::ServerConnected { .. })
        ));

        transport.deliver(&OutboundIntent::DisconnectFromServer {});
        assert_eq!(
            transport.recv_timeout(Duration::from_secs(5)),
            Some(InboundEvent::ServerDisconnected { message: None })
        );
        assert_eq!(transport.recv_timeout(Duration::from_millis(300)), None);
    }

    #[test]
    fn test_connect_timeout_below_reconnect_delay() {
        assert_eq!(connect_timeout_for(Duration::from_secs(5)), Duration::from_secs(4));
        assert_eq!(connect_timeout_for(Duration::from_secs(60)), CONNECT_TIMEOUT);
        assert_eq!(connect_timeout_for(Duration::from_millis(100)), MIN_CONNECT_TIMEOUT);
        assert!(connect_timeout_for(crate::core::session::RECONNECT_DELAY)
            < crate::core::session::RECONNECT_DELAY);
    }
}
