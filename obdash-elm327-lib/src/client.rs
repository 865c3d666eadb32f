//! ELM327 adapter client.
//!
//! Owns one link to the adapter (TCP for Wi-Fi adapters, a serial device for
//! USB/Bluetooth ones), runs the AT initialization sequence, probes the
//! vehicle bus and answers single-command queries.

use derive_more::{Display, Error};
use log::{debug, info, warn};
use smallvec::SmallVec;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::commands::{Command, PIDS_A};
use crate::response::{self, ReplyKind, Response};

/// Address most Wi-Fi ELM327 clones listen on
pub const DEFAULT_WIFI_ADDRESS: &str = "192.168.0.10:35000";
pub const DEFAULT_BAUD_RATE: u32 = 38400;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Initialization sequence: reset, echo off, linefeeds off, spaces off, protocol auto
const INIT_COMMANDS: [&[u8]; 5] = [b"ATZ", b"ATE0", b"ATL0", b"ATS0", b"ATSP0"];

/// Type alias for small command/response buffers
pub type Obd2Buffer = SmallVec<[u8; 32]>;

/// Anything an adapter link can be carried over
pub trait AdapterIo: Read + Write + Send {}

impl<T: Read + Write + Send> AdapterIo for T {}

/// Link status as seen by the adapter client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AdapterStatus {
    #[display("Not Connected")]
    NotConnected,
    /// The adapter answers AT commands but found no vehicle protocol
    #[display("ELM Connected")]
    ElmConnected,
    /// A vehicle bus was reached but it does not answer data requests yet
    #[display("OBD Connected")]
    ObdConnected,
    /// The vehicle answers data requests
    #[display("Car Connected")]
    CarConnected,
}

/// Errors from the adapter link
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TransportError {
    #[display("Not connected to adapter")]
    NotConnected,
    #[display("Adapter timeout")]
    Timeout,
    #[display("Adapter disconnected")]
    Disconnected,
    #[display("IO error: {_0}")]
    Io(#[error(not(source))] String),
    #[display("No OBD2 adapter found")]
    NoAdapter,
}

impl TransportError {
    /// Convert to ELM327-style error message
    #[must_use]
    pub fn to_elm327_error(&self) -> &'static str {
        match self {
            Self::NotConnected | Self::NoAdapter => "UNABLE TO CONNECT",
            Self::Timeout => "NO DATA",
            Self::Disconnected => "CAN ERROR",
            Self::Io(_) => "BUS ERROR",
        }
    }

    /// True if the link is gone and must be reopened
    #[must_use]
    pub fn is_link_lost(&self) -> bool {
        matches!(self, Self::Disconnected | Self::NotConnected)
    }

    fn from_io(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::Disconnected,
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Opens [`Elm327Connection`]s on a port or by trying the usual candidates.
#[derive(Debug, Clone)]
pub struct Elm327Connector {
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl Default for Elm327Connector {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Elm327Connector {
    #[must_use]
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self { baud_rate, timeout }
    }

    /// Open a connection on `port`, or try every candidate if `port` is `None`.
    pub fn open(&self, port: Option<&str>) -> Result<Elm327Connection, TransportError> {
        if let Some(port) = port {
            return Elm327Connection::open(port, self.baud_rate, self.timeout);
        }

        for candidate in candidate_ports() {
            debug!("Trying OBD2 adapter at {candidate}");
            match Elm327Connection::open(&candidate, self.baud_rate, self.timeout) {
                Ok(connection) => return Ok(connection),
                Err(e) => debug!("No adapter at {candidate}: {e}"),
            }
        }

        Err(TransportError::NoAdapter)
    }
}

/// Serial ports reported by the OS, then the default Wi-Fi address
fn candidate_ports() -> Vec<String> {
    let mut ports: Vec<String> = match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            warn!("Failed to enumerate serial ports: {e}");
            Vec::new()
        }
    };
    ports.push(DEFAULT_WIFI_ADDRESS.to_string());
    ports
}

/// Serial device paths start with `/` (unix) or `COM` (windows), everything
/// else is treated as `host:port`
fn is_serial_port(port: &str) -> bool {
    port.starts_with('/') || port.to_uppercase().starts_with("COM")
}

fn open_tcp(port: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    let addr = port
        .to_socket_addrs()
        .map_err(|e| TransportError::Io(format!("invalid address {port}: {e}")))?
        .next()
        .ok_or_else(|| TransportError::Io(format!("no address for {port}")))?;

    let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| TransportError::from_io(&e))?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|()| stream.set_write_timeout(Some(timeout)))
        .and_then(|()| stream.set_nodelay(true))
        .map_err(|e| TransportError::Io(e.to_string()))?;
    Ok(stream)
}

/// Adapter I/O plus the bytes read past the last prompt
struct Link {
    io: Box<dyn AdapterIo>,
    carry: Obd2Buffer,
    /// Requests that timed out and whose replies may still arrive
    late_replies: usize,
}

impl Link {
    fn new(io: Box<dyn AdapterIo>) -> Self {
        Self {
            io,
            carry: Obd2Buffer::new(),
            late_replies: 0,
        }
    }

    /// Send a command and return the reply up to the `>` prompt
    fn execute(&mut self, command: &[u8], timeout: Duration) -> Result<Obd2Buffer, TransportError> {
        let mut cmd_with_cr: Obd2Buffer = command.into();
        if !cmd_with_cr.ends_with(b"\r") {
            cmd_with_cr.push(b'\r');
        }

        debug!("Sending to adapter: {:?}", String::from_utf8_lossy(&cmd_with_cr));

        self.io
            .write_all(&cmd_with_cr)
            .and_then(|()| self.io.flush())
            .map_err(|e| TransportError::from_io(&e))?;

        self.read_reply_counting_late(timeout)
    }

    fn read_reply_counting_late(&mut self, timeout: Duration) -> Result<Obd2Buffer, TransportError> {
        let result = self.read_reply(timeout);
        if matches!(result, Err(TransportError::Timeout)) {
            self.late_replies += 1;
        }
        result
    }

    /// Read one reply up to and including the next `>`, keeping whatever
    /// follows it for the next read
    fn read_reply(&mut self, timeout: Duration) -> Result<Obd2Buffer, TransportError> {
        let mut buffer = [0u8; 64];
        let mut response = std::mem::take(&mut self.carry);
        let start = Instant::now();

        loop {
            if let Some(end) = response.iter().position(|&b| b == b'>') {
                self.carry = response[end + 1..].into();
                response.truncate(end + 1);
                debug!("Complete response: {:?}", String::from_utf8_lossy(&response));
                return Ok(response);
            }

            match self.io.read(&mut buffer) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => response.extend_from_slice(&buffer[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::TimedOut) => {}
                Err(e) => return Err(TransportError::from_io(&e)),
            }

            if start.elapsed() > timeout && !response.contains(&b'>') {
                self.carry = response;
                return Err(TransportError::Timeout);
            }
        }
    }

    /// Discard replies to requests that timed out earlier. Replies that are
    /// still missing after `timeout` are given up on.
    fn discard_late_replies(&mut self, timeout: Duration) -> Result<(), TransportError> {
        while self.late_replies > 0 {
            match self.read_reply(timeout) {
                Ok(reply) => {
                    debug!("Discarding late reply: {:?}", String::from_utf8_lossy(&reply));
                    self.late_replies -= 1;
                }
                Err(TransportError::Timeout) => self.late_replies = 0,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// A live link to an ELM327 adapter
pub struct Elm327Connection {
    io: Option<Link>,
    port: String,
    status: AdapterStatus,
    timeout: Duration,
}

impl std::fmt::Debug for Elm327Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Elm327Connection")
            .field("port", &self.port)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Elm327Connection {
    /// Open `port` (serial path or `host:port`) and initialize the adapter
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Result<Self, TransportError> {
        info!(
            "Connecting to OBD2 adapter at {port} (timeout: {}ms)",
            timeout.as_millis()
        );

        let io: Box<dyn AdapterIo> = if is_serial_port(port) {
            let serial = serialport::new(port, baud_rate)
                .timeout(timeout)
                .open()
                .map_err(|e| TransportError::Io(e.to_string()))?;
            Box::new(serial)
        } else {
            Box::new(open_tcp(port, timeout)?)
        };

        Self::initialize(io, port, timeout)
    }

    /// Run the init sequence and bus probe over an already open link
    pub fn initialize(
        io: Box<dyn AdapterIo>,
        port: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut link = Link::new(io);
        for cmd in INIT_COMMANDS {
            debug!("Sending init command: {:?}", String::from_utf8_lossy(cmd));
            link.execute(cmd, timeout)?;
        }

        let probe = link.execute(PIDS_A.request().as_bytes(), timeout)?;
        let status = match response::classify(&probe) {
            ReplyKind::Data => AdapterStatus::CarConnected,
            ReplyKind::NoData | ReplyKind::BusError => AdapterStatus::ObdConnected,
            ReplyKind::UnableToConnect | ReplyKind::Unknown => AdapterStatus::ElmConnected,
        };

        info!("OBD2 adapter at {port}: {status}");

        Ok(Self {
            io: Some(link),
            port: port.to_string(),
            status,
            timeout,
        })
    }

    #[must_use]
    pub fn status(&self) -> AdapterStatus {
        self.status
    }

    /// True when the vehicle answers data requests
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == AdapterStatus::CarConnected
    }

    #[must_use]
    pub fn port_name(&self) -> &str {
        &self.port
    }

    /// Send one command and decode the reply.
    ///
    /// Replies to earlier requests that timed out are skipped, so a slow
    /// answer never lands on the next command.
    pub fn query(&mut self, command: &Command) -> Result<Response, TransportError> {
        let link = self.io.as_mut().ok_or(TransportError::NotConnected)?;
        let timeout = self.timeout;

        let result = link.discard_late_replies(timeout).and_then(|()| {
            let mut raw = link.execute(command.request().as_bytes(), timeout)?;
            while response::answers_other_command(command, &raw) {
                debug!("Skipping late reply: {:?}", String::from_utf8_lossy(&raw));
                link.late_replies = link.late_replies.saturating_sub(1);
                raw = link.read_reply_counting_late(timeout)?;
            }
            Ok(raw)
        });

        match result {
            Ok(raw) => {
                let response = response::parse_reply(command, &raw);
                debug!("{} -> {:?}", command.name, response.value);
                Ok(response)
            }
            Err(e) => {
                if e.is_link_lost() {
                    warn!("OBD2 adapter connection lost");
                    self.io = None;
                    self.status = AdapterStatus::NotConnected;
                }
                Err(e)
            }
        }
    }

    /// Release the link. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut link) = self.io.take() {
            // Best effort: put the adapter back to defaults for the next user
            let _ = link.io.write_all(b"ATZ\r");
            let _ = link.io.flush();
            info!("OBD2 connection to {} closed", self.port);
        }
        self.status = AdapterStatus::NotConnected;
    }
}

impl Drop for Elm327Connection {
    fn drop(&mut self) {
        self.close();
    }
}
