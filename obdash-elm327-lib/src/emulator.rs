//! Adapter-side ELM327 emulation.
//!
//! Reads commands character by character, echoes when enabled, answers AT
//! commands through [`ClientState`] and Mode 01 requests through a
//! [`PidSource`].

use log::{debug, info, warn};
use std::io::{self, Read, Write};

use crate::ClientState;

/// Supplies the data bytes for Mode 01 PIDs
pub trait PidSource {
    /// Whether a vehicle bus is reachable. When false every OBD request
    /// answers `UNABLE TO CONNECT`.
    fn bus_online(&self) -> bool {
        true
    }

    /// Data bytes for `pid` (without the `41 PP` header), or `None` if the
    /// vehicle does not support it
    fn pid_data(&mut self, pid: u8) -> Option<Vec<u8>>;
}

/// One emulated adapter, serving one client
pub struct Emulator<S> {
    state: ClientState,
    source: S,
}

impl<S: PidSource> Emulator<S> {
    pub fn new(source: S) -> Self {
        Self {
            state: ClientState::new(),
            source,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Answer one complete command (without the terminating CR)
    pub fn process_command(&mut self, cmd: &str) -> String {
        let cmd = cmd.trim().to_uppercase().replace(' ', "");
        let le = self.state.line_ending();

        if cmd.starts_with("AT") {
            return self.state.handle_at_command(&cmd);
        }

        // Mode 01 - Current data (single or multi-PID)
        let Some(pid_data) = cmd.strip_prefix("01").filter(|rest| !rest.is_empty()) else {
            return format!("?{le}{le}>");
        };

        if !self.source.bus_online() {
            return format!("UNABLE TO CONNECT{le}{le}>");
        }

        let Ok(pids) = hex::decode(pid_data) else {
            return format!("?{le}{le}>");
        };

        let mut response = String::from("41");
        for pid in pids {
            match self.source.pid_data(pid) {
                Some(data) => {
                    response.push_str(&format!("{pid:02X}"));
                    response.push_str(&hex::encode_upper(data));
                }
                None => return format!("NO DATA{le}{le}>"),
            }
        }

        let reply = format!("{response}{le}{le}>");
        String::from_utf8_lossy(&self.state.format_response(reply.as_bytes())).into_owned()
    }

    /// Serve a client until it disconnects
    pub fn serve<T: Read + Write>(&mut self, mut stream: T) -> io::Result<()> {
        let mut buffer = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match stream.read(&mut byte) {
                Ok(0) => {
                    info!("Client disconnected");
                    return Ok(());
                }
                Ok(_) => {
                    let ch = byte[0];

                    if self.state.echo_enabled {
                        stream.write_all(&byte)?;
                    }

                    // Carriage return terminates command
                    if ch == b'\r' {
                        let command = String::from_utf8_lossy(&buffer).trim().to_uppercase();

                        if !command.is_empty() {
                            debug!("RX: {command}");
                            let response = self.process_command(&command);
                            debug!("TX: {}", response.escape_debug());
                            stream.write_all(response.as_bytes())?;
                        }

                        buffer.clear();
                    } else if ch != b'\n' {
                        // Accumulate command (ignore linefeeds)
                        buffer.push(ch);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Read error: {e}");
                    return Err(e);
                }
            }
        }
    }
}
