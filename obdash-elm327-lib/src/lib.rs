//! ELM327 protocol implementation for OBD2 communication
//!
//! This library provides the client side used by the dashboard (connecting to
//! an adapter, querying Mode 01 PIDs, decoding replies) and the adapter side
//! used by the mock server (AT command state, PID replies).

pub mod client;
pub mod commands;
pub mod emulator;
pub mod response;

pub use client::{AdapterStatus, Elm327Connection, Elm327Connector, TransportError};
pub use commands::{Command, Decoder};
pub use emulator::{Emulator, PidSource};
pub use response::{Response, Value};

/// Per-connection client state (ELM327 settings)
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)] // These are independent ELM327 protocol flags
pub struct ClientState {
    /// Echo received characters back (ATE0/ATE1)
    pub echo_enabled: bool,
    /// Add linefeeds after carriage returns (ATL0/ATL1)
    pub linefeeds_enabled: bool,
    /// Print spaces between response bytes (ATS0/ATS1)
    pub spaces_enabled: bool,
    /// Show header bytes in responses (ATH0/ATH1)
    pub headers_enabled: bool,
    /// Protocol number selected with ATSPx (0 = automatic)
    pub protocol: u8,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            echo_enabled: true,
            linefeeds_enabled: true,
            spaces_enabled: true,
            headers_enabled: false,
            protocol: 0,
        }
    }
}

/// Identification string reported by ATZ and ATI
pub const ADAPTER_VERSION: &str = "ELM327 v1.5";

/// Highest protocol number accepted by ATSP
const MAX_PROTOCOL: u8 = 0x0C;

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line ending for replies, CR or CR LF depending on ATL
    pub fn line_ending(&self) -> &'static str {
        if self.linefeeds_enabled {
            "\r\n"
        } else {
            "\r"
        }
    }

    /// Insert spaces between hex byte pairs when ATS1 is active.
    /// Replies are built compact, the counting restarts at every non-hex byte.
    pub fn format_response(&self, response: &[u8]) -> Vec<u8> {
        if !self.spaces_enabled {
            return response.to_vec();
        }

        let mut result = Vec::with_capacity(response.len() * 3 / 2);
        let mut run = 0usize;
        for &byte in response {
            let is_hex = byte.is_ascii_hexdigit();
            if is_hex && run > 0 && run % 2 == 0 {
                result.push(b' ');
            }
            run = if is_hex { run + 1 } else { 0 };
            result.push(byte);
        }
        result
    }

    /// Answer an AT command, updating the settings it changes
    pub fn handle_at_command(&mut self, command: &str) -> String {
        let cmd = command.to_uppercase().replace(' ', "");
        // Captured before any change, so ATL0/ATL1 answer with the old ending
        let le = self.line_ending();

        let Some(body) = cmd.strip_prefix("AT") else {
            return format!("{le}?{le}>");
        };

        let text = match body {
            "Z" | "WS" => {
                *self = Self::default();
                let le = self.line_ending();
                return format!("{le}{ADAPTER_VERSION}{le}>");
            }
            "@1" => return self.device_description(),
            "DPN" => return format!("{le}A{:X}{le}>", self.protocol),
            "I" => ADAPTER_VERSION,
            "RV" => "12.6V",
            _ if body.starts_with("ST") || body.starts_with("AT") => "OK",
            _ => self
                .set_flag(body)
                .or_else(|| self.set_protocol(body))
                .unwrap_or("?"),
        };

        format!("{le}{text}{le}>")
    }

    /// `E`, `L`, `S`, `H` followed by 0 or 1
    fn set_flag(&mut self, body: &str) -> Option<&'static str> {
        let [letter, value @ (b'0' | b'1')] = body.as_bytes() else {
            return None;
        };
        let flag = match *letter {
            b'E' => &mut self.echo_enabled,
            b'L' => &mut self.linefeeds_enabled,
            b'S' => &mut self.spaces_enabled,
            b'H' => &mut self.headers_enabled,
            _ => return None,
        };
        *flag = *value == b'1';
        Some("OK")
    }

    /// `SPx`, or `SPAx` for automatic search starting at x
    fn set_protocol(&mut self, body: &str) -> Option<&'static str> {
        let digits = body.strip_prefix("SP")?;
        let digits = match digits.strip_prefix('A') {
            Some(rest) if rest.len() == 1 => rest,
            _ => digits,
        };

        match u8::from_str_radix(digits, 16) {
            Ok(protocol) if protocol <= MAX_PROTOCOL => {
                self.protocol = protocol;
                Some("OK")
            }
            _ => Some("?"),
        }
    }

    /// Device description for AT@1
    pub fn device_description(&self) -> String {
        let le = self.line_ending();
        format!("{le}OBD2 dashboard mock adapter{le}>")
    }
}

/// Whole RPM from a raw Mode 01 PID 0C reply, spaced or compact
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // RPM decodes to 0..16384
pub fn extract_rpm_from_response(data: &[u8]) -> Option<u32> {
    let rpm = response::parse_reply(&commands::RPM, data).value?.magnitude()?;
    Some(rpm as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = ClientState::default();
        assert!(state.echo_enabled);
        assert!(state.linefeeds_enabled);
        assert!(state.spaces_enabled);
        assert!(!state.headers_enabled);
        assert_eq!(state.protocol, 0);
    }

    #[test]
    fn test_line_ending() {
        let mut state = ClientState::default();
        assert_eq!(state.line_ending(), "\r\n");

        state.linefeeds_enabled = false;
        assert_eq!(state.line_ending(), "\r");
    }

    #[test]
    fn test_at_commands() {
        let mut state = ClientState::default();

        let resp = state.handle_at_command("ATE0");
        assert!(resp.contains("OK"));
        assert!(!state.echo_enabled);

        let resp = state.handle_at_command("at s0");
        assert!(resp.contains("OK"));
        assert!(!state.spaces_enabled);

        let resp = state.handle_at_command("ATZ");
        assert!(resp.contains("ELM327"));
        assert!(state.echo_enabled);
        assert!(state.spaces_enabled);
    }

    #[test]
    fn test_protocol_selection() {
        let mut state = ClientState::default();

        assert!(state.handle_at_command("ATSP6").contains("OK"));
        assert_eq!(state.protocol, 6);
        assert!(state.handle_at_command("ATDPN").contains("A6"));

        assert!(state.handle_at_command("ATSPZ").contains('?'));
        assert_eq!(state.protocol, 6);

        assert!(state.handle_at_command("ATSPA8").contains("OK"));
        assert_eq!(state.protocol, 8);
        // A single letter is a protocol number, not the automatic prefix
        assert!(state.handle_at_command("ATSPA").contains("OK"));
        assert_eq!(state.protocol, 0x0A);
    }

    #[test]
    fn test_misc_at_commands() {
        let mut state = ClientState::default();
        assert_eq!(state.handle_at_command("ATI"), "\r\nELM327 v1.5\r\n>");
        assert!(state.handle_at_command("AT@1").contains("mock adapter"));
        assert!(state.handle_at_command("ATST32").contains("OK"));
        assert!(state.handle_at_command("ATAT1").contains("OK"));
        assert!(state.handle_at_command("ATE2").contains('?'));
        assert!(state.handle_at_command("ATXYZ").contains('?'));
        assert!(state.echo_enabled);
    }

    #[test]
    fn test_linefeed_change_uses_old_ending() {
        let mut state = ClientState::default();
        let resp = state.handle_at_command("ATL0");
        assert_eq!(resp, "\r\nOK\r\n>");
        assert_eq!(state.handle_at_command("ATE1"), "\rOK\r>");
    }

    #[test]
    fn test_extract_rpm() {
        let data = b"41 0C 1A F8\r\r>";
        assert_eq!(extract_rpm_from_response(data), Some(1726));

        let data = b"410C1AF8\r\r>";
        assert_eq!(extract_rpm_from_response(data), Some(1726));

        let data = b"41 0D 28\r\r>";
        assert_eq!(extract_rpm_from_response(data), None);
    }

    #[test]
    fn test_format_response_with_spaces() {
        let state = ClientState::default();
        let output = state.format_response(b"410C1AF8\r\r>");
        assert_eq!(&output, b"41 0C 1A F8\r\r>");
    }

    #[test]
    fn test_format_response_without_spaces() {
        let mut state = ClientState::default();
        state.spaces_enabled = false;
        let output = state.format_response(b"410C1AF8\r\r>");
        assert_eq!(&output, b"410C1AF8\r\r>");
    }
}
