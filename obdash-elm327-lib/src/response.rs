//! Parsing raw ELM327 replies into decoded values.

use derive_more::Display;

use crate::commands::Command;

/// A decoded sensor reading
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Value {
    /// A number with its physical unit
    #[display("{magnitude} {unit}")]
    Quantity { magnitude: f64, unit: &'static str },
    /// Anything that is not a plain number (bitmaps etc.)
    #[display("{_0}")]
    Text(String),
}

impl Value {
    /// The numeric magnitude, if this is a quantity
    #[must_use]
    pub fn magnitude(&self) -> Option<f64> {
        match self {
            Self::Quantity { magnitude, .. } => Some(*magnitude),
            Self::Text(_) => None,
        }
    }
}

/// Result of a single query. A null response means the adapter answered but
/// had no data for the command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub value: Option<Value>,
    /// The reply text as received, minus the prompt
    pub raw: String,
}

impl Response {
    #[must_use]
    pub fn null(raw: impl Into<String>) -> Self {
        Self {
            value: None,
            raw: raw.into(),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// Coarse classification of a reply, used while probing the vehicle bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Positive reply with data
    Data,
    /// Adapter reached the bus but nobody answered
    NoData,
    /// Adapter could not find a vehicle protocol
    UnableToConnect,
    /// Bus level failure (CAN ERROR, BUS ERROR, ...)
    BusError,
    /// `?` or anything unrecognised
    Unknown,
}

/// Split a raw reply into compact upper-case lines, dropping whitespace,
/// the prompt and progress messages like `SEARCHING...`
fn reply_lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split(['\r', '\n'])
        .map(|line| {
            line.chars()
                .filter(|c| !c.is_whitespace() && *c != '>')
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|line| !line.is_empty() && !line.starts_with("SEARCHING"))
        .collect()
}

/// Classify a raw reply
#[must_use]
pub fn classify(raw: &[u8]) -> ReplyKind {
    let lines = reply_lines(raw);
    let has = |needle: &str| lines.iter().any(|line| line.contains(needle));

    if has("UNABLETOCONNECT") {
        ReplyKind::UnableToConnect
    } else if has("NODATA") || has("STOPPED") {
        ReplyKind::NoData
    } else if has("ERROR") || has("BUFFERFULL") {
        ReplyKind::BusError
    } else if lines.iter().any(|line| line.starts_with('4') && line.len() >= 4) {
        ReplyKind::Data
    } else {
        ReplyKind::Unknown
    }
}

/// True if `raw` carries positive data for the same mode but a different PID,
/// i.e. a late reply to an earlier request
#[must_use]
pub fn answers_other_command(command: &Command, raw: &[u8]) -> bool {
    let header = command.reply_header();
    let mode = &header[..2];
    let lines = reply_lines(raw);

    lines.iter().any(|line| line.starts_with(mode))
        && !lines.iter().any(|line| line.starts_with(&header))
}

/// Parse the reply to `command` into a [`Response`].
///
/// Looks for the first line starting with the positive reply header (`41 0C`
/// for RPM), hex-decodes the bytes after it and applies the command's
/// decoder. `NO DATA`, `?`, echo-only replies or short payloads all produce
/// a null response.
#[must_use]
pub fn parse_reply(command: &Command, raw: &[u8]) -> Response {
    let text = String::from_utf8_lossy(raw)
        .trim()
        .trim_end_matches('>')
        .trim()
        .to_string();
    let header = command.reply_header();

    let Some(payload) = reply_lines(raw)
        .into_iter()
        .find_map(|line| line.strip_prefix(&header).map(str::to_string))
    else {
        return Response::null(text);
    };
    if !payload.is_ascii() {
        return Response::null(text);
    }

    // Ignore a dangling nibble rather than rejecting the whole line
    let even = payload.len() & !1;
    let value = hex::decode(&payload[..even])
        .ok()
        .and_then(|data| command.decode(&data));

    Response { value, raw: text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{COOLANT_TEMP, PIDS_A, RPM, SPEED};

    #[test]
    fn test_parse_compact_reply() {
        let response = parse_reply(&RPM, b"410C1AF8\r\r>");
        assert_eq!(
            response.value,
            Some(Value::Quantity {
                magnitude: 1726.0,
                unit: "rpm"
            })
        );
        assert_eq!(response.raw, "410C1AF8");
    }

    #[test]
    fn test_parse_spaced_reply_with_echo() {
        let response = parse_reply(&SPEED, b"010D\r41 0D 28 \r\r>");
        assert_eq!(response.value.and_then(|v| v.magnitude()), Some(40.0));
    }

    #[test]
    fn test_parse_after_searching() {
        let response = parse_reply(&COOLANT_TEMP, b"SEARCHING...\r41057B\r\r>");
        assert_eq!(response.value.and_then(|v| v.magnitude()), Some(83.0));
    }

    #[test]
    fn test_no_data_is_null() {
        let response = parse_reply(&RPM, b"NO DATA\r\r>");
        assert!(response.is_null());
        assert_eq!(response.raw, "NO DATA");
    }

    #[test]
    fn test_short_payload_is_null() {
        assert!(parse_reply(&RPM, b"410C1A\r\r>").is_null());
        assert!(parse_reply(&RPM, b"?\r\r>").is_null());
        // Reply for a different PID
        assert!(parse_reply(&RPM, b"410D28\r\r>").is_null());
    }

    #[test]
    fn test_answers_other_command() {
        assert!(answers_other_command(&SPEED, b"410C1AF8\r\r>"));
        assert!(!answers_other_command(&SPEED, b"010D\r41 0D 28\r\r>"));
        // Nothing positive to attribute
        assert!(!answers_other_command(&SPEED, b"NO DATA\r\r>"));
        assert!(!answers_other_command(&SPEED, b"?\r\r>"));
    }

    #[test]
    fn test_bitmap_reply() {
        let response = parse_reply(&PIDS_A, b"4100BE3FA813\r\r>");
        assert_eq!(response.value, Some(Value::Text("BE3FA813".to_string())));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(b"4100BE3FA813\r\r>"), ReplyKind::Data);
        assert_eq!(classify(b"SEARCHING...\rNO DATA\r\r>"), ReplyKind::NoData);
        assert_eq!(classify(b"UNABLE TO CONNECT\r\r>"), ReplyKind::UnableToConnect);
        assert_eq!(classify(b"CAN ERROR\r\r>"), ReplyKind::BusError);
        assert_eq!(classify(b"?\r\r>"), ReplyKind::Unknown);
    }

    #[test]
    fn test_value_display() {
        let value = Value::Quantity {
            magnitude: 40.0,
            unit: "kph",
        };
        assert_eq!(value.to_string(), "40 kph");
        assert_eq!(Value::Text("BE3FA813".into()).to_string(), "BE3FA813");
    }
}
