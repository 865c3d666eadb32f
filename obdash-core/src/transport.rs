//! The seam between the connection manager and an adapter link.

use obdash_elm327_lib::{AdapterStatus, Command, Elm327Connection, Elm327Connector, Response, TransportError};

/// An open adapter link
pub trait Transport {
    fn status(&self) -> AdapterStatus;

    /// True when the vehicle answers data requests
    fn is_connected(&self) -> bool {
        self.status() == AdapterStatus::CarConnected
    }

    fn query(&mut self, command: &Command) -> Result<Response, TransportError>;

    /// Release the link. Must be safe to call more than once.
    fn close(&mut self);
}

/// Opens [`Transport`]s on a named port, or on the first candidate that
/// answers when no port is given
pub trait Connector {
    type Transport: Transport;

    fn connect(&mut self, port: Option<&str>) -> Result<Self::Transport, TransportError>;
}

impl Transport for Elm327Connection {
    fn status(&self) -> AdapterStatus {
        Elm327Connection::status(self)
    }

    fn query(&mut self, command: &Command) -> Result<Response, TransportError> {
        Elm327Connection::query(self, command)
    }

    fn close(&mut self) {
        Elm327Connection::close(self);
    }
}

impl Connector for Elm327Connector {
    type Transport = Elm327Connection;

    fn connect(&mut self, port: Option<&str>) -> Result<Elm327Connection, TransportError> {
        self.open(port)
    }
}
