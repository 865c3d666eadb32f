//! Connection manager and query dispatcher.
//!
//! The manager owns at most one adapter link. Queries go to the adapter when
//! the vehicle answers data requests and to the [`MockGenerator`] otherwise.
//! A failing query only affects its own slot.

use derive_more::Display;
use log::{debug, info, warn};
use obdash_elm327_lib::{AdapterStatus, Command, Response, TransportError, Value};

use crate::mock::MockGenerator;
use crate::plan::{CommandId, QueryPlan, SlotValues, PLACEHOLDER, SLOT_COUNT};
use crate::transport::{Connector, Transport};

/// Shown in a slot whose query raised a transport fault
pub const ERROR_MARKER: &str = "Error";

/// RGBA with components in `0.0..=1.0`
pub type StatusColor = rgb::RGBA<f32>;

const GREEN: StatusColor = StatusColor { r: 0.0, g: 1.0, b: 0.0, a: 1.0 };
const YELLOW: StatusColor = StatusColor { r: 1.0, g: 1.0, b: 0.0, a: 1.0 };
const RED: StatusColor = StatusColor { r: 1.0, g: 0.0, b: 0.0, a: 1.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ConnectionState {
    #[default]
    #[display("Not Connected")]
    Disconnected,
    Connecting,
    /// A vehicle bus answered but telemetry is not flowing yet
    #[display("Car Connected")]
    CarConnected,
    /// Telemetry is flowing
    Connected,
    Error,
}

impl ConnectionState {
    /// Map the adapter's link status after a successful open
    #[must_use]
    pub const fn from_adapter(status: AdapterStatus) -> Self {
        match status {
            AdapterStatus::CarConnected => Self::Connected,
            AdapterStatus::ObdConnected => Self::CarConnected,
            AdapterStatus::ElmConnected => Self::Connecting,
            AdapterStatus::NotConnected => Self::Disconnected,
        }
    }

    #[must_use]
    pub const fn color(self) -> StatusColor {
        match self {
            Self::Connected => GREEN,
            Self::CarConnected => YELLOW,
            Self::Disconnected | Self::Connecting | Self::Error => RED,
        }
    }
}

/// One refreshed slot, handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub slot_index: usize,
    pub display_text: String,
}

impl QueryResult {
    #[must_use]
    pub fn from_values(values: SlotValues) -> [Self; SLOT_COUNT] {
        let mut index = 0;
        values.map(|display_text| {
            let result = Self {
                slot_index: index,
                display_text,
            };
            index += 1;
            result
        })
    }
}

/// Format a live response for display
fn format_response(response: &Response, unit: &str) -> String {
    match &response.value {
        None => PLACEHOLDER.to_string(),
        Some(Value::Quantity { magnitude, .. }) => format!("{magnitude:.1}{unit}"),
        Some(Value::Text(text)) => format!("{text}{unit}"),
    }
}

pub struct ConnectionManager<C: Connector> {
    connector: C,
    /// `None` tries every candidate port
    port: Option<String>,
    connection: Option<C::Transport>,
    state: ConnectionState,
    mock: MockGenerator,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, port: Option<String>, mock: MockGenerator) -> Self {
        Self {
            connector,
            port,
            connection: None,
            state: ConnectionState::Disconnected,
            mock,
        }
    }

    /// Open the adapter link. A no-op while already connected. Failures are
    /// recorded in the state and never returned.
    pub fn connect(&mut self) -> ConnectionState {
        if self.is_connected() {
            debug!("Already connected, skipping connect");
            return self.state;
        }

        if let Some(mut stale) = self.connection.take() {
            stale.close();
        }

        let port = self.port.as_deref().unwrap_or("auto");
        info!("Connecting to OBD2 adapter ({port})");
        self.state = ConnectionState::Connecting;

        match self.connector.connect(self.port.as_deref()) {
            Ok(mut transport) => {
                self.state = ConnectionState::from_adapter(transport.status());
                info!("OBD2 adapter status: {} ({})", transport.status(), self.state);
                if self.state == ConnectionState::Disconnected {
                    transport.close();
                } else {
                    self.connection = Some(transport);
                }
            }
            Err(TransportError::NoAdapter) => {
                warn!("No OBD2 adapter found, using mock data");
                self.state = ConnectionState::Disconnected;
            }
            Err(e) => {
                warn!("Failed to connect to OBD2 adapter: {e}");
                self.state = ConnectionState::Error;
            }
        }

        self.state
    }

    /// True only while a live, responsive link exists
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.connection.as_ref().is_some_and(Transport::is_connected)
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    #[must_use]
    pub fn status_text(&self) -> String {
        format!("OBD Status: {}", self.state)
    }

    #[must_use]
    pub fn status_color(&self) -> StatusColor {
        self.state.color()
    }

    /// Release the link. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            info!("OBD2 connection closed");
        }
        self.state = ConnectionState::Disconnected;
    }

    pub fn mock_mut(&mut self) -> &mut MockGenerator {
        &mut self.mock
    }

    /// Six display strings for up to six commands and units
    pub fn query<U: AsRef<str>>(&mut self, commands: &[Option<CommandId>], units: &[U]) -> SlotValues {
        self.query_plan(&QueryPlan::new(commands, units))
    }

    /// Six display strings for a resolved plan
    pub fn query_plan(&mut self, plan: &QueryPlan) -> SlotValues {
        if !self.is_connected() {
            debug!("No live OBD2 link ({}), using mock data", self.state);
            return self.mock.generate_plan(plan);
        }
        let Some(connection) = self.connection.as_mut() else {
            return self.mock.generate_plan(plan);
        };

        let mut values = SlotValues::default();
        let mut link_lost = false;

        for (value, slot) in values.iter_mut().zip(plan.slots()) {
            let Some(command) = slot.command else {
                *value = PLACEHOLDER.to_string();
                continue;
            };

            *value = match query_one(connection, command) {
                Ok(response) => format_response(&response, &slot.unit),
                Err(e) => {
                    link_lost |= e.is_link_lost();
                    ERROR_MARKER.to_string()
                }
            };
        }

        if link_lost {
            warn!("OBD2 link lost, falling back to mock data until reconnected");
            self.state = ConnectionState::Error;
        }

        values
    }
}

fn query_one<T: Transport>(connection: &mut T, command: &Command) -> Result<Response, TransportError> {
    let result = connection.query(command);
    match &result {
        Ok(response) => debug!("{} -> {:?}", command.name, response.value),
        Err(e) => warn!("Error querying {}: {e}", command.name),
    }
    result
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.close();
    }
}
