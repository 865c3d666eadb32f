//! OBD2 dashboard core
//!
//! Binds dashboard categories to six sensor slots and fills them once per
//! tick, from a live ELM327 adapter when the vehicle answers and from mock
//! data otherwise.

pub mod config;
pub mod dashboard;
pub mod manager;
pub mod mock;
pub mod plan;
pub mod scheduler;
pub mod sensors;
pub mod transport;

pub use config::{Config, LogLevel};
pub use dashboard::Dashboard;
pub use manager::{ConnectionManager, ConnectionState, QueryResult, StatusColor, ERROR_MARKER};
pub use mock::{MockGenerator, MockKind, MockProfile};
pub use plan::{CommandId, QueryPlan, SlotValues, PLACEHOLDER, SLOT_COUNT};
pub use scheduler::IntervalScheduler;
pub use sensors::{CategoryConfig, CategoryTable, SensorSlot};
pub use transport::{Connector, Transport};
