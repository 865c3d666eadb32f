//! Six-slot screen binding.
//!
//! A [`Dashboard`] holds the slots of the selected category and refreshes
//! them through the [`ConnectionManager`] whenever the caller ticks it while
//! the screen is active.

use log::{debug, info, warn};

use crate::manager::{ConnectionManager, QueryResult, StatusColor};
use crate::plan::{normalize, CommandId, QueryPlan, SlotValues, PLACEHOLDER, SLOT_COUNT};
use crate::sensors::CategoryTable;
use crate::transport::Connector;

pub struct Dashboard<C: Connector> {
    manager: ConnectionManager<C>,
    table: CategoryTable,
    category: String,
    names: [String; SLOT_COUNT],
    plan: QueryPlan,
    values: SlotValues,
    status_text: String,
    status_color: StatusColor,
    active: bool,
}

impl<C: Connector> Dashboard<C> {
    /// Create an inactive dashboard showing `category`
    pub fn new(manager: ConnectionManager<C>, table: CategoryTable, category: &str) -> Self {
        let status_text = manager.status_text();
        let status_color = manager.status_color();
        let mut dashboard = Self {
            manager,
            table,
            category: String::new(),
            names: std::array::from_fn(|_| PLACEHOLDER.to_string()),
            plan: QueryPlan::default(),
            values: std::array::from_fn(|_| PLACEHOLDER.to_string()),
            status_text,
            status_color,
            active: false,
        };
        dashboard.select_category(category);
        dashboard
    }

    /// Bind new slots. Lists that are not six long are padded or truncated.
    pub fn set_sensor_data<N, U>(&mut self, names: &[N], units: &[U], commands: &[Option<CommandId>])
    where
        N: AsRef<str>,
        U: AsRef<str>,
    {
        if names.len() != SLOT_COUNT || units.len() != SLOT_COUNT || commands.len() != SLOT_COUNT {
            warn!(
                "Expected {SLOT_COUNT} sensors, got {} names, {} units, {} commands. Normalizing.",
                names.len(),
                units.len(),
                commands.len()
            );
        }

        let names: Vec<String> = names.iter().map(|name| name.as_ref().to_string()).collect();
        let units: Vec<String> = units.iter().map(|unit| unit.as_ref().to_string()).collect();

        self.names = normalize(&names, &PLACEHOLDER.to_string());
        self.plan = QueryPlan::new(&normalize(commands, &None), &normalize(&units, &String::new()));
        self.values = std::array::from_fn(|_| PLACEHOLDER.to_string());

        self.refresh();
    }

    /// Show the slots of a category from the table
    pub fn select_category(&mut self, name: &str) {
        info!("Selecting category {name}");
        let config = self.table.select(name);
        self.category = config.category_name.clone();
        self.set_sensor_data(&config.names(), &config.units(), &config.commands());
    }

    /// The screen became visible
    pub fn on_enter(&mut self) {
        debug!("Dashboard active");
        self.active = true;
    }

    /// The screen was hidden, stop polling
    pub fn on_leave(&mut self) {
        debug!("Dashboard inactive");
        self.active = false;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Periodic refresh. Does nothing while inactive.
    pub fn on_tick(&mut self) -> Option<[QueryResult; SLOT_COUNT]> {
        if !self.active {
            return None;
        }
        self.refresh();
        Some(QueryResult::from_values(self.values.clone()))
    }

    fn refresh(&mut self) {
        self.status_text = self.manager.status_text();
        self.status_color = self.manager.status_color();
        self.values = self.manager.query_plan(&self.plan);
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn names(&self) -> &[String; SLOT_COUNT] {
        &self.names
    }

    #[must_use]
    pub fn values(&self) -> &SlotValues {
        &self.values
    }

    #[must_use]
    pub fn units(&self) -> [&str; SLOT_COUNT] {
        std::array::from_fn(|i| self.plan.slots()[i].unit.as_str())
    }

    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    #[must_use]
    pub fn status_color(&self) -> StatusColor {
        self.status_color
    }

    #[must_use]
    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    #[must_use]
    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConnectionManager<C> {
        &mut self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ConnectionState;
    use crate::mock::MockGenerator;
    use crate::sensors::{EMPTY_SLOT, HOME_CATEGORY};
    use crate::transport::Transport;
    use obdash_elm327_lib::commands::{ENGINE_LOAD, RPM, SPEED};
    use obdash_elm327_lib::{AdapterStatus, Command, Response, TransportError, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    type QueryLog = Rc<RefCell<Vec<&'static str>>>;

    struct EchoPid {
        log: QueryLog,
    }

    impl Transport for EchoPid {
        fn status(&self) -> AdapterStatus {
            AdapterStatus::CarConnected
        }

        fn query(&mut self, command: &Command) -> Result<Response, TransportError> {
            self.log.borrow_mut().push(command.name);
            Ok(Response {
                value: Some(Value::Quantity {
                    magnitude: f64::from(command.pid),
                    unit: "",
                }),
                raw: String::new(),
            })
        }

        fn close(&mut self) {}
    }

    struct EchoConnector {
        online: bool,
        log: QueryLog,
    }

    impl Connector for EchoConnector {
        type Transport = EchoPid;

        fn connect(&mut self, _port: Option<&str>) -> Result<EchoPid, TransportError> {
            if self.online {
                Ok(EchoPid { log: Rc::clone(&self.log) })
            } else {
                Err(TransportError::NoAdapter)
            }
        }
    }

    fn dashboard(online: bool, category: &str) -> (Dashboard<EchoConnector>, QueryLog) {
        let log = QueryLog::default();
        let connector = EchoConnector {
            online,
            log: Rc::clone(&log),
        };
        let mut manager = ConnectionManager::new(connector, None, MockGenerator::new(1));
        manager.connect();
        (Dashboard::new(manager, CategoryTable::builtin(), category), log)
    }

    #[test]
    fn test_select_category_refreshes_immediately() {
        let (dashboard, log) = dashboard(true, HOME_CATEGORY);
        assert_eq!(dashboard.category(), "home");
        assert_eq!(dashboard.names()[0], "RPM");
        assert_eq!(dashboard.values()[0], "12.0 RPM");
        assert_eq!(dashboard.values()[1], "13.0 km/h");
        assert_eq!(log.borrow().len(), 6);
        assert_eq!(dashboard.status_text(), "OBD Status: Connected");
    }

    #[test]
    fn test_short_names_are_padded() {
        let (mut dashboard, _) = dashboard(true, HOME_CATEGORY);
        dashboard.set_sensor_data(
            &["A", "B", "C", "D"],
            &["", "", "", "", "", ""],
            &[Some(&RPM), Some(&SPEED), None, None, None, Some(&ENGINE_LOAD)],
        );

        assert_eq!(dashboard.names(), &["A", "B", "C", "D", "N/A", "N/A"]);
        assert_eq!(dashboard.values()[5], "4.0");
        assert_eq!(dashboard.values()[2], PLACEHOLDER);
    }

    #[test]
    fn test_long_lists_are_truncated() {
        let (mut dashboard, log) = dashboard(true, HOME_CATEGORY);
        log.borrow_mut().clear();

        let commands = [Some(&RPM); 8];
        dashboard.set_sensor_data(&["x"; 8], &[" RPM"; 8], &commands);
        assert_eq!(log.borrow().len(), SLOT_COUNT);
        assert_eq!(dashboard.units(), [" RPM"; 6]);
    }

    #[test]
    fn test_unknown_category() {
        let (mut dashboard, _) = dashboard(true, HOME_CATEGORY);
        dashboard.select_category("nonexistent");
        assert_eq!(dashboard.category(), "nonexistent");
        assert!(dashboard.names().iter().all(|name| name == EMPTY_SLOT));
        assert!(dashboard.values().iter().all(|value| value == PLACEHOLDER));
    }

    #[test]
    fn test_inactive_dashboard_does_not_query() {
        let (mut dashboard, log) = dashboard(true, HOME_CATEGORY);
        let queried = log.borrow().len();

        assert!(dashboard.on_tick().is_none());
        assert_eq!(log.borrow().len(), queried);

        dashboard.on_enter();
        let results = dashboard.on_tick().expect("active dashboard ticks");
        assert_eq!(results[0].display_text, "12.0 RPM");
        assert_eq!(results[5].slot_index, 5);
        assert_eq!(log.borrow().len(), queried + 6);

        dashboard.on_leave();
        assert!(dashboard.on_tick().is_none());
        assert_eq!(log.borrow().len(), queried + 6);
    }

    #[test]
    fn test_offline_dashboard_uses_mock() {
        let (mut dashboard, log) = dashboard(false, "engine");
        dashboard.on_enter();

        let results = dashboard.on_tick().expect("active dashboard ticks");
        assert!(log.borrow().is_empty());
        assert!(results[0].display_text.ends_with(" RPM"));
        // ENGINE_LOAD has no mock profile
        assert_eq!(results[3].display_text, PLACEHOLDER);
        assert_eq!(dashboard.manager().state(), ConnectionState::Disconnected);
        assert_eq!(dashboard.status_color(), ConnectionState::Disconnected.color());
    }
}
