//! Dashboard categories and the six sensor slots each one shows.

use indexmap::IndexMap;
use log::warn;
use obdash_elm327_lib::commands;

use crate::plan::{normalize, CommandId, SLOT_COUNT};

/// Label of a slot in an unknown category
pub const EMPTY_SLOT: &str = "---";

/// Category shown at startup
pub const HOME_CATEGORY: &str = "home";

#[derive(Debug, Clone, PartialEq)]
pub struct SensorSlot {
    pub name: String,
    pub unit: String,
    /// `None` for readings without a standard PID, which always read `N/A`
    pub command: Option<CommandId>,
}

impl SensorSlot {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, command: Option<CommandId>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            command,
        }
    }

    #[must_use]
    pub fn placeholder() -> Self {
        Self::new(EMPTY_SLOT, "", None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryConfig {
    pub category_name: String,
    pub slots: [SensorSlot; SLOT_COUNT],
}

impl CategoryConfig {
    /// Build a category, padding or truncating to six slots
    pub fn new(category_name: impl Into<String>, slots: &[SensorSlot]) -> Self {
        let category_name = category_name.into();
        if slots.len() != SLOT_COUNT {
            warn!(
                "Category {category_name} has {} slots, expected {SLOT_COUNT}",
                slots.len()
            );
        }

        Self {
            category_name,
            slots: normalize(slots, &SensorSlot::placeholder()),
        }
    }

    /// Six `---` slots with no commands
    pub fn placeholder(category_name: impl Into<String>) -> Self {
        Self {
            category_name: category_name.into(),
            slots: std::array::from_fn(|_| SensorSlot::placeholder()),
        }
    }

    #[must_use]
    pub fn names(&self) -> [String; SLOT_COUNT] {
        std::array::from_fn(|i| self.slots[i].name.clone())
    }

    #[must_use]
    pub fn units(&self) -> [String; SLOT_COUNT] {
        std::array::from_fn(|i| self.slots[i].unit.clone())
    }

    #[must_use]
    pub fn commands(&self) -> [Option<CommandId>; SLOT_COUNT] {
        std::array::from_fn(|i| self.slots[i].command)
    }
}

/// Read-only category lookup, in sidebar order
#[derive(Debug, Clone)]
pub struct CategoryTable {
    categories: IndexMap<String, CategoryConfig>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryTable {
    pub fn new(configs: impl IntoIterator<Item = CategoryConfig>) -> Self {
        let categories = configs
            .into_iter()
            .map(|config| (config.category_name.clone(), config))
            .collect();
        Self { categories }
    }

    /// The categories of the dashboard sidebar
    #[must_use]
    pub fn builtin() -> Self {
        let slot = SensorSlot::new;
        let celsius = "°C";

        Self::new([
            CategoryConfig::new(
                HOME_CATEGORY,
                &[
                    slot("RPM", " RPM", Some(&commands::RPM)),
                    slot("Speed", " km/h", Some(&commands::SPEED)),
                    slot("Engine Temp", celsius, Some(&commands::COOLANT_TEMP)),
                    slot("Fuel Level", "%", Some(&commands::FUEL_LEVEL)),
                    slot("Battery Volts", " V", Some(&commands::CONTROL_MODULE_VOLTAGE)),
                    slot("Engine Load", " %", Some(&commands::ENGINE_LOAD)),
                ],
            ),
            CategoryConfig::new(
                "engine",
                &[
                    slot("RPM", " RPM", Some(&commands::RPM)),
                    slot("Coolant Temp", celsius, Some(&commands::COOLANT_TEMP)),
                    slot("Oil Temp", celsius, Some(&commands::OIL_TEMP)),
                    slot("Load", " %", Some(&commands::ENGINE_LOAD)),
                    slot("Timing", "°", Some(&commands::TIMING_ADVANCE)),
                    slot("MAF", " g/s", Some(&commands::MAF)),
                ],
            ),
            CategoryConfig::new(
                "fuel",
                &[
                    slot("Fuel Level", "%", Some(&commands::FUEL_LEVEL)),
                    slot("Fuel Trim", " %", Some(&commands::SHORT_FUEL_TRIM_1)),
                    slot("Long Trim", " %", Some(&commands::LONG_FUEL_TRIM_1)),
                    slot("Fuel Rate", " L/h", Some(&commands::FUEL_RATE)),
                    slot("Fuel Pressure", " kPa", Some(&commands::FUEL_PRESSURE)),
                    slot("Lambda", "", Some(&commands::LAMBDA_COMMANDED)),
                ],
            ),
            CategoryConfig::new(
                "speed",
                &[
                    slot("Speed", " km/h", Some(&commands::SPEED)),
                    slot("Throttle", " %", Some(&commands::THROTTLE_POS)),
                    slot("Accel Pedal", " %", Some(&commands::ACCELERATOR_POS_D)),
                    slot("GPS Speed", " km/h", None),
                    slot("Avg Speed", " km/h", None),
                    slot("Drive Time", " s", Some(&commands::RUN_TIME)),
                ],
            ),
            CategoryConfig::new(
                "temp",
                &[
                    slot("Coolant", celsius, Some(&commands::COOLANT_TEMP)),
                    slot("Intake Air", celsius, Some(&commands::INTAKE_TEMP)),
                    slot("Oil", celsius, Some(&commands::OIL_TEMP)),
                    slot("Ambient", celsius, Some(&commands::AMBIENT_AIR_TEMP)),
                    slot("Catalyst", celsius, Some(&commands::CATALYST_TEMP_B1S1)),
                    slot("Transmission", celsius, None),
                ],
            ),
            CategoryConfig::new(
                "battery",
                &[
                    slot("Battery Volts", " V", Some(&commands::CONTROL_MODULE_VOLTAGE)),
                    slot("Hybrid Battery", " %", Some(&commands::HYBRID_BATTERY_REMAINING)),
                    slot("Absolute Load", " %", Some(&commands::ABSOLUTE_LOAD)),
                    slot("Ambient", celsius, Some(&commands::AMBIENT_AIR_TEMP)),
                    slot("Engine Run Time", " s", Some(&commands::RUN_TIME)),
                    slot("Charge Current", " A", None),
                ],
            ),
            CategoryConfig::new(
                "warning",
                &[
                    slot("Monitor Status", "", Some(&commands::STATUS)),
                    slot("Distance w/ MIL", " km", Some(&commands::DISTANCE_W_MIL)),
                    slot("Time w/ MIL", " min", Some(&commands::RUN_TIME_MIL)),
                    slot("Warm-ups", "", Some(&commands::WARMUPS_SINCE_DTC_CLEAR)),
                    slot("Distance Since Clear", " km", Some(&commands::DISTANCE_SINCE_DTC_CLEAR)),
                    slot("Time Since Clear", " min", Some(&commands::TIME_SINCE_DTC_CLEARED)),
                ],
            ),
        ])
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.get(name)
    }

    /// Like [`Self::get`], but an unknown name yields six placeholder slots
    #[must_use]
    pub fn select(&self, name: &str) -> CategoryConfig {
        self.get(name).cloned().unwrap_or_else(|| {
            warn!("Unknown category {name:?}, showing placeholders");
            CategoryConfig::placeholder(name)
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidebar_order() {
        let table = CategoryTable::builtin();
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, ["home", "engine", "fuel", "speed", "temp", "battery", "warning"]);
    }

    #[test]
    fn test_home_category() {
        let home = CategoryTable::builtin().select(HOME_CATEGORY);
        assert_eq!(
            home.names(),
            ["RPM", "Speed", "Engine Temp", "Fuel Level", "Battery Volts", "Engine Load"]
        );
        assert_eq!(home.units(), [" RPM", " km/h", "°C", "%", " V", " %"]);

        let commands: Vec<_> = home.commands().iter().map(|c| c.map(|c| c.name)).collect();
        assert_eq!(
            commands,
            [
                Some("RPM"),
                Some("SPEED"),
                Some("COOLANT_TEMP"),
                Some("FUEL_LEVEL"),
                Some("CONTROL_MODULE_VOLTAGE"),
                Some("ENGINE_LOAD"),
            ]
        );
    }

    #[test]
    fn test_unknown_category_placeholders() {
        let config = CategoryTable::builtin().select("transmission");
        assert_eq!(config.category_name, "transmission");
        assert!(config.names().iter().all(|name| name == EMPTY_SLOT));
        assert!(config.commands().iter().all(Option::is_none));
    }

    #[test]
    fn test_short_category_is_padded() {
        let config = CategoryConfig::new("short", &[SensorSlot::new("RPM", " RPM", Some(&commands::RPM))]);
        assert_eq!(config.slots[0].name, "RPM");
        assert_eq!(config.slots[1], SensorSlot::placeholder());
        assert_eq!(config.slots[5], SensorSlot::placeholder());
    }

    #[test]
    fn test_every_builtin_command_is_registered() {
        let table = CategoryTable::builtin();
        for name in table.names() {
            for command in table.select(name).commands().into_iter().flatten() {
                assert_eq!(commands::by_name(command.name).map(|c| c.pid), Some(command.pid));
            }
        }
    }
}
