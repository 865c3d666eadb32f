//! Synthetic sensor values for when no adapter is reachable.
//!
//! Each command name maps to a [`MockKind`] by keyword, and each kind to a
//! fixed [`MockProfile`]. The mapping is resolved once per command (see
//! [`crate::plan::QueryPlan`]) and only sampled on every tick.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::plan::{CommandId, QueryPlan, SlotValues, PLACEHOLDER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockKind {
    Rpm,
    Speed,
    Fuel,
    Temperature,
    Voltage,
    Pressure,
    Trim,
    Lambda,
    Throttle,
    Maf,
    Timing,
}

/// Keyword table, checked in order. The first kind with a keyword contained
/// in the command name wins.
const KEYWORDS: [(MockKind, &[&str]); 11] = [
    (MockKind::Rpm, &["RPM"]),
    (MockKind::Speed, &["SPEED"]),
    (MockKind::Fuel, &["FUEL_LEVEL", "FUEL_RATE", "FUEL_CONSUMPTION"]),
    (MockKind::Temperature, &["TEMP"]),
    (MockKind::Voltage, &["VOLTAGE"]),
    (MockKind::Pressure, &["PRESSURE"]),
    (MockKind::Trim, &["TRIM"]),
    (MockKind::Lambda, &["LAMBDA"]),
    (MockKind::Throttle, &["THROTTLE"]),
    (MockKind::Maf, &["MAF"]),
    (MockKind::Timing, &["TIMING"]),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// Whole numbers in `[min, max]`
    Integer { min: i32, max: i32 },
    /// Uniform in `[min, max]`, printed with `decimals` places
    Uniform { min: f64, max: f64, decimals: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockProfile {
    pub kind: MockKind,
    pub distribution: Distribution,
}

impl MockKind {
    /// Match a command name against the keyword table
    #[must_use]
    pub fn classify(name: &str) -> Option<Self> {
        let name = name.to_ascii_uppercase();
        KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|keyword| name.contains(keyword)))
            .map(|(kind, _)| *kind)
    }

    #[must_use]
    pub const fn profile(self) -> MockProfile {
        use Distribution::{Integer, Uniform};

        let distribution = match self {
            Self::Rpm => Integer { min: 700, max: 3000 },
            Self::Speed => Integer { min: 0, max: 120 },
            Self::Fuel => Integer { min: 10, max: 90 },
            Self::Temperature => Integer { min: 80, max: 100 },
            Self::Voltage => Uniform { min: 12.0, max: 14.5, decimals: 1 },
            Self::Pressure => Integer { min: 30, max: 60 },
            Self::Trim => Uniform { min: -5.0, max: 5.0, decimals: 1 },
            Self::Lambda => Uniform { min: 0.9, max: 1.1, decimals: 2 },
            Self::Throttle => Integer { min: 0, max: 100 },
            Self::Maf => Uniform { min: 0.5, max: 5.0, decimals: 2 },
            Self::Timing => Uniform { min: -10.0, max: 30.0, decimals: 1 },
        };

        MockProfile { kind: self, distribution }
    }
}

impl MockProfile {
    /// Profile for a command, `None` for absent or unmatched commands
    #[must_use]
    pub fn for_command(command: Option<CommandId>) -> Option<Self> {
        command
            .and_then(|command| MockKind::classify(command.name))
            .map(MockKind::profile)
    }
}

/// Seedable generator of mock display strings
#[derive(Debug, Clone)]
pub struct MockGenerator {
    rng: SmallRng,
}

impl MockGenerator {
    /// A seed of 0 uses OS entropy, anything else gives a reproducible sequence
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Draw one value and append `unit`
    pub fn sample(&mut self, profile: &MockProfile, unit: &str) -> String {
        match profile.distribution {
            Distribution::Integer { min, max } => {
                format!("{}{unit}", self.rng.gen_range(min..=max))
            }
            Distribution::Uniform { min, max, decimals } => {
                format!("{:.*}{unit}", decimals, self.rng.gen_range(min..=max))
            }
        }
    }

    /// Six mock strings for an already resolved plan
    pub fn generate_plan(&mut self, plan: &QueryPlan) -> SlotValues {
        std::array::from_fn(|i| {
            let slot = &plan.slots()[i];
            match &slot.mock {
                Some(profile) => self.sample(profile, &slot.unit),
                None => PLACEHOLDER.to_string(),
            }
        })
    }

    /// Six mock strings for the given commands and units
    pub fn generate<U: AsRef<str>>(&mut self, commands: &[Option<CommandId>], units: &[U]) -> SlotValues {
        self.generate_plan(&QueryPlan::new(commands, units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obdash_elm327_lib::commands::{
        CONTROL_MODULE_VOLTAGE, COOLANT_TEMP, ENGINE_LOAD, FUEL_LEVEL, FUEL_PRESSURE,
        LAMBDA_COMMANDED, MAF, RPM, SHORT_FUEL_TRIM_1, SPEED, TIMING_ADVANCE,
    };

    fn number(text: &str, unit: &str) -> f64 {
        text.strip_suffix(unit)
            .unwrap_or_else(|| panic!("{text:?} does not end with {unit:?}"))
            .parse()
            .unwrap()
    }

    fn decimals(text: &str, unit: &str) -> usize {
        let number = text.strip_suffix(unit).unwrap();
        number.split_once('.').map_or(0, |(_, frac)| frac.len())
    }

    #[test]
    fn test_classify_keyword_order() {
        assert_eq!(MockKind::classify("RPM"), Some(MockKind::Rpm));
        assert_eq!(MockKind::classify("COOLANT_TEMP"), Some(MockKind::Temperature));
        assert_eq!(MockKind::classify("FUEL_LEVEL"), Some(MockKind::Fuel));
        // FUEL_PRESSURE is not a fuel quantity keyword, falls through to PRESSURE
        assert_eq!(MockKind::classify("FUEL_PRESSURE"), Some(MockKind::Pressure));
        assert_eq!(MockKind::classify("RELATIVE_THROTTLE_POS"), Some(MockKind::Throttle));
        assert_eq!(MockKind::classify("ENGINE_LOAD"), None);
        assert_eq!(MockKind::classify("RUN_TIME"), None);
    }

    #[test]
    fn test_profile_for_command() {
        assert_eq!(MockProfile::for_command(None), None);
        assert_eq!(MockProfile::for_command(Some(&ENGINE_LOAD)), None);
        assert_eq!(
            MockProfile::for_command(Some(&CONTROL_MODULE_VOLTAGE)).map(|p| p.distribution),
            Some(Distribution::Uniform { min: 12.0, max: 14.5, decimals: 1 })
        );
    }

    #[test]
    fn test_seeded_generators_agree() {
        let commands = [Some(&RPM), Some(&SPEED), Some(&COOLANT_TEMP), None, Some(&MAF), Some(&LAMBDA_COMMANDED)];
        let units = [" RPM", " km/h", "°C", "", " g/s", ""];

        let mut a = MockGenerator::new(7);
        let mut b = MockGenerator::new(7);
        for _ in 0..20 {
            assert_eq!(a.generate(&commands, &units), b.generate(&commands, &units));
        }
    }

    #[test]
    fn test_values_stay_in_range() {
        let commands = [
            Some(&RPM),
            Some(&SPEED),
            Some(&COOLANT_TEMP),
            Some(&FUEL_LEVEL),
            Some(&CONTROL_MODULE_VOLTAGE),
            Some(&ENGINE_LOAD),
        ];
        let units = [" RPM", " km/h", "°C", "%", " V", " %"];
        let mut generator = MockGenerator::new(42);

        for _ in 0..200 {
            let values = generator.generate(&commands, &units);
            assert!((700.0..=3000.0).contains(&number(&values[0], " RPM")));
            assert!((0.0..=120.0).contains(&number(&values[1], " km/h")));
            assert!((80.0..=100.0).contains(&number(&values[2], "°C")));
            assert!((10.0..=90.0).contains(&number(&values[3], "%")));
            assert!((12.0..=14.5).contains(&number(&values[4], " V")));
            assert_eq!(decimals(&values[4], " V"), 1);
            assert_eq!(decimals(&values[0], " RPM"), 0);
            assert_eq!(values[5], PLACEHOLDER);
        }
    }

    #[test]
    fn test_decimal_places() {
        let commands = [Some(&LAMBDA_COMMANDED), Some(&MAF), Some(&SHORT_FUEL_TRIM_1), Some(&TIMING_ADVANCE), Some(&FUEL_PRESSURE)];
        let units = ["", " g/s", " %", "°", " kPa"];
        let mut generator = MockGenerator::new(3);

        for _ in 0..50 {
            let values = generator.generate(&commands, &units);
            assert_eq!(decimals(&values[0], ""), 2);
            assert!((0.9..=1.1).contains(&number(&values[0], "")));
            assert_eq!(decimals(&values[1], " g/s"), 2);
            assert!((-5.0..=5.0).contains(&number(&values[2], " %")));
            assert!((-10.0..=30.0).contains(&number(&values[3], "°")));
            assert!((30.0..=60.0).contains(&number(&values[4], " kPa")));
            // Sixth slot was never given
            assert_eq!(values[5], PLACEHOLDER);
        }
    }
}
