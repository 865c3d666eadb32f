//! Registry of OBD2 Mode 01 commands and their decoding formulas.
//!
//! Every command is a `static`, so a `&'static Command` can be used as a cheap
//! identifier throughout the dashboard.

use crate::response::Value;

/// Mode 01: show current data
pub const MODE_CURRENT_DATA: u8 = 0x01;

/// How the data bytes of a reply turn into a value.
///
/// `A`, `B` below are the first and second data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// Supported-PID bitmap, kept as hex text
    Bitmap,
    /// Monitor status, `A & 0x7F` stored trouble codes
    DtcCount,
    /// `A * 100 / 255`
    Percent,
    /// `(A - 128) * 100 / 128`, fuel trims
    CenteredPercent,
    /// `A - 40` degrees Celsius
    Temperature,
    /// `(256A + B) / 10 - 40` degrees Celsius
    CatalystTemperature,
    /// `(256A + B) / 4`
    Rpm,
    /// `A` km/h
    Speed,
    /// `(256A + B) / 100` grams per second
    Maf,
    /// `A / 2 - 64` degrees before TDC
    TimingAdvance,
    /// `A` kPa
    Pressure,
    /// `A * 3` kPa
    FuelPressure,
    /// `(256A + B) * 10` kPa
    FuelRailGauge,
    /// `(256A + B) / 1000` volts
    ModuleVoltage,
    /// `(256A + B) * 2 / 65536`, lambda
    EquivalenceRatio,
    /// `(256A + B) * 100 / 255`
    AbsoluteLoad,
    /// `(256A + B) / 20` litres per hour
    FuelRate,
    /// `256A + B` km
    Distance,
    /// `256A + B` minutes
    Minutes,
    /// `256A + B` seconds
    Seconds,
    /// `A` as a plain count
    Count,
}

#[inline]
fn word(data: &[u8]) -> f64 {
    f64::from(data[0]) * 256.0 + f64::from(data[1])
}

impl Decoder {
    /// Number of data bytes this decoder reads
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Bitmap => 4,
            Self::CatalystTemperature
            | Self::Rpm
            | Self::Maf
            | Self::FuelRailGauge
            | Self::ModuleVoltage
            | Self::EquivalenceRatio
            | Self::AbsoluteLoad
            | Self::FuelRate
            | Self::Distance
            | Self::Minutes
            | Self::Seconds => 2,
            _ => 1,
        }
    }

    /// Decode the data bytes of a reply. Returns `None` if there are too few bytes.
    #[must_use]
    pub fn decode(self, data: &[u8]) -> Option<Value> {
        if data.len() < self.width() {
            return None;
        }
        let a = f64::from(data[0]);

        let (magnitude, unit) = match self {
            Self::Bitmap => return Some(Value::Text(hex::encode_upper(&data[..4]))),
            Self::DtcCount => (f64::from(data[0] & 0x7F), "count"),
            Self::Percent => (a * 100.0 / 255.0, "percent"),
            Self::CenteredPercent => ((a - 128.0) * 100.0 / 128.0, "percent"),
            Self::Temperature => (a - 40.0, "degC"),
            Self::CatalystTemperature => (word(data) / 10.0 - 40.0, "degC"),
            Self::Rpm => (word(data) / 4.0, "rpm"),
            Self::Speed => (a, "kph"),
            Self::Maf => (word(data) / 100.0, "gps"),
            Self::TimingAdvance => (a / 2.0 - 64.0, "degree"),
            Self::Pressure => (a, "kilopascal"),
            Self::FuelPressure => (a * 3.0, "kilopascal"),
            Self::FuelRailGauge => (word(data) * 10.0, "kilopascal"),
            Self::ModuleVoltage => (word(data) / 1000.0, "volt"),
            Self::EquivalenceRatio => (word(data) * 2.0 / 65536.0, "ratio"),
            Self::AbsoluteLoad => (word(data) * 100.0 / 255.0, "percent"),
            Self::FuelRate => (word(data) / 20.0, "liters_per_hour"),
            Self::Distance => (word(data), "kilometer"),
            Self::Minutes => (word(data), "minute"),
            Self::Seconds => (word(data), "second"),
            Self::Count => (a, "count"),
        };

        Some(Value::Quantity { magnitude, unit })
    }
}

/// A single queryable sensor reading.
#[derive(Debug, PartialEq, Eq)]
pub struct Command {
    /// Symbolic name, e.g. `COOLANT_TEMP`
    pub name: &'static str,
    pub description: &'static str,
    pub mode: u8,
    pub pid: u8,
    pub decoder: Decoder,
}

impl Command {
    /// The request string sent to the adapter, e.g. `010C`
    #[must_use]
    pub fn request(&self) -> String {
        format!("{:02X}{:02X}", self.mode, self.pid)
    }

    /// The header a positive reply starts with, e.g. `410C`
    #[must_use]
    pub fn reply_header(&self) -> String {
        format!("{:02X}{:02X}", self.mode + 0x40, self.pid)
    }

    /// Number of data bytes expected after the reply header
    #[must_use]
    pub const fn response_bytes(&self) -> usize {
        self.decoder.width()
    }

    #[must_use]
    pub fn decode(&self, data: &[u8]) -> Option<Value> {
        self.decoder.decode(data)
    }
}

macro_rules! mode01 {
    ($ident:ident, $pid:literal, $decoder:ident, $description:literal) => {
        #[doc = $description]
        pub static $ident: Command = Command {
            name: stringify!($ident),
            description: $description,
            mode: MODE_CURRENT_DATA,
            pid: $pid,
            decoder: Decoder::$decoder,
        };
    };
}

mode01!(PIDS_A, 0x00, Bitmap, "Supported PIDs [01-20]");
mode01!(STATUS, 0x01, DtcCount, "Status since DTCs cleared");
mode01!(ENGINE_LOAD, 0x04, Percent, "Calculated Engine Load");
mode01!(COOLANT_TEMP, 0x05, Temperature, "Engine Coolant Temperature");
mode01!(SHORT_FUEL_TRIM_1, 0x06, CenteredPercent, "Short Term Fuel Trim - Bank 1");
mode01!(LONG_FUEL_TRIM_1, 0x07, CenteredPercent, "Long Term Fuel Trim - Bank 1");
mode01!(FUEL_PRESSURE, 0x0A, FuelPressure, "Fuel Pressure");
mode01!(INTAKE_PRESSURE, 0x0B, Pressure, "Intake Manifold Pressure");
mode01!(RPM, 0x0C, Rpm, "Engine RPM");
mode01!(SPEED, 0x0D, Speed, "Vehicle Speed");
mode01!(TIMING_ADVANCE, 0x0E, TimingAdvance, "Timing Advance");
mode01!(INTAKE_TEMP, 0x0F, Temperature, "Intake Air Temp");
mode01!(MAF, 0x10, Maf, "Air Flow Rate (MAF)");
mode01!(THROTTLE_POS, 0x11, Percent, "Throttle Position");
mode01!(RUN_TIME, 0x1F, Seconds, "Engine Run Time");
mode01!(PIDS_B, 0x20, Bitmap, "Supported PIDs [21-40]");
mode01!(DISTANCE_W_MIL, 0x21, Distance, "Distance Traveled with MIL on");
mode01!(FUEL_RAIL_PRESSURE_DIRECT, 0x23, FuelRailGauge, "Fuel Rail Pressure (direct inject)");
mode01!(FUEL_LEVEL, 0x2F, Percent, "Fuel Level Input");
mode01!(WARMUPS_SINCE_DTC_CLEAR, 0x30, Count, "Number of warm-ups since codes cleared");
mode01!(DISTANCE_SINCE_DTC_CLEAR, 0x31, Distance, "Distance traveled since codes cleared");
mode01!(BAROMETRIC_PRESSURE, 0x33, Pressure, "Barometric Pressure");
mode01!(CATALYST_TEMP_B1S1, 0x3C, CatalystTemperature, "Catalyst Temperature: Bank 1 - Sensor 1");
mode01!(PIDS_C, 0x40, Bitmap, "Supported PIDs [41-60]");
mode01!(CONTROL_MODULE_VOLTAGE, 0x42, ModuleVoltage, "Control module voltage");
mode01!(ABSOLUTE_LOAD, 0x43, AbsoluteLoad, "Absolute load value");
mode01!(LAMBDA_COMMANDED, 0x44, EquivalenceRatio, "Commanded equivalence ratio");
mode01!(RELATIVE_THROTTLE_POS, 0x45, Percent, "Relative throttle position");
mode01!(AMBIENT_AIR_TEMP, 0x46, Temperature, "Ambient air temperature");
mode01!(ACCELERATOR_POS_D, 0x49, Percent, "Accelerator pedal position D");
mode01!(THROTTLE_ACTUATOR, 0x4C, Percent, "Commanded throttle actuator");
mode01!(RUN_TIME_MIL, 0x4D, Minutes, "Time run with MIL on");
mode01!(TIME_SINCE_DTC_CLEARED, 0x4E, Minutes, "Time since trouble codes cleared");
mode01!(ETHANOL_PERCENT, 0x52, Percent, "Ethanol Fuel Percent");
mode01!(HYBRID_BATTERY_REMAINING, 0x5B, Percent, "Hybrid battery pack remaining life");
mode01!(OIL_TEMP, 0x5C, Temperature, "Engine oil temperature");
mode01!(FUEL_RATE, 0x5E, FuelRate, "Engine fuel rate");

/// Every known command, ordered by PID
pub static ALL: &[&Command] = &[
    &PIDS_A,
    &STATUS,
    &ENGINE_LOAD,
    &COOLANT_TEMP,
    &SHORT_FUEL_TRIM_1,
    &LONG_FUEL_TRIM_1,
    &FUEL_PRESSURE,
    &INTAKE_PRESSURE,
    &RPM,
    &SPEED,
    &TIMING_ADVANCE,
    &INTAKE_TEMP,
    &MAF,
    &THROTTLE_POS,
    &RUN_TIME,
    &PIDS_B,
    &DISTANCE_W_MIL,
    &FUEL_RAIL_PRESSURE_DIRECT,
    &FUEL_LEVEL,
    &WARMUPS_SINCE_DTC_CLEAR,
    &DISTANCE_SINCE_DTC_CLEAR,
    &BAROMETRIC_PRESSURE,
    &CATALYST_TEMP_B1S1,
    &PIDS_C,
    &CONTROL_MODULE_VOLTAGE,
    &ABSOLUTE_LOAD,
    &LAMBDA_COMMANDED,
    &RELATIVE_THROTTLE_POS,
    &AMBIENT_AIR_TEMP,
    &ACCELERATOR_POS_D,
    &THROTTLE_ACTUATOR,
    &RUN_TIME_MIL,
    &TIME_SINCE_DTC_CLEARED,
    &ETHANOL_PERCENT,
    &HYBRID_BATTERY_REMAINING,
    &OIL_TEMP,
    &FUEL_RATE,
];

/// Look up a command by its symbolic name (case-insensitive)
#[must_use]
pub fn by_name(name: &str) -> Option<&'static Command> {
    ALL.iter()
        .copied()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

/// Look up a Mode 01 command by PID
#[must_use]
pub fn by_pid(pid: u8) -> Option<&'static Command> {
    ALL.iter().copied().find(|command| command.pid == pid)
}

/// Supported-PID bitmap for the 32 PIDs after `base` (0x00, 0x20, 0x40, ...),
/// built from the registry. Bit 31 is PID `base + 1`.
#[must_use]
pub fn supported_bitmap(base: u8) -> u32 {
    ALL.iter()
        .filter(|command| command.pid > base && u32::from(command.pid) <= u32::from(base) + 32)
        .fold(0, |bits, command| bits | 1 << (32 - u32::from(command.pid - base)))
}
