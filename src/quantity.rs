//! Measurement quantities, qualifier flags and units.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Physical quantity a meter can measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Voltage
    Voltage,
    /// Current
    Current,
    /// Resistance
    Resistance,
    /// Continuity (resistance with a beeper)
    Continuity,
    /// Capacitance
    Capacitance,
    /// Temperature
    Temperature,
    /// Frequency
    Frequency,
    /// Period
    Time,
    /// Duty cycle; reported by some meters but has no unit here
    DutyCycle,
    /// Conductance; reported by some meters but has no unit here
    Conductance,
}

bitflags! {
    /// Qualifiers on a measured quantity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MqFlags: u32 {
        /// Alternating current
        const AC = 1 << 0;
        /// Direct current
        const DC = 1 << 1;
        /// True RMS
        const RMS = 1 << 2;
        /// Diode test
        const DIODE = 1 << 3;
        /// Four-wire (Kelvin) measurement
        const FOUR_WIRE = 1 << 4;
    }
}

/// Unit attached to a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// V
    Volt,
    /// A
    Ampere,
    /// Ω
    Ohm,
    /// F
    Farad,
    /// °C
    Celsius,
    /// °F
    Fahrenheit,
    /// Hz
    Hertz,
    /// s
    Second,
}

impl Unit {
    /// Display symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Ohm => "Ω",
            Unit::Farad => "F",
            Unit::Celsius => "°C",
            Unit::Fahrenheit => "°F",
            Unit::Hertz => "Hz",
            Unit::Second => "s",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Quantity {
    /// Base unit for this quantity, if it has one.
    ///
    /// Temperature maps to Celsius; mode-code meters override it when the
    /// front panel is set to Fahrenheit.
    pub fn unit(self) -> Option<Unit> {
        match self {
            Quantity::Voltage => Some(Unit::Volt),
            Quantity::Current => Some(Unit::Ampere),
            Quantity::Resistance | Quantity::Continuity => Some(Unit::Ohm),
            Quantity::Capacitance => Some(Unit::Farad),
            Quantity::Temperature => Some(Unit::Celsius),
            Quantity::Frequency => Some(Unit::Hertz),
            Quantity::Time => Some(Unit::Second),
            Quantity::DutyCycle | Quantity::Conductance => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuity_reads_in_ohms() {
        assert_eq!(Quantity::Continuity.unit(), Some(Unit::Ohm));
        assert_eq!(Quantity::DutyCycle.unit(), None);
    }

    #[test]
    fn flags_combine() {
        let flags = MqFlags::DC | MqFlags::DIODE;
        assert!(flags.contains(MqFlags::DC));
        assert!(!flags.contains(MqFlags::AC));
    }
}
