//! Model profiles.
//!
//! A [`ModelProfile`] bundles everything that differs between meters: the
//! capability table, command templates, timing, overload thresholds and which
//! measurement and range strategies apply. Profiles are immutable data; see
//! [`crate::models`] for the built-in ones.

use crate::capability::CapabilityTable;
use crate::command::CommandSet;
use crate::error::DmmResult;
use crate::limits::{DEFAULT_OVERLOAD_LIMIT, RESISTANCE_CEILING};
use crate::quantity::{MqFlags, Quantity};
use std::time::Duration;

/// How a measurement is turned into a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementStyle {
    /// The mode query response carries the precision as its last field
    /// (Agilent/Keysight `CONF?`).
    PrecisionInResponse,
    /// The mode query returns a numeric function code and precision comes from
    /// the reading-rate setting (GW-Instek GDM-8200 series).
    ModeCodeTable,
}

/// How range text is read and written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeStyle {
    /// Plain numbers in base units, no catalogue.
    Generic,
    /// Unit-bearing text (`500 mV`, `5 kΩ`) with a fixed per-mode catalogue.
    VendorNormalized {
        /// Selectable ranges per mode
        catalogue: &'static [RangeCatalogueEntry],
    },
}

/// Selectable ranges for the modes matching `quantity` and `flags`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeCatalogueEntry {
    /// Quantity the entry applies to
    pub quantity: Quantity,
    /// Flags the active mode must contain; empty matches any
    pub flags: MqFlags,
    /// Range texts in device order
    pub ranges: &'static [&'static str],
}

impl RangeCatalogueEntry {
    fn matches(&self, quantity: Quantity, flags: MqFlags) -> bool {
        self.quantity == quantity && flags.contains(self.flags)
    }
}

/// Static description of one meter model.
#[derive(Debug, Clone)]
pub struct ModelProfile {
    /// Vendor name as reported by `*IDN?`
    pub vendor: &'static str,
    /// Model name as reported by `*IDN?`
    pub model: &'static str,
    /// Declared significant digits
    pub digits: u8,
    /// Number of measurement channels
    pub channels: usize,
    /// Supported modes
    pub capabilities: CapabilityTable,
    /// Command templates
    pub commands: CommandSet,
    /// Pause after setup commands on modes flagged for it
    pub settle_delay: Duration,
    /// Pause before every request; zero disables it
    pub command_delay: Duration,
    /// Wait on `*OPC?` before every request
    pub opc_sync: bool,
    /// Overload threshold replacing the default `9e37`
    pub overload_limit: Option<f64>,
    /// Resistance open-circuit ceiling for mode-code meters
    pub resistance_ceiling: Option<f64>,
    /// Measurement strategy
    pub measurement: MeasurementStyle,
    /// Range strategy
    pub range: RangeStyle,
}

impl ModelProfile {
    /// Effective overload threshold.
    pub fn overload_threshold(&self) -> f64 {
        self.overload_limit.unwrap_or(DEFAULT_OVERLOAD_LIMIT)
    }

    /// Effective resistance ceiling.
    pub fn resistance_threshold(&self) -> f64 {
        self.resistance_ceiling.unwrap_or(RESISTANCE_CEILING)
    }

    /// Whether values are delivered as double precision.
    pub fn uses_double_width(&self) -> bool {
        match self.measurement {
            MeasurementStyle::PrecisionInResponse => self.digits >= 6,
            MeasurementStyle::ModeCodeTable => self.digits > 6,
        }
    }

    /// Catalogue ranges for a mode; empty when none are defined.
    pub fn catalogue_ranges(&self, quantity: Quantity, flags: MqFlags) -> &'static [&'static str] {
        match self.range {
            RangeStyle::Generic => &[],
            RangeStyle::VendorNormalized { catalogue } => catalogue
                .iter()
                .find(|entry| entry.matches(quantity, flags))
                .map(|entry| entry.ranges)
                .unwrap_or(&[]),
        }
    }

    /// Check the static tables.
    pub fn validate(&self) -> DmmResult<()> {
        self.capabilities.validate()?;
        self.commands.validate()
    }

    /// `vendor model`, for logs.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.vendor, self.model)
    }
}
