//! Measurement parsing.
//!
//! Two strategies turn a value query into a [`Reading`]:
//!
//! - **Precision in response** (Agilent/Keysight, GW-Instek 906x, Owon): the
//!   mode query answers e.g. `VOLT +1.00000E+01,+1.00000E-05`; the exponent of
//!   the last field is the resolution, so `digits = 5`.
//! - **Mode code** (GW-Instek 8200 series): the mode query answers a numeric
//!   function code; digits come from the reading rate (`Slow`/`Mid`/`Fast`)
//!   captured at acquisition start, and some codes read their open-circuit
//!   display (`0L`) as a large finite number that is mapped to infinity.
//!
//! Both return `Ok(None)` when the active mode is not recognized, which the
//! acquisition loop treats as a skip for that channel.

use crate::capability::Capability;
use crate::command::CommandId;
use crate::controller::{ActiveMode, ScpiDmm};
use crate::error::{DmmError, DmmResult};
use crate::limits::{CONTINUITY_CEILING, DEFAULT_OVERLOAD_LIMIT, DIODE_OPEN_READING};
use crate::numeric::{parse_decimal, precision_exponent};
use crate::profile::MeasurementStyle;
use crate::quantity::{MqFlags, Quantity, Unit};
use crate::transport::ScpiTransport;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Mode code for Fahrenheit temperature on mode-code meters.
const MODE_TEMPERATURE_FAHRENHEIT: i32 = 15;

/// Measured value at its delivered width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SampleValue {
    /// Single precision
    Single(f32),
    /// Double precision
    Double(f64),
}

impl SampleValue {
    /// Narrow to single precision unless `double` is set.
    pub fn with_width(value: f64, double: bool) -> Self {
        if double {
            SampleValue::Double(value)
        } else {
            SampleValue::Single(value as f32)
        }
    }

    /// Value as `f64`.
    pub fn as_f64(self) -> f64 {
        match self {
            SampleValue::Single(v) => f64::from(v),
            SampleValue::Double(v) => v,
        }
    }

    /// Encoded size in bytes.
    pub fn byte_width(self) -> usize {
        match self {
            SampleValue::Single(_) => std::mem::size_of::<f32>(),
            SampleValue::Double(_) => std::mem::size_of::<f64>(),
        }
    }
}

/// One parsed measurement, not yet tagged with a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Measured quantity
    pub quantity: Quantity,
    /// Qualifier flags
    pub flags: MqFlags,
    /// Unit of `value`
    pub unit: Unit,
    /// Value, `±inf` on overload
    pub value: SampleValue,
    /// Significant decimal digits
    pub digits: i32,
}

impl Reading {
    /// Encoded size of the value in bytes.
    pub fn byte_width(&self) -> usize {
        self.value.byte_width()
    }
}

/// Clamp the overload sentinel to infinity when `|value| > limit`.
pub fn clamp_overload_strict(value: f64, limit: f64) -> f64 {
    if value > limit {
        f64::INFINITY
    } else if value < -limit {
        f64::NEG_INFINITY
    } else {
        value
    }
}

/// Clamp the overload sentinel to infinity when `|value| >= limit`.
pub fn clamp_overload_inclusive(value: f64, limit: f64) -> f64 {
    if value >= limit {
        f64::INFINITY
    } else if value <= -limit {
        f64::NEG_INFINITY
    } else {
        value
    }
}

/// Map a mode-code meter's open-circuit display value to `+inf`.
///
/// Resistance (codes 7 and 16) reads at or above `resistance_ceiling`,
/// continuity (13) at or above 1.2 kΩ, diode test (17) exactly 1 V.
pub fn remap_open_circuit(mode_code: i32, value: f64, resistance_ceiling: f64) -> f64 {
    let open = match mode_code {
        7 | 16 => value >= resistance_ceiling,
        13 => value >= CONTINUITY_CEILING,
        17 => value == DIODE_OPEN_READING,
        _ => false,
    };
    if open {
        f64::INFINITY
    } else {
        value
    }
}

/// Digits implied by a reading-rate descriptor.
///
/// `Slow` is 5½ digits, `Mid` 4½, `Fast` 3½; anything else keeps `fallback`.
pub fn digits_from_rate(descriptor: Option<&str>, fallback: i32) -> i32 {
    match descriptor {
        Some(d) if d.starts_with("Slow") => 6,
        Some(d) if d.starts_with("Mid") => 5,
        Some(d) if d.starts_with("Fast") => 4,
        Some(d) if !d.is_empty() => {
            info!(descriptor = d, "Unknown precision");
            fallback
        }
        _ => fallback,
    }
}

/// Precision text for a mode response: its last comma-separated field, or the
/// capability's default exponent written as `1e<n>`.
///
/// ```text
/// VOLT +1.00000E-01,+1.00000E-06           -> +1.00000E-06
/// DIOD                                     -> 1e-4 (table default)
/// TEMP THER,5000,+1.00000E+00,+1.00000E-01 -> +1.00000E-01
/// ```
pub fn precision_text(mode_response: &str, capability: &Capability) -> Option<String> {
    let unquoted = unquote(mode_response);
    let fields: Vec<&str> = unquoted.split(',').collect();
    if fields.len() >= 2 {
        return fields.last().map(|f| f.to_string());
    }
    capability
        .default_precision
        .map(|exponent| format!("1e{exponent}"))
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix('"').unwrap_or(text);
    text.strip_suffix('"').unwrap_or(text)
}

fn unit_for(quantity: Quantity) -> DmmResult<Unit> {
    quantity
        .unit()
        .ok_or(DmmError::UnsupportedQuantity(quantity))
}

/// Leading integer of a mode-code response such as `07`.
fn parse_mode_code(response: &str) -> DmmResult<i32> {
    let text = unquote(response);
    let end = text
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && matches!(c, '+' | '-'))))
        .map_or(text.len(), |(i, _)| i);
    text[..end]
        .parse::<i32>()
        .map_err(|_| DmmError::DataFormat(format!("no mode code in {response:?}")))
}

impl<T: ScpiTransport> ScpiDmm<T> {
    /// Take one measurement with the model's strategy.
    ///
    /// Returns `Ok(None)` when the active mode is not recognized.
    pub async fn measure(&mut self, channel: usize) -> DmmResult<Option<Reading>> {
        let reading = match self.profile().measurement {
            MeasurementStyle::PrecisionInResponse => self.measure_precision_in_response().await?,
            MeasurementStyle::ModeCodeTable => self.measure_mode_code().await?,
        };
        if let Some(reading) = &reading {
            debug!(
                channel,
                value = reading.value.as_f64(),
                unit = %reading.unit,
                digits = reading.digits,
                "Reading"
            );
        }
        Ok(reading)
    }

    async fn mode_or_skip(&mut self) -> DmmResult<Option<ActiveMode>> {
        match self.query_mode().await {
            Ok(mode) => Ok(Some(mode)),
            Err(DmmError::NotRecognized(response)) => {
                debug!(response = %response, "Skipping measurement in unknown mode");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn query_value(&mut self) -> DmmResult<f64> {
        let command = self.profile().commands.format(CommandId::QueryValue, &[])?;
        let response = self.query_string(&command).await?;
        parse_decimal(&response)
    }

    async fn measure_precision_in_response(&mut self) -> DmmResult<Option<Reading>> {
        let Some(mode) = self.mode_or_skip().await? else {
            return Ok(None);
        };
        let capability = mode.capability;
        let exponent = match precision_text(&mode.response, capability) {
            Some(text) => precision_exponent(&text)?,
            None => 0,
        };

        let value = clamp_overload_strict(self.query_value().await?, DEFAULT_OVERLOAD_LIMIT);
        let unit = unit_for(capability.quantity)?;

        Ok(Some(Reading {
            quantity: capability.quantity,
            flags: capability.flags,
            unit,
            value: SampleValue::with_width(value, self.profile().uses_double_width()),
            digits: -exponent,
        }))
    }

    async fn measure_mode_code(&mut self) -> DmmResult<Option<Reading>> {
        let Some(mode) = self.mode_or_skip().await? else {
            return Ok(None);
        };
        let capability = mode.capability;
        let mode_code = parse_mode_code(&mode.response)?;
        let profile = self.profile();

        let value = clamp_overload_inclusive(self.query_value().await?, profile.overload_threshold());
        let value = remap_open_circuit(mode_code, value, profile.resistance_threshold());

        let digits = digits_from_rate(self.rate_descriptor(), i32::from(profile.digits));
        let unit = match capability.quantity {
            Quantity::Temperature if mode_code == MODE_TEMPERATURE_FAHRENHEIT => Unit::Fahrenheit,
            quantity => unit_for(quantity)?,
        };

        Ok(Some(Reading {
            quantity: capability.quantity,
            flags: capability.flags,
            unit,
            value: SampleValue::with_width(value, profile.uses_double_width()),
            digits,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::BehaviorFlags;

    const DIOD: Capability = Capability::new(
        Quantity::Voltage,
        MqFlags::DC.union(MqFlags::DIODE),
        "DIOD",
        "DIOD",
    )
    .with_behavior(BehaviorFlags::NO_RANGE)
    .with_default_precision(-4);

    const VOLT: Capability = Capability::new(Quantity::Voltage, MqFlags::DC, "VOLT:DC", "VOLT ");

    #[test]
    fn precision_from_last_field() {
        assert_eq!(
            precision_text("VOLT +1.00000E-01,+1.00000E-06", &VOLT).as_deref(),
            Some("+1.00000E-06")
        );
        assert_eq!(
            precision_text("TEMP THER,5000,+1.00000E+00,+1.00000E-01\"", &VOLT).as_deref(),
            Some("+1.00000E-01")
        );
    }

    #[test]
    fn precision_falls_back_to_table_default() {
        assert_eq!(precision_text("DIOD", &DIOD).as_deref(), Some("1e-4"));
        assert_eq!(precision_text("VOLT", &VOLT), None);
        assert_eq!(precision_exponent("1e-4").unwrap(), -4);
    }

    #[test]
    fn strict_overload_clamp() {
        assert_eq!(clamp_overload_strict(9.99999e37, 9e37), f64::INFINITY);
        assert_eq!(clamp_overload_strict(-9.99999e37, 9e37), f64::NEG_INFINITY);
        assert_eq!(clamp_overload_strict(5.0, 9e37), 5.0);
        assert_eq!(clamp_overload_strict(9e37, 9e37), 9e37);
    }

    #[test]
    fn inclusive_overload_clamp() {
        assert_eq!(clamp_overload_inclusive(9e37, 9e37), f64::INFINITY);
        assert_eq!(clamp_overload_inclusive(-1e9, 1e9), f64::NEG_INFINITY);
        assert_eq!(clamp_overload_inclusive(5.0, 1e9), 5.0);
    }

    #[test]
    fn open_circuit_remap() {
        assert_eq!(remap_open_circuit(7, 1.2e8, 1.2e8), f64::INFINITY);
        assert_eq!(remap_open_circuit(7, 1.2e8, 1.99999e8), 1.2e8);
        assert_eq!(remap_open_circuit(16, 2.0e8, 1.99999e8), f64::INFINITY);
        assert_eq!(remap_open_circuit(13, 1.2e3, 1.2e8), f64::INFINITY);
        assert_eq!(remap_open_circuit(13, 11.5, 1.2e8), 11.5);
        assert_eq!(remap_open_circuit(17, 1.0, 1.2e8), f64::INFINITY);
        assert_eq!(remap_open_circuit(17, 0.6, 1.2e8), 0.6);
        assert_eq!(remap_open_circuit(1, 1.0, 1.2e8), 1.0);
    }

    #[test]
    fn rate_descriptor_digits() {
        assert_eq!(digits_from_rate(Some("Slow"), 6), 6);
        assert_eq!(digits_from_rate(Some("Mid"), 6), 5);
        assert_eq!(digits_from_rate(Some("Fast"), 6), 4);
        assert_eq!(digits_from_rate(Some("Turbo"), 6), 6);
        assert_eq!(digits_from_rate(None, 3), 3);
    }

    #[test]
    fn mode_code_parsing() {
        assert_eq!(parse_mode_code("07").unwrap(), 7);
        assert_eq!(parse_mode_code("\"15\"").unwrap(), 15);
        assert!(matches!(
            parse_mode_code("VOLT"),
            Err(DmmError::DataFormat(_))
        ));
    }

    #[test]
    fn sample_width() {
        assert_eq!(SampleValue::with_width(1.5, true).byte_width(), 8);
        assert_eq!(SampleValue::with_width(1.5, false).byte_width(), 4);
        assert_eq!(SampleValue::with_width(1.5, false).as_f64(), 1.5);
    }

    #[test]
    fn unmapped_quantity_is_rejected() {
        assert!(matches!(
            unit_for(Quantity::DutyCycle),
            Err(DmmError::UnsupportedQuantity(Quantity::DutyCycle))
        ));
    }
}
