//! Mode and range control.
//!
//! [`ScpiDmm`] owns the transport and a model profile and exposes the uniform
//! mode/range operations. Vendor differences are resolved through the
//! profile's capability table, command set and [`RangeStyle`].
//!
//! ## Range text
//!
//! | Style             | Read back      | Accepted on write              |
//! |-------------------|----------------|--------------------------------|
//! | Generic           | `10`, `0.1`    | passed through verbatim        |
//! | Vendor-normalized | `500 mV`, `5 kOhm` | `auto`, `50 mV`, `0.05`, `KITS90` |

use crate::capability::Capability;
use crate::command::CommandId;
use crate::error::{DmmError, DmmResult};
use crate::limits::{check_text_len, MAX_RANGE_TEXT_LEN};
use crate::numeric::{
    format_decimal, parse_decimal, scale_by_power_of_ten, si_prefix_exponent,
};
use crate::profile::{ModelProfile, RangeStyle};
use crate::quantity::{MqFlags, Quantity};
use crate::transport::ScpiTransport;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Active range as reported by the meter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeText {
    /// Autoranging
    Auto,
    /// Fixed range, e.g. `10` or `500 mV`
    Fixed(String),
}

impl RangeText {
    /// Text form, `auto` for autoranging.
    pub fn as_str(&self) -> &str {
        match self {
            RangeText::Auto => "auto",
            RangeText::Fixed(text) => text,
        }
    }
}

impl fmt::Display for RangeText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a mode query.
#[derive(Debug, Clone)]
pub struct ActiveMode {
    /// Matched capability
    pub capability: &'static Capability,
    /// Mode response with any leading quote removed
    pub response: String,
}

/// Operation-complete query issued before each request.
const OPC_QUERY: &str = "*OPC?";

/// A bench DMM behind an SCPI transport.
pub struct ScpiDmm<T> {
    transport: T,
    profile: &'static ModelProfile,
    command_delay: Duration,
    rate_descriptor: Option<String>,
}

impl<T> fmt::Debug for ScpiDmm<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScpiDmm")
            .field("model", &self.profile.display_name())
            .field("rate_descriptor", &self.rate_descriptor)
            .finish_non_exhaustive()
    }
}

impl<T: ScpiTransport> ScpiDmm<T> {
    /// Bind a transport to a model after validating the model's tables.
    pub fn new(transport: T, profile: &'static ModelProfile) -> DmmResult<Self> {
        profile.validate()?;
        Ok(Self {
            transport,
            profile,
            command_delay: profile.command_delay,
            rate_descriptor: None,
        })
    }

    /// Override the profile's inter-command delay.
    pub fn with_command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    /// Model profile.
    pub fn profile(&self) -> &'static ModelProfile {
        self.profile
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Reading-rate descriptor captured at acquisition start.
    pub fn rate_descriptor(&self) -> Option<&str> {
        self.rate_descriptor.as_deref()
    }

    /// Selectable (quantity, flags) pairs.
    pub fn supported_modes(&self) -> Vec<(Quantity, MqFlags)> {
        self.profile.capabilities.supported_modes().collect()
    }

    // -------------------------------------------------------------------------
    // Transport helpers
    // -------------------------------------------------------------------------

    /// Sleep the command delay, then wait for the meter to finish the
    /// previous operation when the model answers `*OPC?`.
    async fn pace(&mut self) -> DmmResult<()> {
        if !self.command_delay.is_zero() {
            tokio::time::sleep(self.command_delay).await;
        }
        if self.profile.opc_sync {
            let response = self
                .transport
                .query_string(OPC_QUERY)
                .await
                .map_err(|e| DmmError::communication(OPC_QUERY, e))?;
            if response.trim() != "1" {
                debug!(response = %response.trim(), "Unexpected *OPC? response");
            }
        }
        Ok(())
    }

    pub(crate) async fn send(&mut self, command: &str) -> DmmResult<()> {
        self.pace().await?;
        self.transport
            .send(command)
            .await
            .map_err(|e| DmmError::communication(command, e))
    }

    pub(crate) async fn query_string(&mut self, command: &str) -> DmmResult<String> {
        self.pace().await?;
        self.transport
            .query_string(command)
            .await
            .map_err(|e| DmmError::communication(command, e))
    }

    pub(crate) async fn query_bool(&mut self, command: &str) -> DmmResult<bool> {
        self.pace().await?;
        self.transport
            .query_bool(command)
            .await
            .map_err(|e| DmmError::communication(command, e))
    }

    async fn settle(&mut self, capability: &Capability) {
        if capability.needs_settle_delay() && !self.profile.settle_delay.is_zero() {
            debug!(delay = ?self.profile.settle_delay, "Waiting for meter to settle");
            tokio::time::sleep(self.profile.settle_delay).await;
        }
    }

    // -------------------------------------------------------------------------
    // Mode
    // -------------------------------------------------------------------------

    /// Query the meter's active mode and keep the raw response.
    pub async fn query_mode(&mut self) -> DmmResult<ActiveMode> {
        let command = self.profile.commands.format(CommandId::QueryFunction, &[])?;
        let raw = self.query_string(&command).await?;
        let response = raw.trim();
        let response = response.strip_prefix('"').unwrap_or(response);

        if response.is_empty() {
            warn!("Empty measurement quantity response");
            return Err(DmmError::NotRecognized(String::new()));
        }

        match self.profile.capabilities.by_prefix(response) {
            Some(capability) => Ok(ActiveMode {
                capability,
                response: response.to_string(),
            }),
            None => {
                warn!(response, "Unknown measurement quantity");
                Err(DmmError::NotRecognized(response.to_string()))
            }
        }
    }

    /// Active (quantity, flags).
    pub async fn active_mode(&mut self) -> DmmResult<(Quantity, MqFlags)> {
        let mode = self.query_mode().await?;
        Ok((mode.capability.quantity, mode.capability.flags))
    }

    /// Select a measurement mode.
    pub async fn set_active_mode(&mut self, quantity: Quantity, flags: MqFlags) -> DmmResult<()> {
        let capability = self
            .profile
            .capabilities
            .by_number(quantity, flags)
            .ok_or(DmmError::UnsupportedMode { quantity, flags })?;
        let command = self
            .profile
            .commands
            .format(CommandId::SetupFunction, &[("mode", capability.setup_token)])?;
        self.send(&command).await?;
        self.settle(capability).await;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Range
    // -------------------------------------------------------------------------

    /// Active range, or `None` when the mode has no range control.
    pub async fn range(&mut self) -> DmmResult<Option<RangeText>> {
        let capability = self.query_mode().await?.capability;
        if !capability.has_range() || capability.setup_token.is_empty() {
            return Ok(None);
        }
        let args = [("mode", capability.setup_token)];

        let command = self.profile.commands.format(CommandId::QueryRangeAuto, &args)?;
        if self.query_bool(&command).await? {
            return Ok(Some(RangeText::Auto));
        }

        let command = self.profile.commands.format(CommandId::QueryRange, &args)?;
        let response = self.query_string(&command).await?;
        let text = match self.profile.range {
            RangeStyle::Generic => generic_range_text(&response)?,
            RangeStyle::VendorNormalized { .. } => normalize_range_text(&response),
        };
        check_text_len("range text", &text, MAX_RANGE_TEXT_LEN)?;
        Ok(Some(RangeText::Fixed(text)))
    }

    /// Set the range. `auto` (any case) enables autoranging.
    pub async fn set_range(&mut self, text: &str) -> DmmResult<()> {
        if text.is_empty() {
            return Err(DmmError::InvalidArgument("empty range text".to_string()));
        }
        let capability = self.query_mode().await?.capability;
        if capability.setup_token.is_empty() {
            return Err(DmmError::InvalidArgument(format!(
                "mode {:?} has no setup token",
                capability.quantity
            )));
        }
        if !capability.has_range() {
            return Err(DmmError::RangeNotSupported);
        }

        let payload = if text.eq_ignore_ascii_case("auto") {
            "AUTO".to_string()
        } else {
            match self.profile.range {
                RangeStyle::Generic => text.to_string(),
                RangeStyle::VendorNormalized { .. } => si_range_payload(text),
            }
        };
        check_text_len("range text", &payload, MAX_RANGE_TEXT_LEN)?;

        let command = self.profile.commands.format(
            CommandId::SetupRange,
            &[("mode", capability.setup_token), ("range", payload.as_str())],
        )?;
        self.send(&command).await?;
        self.settle(capability).await;
        Ok(())
    }

    /// Selectable ranges for the active mode. Empty when the model has no
    /// catalogue or the mode cannot be determined.
    pub async fn ranges(&mut self) -> Vec<&'static str> {
        if matches!(self.profile.range, RangeStyle::Generic) {
            return Vec::new();
        }
        let capability = match self.query_mode().await {
            Ok(mode) => mode.capability,
            Err(e) => {
                debug!(error = %e, "No range list without a known mode");
                return Vec::new();
            }
        };
        if !capability.has_range() {
            return Vec::new();
        }
        self.profile
            .catalogue_ranges(capability.quantity, capability.flags)
            .to_vec()
    }

    // -------------------------------------------------------------------------
    // Acquisition commands
    // -------------------------------------------------------------------------

    /// Send the model's start command and capture the reading-rate descriptor.
    pub async fn start_acquisition(&mut self) -> DmmResult<()> {
        if let Some(command) = self.profile.commands.template(CommandId::StartAcquisition) {
            self.send(command).await?;
        }

        self.rate_descriptor = None;
        if let Some(command) = self.profile.commands.template(CommandId::QueryPrecision) {
            match self.query_string(command).await {
                Ok(response) => {
                    let descriptor = response.trim().trim_matches('"').to_string();
                    debug!(descriptor = %descriptor, "Reading rate");
                    self.rate_descriptor = Some(descriptor);
                }
                Err(e) => warn!(error = %e, "Could not read the reading rate"),
            }
        }
        Ok(())
    }

    /// Send the model's stop command, if it has one.
    pub async fn stop_acquisition(&mut self) -> DmmResult<()> {
        match self.profile.commands.template(CommandId::StopAcquisition) {
            Some(command) => self.send(command).await,
            None => Ok(()),
        }
    }
}

/// `+1.00000E+01,+1.00000E-05` → `10`.
fn generic_range_text(response: &str) -> DmmResult<String> {
    let number = response.split(',').next().unwrap_or_default();
    let value = parse_decimal(number)?;
    Ok(format_decimal(value))
}

/// Replace `Ω` with `Ohm` and put one space between a leading number and an
/// adjacent unit: `500Ω` → `500 Ohm`, `500uF` → `500 uF`.
pub fn normalize_range_text(response: &str) -> String {
    let text = response.trim().replace('Ω', "Ohm");
    let number_len = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E')))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(number_len);
    if number.is_empty() || unit.is_empty() || unit.starts_with(char::is_whitespace) {
        return text;
    }
    debug!(number, unit, "Inserting range unit separator");
    format!("{number} {unit}")
}

/// `50 mV` → `0.05`. Anything that is not `<number> <prefix><unit>` with a
/// known SI prefix is passed through unchanged.
pub fn si_range_payload(text: &str) -> String {
    let Some((number, unit)) = text.split_once(' ') else {
        return text.to_string();
    };
    let Some(prefix) = unit.chars().next() else {
        return text.to_string();
    };
    let Some(exponent) = si_prefix_exponent(prefix) else {
        return text.to_string();
    };
    match parse_decimal(number) {
        Ok(value) => format_decimal(scale_by_power_of_ten(value, exponent)),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::models::{AGILENT_34405A, GWINSTEK_GDM8251A};
    use tracing_test::traced_test;

    #[test]
    fn ohm_symbol_is_spelled_out() {
        assert_eq!(normalize_range_text("500 Ω"), "500 Ohm");
        assert_eq!(normalize_range_text("5kΩ"), "5 kOhm");
    }

    #[test]
    fn unit_gets_one_separating_space() {
        assert_eq!(normalize_range_text("500uF"), "500 uF");
        assert_eq!(normalize_range_text("500 uF"), "500 uF");
        assert_eq!(normalize_range_text("KITS90"), "KITS90");
        assert_eq!(normalize_range_text("1000"), "1000");
    }

    #[test]
    fn si_payload_scales_known_prefixes() {
        assert_eq!(si_range_payload("50 mV"), "0.05");
        assert_eq!(si_range_payload("0.05"), "0.05");
        assert_eq!(si_range_payload("5 kOhm"), "5000");
        assert_eq!(si_range_payload("5 KOhm"), "5000");
        assert_eq!(si_range_payload("50 nF"), format_decimal(50e-9));
    }

    #[test]
    fn si_payload_passes_unknown_text_through() {
        assert_eq!(si_range_payload("5 V"), "5 V");
        assert_eq!(si_range_payload("Pt100"), "Pt100");
        assert_eq!(si_range_payload("abc mV"), "abc mV");
        assert_eq!(si_range_payload("5 "), "5 ");
    }

    #[test]
    fn generic_range_drops_precision_field() {
        assert_eq!(
            generic_range_text("+1.00000E+01,+1.00000E-05").unwrap(),
            "10"
        );
        assert_eq!(generic_range_text("+1.00000E-01").unwrap(), "0.1");
        assert!(generic_range_text("TEN").is_err());
    }

    #[test]
    fn range_text_display() {
        assert_eq!(RangeText::Auto.to_string(), "auto");
        assert_eq!(RangeText::Fixed("5 V".into()).to_string(), "5 V");
    }

    #[tokio::test]
    #[traced_test]
    async fn unknown_mode_is_logged() {
        let mut mock = MockTransport::new();
        mock.expect_query("CONF?", "\"XYZ 1,2\"");
        let mut dmm = ScpiDmm::new(mock, &AGILENT_34405A).unwrap();

        assert!(matches!(
            dmm.query_mode().await,
            Err(DmmError::NotRecognized(_))
        ));
        assert!(logs_contain("Unknown measurement quantity"));
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_rate_query_is_logged() {
        let mut mock = MockTransport::new();
        mock.expect_send("*CLS;SYST:REM")
            .fail_query("SENS:DET:RATE?", "timeout");
        let mut dmm = ScpiDmm::new(mock, &GWINSTEK_GDM8251A).unwrap();

        dmm.start_acquisition().await.unwrap();
        assert!(dmm.rate_descriptor().is_none());
        assert!(logs_contain("Could not read the reading rate"));
    }
}
