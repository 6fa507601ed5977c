//! Acquisition configuration.
//!
//! ```toml
//! model = "34465A"
//! vendor = "Keysight"      # optional
//! poll_interval = "100ms"  # default 10ms
//! limit_samples = 1000     # optional
//! limit_time = "30s"       # optional
//! command_delay = "5ms"    # optional, overrides the model's
//!
//! [[channels]]             # optional, default: one enabled channel per input
//! name = "P1"
//! enabled = true
//! ```

use crate::acquisition::{Acquisition, Channel, SwLimits};
use crate::controller::ScpiDmm;
use crate::error::{DmmError, DmmResult};
use crate::limits::DEFAULT_POLL_INTERVAL;
use crate::models::find_model;
use crate::profile::ModelProfile;
use crate::transport::ScpiTransport;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Model name, e.g. `34465A`
    pub model: String,
    /// Vendor name, to disambiguate model names
    #[serde(default)]
    pub vendor: Option<String>,
    /// Interval between ticks
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Stop after this many sweeps
    #[serde(default)]
    pub limit_samples: Option<u64>,
    /// Stop after this much time
    #[serde(default, with = "humantime_serde")]
    pub limit_time: Option<Duration>,
    /// Pause before every request, replacing the model's
    #[serde(default, with = "humantime_serde")]
    pub command_delay: Option<Duration>,
    /// Channel list; defaults to the model's inputs
    #[serde(default)]
    pub channels: Option<Vec<ChannelConfig>>,
}

/// One configured channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name
    pub name: String,
    /// Whether the channel is polled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_enabled() -> bool {
    true
}

impl AcquisitionConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> DmmResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> DmmResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DmmError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> DmmResult<()> {
        if self.model.trim().is_empty() {
            return Err(DmmError::Configuration("model must not be empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(DmmError::Configuration(
                "poll_interval must be greater than zero".into(),
            ));
        }
        if self.limit_samples == Some(0) {
            return Err(DmmError::Configuration(
                "limit_samples must be at least 1".into(),
            ));
        }
        if let Some(channels) = &self.channels {
            let mut names = std::collections::HashSet::new();
            for channel in channels {
                if channel.name.trim().is_empty() {
                    return Err(DmmError::Configuration(
                        "channel names must not be empty".into(),
                    ));
                }
                if !names.insert(channel.name.as_str()) {
                    return Err(DmmError::Configuration(format!(
                        "duplicate channel name: {}",
                        channel.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve the configured model.
    pub fn profile(&self) -> DmmResult<&'static ModelProfile> {
        find_model(self.vendor.as_deref(), &self.model)
    }

    /// Software limits for each run.
    pub fn limits(&self) -> SwLimits {
        SwLimits::new(self.limit_samples, self.limit_time)
    }

    /// Channels for `profile`, numbered in configuration order.
    pub fn channels_for(&self, profile: &ModelProfile) -> DmmResult<Vec<Channel>> {
        match &self.channels {
            None => Ok(Channel::defaults(profile.channels)),
            Some(configured) => {
                if configured.len() > profile.channels {
                    return Err(DmmError::Configuration(format!(
                        "{} has {} channel(s), {} configured",
                        profile.display_name(),
                        profile.channels,
                        configured.len()
                    )));
                }
                Ok(configured
                    .iter()
                    .enumerate()
                    .map(|(index, c)| Channel::new(index, c.name.clone()).enabled(c.enabled))
                    .collect())
            }
        }
    }

    /// Build a ready-to-run acquisition over `transport`.
    pub fn build<T: ScpiTransport>(&self, transport: T) -> DmmResult<Acquisition<T>> {
        let profile = self.profile()?;
        let mut dmm = ScpiDmm::new(transport, profile)?;
        if let Some(delay) = self.command_delay {
            dmm = dmm.with_command_delay(delay);
        }
        let channels = self.channels_for(profile)?;
        Ok(Acquisition::new(dmm, channels, self.poll_interval).with_limits(self.limits()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = AcquisitionConfig::from_toml_str(r#"model = "34405A""#).unwrap();
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(config.limit_samples.is_none());
        let profile = config.profile().unwrap();
        assert_eq!(profile.vendor, "Agilent");
        let channels = config.channels_for(profile).unwrap();
        assert_eq!(channels, vec![Channel::new(0, "P1")]);
    }

    #[test]
    fn humantime_durations_parse() {
        let config = AcquisitionConfig::from_toml_str(
            r#"
            model = "XDM1041"
            vendor = "Owon"
            poll_interval = "250ms"
            limit_time = "2s"
            command_delay = "5ms"
            limit_samples = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.limit_time, Some(Duration::from_secs(2)));
        assert_eq!(config.command_delay, Some(Duration::from_millis(5)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            AcquisitionConfig::from_toml_str("model = \"34405A\"\npoll_interval = \"0s\""),
            Err(DmmError::Configuration(_))
        ));
        assert!(matches!(
            AcquisitionConfig::from_toml_str("model = \"34405A\"\nlimit_samples = 0"),
            Err(DmmError::Configuration(_))
        ));
        assert!(matches!(
            AcquisitionConfig::from_toml_str("poll_interval = \"1s\""),
            Err(DmmError::ConfigParse(_))
        ));
    }

    #[test]
    fn unknown_model_fails_on_build() {
        let config = AcquisitionConfig::from_toml_str(r#"model = "HP3478A""#).unwrap();
        assert!(matches!(
            config.build(MockTransport::new()),
            Err(DmmError::UnknownModel(_))
        ));
    }

    #[test]
    fn too_many_channels_are_rejected() {
        let config = AcquisitionConfig::from_toml_str(
            r#"
            model = "34405A"
            [[channels]]
            name = "P1"
            [[channels]]
            name = "P2"
            enabled = false
            "#,
        )
        .unwrap();
        let profile = config.profile().unwrap();
        assert!(config.channels_for(profile).is_err());
    }
}
