//! SCPI bench digital multimeter driver for rust-daq.
//!
//! This crate talks to bench DMMs over a line-oriented SCPI transport:
//! - Agilent 34405A, Keysight 34465A
//! - GW-Instek GDM8251A, GDM8255A, GDM9061
//! - Owon XDM1041
//!
//! Per-vendor command vocabularies live in static [`ModelProfile`]s. On top of
//! them [`ScpiDmm`] gets and sets measurement modes and ranges and parses
//! readings, and [`Acquisition`] polls the meter on a timer and broadcasts
//! [`Sample`]s.
//!
//! # Usage
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! daq-driver-scpi-dmm = { path = "../daq-driver-scpi-dmm" }
//! ```
//!
//! Drive a meter through any [`ScpiTransport`]:
//!
//! ```rust,ignore
//! use daq_driver_scpi_dmm::{models, ScpiDmm, Quantity, MqFlags};
//!
//! let mut dmm = ScpiDmm::new(transport, &models::KEYSIGHT_34465A)?;
//! dmm.set_active_mode(Quantity::Voltage, MqFlags::DC).await?;
//! dmm.set_range("10").await?;
//! let reading = dmm.measure(0).await?;
//! ```

pub mod acquisition;
pub mod capability;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod limits;
pub mod measurement;
pub mod mock;
pub mod models;
pub mod numeric;
pub mod profile;
pub mod quantity;
pub mod transport;

pub use acquisition::{Acquisition, Channel, RunState, RunSummary, Sample, StopHandle, StopReason, SwLimits};
pub use capability::{BehaviorFlags, Capability, CapabilityTable};
pub use command::{CommandId, CommandSet};
pub use config::AcquisitionConfig;
pub use controller::{RangeText, ScpiDmm};
pub use error::{DmmError, DmmResult, ErrorClass};
pub use measurement::{Reading, SampleValue};
pub use profile::{MeasurementStyle, ModelProfile, RangeStyle};
pub use quantity::{MqFlags, Quantity, Unit};
pub use transport::ScpiTransport;
