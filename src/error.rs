//! Error types for the DMM driver.
//!
//! `DmmError` is the single error type returned by every fallible operation in
//! this crate. Using `thiserror`, it keeps vendor, protocol and configuration
//! failures distinct so the acquisition loop can decide what to do with each.
//!
//! ## Error classes
//!
//! Every variant belongs to one [`ErrorClass`]:
//!
//! - **Capability**: the model cannot do what was asked (`NotSupportedCommand`,
//!   `UnsupportedMode`, `RangeNotSupported`, `UnsupportedQuantity`). Never retried.
//! - **Communication**: the transport failed. Fatal to the acquisition run.
//! - **DataFormat**: the device answered with text that does not parse. Fatal to
//!   the acquisition run.
//! - **Skip**: the active mode could not be recognized (`NotRecognized`). Inside the
//!   measurement parsers this withholds one channel's sample for one tick.
//!
//! Argument, table and configuration problems are reported as
//! [`ErrorClass::Usage`].

use crate::command::CommandId;
use crate::quantity::{MqFlags, Quantity};
use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type DmmResult<T> = std::result::Result<T, DmmError>;

/// Errors produced by the DMM driver.
#[derive(Error, Debug)]
pub enum DmmError {
    /// The model's command set has no template for this command.
    #[error("Command {0} is not supported by this model")]
    NotSupportedCommand(CommandId),

    /// A transport exchange failed.
    #[error("Communication failure during '{command}': {source}")]
    Communication {
        /// Command text that was being sent
        command: String,
        /// Underlying transport error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Device response could not be parsed.
    #[error("Malformed device response: {0}")]
    DataFormat(String),

    /// The mode response matched no capability in the model's table.
    #[error("Unknown measurement quantity: {0:?}")]
    NotRecognized(String),

    /// No selectable capability exists for the requested quantity/flags.
    #[error("Measurement mode {quantity:?} ({flags:?}) is not supported by this model")]
    UnsupportedMode {
        /// Requested quantity
        quantity: Quantity,
        /// Requested flags
        flags: MqFlags,
    },

    /// The active mode has no range control.
    #[error("Range control is not available in the active mode")]
    RangeNotSupported,

    /// The quantity has no unit mapping.
    #[error("No unit mapping for quantity {0:?}")]
    UnsupportedQuantity(Quantity),

    /// Caller supplied an argument the driver cannot use.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Formatted text would exceed its maximum length.
    #[error("Formatted {context} is {len} bytes, maximum is {max}")]
    TextTooLong {
        /// What was being formatted
        context: &'static str,
        /// Length that was produced
        len: usize,
        /// Allowed maximum
        max: usize,
    },

    /// A model's static tables violate an invariant.
    #[error("Model table error: {0}")]
    ModelTable(String),

    /// No built-in profile matches the requested model.
    #[error("Unknown DMM model: {0}")]
    UnknownModel(String),

    /// Semantic configuration error.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Configuration file could not be parsed.
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Coarse classification used by the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The model lacks the requested capability.
    Capability,
    /// Transport failure.
    Communication,
    /// Unparseable device response.
    DataFormat,
    /// Soft skip of one channel for one tick.
    Skip,
    /// Bad argument, table or configuration.
    Usage,
}

impl DmmError {
    /// Wrap a transport error together with the command that triggered it.
    pub fn communication(command: &str, source: anyhow::Error) -> Self {
        DmmError::Communication {
            command: command.to_string(),
            source: source.into(),
        }
    }

    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            DmmError::NotSupportedCommand(_)
            | DmmError::UnsupportedMode { .. }
            | DmmError::RangeNotSupported
            | DmmError::UnsupportedQuantity(_) => ErrorClass::Capability,
            DmmError::Communication { .. } => ErrorClass::Communication,
            DmmError::DataFormat(_) => ErrorClass::DataFormat,
            DmmError::NotRecognized(_) => ErrorClass::Skip,
            DmmError::InvalidArgument(_)
            | DmmError::TextTooLong { .. }
            | DmmError::ModelTable(_)
            | DmmError::UnknownModel(_)
            | DmmError::Configuration(_)
            | DmmError::ConfigParse(_) => ErrorClass::Usage,
        }
    }
}
