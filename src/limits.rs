//! Shared limits and device constants.
//!
//! This module centralizes:
//! - Maximum lengths for text the driver formats
//! - Overload thresholds and vendor ceilings
//! - Default timing

use crate::error::{DmmError, DmmResult};
use std::time::Duration;

// =============================================================================
// Size Limits
// =============================================================================

/// Maximum length of a formatted command line in bytes.
pub const MAX_COMMAND_LEN: usize = 256;

/// Maximum length of formatted range text in bytes.
pub const MAX_RANGE_TEXT_LEN: usize = 64;

/// Fail when `text` is longer than `max` bytes.
pub fn check_text_len(context: &'static str, text: &str, max: usize) -> DmmResult<()> {
    if text.len() > max {
        return Err(DmmError::TextTooLong {
            context,
            len: text.len(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Overload Detection
// =============================================================================

/// Magnitude above which a reading is the device's overload sentinel.
///
/// SCPI meters report overload as `9.9E+37`.
pub const DEFAULT_OVERLOAD_LIMIT: f64 = 9e37;

/// Resistance ceiling for mode-code meters; readings at or above it are open circuit.
pub const RESISTANCE_CEILING: f64 = 1.2e8;

/// Continuity ceiling for mode-code meters.
pub const CONTINUITY_CEILING: f64 = 1.2e3;

/// Diode-test reading that signals an open junction.
pub const DIODE_OPEN_READING: f64 = 1.0;

// =============================================================================
// Timing
// =============================================================================

/// Default interval between acquisition ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Capacity of the sample broadcast channel.
pub const SAMPLE_CHANNEL_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_at_limit_is_accepted() {
        assert!(check_text_len("range", "12345", 5).is_ok());
        let err = check_text_len("range", "123456", 5).unwrap_err();
        assert!(matches!(
            err,
            DmmError::TextTooLong {
                len: 6,
                max: 5,
                ..
            }
        ));
    }
}
