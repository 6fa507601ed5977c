//! Per-model capability tables.
//!
//! A capability maps one (quantity, flags) pair to the vendor tokens used to
//! select it (`CONF:VOLT:DC`) and to recognize it in a mode query response
//! (`VOLT `). Tables are static and ordered; lookups by prefix scan in table
//! order and the first match wins.

use crate::error::{DmmError, DmmResult};
use crate::quantity::{MqFlags, Quantity};
use bitflags::bitflags;

bitflags! {
    /// Per-capability behavior switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BehaviorFlags: u8 {
        /// The mode has no range control.
        const NO_RANGE = 1 << 0;
        /// Sleep the model's settle delay after selecting this mode or its range.
        const SETTLE_DELAY = 1 << 1;
        /// Reported by the meter but cannot be selected remotely.
        const QUERY_ONLY = 1 << 2;
    }
}

/// One measurement mode a model supports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capability {
    /// Measured quantity
    pub quantity: Quantity,
    /// Qualifier flags
    pub flags: MqFlags,
    /// Token interpolated into setup commands
    pub setup_token: &'static str,
    /// Prefix of the mode query response identifying this mode
    pub query_prefix: &'static str,
    /// Behavior switches
    pub behavior: BehaviorFlags,
    /// Precision exponent used when the mode response carries none
    pub default_precision: Option<i32>,
}

impl Capability {
    /// Selectable capability with no special behavior.
    pub const fn new(
        quantity: Quantity,
        flags: MqFlags,
        setup_token: &'static str,
        query_prefix: &'static str,
    ) -> Self {
        Self {
            quantity,
            flags,
            setup_token,
            query_prefix,
            behavior: BehaviorFlags::empty(),
            default_precision: None,
        }
    }

    /// Replace the behavior flags.
    pub const fn with_behavior(mut self, behavior: BehaviorFlags) -> Self {
        self.behavior = behavior;
        self
    }

    /// Set the default precision exponent.
    pub const fn with_default_precision(mut self, exponent: i32) -> Self {
        self.default_precision = Some(exponent);
        self
    }

    /// Whether range control is available.
    pub fn has_range(&self) -> bool {
        !self.behavior.contains(BehaviorFlags::NO_RANGE)
    }

    /// Whether the settle delay applies after setup commands.
    pub fn needs_settle_delay(&self) -> bool {
        self.behavior.contains(BehaviorFlags::SETTLE_DELAY)
    }

    /// Whether the mode can be selected remotely.
    pub fn is_selectable(&self) -> bool {
        !self.behavior.contains(BehaviorFlags::QUERY_ONLY)
    }
}

/// Ordered, immutable list of a model's capabilities.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityTable {
    entries: &'static [Capability],
}

impl CapabilityTable {
    /// Wrap a static table.
    pub const fn new(entries: &'static [Capability]) -> Self {
        Self { entries }
    }

    /// All entries in table order.
    pub fn entries(&self) -> &'static [Capability] {
        self.entries
    }

    /// Selectable capability for an exact (quantity, flags) pair.
    pub fn by_number(&self, quantity: Quantity, flags: MqFlags) -> Option<&'static Capability> {
        self.entries
            .iter()
            .find(|c| c.is_selectable() && c.quantity == quantity && c.flags == flags)
    }

    /// First capability whose non-empty query prefix starts `response`.
    pub fn by_prefix(&self, response: &str) -> Option<&'static Capability> {
        self.entries
            .iter()
            .find(|c| !c.query_prefix.is_empty() && response.starts_with(c.query_prefix))
    }

    /// Selectable (quantity, flags) pairs in table order.
    pub fn supported_modes(&self) -> impl Iterator<Item = (Quantity, MqFlags)> + '_ {
        self.entries
            .iter()
            .filter(|c| c.is_selectable())
            .map(|c| (c.quantity, c.flags))
    }

    /// Check that selectable pairs are unique and no prefix is shadowed by an
    /// earlier, shorter one.
    pub fn validate(&self) -> DmmResult<()> {
        for (i, later) in self.entries.iter().enumerate() {
            for earlier in &self.entries[..i] {
                if later.is_selectable()
                    && earlier.is_selectable()
                    && later.quantity == earlier.quantity
                    && later.flags == earlier.flags
                {
                    return Err(DmmError::ModelTable(format!(
                        "duplicate capability {:?} ({:?})",
                        later.quantity, later.flags
                    )));
                }
                if !earlier.query_prefix.is_empty()
                    && later.query_prefix.starts_with(earlier.query_prefix)
                {
                    return Err(DmmError::ModelTable(format!(
                        "query prefix {:?} is shadowed by earlier {:?}",
                        later.query_prefix, earlier.query_prefix
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TABLE: &[Capability] = &[
        Capability::new(Quantity::Voltage, MqFlags::AC, "VOLT:AC", "VOLT AC"),
        Capability::new(Quantity::Voltage, MqFlags::DC, "VOLT:DC", "VOLT"),
        Capability::new(Quantity::Continuity, MqFlags::empty(), "CONT", "CONT")
            .with_behavior(BehaviorFlags::NO_RANGE)
            .with_default_precision(-1),
        Capability::new(Quantity::Temperature, MqFlags::empty(), "", "TEMPF")
            .with_behavior(BehaviorFlags::QUERY_ONLY),
        Capability::new(Quantity::Temperature, MqFlags::empty(), "TEMP", "TEMP"),
    ];

    #[test]
    fn prefix_lookup_uses_table_order() {
        let table = CapabilityTable::new(TABLE);
        assert_eq!(table.by_prefix("VOLT AC").unwrap().flags, MqFlags::AC);
        assert_eq!(table.by_prefix("VOLT").unwrap().flags, MqFlags::DC);
        assert!(table.by_prefix("CURR").is_none());
    }

    #[test]
    fn query_only_entries_are_recognized_but_not_selectable() {
        let table = CapabilityTable::new(TABLE);
        let fahrenheit = table.by_prefix("TEMPF").unwrap();
        assert!(!fahrenheit.is_selectable());
        let selected = table
            .by_number(Quantity::Temperature, MqFlags::empty())
            .unwrap();
        assert_eq!(selected.setup_token, "TEMP");
        assert_eq!(table.supported_modes().count(), 4);
    }

    #[test]
    fn validate_accepts_well_formed_table() {
        assert!(CapabilityTable::new(TABLE).validate().is_ok());
    }

    #[test]
    fn validate_rejects_shadowed_prefix() {
        static SHADOWED: &[Capability] = &[
            Capability::new(Quantity::Voltage, MqFlags::DC, "VOLT:DC", "VOLT"),
            Capability::new(Quantity::Voltage, MqFlags::AC, "VOLT:AC", "VOLT AC"),
        ];
        let err = CapabilityTable::new(SHADOWED).validate().unwrap_err();
        assert!(matches!(err, DmmError::ModelTable(_)));
    }

    #[test]
    fn validate_rejects_duplicate_pair() {
        static DUPLICATE: &[Capability] = &[
            Capability::new(Quantity::Current, MqFlags::DC, "CURR:DC", "CURR "),
            Capability::new(Quantity::Current, MqFlags::DC, "CURR:DC", "MA "),
        ];
        assert!(CapabilityTable::new(DUPLICATE).validate().is_err());
    }
}
