//! Built-in model profiles.
//!
//! | Vendor     | Model    | Measurement         | Range            |
//! |------------|----------|---------------------|------------------|
//! | Agilent    | 34405A   | precision in `CONF?`| generic          |
//! | Keysight   | 34465A   | precision in `CONF?`| generic          |
//! | GW-Instek  | GDM8251A | mode code           | none             |
//! | GW-Instek  | GDM8255A | mode code           | none             |
//! | GW-Instek  | GDM9061  | precision in `CONF?`| generic          |
//! | Owon       | XDM1041  | precision in `FUNC?`| vendor catalogue |

use crate::capability::{BehaviorFlags, Capability, CapabilityTable};
use crate::command::{CommandId, CommandSet};
use crate::error::{DmmError, DmmResult};
use crate::profile::{MeasurementStyle, ModelProfile, RangeCatalogueEntry, RangeStyle};
use crate::quantity::{MqFlags, Quantity};
use std::time::Duration;

const NO_RANGE: BehaviorFlags = BehaviorFlags::NO_RANGE;
const SETTLE: BehaviorFlags = BehaviorFlags::SETTLE_DELAY;
const QUERY_ONLY: BehaviorFlags = BehaviorFlags::QUERY_ONLY;
const NONE: MqFlags = MqFlags::empty();
const DIODE: MqFlags = MqFlags::DC.union(MqFlags::DIODE);
const AC_DC: MqFlags = MqFlags::AC.union(MqFlags::DC);

// =============================================================================
// Agilent / Keysight
// =============================================================================

const AGILENT_COMMANDS: CommandSet = CommandSet::new(&[
    (CommandId::StartAcquisition, "SYST:REM"),
    (CommandId::StopAcquisition, "SYST:LOC"),
    (CommandId::SetupFunction, "CONF:${mode}"),
    (CommandId::QueryFunction, "CONF?"),
    (CommandId::QueryValue, "READ?"),
    (CommandId::SetupRange, "${mode}:RANGE ${range}"),
    (CommandId::QueryRangeAuto, "${mode}:RANGE:AUTO?"),
    (CommandId::QueryRange, "${mode}:RANGE?"),
]);

const AGILENT_34405A_MODES: &[Capability] = &[
    Capability::new(Quantity::Voltage, MqFlags::DC, "VOLT:DC", "VOLT "),
    Capability::new(Quantity::Voltage, MqFlags::AC, "VOLT:AC", "VOLT:AC "),
    Capability::new(Quantity::Current, MqFlags::DC, "CURR:DC", "CURR "),
    Capability::new(Quantity::Current, MqFlags::AC, "CURR:AC", "CURR:AC "),
    Capability::new(Quantity::Resistance, NONE, "RES", "RES "),
    Capability::new(Quantity::Continuity, NONE, "CONT", "CONT")
        .with_behavior(NO_RANGE)
        .with_default_precision(-1),
    Capability::new(Quantity::Capacitance, NONE, "CAP", "CAP "),
    Capability::new(Quantity::Voltage, DIODE, "DIOD", "DIOD")
        .with_behavior(NO_RANGE)
        .with_default_precision(-4),
    Capability::new(Quantity::Temperature, NONE, "TEMP", "TEMP ").with_behavior(NO_RANGE),
    Capability::new(Quantity::Frequency, NONE, "FREQ", "FREQ "),
];

const KEYSIGHT_34465A_MODES: &[Capability] = &[
    Capability::new(Quantity::Voltage, MqFlags::DC, "VOLT:DC", "VOLT "),
    Capability::new(Quantity::Voltage, MqFlags::AC, "VOLT:AC", "VOLT:AC "),
    Capability::new(Quantity::Current, MqFlags::DC, "CURR:DC", "CURR "),
    Capability::new(Quantity::Current, MqFlags::AC, "CURR:AC", "CURR:AC "),
    Capability::new(Quantity::Resistance, NONE, "RES", "RES "),
    Capability::new(Quantity::Resistance, MqFlags::FOUR_WIRE, "FRES", "FRES "),
    Capability::new(Quantity::Continuity, NONE, "CONT", "CONT")
        .with_behavior(NO_RANGE)
        .with_default_precision(-1),
    Capability::new(Quantity::Capacitance, NONE, "CAP", "CAP "),
    Capability::new(Quantity::Voltage, DIODE, "DIOD", "DIOD")
        .with_behavior(NO_RANGE)
        .with_default_precision(-4),
    Capability::new(Quantity::Temperature, NONE, "TEMP", "TEMP ").with_behavior(NO_RANGE),
    Capability::new(Quantity::Frequency, NONE, "FREQ", "FREQ "),
    Capability::new(Quantity::Time, NONE, "PER", "PER "),
];

/// Agilent 34405A, 5½ digits.
pub static AGILENT_34405A: ModelProfile = ModelProfile {
    vendor: "Agilent",
    model: "34405A",
    digits: 5,
    channels: 1,
    capabilities: CapabilityTable::new(AGILENT_34405A_MODES),
    commands: AGILENT_COMMANDS,
    settle_delay: Duration::ZERO,
    command_delay: Duration::ZERO,
    opc_sync: true,
    overload_limit: None,
    resistance_ceiling: None,
    measurement: MeasurementStyle::PrecisionInResponse,
    range: RangeStyle::Generic,
};

/// Keysight 34465A, 6½ digits.
pub static KEYSIGHT_34465A: ModelProfile = ModelProfile {
    vendor: "Keysight",
    model: "34465A",
    digits: 6,
    channels: 1,
    capabilities: CapabilityTable::new(KEYSIGHT_34465A_MODES),
    commands: AGILENT_COMMANDS,
    settle_delay: Duration::ZERO,
    command_delay: Duration::ZERO,
    opc_sync: true,
    overload_limit: None,
    resistance_ceiling: None,
    measurement: MeasurementStyle::PrecisionInResponse,
    range: RangeStyle::Generic,
};

// =============================================================================
// GW-Instek
// =============================================================================

const GWINSTEK_8200_COMMANDS: CommandSet = CommandSet::new(&[
    (CommandId::StartAcquisition, "*CLS;SYST:REM"),
    (CommandId::StopAcquisition, "SYST:LOC"),
    (CommandId::SetupFunction, "CONF:${mode}"),
    (CommandId::QueryFunction, "CONF:STAT:FUNC?"),
    (CommandId::QueryValue, "VAL1?"),
    (CommandId::QueryPrecision, "SENS:DET:RATE?"),
]);

/// Mode codes are the `CONF:STAT:FUNC?` answers. Codes 05/06/12 are the
/// milliampere inputs and 15 is Fahrenheit; the meter reports them but they
/// share their mode with a remotely selectable entry.
const GWINSTEK_8200_MODES: &[Capability] = &[
    Capability::new(Quantity::Voltage, MqFlags::DC, "VOLT:DC", "01"),
    Capability::new(Quantity::Voltage, MqFlags::AC, "VOLT:AC", "02"),
    Capability::new(Quantity::Current, MqFlags::DC, "CURR:DC", "03"),
    Capability::new(Quantity::Current, MqFlags::AC, "CURR:AC", "04"),
    Capability::new(Quantity::Current, MqFlags::DC, "CURR:DC", "05").with_behavior(QUERY_ONLY),
    Capability::new(Quantity::Current, MqFlags::AC, "CURR:AC", "06").with_behavior(QUERY_ONLY),
    Capability::new(Quantity::Resistance, NONE, "RES", "07"),
    Capability::new(Quantity::Frequency, NONE, "FREQ", "08").with_behavior(NO_RANGE),
    Capability::new(Quantity::Temperature, NONE, "TEMP:TCO", "09"),
    Capability::new(Quantity::Voltage, AC_DC, "VOLT:DCAC", "10"),
    Capability::new(Quantity::Current, AC_DC, "CURR:DCAC", "11"),
    Capability::new(Quantity::Current, AC_DC, "CURR:DCAC", "12").with_behavior(QUERY_ONLY),
    Capability::new(Quantity::Continuity, NONE, "CONT", "13").with_behavior(NO_RANGE),
    Capability::new(Quantity::Time, NONE, "PER", "14").with_behavior(NO_RANGE),
    Capability::new(Quantity::Temperature, NONE, "TEMP:TCO", "15")
        .with_behavior(QUERY_ONLY.union(NO_RANGE)),
    Capability::new(Quantity::Resistance, MqFlags::FOUR_WIRE, "FRES", "16"),
    Capability::new(Quantity::Voltage, DIODE, "DIOD", "17").with_behavior(NO_RANGE),
    Capability::new(Quantity::Capacitance, NONE, "CAP", "18"),
];

/// GW-Instek GDM-8251A, 5½ digits.
pub static GWINSTEK_GDM8251A: ModelProfile = ModelProfile {
    vendor: "GW-Instek",
    model: "GDM8251A",
    digits: 6,
    channels: 1,
    capabilities: CapabilityTable::new(GWINSTEK_8200_MODES),
    commands: GWINSTEK_8200_COMMANDS,
    settle_delay: Duration::ZERO,
    command_delay: Duration::ZERO,
    opc_sync: true,
    overload_limit: Some(1e9),
    resistance_ceiling: None,
    measurement: MeasurementStyle::ModeCodeTable,
    range: RangeStyle::Generic,
};

/// GW-Instek GDM-8255A. Reads open-circuit resistance as `1.99999E8`.
pub static GWINSTEK_GDM8255A: ModelProfile = ModelProfile {
    vendor: "GW-Instek",
    model: "GDM8255A",
    digits: 6,
    channels: 1,
    capabilities: CapabilityTable::new(GWINSTEK_8200_MODES),
    commands: GWINSTEK_8200_COMMANDS,
    settle_delay: Duration::ZERO,
    command_delay: Duration::ZERO,
    opc_sync: true,
    overload_limit: Some(1e9),
    resistance_ceiling: Some(1.99999e8),
    measurement: MeasurementStyle::ModeCodeTable,
    range: RangeStyle::Generic,
};

const GWINSTEK_906X_COMMANDS: CommandSet = CommandSet::new(&[
    (CommandId::StartAcquisition, "INIT"),
    (CommandId::StopAcquisition, "ABORT"),
    (CommandId::SetupFunction, "CONF:${mode}"),
    (CommandId::QueryFunction, "CONF?"),
    (CommandId::QueryValue, "MEAS?"),
    (CommandId::QueryPrecision, "SENS:DET:RATE?"),
    (CommandId::SetupRange, "${mode}:RANGE ${range}"),
    (CommandId::QueryRangeAuto, "${mode}:RANGE:AUTO?"),
    (CommandId::QueryRange, "${mode}:RANGE?"),
]);

/// Every function change on the 906x needs time before the next query.
const GWINSTEK_906X_MODES: &[Capability] = &[
    Capability::new(Quantity::Voltage, MqFlags::DC, "VOLT:DC", "VOLT ").with_behavior(SETTLE),
    Capability::new(Quantity::Voltage, MqFlags::AC, "VOLT:AC", "VOLT:AC ").with_behavior(SETTLE),
    Capability::new(Quantity::Current, MqFlags::DC, "CURR:DC", "CURR ").with_behavior(SETTLE),
    Capability::new(Quantity::Current, MqFlags::AC, "CURR:AC", "CURR:AC ").with_behavior(SETTLE),
    Capability::new(Quantity::Resistance, NONE, "RES", "RES ").with_behavior(SETTLE),
    Capability::new(Quantity::Resistance, MqFlags::FOUR_WIRE, "FRES", "FRES ")
        .with_behavior(SETTLE),
    Capability::new(Quantity::Continuity, NONE, "CONT", "CONT")
        .with_behavior(NO_RANGE.union(SETTLE))
        .with_default_precision(-1),
    Capability::new(Quantity::Capacitance, NONE, "CAP", "CAP ").with_behavior(SETTLE),
    Capability::new(Quantity::Voltage, DIODE, "DIOD", "DIOD")
        .with_behavior(NO_RANGE.union(SETTLE))
        .with_default_precision(-4),
    Capability::new(Quantity::Temperature, NONE, "TEMP", "TEMP ")
        .with_behavior(NO_RANGE.union(SETTLE)),
    Capability::new(Quantity::Frequency, NONE, "FREQ", "FREQ ").with_behavior(SETTLE),
    Capability::new(Quantity::Time, NONE, "PER", "PER ").with_behavior(SETTLE),
];

/// GW-Instek GDM-9061, 6½ digits.
pub static GWINSTEK_GDM9061: ModelProfile = ModelProfile {
    vendor: "GW-Instek",
    model: "GDM9061",
    digits: 6,
    channels: 1,
    capabilities: CapabilityTable::new(GWINSTEK_906X_MODES),
    commands: GWINSTEK_906X_COMMANDS,
    settle_delay: Duration::from_millis(2500),
    command_delay: Duration::ZERO,
    opc_sync: true,
    overload_limit: None,
    resistance_ceiling: None,
    measurement: MeasurementStyle::PrecisionInResponse,
    range: RangeStyle::Generic,
};

// =============================================================================
// Owon
// =============================================================================

const OWON_COMMANDS: CommandSet = CommandSet::new(&[
    (CommandId::StartAcquisition, "*CLS;SYST:REM"),
    (CommandId::StopAcquisition, "SYST:LOC"),
    (CommandId::SetupFunction, "CONF:${mode}"),
    (CommandId::QueryFunction, "FUNC?"),
    (CommandId::QueryValue, "MEAS1?"),
    (CommandId::SetupRange, "CONF:${mode} ${range}"),
    (CommandId::QueryRangeAuto, "AUTO?"),
    (CommandId::QueryRange, "RANGE?"),
]);

/// `FUNC?` answers `"VOLT AC"` for AC and `"VOLT"` for DC, so the AC entries
/// must come first.
const OWON_XDM_MODES: &[Capability] = &[
    Capability::new(Quantity::Voltage, MqFlags::AC, "VOLT:AC", "VOLT AC"),
    Capability::new(Quantity::Voltage, MqFlags::DC, "VOLT:DC", "VOLT"),
    Capability::new(Quantity::Current, MqFlags::AC, "CURR:AC", "CURR AC"),
    Capability::new(Quantity::Current, MqFlags::DC, "CURR:DC", "CURR"),
    Capability::new(Quantity::Resistance, NONE, "RES", "RES"),
    Capability::new(Quantity::Resistance, MqFlags::FOUR_WIRE, "FRES", "FRES"),
    Capability::new(Quantity::Continuity, NONE, "CONT", "CONT")
        .with_behavior(NO_RANGE)
        .with_default_precision(-1),
    Capability::new(Quantity::Capacitance, NONE, "CAP", "CAP"),
    Capability::new(Quantity::Voltage, DIODE, "DIOD", "DIOD")
        .with_behavior(NO_RANGE)
        .with_default_precision(-4),
    Capability::new(Quantity::Temperature, NONE, "TEMP", "TEMP"),
    Capability::new(Quantity::Frequency, NONE, "FREQ", "FREQ").with_behavior(NO_RANGE),
    Capability::new(Quantity::Time, NONE, "PER", "PER").with_behavior(NO_RANGE),
];

const OWON_RANGES: &[RangeCatalogueEntry] = &[
    RangeCatalogueEntry {
        quantity: Quantity::Voltage,
        flags: MqFlags::DC,
        ranges: &["auto", "50 mV", "500 mV", "5 V", "50 V", "500 V", "1000 V"],
    },
    RangeCatalogueEntry {
        quantity: Quantity::Voltage,
        flags: MqFlags::AC,
        ranges: &["auto", "500 mV", "5 V", "50 V", "500 V", "750 V"],
    },
    RangeCatalogueEntry {
        quantity: Quantity::Current,
        flags: MqFlags::DC,
        ranges: &["auto", "500 uA", "5 mA", "50 mA", "500 mA", "5 A", "10 A"],
    },
    RangeCatalogueEntry {
        quantity: Quantity::Current,
        flags: MqFlags::AC,
        ranges: &["auto", "500 uA", "5 mA", "50 mA", "500 mA", "5 A", "10 A"],
    },
    RangeCatalogueEntry {
        quantity: Quantity::Resistance,
        flags: NONE,
        ranges: &[
            "auto", "500 Ohm", "5 kOhm", "50 kOhm", "500 kOhm", "5 MOhm", "50 MOhm",
        ],
    },
    RangeCatalogueEntry {
        quantity: Quantity::Capacitance,
        flags: NONE,
        ranges: &[
            "auto", "50 nF", "500 nF", "5 uF", "50 uF", "500 uF", "5 mF", "50 mF",
        ],
    },
    RangeCatalogueEntry {
        quantity: Quantity::Temperature,
        flags: NONE,
        ranges: &["KITS90", "Pt100"],
    },
];

/// Owon XDM1041 bench meter.
pub static OWON_XDM1041: ModelProfile = ModelProfile {
    vendor: "Owon",
    model: "XDM1041",
    digits: 5,
    channels: 1,
    capabilities: CapabilityTable::new(OWON_XDM_MODES),
    commands: OWON_COMMANDS,
    settle_delay: Duration::ZERO,
    command_delay: Duration::ZERO,
    opc_sync: true,
    overload_limit: None,
    resistance_ceiling: None,
    measurement: MeasurementStyle::PrecisionInResponse,
    range: RangeStyle::VendorNormalized {
        catalogue: OWON_RANGES,
    },
};

// =============================================================================
// Registry
// =============================================================================

/// Every built-in profile.
pub static ALL_MODELS: &[&ModelProfile] = &[
    &AGILENT_34405A,
    &KEYSIGHT_34465A,
    &GWINSTEK_GDM8251A,
    &GWINSTEK_GDM8255A,
    &GWINSTEK_GDM9061,
    &OWON_XDM1041,
];

/// Find a built-in profile by model name, optionally constrained by vendor.
///
/// Matching ignores ASCII case.
pub fn find_model(vendor: Option<&str>, model: &str) -> DmmResult<&'static ModelProfile> {
    ALL_MODELS
        .iter()
        .copied()
        .find(|profile| {
            profile.model.eq_ignore_ascii_case(model)
                && vendor.map_or(true, |v| profile.vendor.eq_ignore_ascii_case(v))
        })
        .ok_or_else(|| match vendor {
            Some(v) => DmmError::UnknownModel(format!("{v} {model}")),
            None => DmmError::UnknownModel(model.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_profile_validates() {
        for profile in ALL_MODELS {
            profile
                .validate()
                .unwrap_or_else(|e| panic!("{}: {e}", profile.display_name()));
        }
    }

    #[test]
    fn every_selectable_capability_round_trips_through_its_prefix() {
        for profile in ALL_MODELS {
            let table = profile.capabilities;
            for (quantity, flags) in table.supported_modes() {
                let by_number = table.by_number(quantity, flags).unwrap();
                let by_prefix = table.by_prefix(by_number.query_prefix).unwrap();
                assert_eq!(
                    by_number,
                    by_prefix,
                    "{} {:?} {:?}",
                    profile.display_name(),
                    quantity,
                    flags
                );
            }
        }
    }

    #[test]
    fn find_model_ignores_case_and_checks_vendor() {
        assert_eq!(find_model(None, "gdm8255a").unwrap().model, "GDM8255A");
        assert_eq!(
            find_model(Some("owon"), "XDM1041").unwrap().vendor,
            "Owon"
        );
        assert!(matches!(
            find_model(Some("Agilent"), "XDM1041"),
            Err(DmmError::UnknownModel(_))
        ));
    }

    #[test]
    fn owon_catalogue_selects_by_flags() {
        let dcv = OWON_XDM1041.catalogue_ranges(Quantity::Voltage, MqFlags::DC);
        assert_eq!(dcv.last(), Some(&"1000 V"));
        let acv = OWON_XDM1041.catalogue_ranges(Quantity::Voltage, MqFlags::AC);
        assert_eq!(acv.last(), Some(&"750 V"));
        assert!(OWON_XDM1041
            .catalogue_ranges(Quantity::Frequency, NONE)
            .is_empty());
        assert!(AGILENT_34405A
            .catalogue_ranges(Quantity::Voltage, MqFlags::DC)
            .is_empty());
    }

    #[test]
    fn double_width_thresholds_differ_by_strategy() {
        assert!(!AGILENT_34405A.uses_double_width());
        assert!(KEYSIGHT_34465A.uses_double_width());
        assert!(!GWINSTEK_GDM8251A.uses_double_width());
    }
}
