//! Abstract commands and per-model command templates.
//!
//! Templates use `${name}` placeholders. The driver supplies two arguments:
//! `mode` (the active capability's setup token) and `range` (range payload),
//! e.g. `${mode}:RANG ${range}` becomes `VOLT:DC:RANG 10`.

use crate::error::{DmmError, DmmResult};
use crate::limits::{check_text_len, MAX_COMMAND_LEN};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static INTERPOLATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid interpolation regex"));

/// Abstract command identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    /// Query the active measurement function
    QueryFunction,
    /// Select a measurement function
    SetupFunction,
    /// Query the active numeric range
    QueryRange,
    /// Query whether autoranging is on
    QueryRangeAuto,
    /// Set the range
    SetupRange,
    /// Read one measurement value
    QueryValue,
    /// Query the reading-rate descriptor (`Slow`/`Mid`/`Fast`)
    QueryPrecision,
    /// Sent once when acquisition starts
    StartAcquisition,
    /// Sent once when acquisition stops
    StopAcquisition,
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandId::QueryFunction => "query-function",
            CommandId::SetupFunction => "setup-function",
            CommandId::QueryRange => "query-range",
            CommandId::QueryRangeAuto => "query-range-auto",
            CommandId::SetupRange => "setup-range",
            CommandId::QueryValue => "query-value",
            CommandId::QueryPrecision => "query-precision",
            CommandId::StartAcquisition => "start-acquisition",
            CommandId::StopAcquisition => "stop-acquisition",
        };
        f.write_str(name)
    }
}

/// A model's mapping from [`CommandId`] to vendor template.
#[derive(Debug, Clone, Copy)]
pub struct CommandSet {
    templates: &'static [(CommandId, &'static str)],
}

impl CommandSet {
    /// Wrap a static template list.
    pub const fn new(templates: &'static [(CommandId, &'static str)]) -> Self {
        Self { templates }
    }

    /// Template for `id`, if the model defines a non-empty one.
    pub fn template(&self, id: CommandId) -> Option<&'static str> {
        self.templates
            .iter()
            .find(|(cmd, template)| *cmd == id && !template.is_empty())
            .map(|(_, template)| *template)
    }

    /// Whether the model defines `id`.
    pub fn supports(&self, id: CommandId) -> bool {
        self.template(id).is_some()
    }

    /// Format `id` with the given placeholder arguments.
    ///
    /// Fails with `NotSupportedCommand` when the template is missing and with
    /// `InvalidArgument` when a placeholder has no argument.
    pub fn format(&self, id: CommandId, args: &[(&str, &str)]) -> DmmResult<String> {
        let template = self
            .template(id)
            .ok_or(DmmError::NotSupportedCommand(id))?;
        let command = interpolate(template, args)?;
        check_text_len("command", &command, MAX_COMMAND_LEN)?;
        Ok(command)
    }

    /// Check that the commands every driver path relies on are present.
    pub fn validate(&self) -> DmmResult<()> {
        for required in [CommandId::QueryFunction, CommandId::QueryValue] {
            if !self.supports(required) {
                return Err(DmmError::ModelTable(format!(
                    "command set lacks {required}"
                )));
            }
        }
        Ok(())
    }
}

/// Expand each `${name}` in `template` exactly once; argument text is never
/// rescanned for placeholders.
fn interpolate(template: &str, args: &[(&str, &str)]) -> DmmResult<String> {
    let mut missing = None;
    let result = INTERPOLATION_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let name = &cap[1];
        match args.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => (*value).to_string(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(DmmError::InvalidArgument(format!(
            "no value for placeholder '{name}' in {template:?}"
        ))),
        None => Ok(result.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SET: CommandSet = CommandSet::new(&[
        (CommandId::QueryFunction, "CONF?"),
        (CommandId::SetupFunction, "CONF:${mode}"),
        (CommandId::SetupRange, "${mode}:RANG ${range}"),
        (CommandId::QueryValue, "READ?"),
        (CommandId::QueryRange, ""),
    ]);

    #[test]
    fn format_interpolates_placeholders() {
        let cmd = SET
            .format(CommandId::SetupRange, &[("mode", "VOLT:DC"), ("range", "10")])
            .unwrap();
        assert_eq!(cmd, "VOLT:DC:RANG 10");
        assert_eq!(SET.format(CommandId::QueryFunction, &[]).unwrap(), "CONF?");
    }

    #[test]
    fn argument_text_is_not_expanded_again() {
        let cmd = SET
            .format(
                CommandId::SetupRange,
                &[("mode", "${range}"), ("range", "10")],
            )
            .unwrap();
        assert_eq!(cmd, "${range}:RANG 10");
    }

    #[test]
    fn empty_template_is_unsupported() {
        assert!(!SET.supports(CommandId::QueryRange));
        let err = SET.format(CommandId::QueryRange, &[]).unwrap_err();
        assert!(matches!(
            err,
            DmmError::NotSupportedCommand(CommandId::QueryRange)
        ));
    }

    #[test]
    fn missing_placeholder_argument_fails() {
        let err = SET
            .format(CommandId::SetupFunction, &[("range", "AUTO")])
            .unwrap_err();
        assert!(matches!(err, DmmError::InvalidArgument(_)));
    }

    #[test]
    fn over_long_command_fails_loudly() {
        let token = "X".repeat(MAX_COMMAND_LEN);
        let err = SET
            .format(CommandId::SetupFunction, &[("mode", token.as_str())])
            .unwrap_err();
        assert!(matches!(err, DmmError::TextTooLong { .. }));
    }

    #[test]
    fn validate_requires_function_and_value_queries() {
        assert!(SET.validate().is_ok());
        static BARE: CommandSet = CommandSet::new(&[(CommandId::QueryFunction, "FUNC?")]);
        assert!(BARE.validate().is_err());
    }
}
