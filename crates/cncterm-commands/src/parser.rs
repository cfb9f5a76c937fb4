//! Command parser
//!
//! Resolves one line of operator input against the registry. Resolution
//! order is system command, API pattern, macro, then text alias expansion
//! and a fresh attempt. Anything left over is an unknown command.

use crate::descriptor::{ApiCommand, CommandDescriptor, CommandKind};
use crate::registry::{CommandRegistry, MAX_ALIAS_DEPTH};
use cncterm_core::ValueMap;
use serde_json::Value;
use std::sync::Arc;

/// Mapping template replaced by the whole matched input
pub const INPUT_PLACEHOLDER: &str = "$input";

/// Result of resolving one input line
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    /// Resolution category
    pub kind: CommandKind,
    /// Canonical name of the matched command, or the input when unknown
    pub name: String,
    /// Input after alias expansion
    pub input: String,
    /// Input as typed
    pub raw_input: String,
    /// Request fields extracted from an API pattern
    pub parameters: ValueMap,
    /// Matched descriptor
    pub descriptor: Option<Arc<CommandDescriptor>>,
}

impl ParsedCommand {
    fn matched(
        descriptor: &Arc<CommandDescriptor>,
        input: &str,
        raw_input: &str,
        parameters: ValueMap,
    ) -> Self {
        Self {
            kind: descriptor.kind(),
            name: descriptor.name().to_string(),
            input: input.to_string(),
            raw_input: raw_input.to_string(),
            parameters,
            descriptor: Some(descriptor.clone()),
        }
    }

    fn unknown(input: &str, raw_input: &str) -> Self {
        Self {
            kind: CommandKind::Unknown,
            name: input.to_string(),
            input: input.to_string(),
            raw_input: raw_input.to_string(),
            parameters: ValueMap::new(),
            descriptor: None,
        }
    }

    /// Whether resolution found a command
    pub fn is_known(&self) -> bool {
        self.kind != CommandKind::Unknown
    }
}

/// Resolves input lines into commands
#[derive(Debug, Clone)]
pub struct CommandParser {
    registry: Arc<CommandRegistry>,
}

impl CommandParser {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Resolve one line of input.
    ///
    /// Returns `None` for empty or whitespace-only input. Never fails:
    /// input that matches nothing resolves to [`CommandKind::Unknown`].
    pub fn parse(&self, raw_input: &str) -> Option<ParsedCommand> {
        let original = raw_input.trim();
        if original.is_empty() {
            return None;
        }

        let mut input = original.to_string();
        for depth in 0..=MAX_ALIAS_DEPTH {
            if let Some(parsed) = self.resolve(&input, raw_input) {
                tracing::debug!(
                    "Resolved '{}' to {} command {} (alias depth {})",
                    original,
                    parsed.kind,
                    parsed.name,
                    depth
                );
                return Some(parsed);
            }
            if depth == MAX_ALIAS_DEPTH {
                tracing::warn!(
                    "Alias expansion of '{}' exceeded {} steps",
                    original,
                    MAX_ALIAS_DEPTH
                );
                break;
            }
            let (expanded, matched) = self.registry.expand_alias(&input);
            if !matched {
                break;
            }
            tracing::debug!("Alias expanded '{}' to '{}'", input, expanded);
            input = expanded.trim().to_string();
        }

        tracing::debug!("No command matches '{}'", original);
        Some(ParsedCommand::unknown(original, raw_input))
    }

    fn resolve(&self, input: &str, raw_input: &str) -> Option<ParsedCommand> {
        if let Some(system) = self.registry.find_system(input) {
            return Some(ParsedCommand::matched(system, input, raw_input, ValueMap::new()));
        }

        for descriptor in self.registry.api_commands() {
            if let CommandDescriptor::Api(api) = descriptor.as_ref() {
                if let Some(parameters) = match_api(api, input) {
                    return Some(ParsedCommand::matched(descriptor, input, raw_input, parameters));
                }
            }
        }

        self.registry
            .find_macro(input)
            .map(|m| ParsedCommand::matched(m, input, raw_input, ValueMap::new()))
    }
}

/// Match the input against an API pattern and resolve its request mapping
fn match_api(api: &ApiCommand, input: &str) -> Option<ValueMap> {
    let captures = api.pattern.as_ref()?.captures(input)?;

    let mut parameters = ValueMap::new();
    for (field, template) in &api.request_mapping {
        let value = if template.eq_ignore_ascii_case(INPUT_PLACEHOLDER) {
            input.to_string()
        } else {
            match template
                .strip_prefix('$')
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n < captures.len())
            {
                Some(index) => captures
                    .get(index)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                None => template.clone(),
            }
        };
        parameters.insert(field.clone(), Value::String(value));
    }
    Some(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cncterm_settings::{ApiCommandConfig, CommandSettings};

    fn parser_with_api(pattern: &str, mapping: &[(&str, &str)]) -> CommandParser {
        let mut api = ApiCommandConfig::new(pattern, "execute");
        for (field, template) in mapping {
            api = api.with_mapping(*field, *template);
        }
        let mut settings = CommandSettings::empty();
        settings.api.insert("sample".to_string(), api);
        CommandParser::new(Arc::new(CommandRegistry::from_settings(&settings).unwrap()))
    }

    #[test]
    fn test_blank_input_is_no_command() {
        let parser = parser_with_api("^x$", &[]);
        assert!(parser.parse("").is_none());
        assert!(parser.parse("   \t").is_none());
    }

    #[test]
    fn test_capture_mapping() {
        let parser = parser_with_api(
            r"^touch\s+(\w+)(?:\s+(\d+))?$",
            &[("axis", "$1"), ("depth", "$2"), ("mode", "fast"), ("extra", "$9")],
        );
        let parsed = parser.parse("TOUCH z").unwrap();
        assert_eq!(parsed.kind, CommandKind::Api);
        assert_eq!(parsed.parameters["axis"], "z");
        assert_eq!(parsed.parameters["depth"], "");
        assert_eq!(parsed.parameters["mode"], "fast");
        assert_eq!(parsed.parameters["extra"], "$9");
    }

    #[test]
    fn test_unknown_keeps_original_input() {
        let parser = parser_with_api("^x$", &[]);
        let parsed = parser.parse("  frobnicate now ").unwrap();
        assert_eq!(parsed.kind, CommandKind::Unknown);
        assert_eq!(parsed.input, "frobnicate now");
        assert_eq!(parsed.raw_input, "  frobnicate now ");
        assert!(parsed.descriptor.is_none());
        assert!(!parsed.is_known());
    }
}
