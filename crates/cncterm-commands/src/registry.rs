//! Command registry
//!
//! Builds the in-memory command catalog from the configured vocabulary:
//! - System and macro names are normalized; aliases are normalized and de-duplicated
//! - API patterns are compiled once, case-insensitively
//! - The full catalog is sorted case-insensitively by name
//! - Text aliases keep declaration order, which is their precedence

use crate::descriptor::{
    normalize_aliases, ApiCommand, CommandDescriptor, MacroCommand, SystemCommand,
};
use crate::name;
use cncterm_core::ConfigurationError;
use cncterm_settings::CommandSettings;
use regex::RegexBuilder;
use std::sync::Arc;

/// Maximum number of alias rewrites applied to one input
pub const MAX_ALIAS_DEPTH: usize = 5;

/// Catalog of command descriptors
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<Arc<CommandDescriptor>>,
    system: Vec<Arc<CommandDescriptor>>,
    api: Vec<Arc<CommandDescriptor>>,
    macros: Vec<Arc<CommandDescriptor>>,
    aliases: Vec<(String, String)>,
}

impl CommandRegistry {
    /// Build the registry.
    ///
    /// Fails on blank command names and malformed API patterns.
    pub fn from_settings(settings: &CommandSettings) -> Result<Self, ConfigurationError> {
        let mut registry = Self::default();

        for (key, cfg) in settings.system.iter() {
            let descriptor = Arc::new(CommandDescriptor::System(SystemCommand {
                name: canonical_name(key, "system")?,
                description: cfg.description.clone(),
                aliases: normalize_aliases(&cfg.aliases),
                action: cfg.action.trim().to_string(),
            }));
            registry.system.push(descriptor);
        }

        for (key, cfg) in settings.api.iter() {
            let name = canonical_name(key, "api")?;
            let pattern = if cfg.pattern.trim().is_empty() {
                tracing::warn!("API command {} has an empty pattern and will never match", name);
                None
            } else {
                let regex = RegexBuilder::new(&cfg.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigurationError::InvalidPattern {
                        command: name.clone(),
                        reason: e.to_string(),
                    })?;
                Some(regex)
            };
            let descriptor = Arc::new(CommandDescriptor::Api(ApiCommand {
                name,
                description: cfg.description.clone(),
                pattern,
                endpoint: cfg.endpoint.trim().to_string(),
                request_mapping: cfg
                    .request_mapping
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                response_template: cfg.response_template.clone(),
            }));
            registry.api.push(descriptor);
        }

        for (key, cfg) in settings.macros.iter() {
            let descriptor = Arc::new(CommandDescriptor::Macro(MacroCommand {
                name: canonical_name(key, "macro")?,
                description: cfg.description.clone(),
                aliases: normalize_aliases(&cfg.aliases),
                steps: cfg.steps.clone(),
                response_template: cfg.response_template.clone(),
            }));
            registry.macros.push(descriptor);
        }

        for (from, to) in settings.aliases.iter() {
            if from.is_empty() {
                tracing::warn!("Ignoring text alias with an empty key");
                continue;
            }
            if registry
                .aliases
                .iter()
                .any(|(existing, _)| existing.eq_ignore_ascii_case(from))
            {
                tracing::warn!("Duplicate text alias '{}' ignored", from);
                continue;
            }
            registry.aliases.push((from.to_string(), to.clone()));
        }

        registry.commands = registry
            .system
            .iter()
            .chain(&registry.api)
            .chain(&registry.macros)
            .cloned()
            .collect();
        registry
            .commands
            .sort_by_key(|c| name::sort_key(c.name()));

        registry.warn_on_alias_cycles();
        tracing::debug!(
            "Command registry built: {} system, {} api, {} macro, {} aliases",
            registry.system.len(),
            registry.api.len(),
            registry.macros.len(),
            registry.aliases.len()
        );
        Ok(registry)
    }

    /// All descriptors, sorted case-insensitively by name
    pub fn commands(&self) -> &[Arc<CommandDescriptor>] {
        &self.commands
    }

    /// System commands in declaration order
    pub fn system_commands(&self) -> &[Arc<CommandDescriptor>] {
        &self.system
    }

    /// API commands in declaration order
    pub fn api_commands(&self) -> &[Arc<CommandDescriptor>] {
        &self.api
    }

    /// Macro commands in declaration order
    pub fn macro_commands(&self) -> &[Arc<CommandDescriptor>] {
        &self.macros
    }

    /// Text aliases in precedence order
    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    /// System command whose name or alias equals the normalized input
    pub fn find_system(&self, input: &str) -> Option<&Arc<CommandDescriptor>> {
        self.system.iter().find(|c| c.matches_name(input))
    }

    /// Macro command whose name or alias equals the normalized input
    pub fn find_macro(&self, input: &str) -> Option<&Arc<CommandDescriptor>> {
        self.macros.iter().find(|c| c.matches_name(input))
    }

    /// Rewrite the input with the first matching text alias.
    ///
    /// The first alias key (in declaration order) that is a case-insensitive
    /// prefix of the input is replaced by its value; the rest of the input is
    /// kept. Returns the input unchanged and `false` when nothing matched.
    pub fn expand_alias(&self, input: &str) -> (String, bool) {
        for (from, to) in &self.aliases {
            if let Some(rest) = name::strip_prefix_ignore_case(input, from) {
                return (format!("{}{}", to, rest), true);
            }
        }
        (input.to_string(), false)
    }

    fn warn_on_alias_cycles(&self) {
        for (from, _) in &self.aliases {
            let mut current = from.clone();
            let mut expansions = 0;
            loop {
                let (next, matched) = self.expand_alias(&current);
                if !matched {
                    break;
                }
                expansions += 1;
                if expansions > MAX_ALIAS_DEPTH {
                    tracing::warn!(
                        "Text alias '{}' does not settle within {} expansions",
                        from,
                        MAX_ALIAS_DEPTH
                    );
                    break;
                }
                current = next;
            }
        }
    }
}

fn canonical_name(key: &str, kind: &str) -> Result<String, ConfigurationError> {
    if key.trim().trim_start_matches(name::COMMAND_PREFIX).is_empty() {
        return Err(ConfigurationError::BlankName {
            kind: kind.to_string(),
        });
    }
    Ok(name::normalize(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cncterm_settings::{ApiCommandConfig, SystemCommandConfig};

    #[test]
    fn test_blank_name_rejected() {
        let mut settings = CommandSettings::empty();
        settings
            .system
            .insert("  ".to_string(), SystemCommandConfig::new("builtin:help"));
        let err = CommandRegistry::from_settings(&settings).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::BlankName {
                kind: "system".to_string()
            }
        );
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let mut settings = CommandSettings::empty();
        settings.api.insert("noop".to_string(), ApiCommandConfig::new("", "execute"));
        let registry = CommandRegistry::from_settings(&settings).unwrap();
        assert_eq!(registry.commands().len(), 1);
        match registry.api_commands()[0].as_ref() {
            CommandDescriptor::Api(api) => assert!(api.pattern.is_none()),
            other => panic!("unexpected descriptor {:?}", other),
        }
    }

    #[test]
    fn test_empty_alias_key_ignored() {
        let mut settings = CommandSettings::empty();
        settings.aliases.insert("".to_string(), "/help".to_string());
        let registry = CommandRegistry::from_settings(&settings).unwrap();
        assert!(registry.aliases().is_empty());
        assert_eq!(registry.expand_alias("anything"), ("anything".to_string(), false));
    }
}
