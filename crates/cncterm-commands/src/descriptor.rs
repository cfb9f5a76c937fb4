//! Command descriptors
//!
//! A descriptor is the registry's immutable record of one invocable
//! command. Descriptors are built once per configuration load and shared
//! as `Arc`s with parsed commands.

use crate::name;
use cncterm_settings::MacroStep;
use regex::Regex;
use std::fmt;

/// Kind of a parsed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Handled inside the client
    System,
    /// Forwarded to one backend endpoint
    Api,
    /// A sequence of backend invocations
    Macro,
    /// Nothing matched
    Unknown,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Api => write!(f, "api"),
            Self::Macro => write!(f, "macro"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A command handled by a builtin action
#[derive(Debug, Clone)]
pub struct SystemCommand {
    /// Canonical name
    pub name: String,
    /// Help text
    pub description: String,
    /// Normalized, de-duplicated aliases
    pub aliases: Vec<String>,
    /// Configured action (`builtin:<name>`)
    pub action: String,
}

/// A pattern-matched backend command
#[derive(Debug, Clone)]
pub struct ApiCommand {
    /// Canonical name
    pub name: String,
    /// Help text
    pub description: String,
    /// Compiled pattern; `None` when the configured pattern is empty
    pub pattern: Option<Regex>,
    /// Backend endpoint
    pub endpoint: String,
    /// Request field to value template, in declaration order
    pub request_mapping: Vec<(String, String)>,
    /// Template rendered against the response data
    pub response_template: Option<String>,
}

/// A multi-step backend command
#[derive(Debug, Clone)]
pub struct MacroCommand {
    /// Canonical name
    pub name: String,
    /// Help text
    pub description: String,
    /// Normalized, de-duplicated aliases
    pub aliases: Vec<String>,
    /// Steps, executed in order
    pub steps: Vec<MacroStep>,
    /// Template rendered against the last step's response data
    pub response_template: Option<String>,
}

/// Registry entry for one command
#[derive(Debug, Clone)]
pub enum CommandDescriptor {
    /// Builtin command
    System(SystemCommand),
    /// Backend command
    Api(ApiCommand),
    /// Multi-step backend command
    Macro(MacroCommand),
}

impl CommandDescriptor {
    /// Canonical name, always starting with `/`
    pub fn name(&self) -> &str {
        match self {
            Self::System(c) => &c.name,
            Self::Api(c) => &c.name,
            Self::Macro(c) => &c.name,
        }
    }

    /// Help text
    pub fn description(&self) -> &str {
        match self {
            Self::System(c) => &c.description,
            Self::Api(c) => &c.description,
            Self::Macro(c) => &c.description,
        }
    }

    /// Command kind
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::System(_) => CommandKind::System,
            Self::Api(_) => CommandKind::Api,
            Self::Macro(_) => CommandKind::Macro,
        }
    }

    /// Aliases accepted in place of the name; API commands have none
    pub fn aliases(&self) -> &[String] {
        match self {
            Self::System(c) => &c.aliases,
            Self::Api(_) => &[],
            Self::Macro(c) => &c.aliases,
        }
    }

    /// Whether the normalized input equals the name or one of the aliases
    pub fn matches_name(&self, input: &str) -> bool {
        let input = name::normalize(input);
        input.eq_ignore_ascii_case(self.name())
            || self.aliases().iter().any(|a| input.eq_ignore_ascii_case(a))
    }
}

/// Normalize aliases and drop case-insensitive duplicates, keeping the first
pub(crate) fn normalize_aliases(aliases: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(aliases.len());
    for alias in aliases {
        if alias.trim().is_empty() {
            continue;
        }
        let alias = name::normalize(alias);
        if !out.iter().any(|a| a.eq_ignore_ascii_case(&alias)) {
            out.push(alias);
        }
    }
    out
}
