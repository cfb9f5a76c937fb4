//! # CncTerm Commands
//!
//! The command resolution and execution pipeline for CncTerm.
//! Builds the command registry from configuration, resolves operator input
//! into commands, renders response templates and executes commands against
//! a backend transport.

pub mod descriptor;
pub mod executor;
pub mod name;
pub mod parser;
pub mod registry;
pub mod render;
pub mod result;
pub mod template;

pub use descriptor::{ApiCommand, CommandDescriptor, CommandKind, MacroCommand, SystemCommand};
pub use executor::{CommandExecutor, BUILTIN_PREFIX, DEFAULT_TIMEOUT};
pub use name::{names_equal, normalize, COMMAND_PREFIX};
pub use parser::{CommandParser, ParsedCommand};
pub use registry::{CommandRegistry, MAX_ALIAS_DEPTH};
pub use result::CommandExecutionResult;
pub use template::{Template, TemplateEngine};
