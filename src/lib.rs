//! # CncTerm
//!
//! An interactive terminal client for CNC controllers whose whole command
//! vocabulary comes from configuration.
//!
//! ## Architecture
//!
//! CncTerm is organized as a workspace with multiple crates:
//!
//! 1. **cncterm-core** - Machine data models, error taxonomy, shared-state aliases
//! 2. **cncterm-settings** - Configuration schema, file loading, default vocabulary
//! 3. **cncterm-communication** - Transport trait, machine simulator, status cache
//! 4. **cncterm-commands** - Registry, parser, template engine, executor
//! 5. **cncterm** - Binary and the interactive session
//!
//! Without a physical controller attached, commands drive an in-process
//! machine simulator with soft limits, feed hold and emergency stop.

pub mod session;

pub use cncterm_commands::{
    CommandExecutionResult, CommandExecutor, CommandKind, CommandParser, CommandRegistry,
    ParsedCommand, TemplateEngine,
};
pub use cncterm_communication::{MachineSimulator, StatusCache, Transport, VirtualTransport};
pub use cncterm_core::{Error, MachineState, MachineStatus, Result};
pub use cncterm_settings::Config;
pub use session::Session;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// `RUST_LOG` takes precedence over `default_level`. Logs go to stderr so
/// they do not interleave with command output.
pub fn init_logging(default_level: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)?,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
