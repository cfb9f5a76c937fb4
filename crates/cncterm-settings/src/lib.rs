//! CncTerm Settings Crate
//!
//! Handles the configuration schema, file loading and validation, and the
//! built-in command vocabulary used when no configuration file exists.

pub mod config;
pub mod error;

pub use config::{
    ApiCommandConfig, AppSettings, Axes, CommandSettings, Config, MachineSettings,
    MacroCommandConfig, MacroStep, SystemCommandConfig, TransportKind, TransportSettings,
};
pub use error::{SettingsError, SettingsResult};
