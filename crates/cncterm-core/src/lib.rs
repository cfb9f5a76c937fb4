//! # CncTerm Core
//!
//! Core types and utilities for CncTerm.
//! Provides the machine data models, the error taxonomy shared by every
//! layer of the command pipeline, and shared-state aliases.

pub mod data;
pub mod error;
pub mod types;

pub use data::{
    parameters::MachineParameters,
    tools::{ToolEntry, ToolTable},
    value::ValueMap,
    MachineState, MachineStatus,
};

pub use error::{
    ConfigurationError, Error, ExecutionError, MachineError, Result, TemplateError, TransportError,
};

// Re-export type aliases for convenience
pub use types::{thread_safe, thread_safe_rw, ThreadSafe, ThreadSafeRw};
