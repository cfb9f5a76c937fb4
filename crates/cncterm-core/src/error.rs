//! Error handling for CncTerm
//!
//! Provides error types for every layer of the command pipeline:
//! - Configuration errors (registry construction, invalid settings values)
//! - Execution errors (builtin dispatch, macro steps, backend failures)
//! - Transport errors (cancellation, timeouts, unavailable backend)
//! - Template errors (rendering problems, surfaced inline)
//! - Machine errors (parameter updates, cancelled simulation)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Configuration error type
///
/// Raised while building the command registry or validating settings.
/// These are the only hard failures in the pipeline; they are never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// An API command pattern failed to compile
    #[error("Invalid pattern for command '{command}': {reason}")]
    InvalidPattern {
        /// The command whose pattern is malformed.
        command: String,
        /// The compiler's description of the problem.
        reason: String,
    },

    /// A command was declared with an empty name
    #[error("Blank {kind} command name")]
    BlankName {
        /// The command kind (system, api, macro).
        kind: String,
    },

    /// A configuration value is outside its valid range
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue {
        /// The configuration key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Execution error type
///
/// Every variant is reported to the operator as a failed command result;
/// none of them escape the executor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// A system command action is not of the form `builtin:<name>`
    #[error("Unknown action: {action}")]
    UnknownAction {
        /// The configured action string.
        action: String,
    },

    /// A `builtin:` action names a handler that does not exist
    #[error("Unknown builtin action: {name}")]
    UnknownBuiltin {
        /// The builtin name after the prefix.
        name: String,
    },

    /// The matched command carries no descriptor configuration
    #[error("Command {command} has no configuration")]
    MissingConfig {
        /// The resolved command name.
        command: String,
    },

    /// A macro was declared without steps
    #[error("Macro {name} has no steps")]
    EmptyMacro {
        /// The macro name.
        name: String,
    },

    /// A macro step failed; remaining steps were skipped
    #[error("Macro step failed: {message}")]
    MacroStepFailed {
        /// Zero-based index of the failing step.
        step: usize,
        /// The failure reported by that step.
        message: String,
    },

    /// The backend reported a failure
    #[error("{message}")]
    Backend {
        /// The message returned by the backend.
        message: String,
    },

    /// No command matched the input
    #[error("Unknown command: {input}")]
    UnknownCommand {
        /// The original operator input.
        input: String,
    },

    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Transport error type
///
/// Failures of the transport capability itself, as opposed to an
/// unsuccessful response from the backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The operation observed a cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// The invocation did not complete in time
    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout {
        /// The endpoint that was invoked.
        endpoint: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The backend cannot be reached
    #[error("Transport unavailable: {reason}")]
    Unavailable {
        /// Why the backend is unavailable.
        reason: String,
    },
}

/// Template error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// A block tag was opened but never closed
    #[error("unterminated {tag} block")]
    UnterminatedBlock {
        /// The opening tag (`if`, `range`).
        tag: String,
    },

    /// A closing or branch tag appeared without its block
    #[error("unexpected {tag} tag")]
    UnexpectedTag {
        /// The stray tag (`else`, `end`).
        tag: String,
    },

    /// A format specifier could not be applied
    #[error("unsupported format '{format}'")]
    UnsupportedFormat {
        /// The format specifier as written.
        format: String,
    },
}

/// Machine error type
///
/// Raised by the machine data model and the simulator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MachineError {
    /// The requested parameter does not exist
    #[error("Parameter {key} not found")]
    UnknownParameter {
        /// The parameter key as given.
        key: String,
    },

    /// The parameter value is not a finite number
    #[error("Invalid value for {key}: {value}")]
    InvalidParameterValue {
        /// The parameter key.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// A simulated operation was cancelled before it completed
    #[error("Simulation cancelled")]
    Cancelled,
}

/// Main error type for CncTerm
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Execution error
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Template error
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Machine error
    #[error(transparent)]
    Machine(#[from] MachineError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::Timeout { .. })
                | Error::Execution(ExecutionError::Transport(TransportError::Timeout { .. }))
        )
    }

    /// Check if this error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::Cancelled)
                | Error::Execution(ExecutionError::Transport(TransportError::Cancelled))
                | Error::Machine(MachineError::Cancelled)
        )
    }

    /// Check if this is a configuration error
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_messages() {
        let err = ExecutionError::UnknownAction {
            action: "shell:ls".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown action: shell:ls");

        let err = ExecutionError::MacroStepFailed {
            step: 1,
            message: "Machine in ALARM".to_string(),
        };
        assert_eq!(err.to_string(), "Macro step failed: Machine in ALARM");

        let err = ExecutionError::UnknownCommand {
            input: "/frobnicate".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown command: /frobnicate");
    }

    #[test]
    fn test_transport_error_passes_through_execution() {
        let err: ExecutionError = TransportError::Timeout {
            endpoint: "execute".to_string(),
            timeout_ms: 5000,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Request to execute timed out after 5000ms"
        );

        let err: Error = err.into();
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancellation_detection() {
        assert!(Error::from(MachineError::Cancelled).is_cancelled());
        assert!(Error::from(TransportError::Cancelled).is_cancelled());
        assert!(!Error::from(std::io::Error::other("boom")).is_cancelled());
    }

    #[test]
    fn test_parameter_error_message() {
        let err = MachineError::UnknownParameter {
            key: "W_MAX".to_string(),
        };
        assert_eq!(err.to_string(), "Parameter W_MAX not found");
    }
}
