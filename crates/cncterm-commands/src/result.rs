//! Command execution results

use cncterm_core::ValueMap;

/// Outcome of executing one parsed command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandExecutionResult {
    /// Whether the command succeeded
    pub success: bool,
    /// Text shown to the operator
    pub output: String,
    /// Response data of the last backend call
    pub data: ValueMap,
    /// The session should end
    pub should_exit: bool,
    /// The screen should be cleared
    pub should_clear: bool,
    /// The command stopped because it was cancelled
    pub cancelled: bool,
}

impl CommandExecutionResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            ..Self::default()
        }
    }

    /// Successful result asking the session to end
    pub fn exit() -> Self {
        Self {
            should_exit: true,
            ..Self::ok("Goodbye")
        }
    }

    /// Successful result asking the session to clear the screen
    pub fn clear() -> Self {
        Self {
            should_clear: true,
            ..Self::ok("")
        }
    }

    /// Failed result for an operation stopped by cancellation
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::failure("Operation cancelled")
        }
    }

    /// Builder method to attach response data
    pub fn with_data(mut self, data: ValueMap) -> Self {
        self.data = data;
        self
    }
}
