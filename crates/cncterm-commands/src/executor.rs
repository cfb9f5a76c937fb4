//! Command executor
//!
//! Turns a [`ParsedCommand`] into a [`CommandExecutionResult`]. System
//! commands run builtin handlers, API commands make one backend call and
//! macros make several. Execution is total: every fault is reported as a
//! failed result carrying the fault's message.

use crate::descriptor::{ApiCommand, CommandDescriptor, CommandKind, MacroCommand, SystemCommand};
use crate::parser::ParsedCommand;
use crate::registry::CommandRegistry;
use crate::render;
use crate::result::CommandExecutionResult;
use crate::template::TemplateEngine;
use cncterm_communication::{
    endpoints, invoke_with_timeout, StatusCache, Transport, TransportResponse,
    DEFAULT_SUCCESS_MESSAGE,
};
use cncterm_core::{ExecutionError, TransportError, ValueMap};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Prefix of every system command action
pub const BUILTIN_PREFIX: &str = "builtin:";

/// Default upper bound on one backend call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Executes parsed commands
pub struct CommandExecutor {
    registry: Arc<CommandRegistry>,
    transport: Arc<dyn Transport>,
    templates: TemplateEngine,
    status_cache: Option<StatusCache>,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(registry: Arc<CommandRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            templates: TemplateEngine::new(),
            status_cache: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Builder method to set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to serve the status panel from a cache
    pub fn with_status_cache(mut self, cache: StatusCache) -> Self {
        self.status_cache = Some(cache);
        self
    }

    /// Execute one command. Never fails.
    pub async fn execute(
        &self,
        command: &ParsedCommand,
        cancel: &CancellationToken,
    ) -> CommandExecutionResult {
        tracing::info!("Executing {} command {}", command.kind, command.name);

        let outcome = match (command.kind, command.descriptor.as_deref()) {
            (CommandKind::Unknown, _) => Err(ExecutionError::UnknownCommand {
                input: command.input.clone(),
            }),
            (_, Some(CommandDescriptor::System(system))) => self.execute_system(system, cancel).await,
            (_, Some(CommandDescriptor::Api(api))) => {
                self.execute_api(api, &command.parameters, cancel).await
            }
            (_, Some(CommandDescriptor::Macro(macro_cmd))) => {
                self.execute_macro(macro_cmd, cancel).await
            }
            (_, None) => Err(ExecutionError::MissingConfig {
                command: command.name.clone(),
            }),
        };

        match outcome {
            Ok(result) => result,
            Err(ExecutionError::Transport(TransportError::Cancelled)) => {
                tracing::info!("Command {} cancelled", command.name);
                CommandExecutionResult::cancelled()
            }
            Err(e) => {
                tracing::warn!("Command {} failed: {}", command.name, e);
                CommandExecutionResult::failure(e.to_string())
            }
        }
    }

    async fn execute_system(
        &self,
        system: &SystemCommand,
        cancel: &CancellationToken,
    ) -> Result<CommandExecutionResult, ExecutionError> {
        let Some(builtin) = system.action.strip_prefix(BUILTIN_PREFIX) else {
            return Err(ExecutionError::UnknownAction {
                action: system.action.clone(),
            });
        };

        match builtin.trim() {
            "help" => Ok(CommandExecutionResult::ok(render::help(&self.registry))),
            "exit" => Ok(CommandExecutionResult::exit()),
            "clear" => Ok(CommandExecutionResult::clear()),
            "status_panel" => self.status_panel(cancel).await,
            "params" => {
                let response = self
                    .call(endpoints::GET_PARAMETERS, &ValueMap::new(), cancel)
                    .await?;
                Ok(self.rendered(render::PARAMS_TEMPLATE, response))
            }
            "tools" => {
                let response = self.call(endpoints::GET_TOOLS, &ValueMap::new(), cancel).await?;
                Ok(self.rendered(render::TOOLS_TEMPLATE, response))
            }
            "reset" => self.message_call(endpoints::RESET, cancel).await,
            "estop" => self.message_call(endpoints::ESTOP, cancel).await,
            "feed_hold" => self.message_call(endpoints::FEED_HOLD, cancel).await,
            other => Err(ExecutionError::UnknownBuiltin {
                name: other.to_string(),
            }),
        }
    }

    async fn status_panel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CommandExecutionResult, ExecutionError> {
        if let Some(cache) = self.status_cache.as_ref().filter(|c| c.is_populated()) {
            let data = cache.latest().to_value_map();
            let output = self.templates.render(render::STATUS_TEMPLATE, &data);
            return Ok(CommandExecutionResult::ok(output).with_data(data));
        }
        let response = self.call(endpoints::GET_STATUS, &ValueMap::new(), cancel).await?;
        Ok(self.rendered(render::STATUS_TEMPLATE, response))
    }

    async fn execute_api(
        &self,
        api: &ApiCommand,
        parameters: &ValueMap,
        cancel: &CancellationToken,
    ) -> Result<CommandExecutionResult, ExecutionError> {
        let response = self.call(&api.endpoint, parameters, cancel).await?;
        Ok(self.respond(api.response_template.as_deref(), response))
    }

    async fn execute_macro(
        &self,
        macro_cmd: &MacroCommand,
        cancel: &CancellationToken,
    ) -> Result<CommandExecutionResult, ExecutionError> {
        if macro_cmd.steps.is_empty() {
            return Err(ExecutionError::EmptyMacro {
                name: macro_cmd.name.clone(),
            });
        }

        let mut last = None;
        for (index, step) in macro_cmd.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled.into());
            }
            tracing::debug!(
                "Macro {} step {}/{}: {}",
                macro_cmd.name,
                index + 1,
                macro_cmd.steps.len(),
                step.endpoint
            );
            let response = self
                .call(&step.endpoint, &step.request, cancel)
                .await
                .map_err(|e| match e {
                    ExecutionError::Transport(TransportError::Cancelled) => e,
                    other => ExecutionError::MacroStepFailed {
                        step: index,
                        message: other.to_string(),
                    },
                })?;
            last = Some(response);
        }

        let response = last.unwrap_or_default();
        Ok(self.respond(macro_cmd.response_template.as_deref(), response))
    }

    /// Invoke an endpoint, turning an unsuccessful response into an error.
    ///
    /// Returns as soon as `cancel` fires, whether or not the transport
    /// observes the token itself.
    async fn call(
        &self,
        endpoint: &str,
        request: &ValueMap,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, ExecutionError> {
        let invoke =
            invoke_with_timeout(self.transport.as_ref(), endpoint, request, cancel, self.timeout);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Call to {} cancelled", endpoint);
                return Err(TransportError::Cancelled.into());
            }
            result = invoke => result?,
        };
        if response.success {
            Ok(response)
        } else {
            Err(ExecutionError::Backend {
                message: response.error_message(),
            })
        }
    }

    async fn message_call(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<CommandExecutionResult, ExecutionError> {
        let response = self.call(endpoint, &ValueMap::new(), cancel).await?;
        Ok(self.respond(None, response))
    }

    fn rendered(&self, template: &str, response: TransportResponse) -> CommandExecutionResult {
        let output = self.templates.render(template, &response.data);
        CommandExecutionResult::ok(output.trim_end()).with_data(response.data)
    }

    fn respond(&self, template: Option<&str>, response: TransportResponse) -> CommandExecutionResult {
        match template.filter(|t| !t.is_empty()) {
            Some(template) => self.rendered(template, response),
            None => {
                let output = response.message().unwrap_or(DEFAULT_SUCCESS_MESSAGE).to_string();
                CommandExecutionResult::ok(output).with_data(response.data)
            }
        }
    }
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("transport", &self.transport.name())
            .field("timeout", &self.timeout)
            .field("status_cache", &self.status_cache.is_some())
            .finish()
    }
}
