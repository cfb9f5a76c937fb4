//! Backend transport abstraction
//!
//! The command pipeline never talks to a machine directly. It invokes
//! named endpoints on a [`Transport`] with a loosely typed request map and
//! receives a [`TransportResponse`]. Wire protocols live behind this trait.

pub mod virtual_transport;

use async_trait::async_trait;
use cncterm_core::{TransportError, ValueMap};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use virtual_transport::VirtualTransport;

/// Well-known endpoint names
pub mod endpoints {
    /// Run one line of G-code or a machine macro (`text`)
    pub const EXECUTE: &str = "execute";
    /// Current machine status
    pub const GET_STATUS: &str = "get_status";
    /// Machine parameter table
    pub const GET_PARAMETERS: &str = "get_parameters";
    /// Update one machine parameter (`key`, `value`)
    pub const SET_PARAMETER: &str = "set_parameter";
    /// Tool table
    pub const GET_TOOLS: &str = "get_tools";
    /// Clear an active alarm
    pub const RESET: &str = "reset";
    /// Emergency stop
    pub const ESTOP: &str = "estop";
    /// Toggle feed hold
    pub const FEED_HOLD: &str = "feed_hold";
}

/// Default message when a successful response carries none
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Command executed successfully";

/// Response from one endpoint invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    /// Whether the backend accepted the request
    pub success: bool,
    /// Response payload
    pub data: ValueMap,
    /// Failure description
    pub error: Option<String>,
}

impl TransportResponse {
    /// Successful response with a payload
    pub fn ok(data: ValueMap) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Failed response
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: ValueMap::new(),
            error: Some(error.into()),
        }
    }

    /// Builder method to set the `message` field
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.data
            .insert("message".to_string(), Value::String(message.into()));
        self
    }

    /// The `message` field, if present and a string
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// Best description of a failure
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| self.message().map(str::to_string))
            .unwrap_or_else(|| "Request failed".to_string())
    }
}

/// Capability to reach a machine-control backend
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Invoke an endpoint once.
    ///
    /// An unsuccessful response is `Ok` with `success == false`; `Err` is
    /// reserved for failures of the transport itself.
    async fn invoke(
        &self,
        endpoint: &str,
        request: &ValueMap,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, TransportError>;

    /// Stream responses from an endpoint until `cancel` fires.
    ///
    /// Must be called from within a tokio runtime.
    fn subscribe(&self, endpoint: &str, cancel: CancellationToken) -> mpsc::Receiver<TransportResponse>;
}

/// Invoke an endpoint with an upper bound on its duration.
///
/// The transport sees a child of `cancel` that is also cancelled when the
/// timeout expires, so work it spawned stops with the request.
pub async fn invoke_with_timeout(
    transport: &dyn Transport,
    endpoint: &str,
    request: &ValueMap,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<TransportResponse, TransportError> {
    let request_cancel = cancel.child_token();
    let invoke = transport.invoke(endpoint, request, &request_cancel);
    match tokio::time::timeout(timeout, invoke).await {
        Ok(result) => result,
        Err(_) => {
            request_cancel.cancel();
            tracing::warn!(
                "{} request to {} timed out after {}ms",
                transport.name(),
                endpoint,
                timeout.as_millis()
            );
            Err(TransportError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}
