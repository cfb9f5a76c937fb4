//! Simulator-backed transport
//!
//! Serves the well-known endpoints from an in-process [`MachineSimulator`],
//! so the client can run without a physical backend.

use super::{endpoints, Transport, TransportResponse};
use crate::simulator::{MachineSimulator, SimulationOutcome};
use async_trait::async_trait;
use cncterm_core::data::value;
use cncterm_core::{MachineError, TransportError, ValueMap};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const SUBSCRIPTION_BUFFER: usize = 16;

/// Transport that drives a [`MachineSimulator`]
#[derive(Debug, Clone)]
pub struct VirtualTransport {
    simulator: MachineSimulator,
    status_interval: Duration,
}

impl VirtualTransport {
    /// Create a transport over a simulator
    pub fn new(simulator: MachineSimulator, status_interval: Duration) -> Self {
        Self {
            simulator,
            status_interval,
        }
    }

    /// The simulator behind this transport
    pub fn simulator(&self) -> &MachineSimulator {
        &self.simulator
    }

    fn status_response(&self) -> TransportResponse {
        TransportResponse::ok(self.simulator.status().to_value_map())
    }

    async fn execute(
        &self,
        request: &ValueMap,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        let Some(text) = request.get("text").and_then(Value::as_str) else {
            return Ok(TransportResponse::failure("Missing 'text' field"));
        };

        match self.simulator.execute(text, cancel).await {
            Ok(SimulationOutcome::Completed(message)) => {
                Ok(self.status_response().with_message(message))
            }
            Ok(SimulationOutcome::Rejected(reason)) | Ok(SimulationOutcome::Aborted(reason)) => {
                let mut response = TransportResponse::failure(reason);
                response.data = self.simulator.status().to_value_map();
                Ok(response)
            }
            Err(MachineError::Cancelled) => Err(TransportError::Cancelled),
            Err(e) => Ok(TransportResponse::failure(e.to_string())),
        }
    }

    fn set_parameter(&self, request: &ValueMap) -> TransportResponse {
        let key = request.get("key").and_then(Value::as_str).map(str::trim);
        let raw = request.get("value");
        let (Some(key), Some(raw)) = (key.filter(|k| !k.is_empty()), raw) else {
            return TransportResponse::failure("Usage: /set <PARAM> <VALUE>");
        };
        let Some(number) = value::as_f64(raw) else {
            return TransportResponse::failure(
                MachineError::InvalidParameterValue {
                    key: key.to_string(),
                    value: value::to_display(raw),
                }
                .to_string(),
            );
        };

        match self.simulator.set_parameter(key, number) {
            Ok(canonical) => {
                let mut data = ValueMap::new();
                data.insert("key".to_string(), json!(canonical));
                data.insert("value".to_string(), json!(number));
                TransportResponse::ok(data).with_message(format!("Set {} to {}", canonical, number))
            }
            Err(e) => TransportResponse::failure(e.to_string()),
        }
    }

    fn parameters(&self) -> TransportResponse {
        let rows: Vec<Value> = self
            .simulator
            .parameters()
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();
        let mut data = ValueMap::new();
        data.insert("parameters".to_string(), Value::Array(rows));
        TransportResponse::ok(data)
    }

    fn tools(&self) -> TransportResponse {
        let rows: Vec<Value> = self
            .simulator
            .tools()
            .iter()
            .filter_map(|tool| serde_json::to_value(tool).ok())
            .collect();
        let mut data = ValueMap::new();
        data.insert("tools".to_string(), Value::Array(rows));
        TransportResponse::ok(data)
    }
}

#[async_trait]
impl Transport for VirtualTransport {
    fn name(&self) -> &str {
        "virtual"
    }

    async fn invoke(
        &self,
        endpoint: &str,
        request: &ValueMap,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        tracing::debug!("virtual: {} {:?}", endpoint, request);

        let response = match endpoint {
            endpoints::EXECUTE => return self.execute(request, cancel).await,
            endpoints::GET_STATUS => {
                TransportResponse::ok(self.simulator.sample_status().to_value_map())
            }
            endpoints::GET_PARAMETERS => self.parameters(),
            endpoints::SET_PARAMETER => self.set_parameter(request),
            endpoints::GET_TOOLS => self.tools(),
            endpoints::RESET => {
                self.simulator.reset();
                self.status_response().with_message("Alarm cleared")
            }
            endpoints::ESTOP => {
                self.simulator.emergency_stop();
                self.status_response().with_message("Emergency stop triggered")
            }
            endpoints::FEED_HOLD => {
                let state = self.simulator.feed_hold();
                self.status_response().with_message(format!("State: {}", state))
            }
            other => TransportResponse::failure(format!("Unknown endpoint: {}", other)),
        };
        Ok(response)
    }

    fn subscribe(&self, endpoint: &str, cancel: CancellationToken) -> mpsc::Receiver<TransportResponse> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        if endpoint != endpoints::GET_STATUS {
            let message = format!("Endpoint {} does not support streaming", endpoint);
            tokio::spawn(async move {
                let _ = tx.send(TransportResponse::failure(message)).await;
            });
            return rx;
        }

        let simulator = self.simulator.clone();
        let period = self.status_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = TransportResponse::ok(simulator.sample_status().to_value_map());
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("virtual: status stream closed");
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cncterm_settings::MachineSettings;

    fn transport() -> VirtualTransport {
        let settings = MachineSettings {
            motion_steps: 2,
            step_interval_ms: 1,
            ..MachineSettings::default()
        };
        VirtualTransport::new(MachineSimulator::new(&settings), Duration::from_millis(5))
    }

    fn request(pairs: &[(&str, Value)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_set_parameter_accepts_string_values() {
        let t = transport();
        let token = CancellationToken::new();
        let resp = t
            .invoke(
                endpoints::SET_PARAMETER,
                &request(&[("key", json!("x_max")), ("value", json!("300"))]),
                &token,
            )
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!(resp.message(), Some("Set X_MAX to 300"));
        assert_eq!(t.simulator().parameters().get("X_MAX"), Some(300.0));
    }

    #[tokio::test]
    async fn test_set_unknown_parameter_fails() {
        let t = transport();
        let resp = t
            .invoke(
                endpoints::SET_PARAMETER,
                &request(&[("key", json!("W_MAX")), ("value", json!(1))]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error_message(), "Parameter W_MAX not found");
    }

    #[tokio::test]
    async fn test_set_non_numeric_value_fails() {
        let t = transport();
        let resp = t
            .invoke(
                endpoints::SET_PARAMETER,
                &request(&[("key", json!("X_MAX")), ("value", json!("wide"))]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error_message(), "Invalid value for X_MAX: wide");
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let t = transport();
        let resp = t
            .invoke("teleport", &ValueMap::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error_message(), "Unknown endpoint: teleport");
    }

    #[tokio::test]
    async fn test_tools_and_parameters_listing() {
        let t = transport();
        let token = CancellationToken::new();

        let tools = t.invoke(endpoints::GET_TOOLS, &ValueMap::new(), &token).await.unwrap();
        let rows = tools.data["tools"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["description"], "End Mill 6mm");

        let params = t
            .invoke(endpoints::GET_PARAMETERS, &ValueMap::new(), &token)
            .await
            .unwrap();
        let names: Vec<&str> = params.data["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|row| row["name"].as_str())
            .collect();
        assert_eq!(names, vec!["DEFAULT_FEED", "MAX_SPINDLE", "X_MAX", "Y_MAX", "Z_MAX"]);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let t = transport();
        let token = CancellationToken::new();
        token.cancel();
        let err = t
            .invoke(endpoints::GET_STATUS, &ValueMap::new(), &token)
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Cancelled);
    }

    #[tokio::test]
    async fn test_non_status_subscription_yields_one_failure() {
        let t = transport();
        let mut rx = t.subscribe(endpoints::GET_TOOLS, CancellationToken::new());
        let first = rx.recv().await.unwrap();
        assert!(!first.success);
        assert!(rx.recv().await.is_none());
    }
}
