//! Latest machine status, filled by a background task.
//!
//! Readers take the read lock and get a clone; the only writer is the
//! subscription task started by [`StatusCache::spawn`].

use crate::transport::Transport;
use chrono::{DateTime, Utc};
use cncterm_core::{thread_safe_rw, MachineStatus, ThreadSafeRw};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
struct Snapshot {
    status: MachineStatus,
    updated_at: Option<DateTime<Utc>>,
}

/// Shared cache of the most recent status snapshot
#[derive(Debug, Clone, Default)]
pub struct StatusCache {
    latest: ThreadSafeRw<Snapshot>,
}

impl StatusCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            latest: thread_safe_rw(Snapshot::default()),
        }
    }

    /// Clone of the latest snapshot
    pub fn latest(&self) -> MachineStatus {
        self.latest.read().status.clone()
    }

    /// When the latest snapshot arrived; `None` before the first update
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.latest.read().updated_at
    }

    /// Whether any snapshot has arrived yet
    pub fn is_populated(&self) -> bool {
        self.latest.read().updated_at.is_some()
    }

    /// Replace the snapshot
    pub fn update(&self, status: MachineStatus) {
        let mut latest = self.latest.write();
        latest.status = status;
        latest.updated_at = Some(Utc::now());
    }

    /// Start a task that streams `endpoint` into the cache until `cancel` fires.
    pub fn spawn(
        &self,
        transport: Arc<dyn Transport>,
        endpoint: &str,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        let endpoint = endpoint.to_string();
        let mut rx = transport.subscribe(&endpoint, cancel.clone());
        tokio::spawn(async move {
            tracing::debug!("Status cache following {} on {}", endpoint, transport.name());
            loop {
                let response = tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(response) => response,
                        None => break,
                    },
                };

                if !response.success {
                    tracing::warn!("Status update failed: {}", response.error_message());
                    continue;
                }
                match MachineStatus::from_value_map(&response.data) {
                    Some(status) => cache.update(status),
                    None => tracing::warn!("Ignoring malformed status payload"),
                }
            }
            tracing::debug!("Status cache stopped");
        })
    }
}
