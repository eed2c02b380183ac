//! Health reporting over the snapshot store.

use crate::store::{EndpointState, SnapshotStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Overall system health status.
///
/// Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub version: &'static str,
    pub subsystems: Vec<SubsystemHealth>,
}

/// Health of one monitored endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemHealth {
    /// `username@url` of the endpoint.
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// Derives health from the state of every known endpoint.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    store: Arc<SnapshotStore>,
}

impl HealthChecker {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Get overall health status.
    ///
    /// An endpoint still waiting for its first snapshot is degraded; a failed
    /// one is unhealthy. The overall status is the worst endpoint status.
    pub fn get_health(&self) -> HealthCheck {
        let subsystems: Vec<SubsystemHealth> = self
            .store
            .endpoints()
            .into_iter()
            .map(|summary| {
                let (status, message) = match summary.state {
                    EndpointState::Ready => (HealthStatus::Healthy, None),
                    EndpointState::Pending => {
                        (HealthStatus::Degraded, Some("Waiting for first snapshot".to_string()))
                    }
                    EndpointState::Failed(message) => (HealthStatus::Unhealthy, message),
                };
                SubsystemHealth {
                    name: format!("{}@{}", summary.key.username, summary.key.url),
                    status,
                    message,
                }
            })
            .collect();

        let status = subsystems.iter().map(|s| s.status).max().unwrap_or(HealthStatus::Healthy);
        HealthCheck { status, version: env!("CARGO_PKG_VERSION"), subsystems }
    }

    /// Simple liveness check - is the process alive?
    pub fn is_alive(&self) -> bool {
        true
    }

    /// Readiness check - does every endpoint have a snapshot?
    pub fn is_ready(&self) -> bool {
        self.get_health().status == HealthStatus::Healthy
    }
}
