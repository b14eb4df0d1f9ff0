//! Read-only system status projection for dashboards.
//!
//! Carries no credentials, only provider names and counts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::traits::{ProviderId, RoutingMode};

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// At least one provider is available.
    Operational,
    /// No provider is available.
    Offline,
}

impl ServiceStatus {
    /// `Operational` when `available_providers > 0`.
    pub fn from_available(available_providers: usize) -> Self {
        if available_providers > 0 {
            Self::Operational
        } else {
            Self::Offline
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operational => f.write_str("operational"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// Snapshot returned by `Router::system_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Routing mode at the time of the snapshot.
    pub mode: RoutingMode,
    /// Providers with a credential.
    pub enabled_providers: Vec<ProviderId>,
    /// Providers the router will offer to the orchestrator.
    pub available_providers: Vec<ProviderId>,
    /// Number of models in the registry.
    pub total_models: usize,
    /// Overall health.
    pub status: ServiceStatus,
}
