//! Read-only view of the router for monitoring

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metrics::MetricsSnapshot;
use crate::provider::BackendKind;

/// State of one registered backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub kind: BackendKind,
    pub available: bool,
    pub max_tokens: u32,
    pub model_id: String,
    pub successes: u64,
    pub failures: u64,
}

/// Router-wide status, as returned by [`crate::Router::status`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterStatus {
    pub backends: BTreeMap<String, BackendStatus>,
    pub spend: f64,
    pub cost_budget: f64,
    /// `cost_budget - spend`, read under the same lock as `spend`
    pub budget_remaining: f64,
    pub fallback_order: Vec<String>,
    pub metrics: MetricsSnapshot,
    pub generated_at: DateTime<Utc>,
}

impl RouterStatus {
    pub fn available_backends(&self) -> Vec<&str> {
        self.backends
            .iter()
            .filter(|(_, status)| status.available)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
