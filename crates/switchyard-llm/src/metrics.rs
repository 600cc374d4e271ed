//! Routing counters with Prometheus text export

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Success/failure counts for one backend
#[derive(Debug, Default)]
pub struct BackendCounters {
    successes: AtomicU64,
    failures: AtomicU64,
}

impl BackendCounters {
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Router-wide counters.
///
/// The per-backend map is fixed at construction, like the registry it mirrors,
/// so recording never takes a lock.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Calls to `route`
    pub routes: AtomicU64,
    /// Calls that ended with a success
    pub routes_succeeded: AtomicU64,
    /// Successes served by a fallback candidate rather than the preferred backend
    pub fallbacks_served: AtomicU64,
    /// Calls that exhausted every candidate
    pub routes_exhausted: AtomicU64,
    /// Backend attempts, including short-circuited ones
    pub attempts: AtomicU64,
    /// Tokens reported by successful attempts
    pub tokens_used: AtomicU64,
    backends: BTreeMap<String, BackendCounters>,
}

impl RouterMetrics {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            backends: names
                .into_iter()
                .map(|name| (name.to_string(), BackendCounters::default()))
                .collect(),
            ..Self::default()
        }
    }

    /// Record one backend attempt
    pub fn record_attempt(&self, backend: &str, success: bool, tokens: u64) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if success {
            self.tokens_used.fetch_add(tokens, Ordering::Relaxed);
        }
        if let Some(counters) = self.backends.get(backend) {
            let counter = if success {
                &counters.successes
            } else {
                &counters.failures
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record the end of a `route` call
    pub fn record_route(&self, success: bool, via_fallback: bool) {
        self.routes.fetch_add(1, Ordering::Relaxed);
        if success {
            self.routes_succeeded.fetch_add(1, Ordering::Relaxed);
            if via_fallback {
                self.fallbacks_served.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            self.routes_exhausted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn backend(&self, name: &str) -> Option<&BackendCounters> {
        self.backends.get(name)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            routes: self.routes.load(Ordering::Relaxed),
            routes_succeeded: self.routes_succeeded.load(Ordering::Relaxed),
            fallbacks_served: self.fallbacks_served.load(Ordering::Relaxed),
            routes_exhausted: self.routes_exhausted.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            tokens_used: self.tokens_used.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub routes: u64,
    pub routes_succeeded: u64,
    pub fallbacks_served: u64,
    pub routes_exhausted: u64,
    pub attempts: u64,
    pub tokens_used: u64,
}

impl MetricsSnapshot {
    /// Export metrics in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        push_counter(&mut output, "switchyard_routes_total", "Total number of routed tasks", self.routes);
        push_counter(
            &mut output,
            "switchyard_routes_succeeded_total",
            "Routed tasks that ended with a successful backend",
            self.routes_succeeded,
        );
        push_counter(
            &mut output,
            "switchyard_fallbacks_served_total",
            "Successful tasks served by a fallback backend",
            self.fallbacks_served,
        );
        push_counter(
            &mut output,
            "switchyard_routes_exhausted_total",
            "Routed tasks where every backend failed",
            self.routes_exhausted,
        );
        push_counter(&mut output, "switchyard_attempts_total", "Backend attempts", self.attempts);
        push_counter(
            &mut output,
            "switchyard_tokens_used_total",
            "Tokens reported by successful attempts",
            self.tokens_used,
        );

        let exhaustion_rate = if self.routes > 0 {
            self.routes_exhausted as f64 / self.routes as f64
        } else {
            0.0
        };
        output.push_str("# HELP switchyard_exhaustion_rate Share of routed tasks where every backend failed\n");
        output.push_str("# TYPE switchyard_exhaustion_rate gauge\n");
        output.push_str(&format!("switchyard_exhaustion_rate {:.4}\n", exhaustion_rate));

        output
    }
}

fn push_counter(output: &mut String, name: &str, help: &str, value: u64) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    output.push_str(&format!("{} {}\n", name, value));
}
