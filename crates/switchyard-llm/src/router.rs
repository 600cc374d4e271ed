//! Router - backend selection, fallback walk and budget accounting
//!
//! A call to [`Router::route`] moves through
//! `Selecting -> Attempting(preferred) -> {Success | FallbackWalking} -> {Success | Exhausted}`.
//! Attempts inside one call are strictly sequential and no backend is attempted twice.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::budget::{Budget, BudgetSnapshot, SECURITY_HEADROOM};
use crate::config::{ConfigError, RouterConfig, DEFAULT_COST_BUDGET};
use crate::metrics::RouterMetrics;
use crate::provider::{Attempt, Backend, BackendError, BackendKind, RouteResult, NO_BACKEND};
use crate::status::{BackendStatus, RouterStatus};
use crate::task::{Task, TaskKind};

/// Content length, in characters, above which only self-hosted backends are preferred
pub const LARGE_TASK_THRESHOLD: usize = 50_000;

/// Registry names holding each selection role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Roles {
    primary: Option<String>,
    secondary: Option<String>,
    metered: Option<String>,
}

impl Roles {
    /// First registered backend of each kind, in name order
    fn resolve(registry: &BTreeMap<String, Arc<dyn Backend>>) -> Self {
        let first_of = |kind: BackendKind| {
            registry
                .iter()
                .find(|(_, backend)| backend.kind() == kind)
                .map(|(name, _)| name.clone())
        };
        Self {
            primary: first_of(BackendKind::LocalChat),
            secondary: first_of(BackendKind::Ollama),
            metered: first_of(BackendKind::Metered),
        }
    }
}

/// Multi-backend orchestrator.
///
/// Share it between tasks with `Arc<Router>`; the registry is immutable after
/// construction and the spend counter is internally synchronised.
#[derive(Debug)]
pub struct Router {
    registry: BTreeMap<String, Arc<dyn Backend>>,
    fallback_order: Vec<String>,
    budget: Budget,
    roles: Roles,
    metrics: RouterMetrics,
}

impl Router {
    /// Build every configured backend and wrap them in a router
    pub fn from_config(config: &RouterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut builder = Self::builder()
            .fallback_order(config.fallback_order.clone())
            .cost_budget(config.cost_budget);
        for backend in config.build_backends() {
            builder = builder.backend(backend);
        }
        Ok(builder.build())
    }

    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Route a task to one backend, falling back as configured.
    ///
    /// Always returns exactly one envelope; callers branch on `success`.
    pub async fn route(&self, task: &Task) -> RouteResult {
        let span = tracing::info_span!(
            "route",
            route_id = %Uuid::new_v4(),
            kind = ?task.kind(),
            content_len = task.content_chars()
        );
        self.route_inner(task).instrument(span).await
    }

    async fn route_inner(&self, task: &Task) -> RouteResult {
        let start = Instant::now();
        let mut attempts: Vec<Attempt> = Vec::new();

        match self.preferred_backend(task).await {
            Some(name) => {
                tracing::debug!(backend = %name, "Selected preferred backend");
                let result = self.attempt(&name, task).await;
                if let Some(done) = self.settle(&name, result, &mut attempts, false) {
                    return done;
                }
            }
            None => tracing::debug!("No preferred backend registered, walking fallback order"),
        }

        for name in &self.fallback_order {
            if attempts.iter().any(|a| &a.backend_id == name) {
                continue;
            }
            if !self.registry.contains_key(name) {
                tracing::debug!(backend = %name, "Skipping unregistered fallback backend");
                continue;
            }
            let result = self.attempt(name, task).await;
            if let Some(done) = self.settle(name, result, &mut attempts, true) {
                return done;
            }
        }

        tracing::error!(attempts = attempts.len(), "All providers failed");
        self.metrics.record_route(false, false);
        RouteResult::exhausted(start.elapsed(), attempts)
    }

    /// Apply the selection rules and name the backend to try first.
    ///
    /// Rules, first match wins:
    /// 1. security task, metered backend registered, spend under 80% of the ceiling
    /// 2. content over [`LARGE_TASK_THRESHOLD`]: first available self-hosted backend
    /// 3. first available of primary, secondary, metered (metered skipped once the budget is
    ///    spent, or for security tasks once spend passes the headroom)
    /// 4. the primary backend, even if its availability is unconfirmed
    ///
    /// Large tasks and security tasks past the headroom never start on the metered backend;
    /// it can still serve them from the fallback walk.
    pub async fn preferred_backend(&self, task: &Task) -> Option<String> {
        let within_headroom = self.budget.is_below(SECURITY_HEADROOM);
        if task.kind() == TaskKind::Security && within_headroom {
            if let Some(metered) = &self.roles.metered {
                return Some(metered.clone());
            }
        }

        let self_hosted = [&self.roles.primary, &self.roles.secondary];

        if task.content_chars() > LARGE_TASK_THRESHOLD {
            for name in self_hosted.into_iter().flatten() {
                if self.is_available(name).await {
                    return Some(name.clone());
                }
            }
            return self.roles.primary.clone().or_else(|| self.roles.secondary.clone());
        }

        for name in self_hosted.into_iter().flatten() {
            if self.is_available(name).await {
                return Some(name.clone());
            }
        }
        let metered_allowed = !self.budget.is_exhausted()
            && (task.kind() != TaskKind::Security || within_headroom);
        if let Some(metered) = &self.roles.metered {
            if metered_allowed && self.is_available(metered).await {
                return Some(metered.clone());
            }
        }

        self.roles.primary.clone()
    }

    async fn is_available(&self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(backend) => backend.is_available().await,
            None => false,
        }
    }

    /// One attempt against `name`; never calls `execute` on an unusable backend
    async fn attempt(&self, name: &str, task: &Task) -> RouteResult {
        let Some(backend) = self.registry.get(name) else {
            return RouteResult::failure(name, NO_BACKEND, &BackendError::Unavailable, Duration::ZERO);
        };

        if backend.kind().is_metered() && self.budget.is_exhausted() {
            let budget = self.budget.snapshot();
            let error = BackendError::BudgetExhausted {
                spend: budget.spend,
                ceiling: budget.ceiling,
            };
            return RouteResult::failure(name, backend.model_id(), &error, Duration::ZERO);
        }

        let start = Instant::now();
        if let Err(error) = backend.probe().await {
            return RouteResult::failure(name, backend.model_id(), &error, start.elapsed());
        }

        backend.execute(task).await
    }

    /// Record an attempt; on success charge the budget and hand back the final envelope
    fn settle(
        &self,
        name: &str,
        mut result: RouteResult,
        attempts: &mut Vec<Attempt>,
        via_fallback: bool,
    ) -> Option<RouteResult> {
        let mut attempt = result.as_attempt();
        attempt.backend_id = name.to_string();
        attempts.push(attempt);
        self.metrics
            .record_attempt(name, result.success, result.tokens_used);

        if !result.success {
            tracing::warn!(
                backend = %name,
                category = result.category.as_deref().unwrap_or("unknown"),
                error = result.error.as_deref().unwrap_or(""),
                "Backend attempt failed"
            );
            return None;
        }

        let metered = self
            .registry
            .get(name)
            .map(|b| b.kind().is_metered())
            .unwrap_or(false);
        if metered {
            let spend = self.budget.record(result.cost_estimate);
            tracing::info!(
                backend = %name,
                cost = result.cost_estimate,
                spend,
                ceiling = self.budget.ceiling(),
                "Recorded metered spend"
            );
        }

        tracing::info!(
            backend = %name,
            model = %result.model_id,
            tokens = result.tokens_used,
            latency_ms = result.latency_ms,
            via_fallback,
            "Task routed"
        );
        self.metrics.record_route(true, via_fallback);
        result.attempts = std::mem::take(attempts);
        Some(result)
    }

    /// Probe every backend concurrently and report router state
    pub async fn status(&self) -> RouterStatus {
        let probes = self.registry.iter().map(|(name, backend)| async move {
            (name.clone(), backend.is_available().await)
        });
        let availability: BTreeMap<String, bool> = join_all(probes).await.into_iter().collect();

        let backends = self
            .registry
            .iter()
            .map(|(name, backend)| {
                let (successes, failures) = self
                    .metrics
                    .backend(name)
                    .map(|c| (c.successes(), c.failures()))
                    .unwrap_or_default();
                let status = BackendStatus {
                    kind: backend.kind(),
                    available: availability.get(name).copied().unwrap_or(false),
                    max_tokens: backend.max_tokens(),
                    model_id: backend.model_id().to_string(),
                    successes,
                    failures,
                };
                (name.clone(), status)
            })
            .collect();

        let budget = self.budget.snapshot();
        RouterStatus {
            backends,
            spend: budget.spend,
            cost_budget: budget.ceiling,
            budget_remaining: budget.remaining,
            fallback_order: self.fallback_order.clone(),
            metrics: self.metrics.snapshot(),
            generated_at: chrono::Utc::now(),
        }
    }

    pub fn budget(&self) -> BudgetSnapshot {
        self.budget.snapshot()
    }

    pub fn spend(&self) -> f64 {
        self.budget.spend()
    }

    pub fn fallback_order(&self) -> &[String] {
        &self.fallback_order
    }

    pub fn backend(&self, name: &str) -> Option<&Arc<dyn Backend>> {
        self.registry.get(name)
    }

    pub fn backend_names(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }

    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }
}

/// Builder for [`Router`]
#[derive(Debug)]
pub struct RouterBuilder {
    backends: Vec<Arc<dyn Backend>>,
    fallback_order: Vec<String>,
    cost_budget: f64,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            fallback_order: Vec::new(),
            cost_budget: DEFAULT_COST_BUDGET,
        }
    }

    /// Register a backend under its own name; a later backend with the same name replaces it
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn fallback_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn cost_budget(mut self, budget: f64) -> Self {
        self.cost_budget = budget;
        self
    }

    pub fn build(self) -> Router {
        let mut registry: BTreeMap<String, Arc<dyn Backend>> = BTreeMap::new();
        for backend in self.backends {
            let name = backend.name().to_string();
            if registry.insert(name.clone(), backend).is_some() {
                tracing::warn!(backend = %name, "Duplicate backend name, keeping the last one");
            }
        }

        let roles = Roles::resolve(&registry);
        tracing::debug!(?roles, "Resolved backend roles");
        let metrics = RouterMetrics::new(registry.keys().map(String::as_str));

        Router {
            registry,
            fallback_order: self.fallback_order,
            budget: Budget::new(self.cost_budget),
            roles,
            metrics,
        }
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
