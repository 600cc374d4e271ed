//! Mock backend for testing and offline demos

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::pricing::{ModelPrice, DEFAULT_MAX_TOKENS};
use crate::provider::{Backend, BackendError, BackendKind, RouteResult};
use crate::task::Task;

/// A scripted backend that can play any [`BackendKind`].
///
/// Availability can be flipped at runtime; every call to `execute` is counted.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    kind: BackendKind,
    model: String,
    /// Canned responses (cycles through them)
    responses: Vec<String>,
    /// Current response index
    index: AtomicUsize,
    available: AtomicBool,
    /// When set, every execution fails with this error
    failure: Option<BackendError>,
    /// Tokens reported per successful call
    tokens: u64,
    price: Option<ModelPrice>,
    /// Simulated latency
    latency: Duration,
    executions: AtomicUsize,
}

impl MockBackend {
    /// Create an available mock that answers with a canned response
    pub fn new(name: &str, kind: BackendKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            model: format!("mock-{}", name),
            responses: vec!["Mock analysis complete. No issues found.".to_string()],
            index: AtomicUsize::new(0),
            available: AtomicBool::new(true),
            failure: None,
            tokens: 100,
            price: None,
            latency: Duration::ZERO,
            executions: AtomicUsize::new(0),
        }
    }

    /// Create a mock whose probe always fails
    pub fn unavailable(name: &str, kind: BackendKind) -> Self {
        let mock = Self::new(name, kind);
        mock.set_available(false);
        mock
    }

    /// Create an available mock whose executions always fail
    pub fn failing(name: &str, kind: BackendKind, error: BackendError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(name, kind)
        }
    }

    pub fn with_responses(mut self, responses: Vec<String>) -> Self {
        if !responses.is_empty() {
            self.responses = responses;
        }
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }

    /// Bill executions at `price`; only meaningful for metered mocks
    pub fn with_price(mut self, price: ModelPrice) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of times `execute` has been called
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        DEFAULT_MAX_TOKENS
    }

    fn estimate_cost(&self, tokens: u64) -> f64 {
        match (self.kind, self.price) {
            (BackendKind::Metered, Some(price)) => price.estimate(tokens),
            _ => 0.0,
        }
    }

    async fn probe(&self) -> Result<(), BackendError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else if self.kind.is_metered() {
            Err(BackendError::AuthMissing(self.name.clone()))
        } else {
            Err(BackendError::Unavailable)
        }
    }

    async fn execute(&self, _task: &Task) -> RouteResult {
        let start = Instant::now();
        self.executions.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(error) = &self.failure {
            return RouteResult::failure(&self.name, &self.model, error, start.elapsed());
        }

        let idx = self.index.fetch_add(1, Ordering::Relaxed);
        let content = self.responses[idx % self.responses.len()].clone();

        RouteResult::success(
            &self.name,
            &self.model,
            content,
            self.tokens,
            self.estimate_cost(self.tokens),
            start.elapsed(),
        )
    }
}
