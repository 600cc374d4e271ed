//! Backend trait, result envelope and the failure taxonomy shared by every backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::task::Task;

/// Backend id and model id reported by the terminal envelope
pub const NO_BACKEND: &str = "none";

/// Errors a backend attempt can end with.
///
/// None of these ever escape [`Backend::execute`] or [`crate::Router::route`]; they are
/// folded into a failed [`RouteResult`] and logged with their [`category`](Self::category).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("Provider not available")]
    Unavailable,
    #[error("API credential not configured for backend '{0}'")]
    AuthMissing(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Budget exhausted: spend {spend:.6} of {ceiling:.6}")]
    BudgetExhausted { spend: f64, ceiling: f64 },
    #[error("All providers failed")]
    Exhausted,
}

impl BackendError {
    /// Stable label used in logs and attempt traces
    pub fn category(&self) -> &'static str {
        match self {
            BackendError::Unavailable => "provider_unavailable",
            BackendError::AuthMissing(_) => "provider_auth_missing",
            BackendError::Http { .. } => "provider_http_error",
            BackendError::Transport(_) => "provider_transport_error",
            BackendError::InvalidResponse(_) => "provider_invalid_response",
            BackendError::BudgetExhausted { .. } => "budget_exhausted",
            BackendError::Exhausted => "all_providers_exhausted",
        }
    }

    /// Map a reqwest failure, keeping timeouts distinguishable in the message
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            BackendError::Transport(format!("request timed out after {}s", timeout.as_secs()))
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// The three backend roles the router knows how to select between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Primary self-hosted server speaking the OpenAI chat protocol
    LocalChat,
    /// Secondary self-hosted Ollama server
    Ollama,
    /// Remote pay-per-token API
    Metered,
}

impl BackendKind {
    pub fn is_metered(self) -> bool {
        matches!(self, BackendKind::Metered)
    }

    pub fn is_self_hosted(self) -> bool {
        !self.is_metered()
    }
}

/// One entry of the attempt trace recorded by the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub backend_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Uniform outcome of a routed task.
///
/// `success == false` always carries empty `content` and a non-empty `error`;
/// `success == true` never carries an error. The constructors enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Generated text (empty on failure)
    pub content: String,
    /// Name of the backend that produced this envelope, or `"none"`
    pub backend_id: String,
    /// Model that served the request, or `"none"`
    pub model_id: String,
    /// Tokens consumed as reported by the backend, or estimated from the content
    pub tokens_used: u64,
    /// Estimated spend for this attempt
    pub cost_estimate: f64,
    /// Wall-clock time spent, in milliseconds
    pub latency_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure category of `error`, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Every backend attempt made while routing, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<Attempt>,
}

impl RouteResult {
    pub fn success(
        backend_id: &str,
        model_id: &str,
        content: String,
        tokens_used: u64,
        cost_estimate: f64,
        latency: Duration,
    ) -> Self {
        Self {
            content,
            backend_id: backend_id.to_string(),
            model_id: model_id.to_string(),
            tokens_used,
            cost_estimate: cost_estimate.max(0.0),
            latency_ms: latency.as_millis() as u64,
            success: true,
            error: None,
            category: None,
            attempts: Vec::new(),
        }
    }

    pub fn failure(backend_id: &str, model_id: &str, error: &BackendError, latency: Duration) -> Self {
        Self {
            content: String::new(),
            backend_id: backend_id.to_string(),
            model_id: model_id.to_string(),
            tokens_used: 0,
            cost_estimate: 0.0,
            latency_ms: latency.as_millis() as u64,
            success: false,
            error: Some(error.to_string()),
            category: Some(error.category().to_string()),
            attempts: Vec::new(),
        }
    }

    /// Terminal envelope returned when no candidate succeeded
    pub fn exhausted(latency: Duration, attempts: Vec<Attempt>) -> Self {
        let mut result = Self::failure(NO_BACKEND, NO_BACKEND, &BackendError::Exhausted, latency);
        result.attempts = attempts;
        result
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// Trace entry describing this envelope
    pub fn as_attempt(&self) -> Attempt {
        Attempt {
            backend_id: self.backend_id.clone(),
            success: self.success,
            error: self.error.clone(),
            category: self.category.clone(),
        }
    }
}

/// Token count used when a backend reports no usage block
pub fn estimate_tokens(content: &str) -> u64 {
    (content.chars().count() / 4) as u64
}

/// Capability every routable backend implements
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Registry name, reported as `backend_id`
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    fn model_id(&self) -> &str;

    /// Context ceiling for the configured model
    fn max_tokens(&self) -> u32;

    /// Estimated spend for `tokens` tokens. Pure and never negative.
    fn estimate_cost(&self, tokens: u64) -> f64;

    /// Bounded liveness check reporting why the backend cannot serve
    async fn probe(&self) -> Result<(), BackendError>;

    /// Check if the backend can take work right now
    async fn is_available(&self) -> bool {
        self.probe().await.is_ok()
    }

    /// Run the task. Failures come back as a `success == false` envelope.
    async fn execute(&self, task: &Task) -> RouteResult;
}
