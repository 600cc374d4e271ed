//! Primary self-hosted backend: a local OpenAI-compatible server
//! (LM Studio, llama.cpp server, vLLM)

use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::chat;
use crate::config::{DEFAULT_PROBE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use crate::pricing::default_max_tokens;
use crate::provider::{Backend, BackendError, BackendKind, RouteResult};
use crate::task::Task;

pub const DEFAULT_LOCAL_URL: &str = "http://localhost:1234";
pub const DEFAULT_LOCAL_MODEL: &str = "qwen2.5-coder-7b-instruct";

/// Zero-cost backend reached over the chat completions protocol
#[derive(Debug, Clone)]
pub struct LocalChatBackend {
    name: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    probe_timeout: Duration,
}

impl LocalChatBackend {
    pub fn new(name: &str, base_url: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_tokens: default_max_tokens(model),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Create with the default LM Studio address and model
    pub fn localhost(name: &str) -> Self {
        Self::new(name, DEFAULT_LOCAL_URL, DEFAULT_LOCAL_MODEL)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }
}

#[async_trait]
impl Backend for LocalChatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::LocalChat
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn estimate_cost(&self, _tokens: u64) -> f64 {
        0.0
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let url = format!("{}/v1/models", self.base_url);
        chat::probe_get(&url, None, self.probe_timeout)
            .await
            .map_err(|e| {
                tracing::debug!(backend = %self.name, error = %e, "Model list probe failed");
                BackendError::Unavailable
            })
    }

    async fn execute(&self, task: &Task) -> RouteResult {
        let start = Instant::now();
        match chat::complete(&self.base_url, &self.model, None, task, self.timeout).await {
            Ok(completion) => {
                tracing::debug!(
                    backend = %self.name,
                    served_by = completion.model.as_deref().unwrap_or(&self.model),
                    tokens = completion.tokens_used,
                    "Local chat completion finished"
                );
                RouteResult::success(
                    &self.name,
                    &self.model,
                    completion.content,
                    completion.tokens_used,
                    0.0,
                    start.elapsed(),
                )
            }
            Err(e) => {
                tracing::warn!(
                    backend = %self.name,
                    category = e.category(),
                    error = %e,
                    "Local chat request failed"
                );
                RouteResult::failure(&self.name, &self.model, &e, start.elapsed())
            }
        }
    }
}
