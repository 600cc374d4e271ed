//! Secondary self-hosted backend: Ollama's generate API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::chat::{http_client, probe_get, truncate};
use crate::config::{DEFAULT_PROBE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use crate::pricing::default_max_tokens;
use crate::provider::{estimate_tokens, Backend, BackendError, BackendKind, RouteResult};
use crate::task::Task;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";

/// Ollama API request format
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format
#[derive(Debug, Deserialize)]
struct OllamaApiResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

impl OllamaApiResponse {
    fn tokens_used(&self) -> u64 {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => estimate_tokens(&self.response),
            (prompt, eval) => prompt.unwrap_or(0) + eval.unwrap_or(0),
        }
    }
}

/// Zero-cost backend for a local Ollama daemon
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    name: String,
    /// Base URL for Ollama API
    base_url: String,
    /// Model to use (e.g., "llama3.1", "qwen2.5-coder", "codellama")
    model: String,
    max_tokens: u32,
    timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaBackend {
    /// Create a backend pointed at the default local daemon
    pub fn new(name: &str, model: &str) -> Self {
        Self::with_url(name, DEFAULT_OLLAMA_URL, model)
    }

    /// Create with custom base URL
    pub fn with_url(name: &str, base_url: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_tokens: default_max_tokens(model),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
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

    async fn generate(&self, task: &Task) -> Result<OllamaApiResponse, BackendError> {
        let url = format!("{}/api/generate", self.base_url);

        let ollama_request = OllamaRequest {
            model: &self.model,
            prompt: task.render_prompt(),
            system: task.system_prompt(),
            stream: false,
            options: OllamaOptions {
                temperature: task.temperature(),
                num_predict: task.max_output_tokens(),
            },
        };

        let response = http_client(self.timeout)?
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status,
                body: truncate(&body, 500),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout))?;
        serde_json::from_str(&text).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
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
        let url = format!("{}/api/tags", self.base_url);
        probe_get(&url, None, self.probe_timeout).await.map_err(|e| {
            tracing::debug!(backend = %self.name, error = %e, "Tag list probe failed");
            BackendError::Unavailable
        })
    }

    async fn execute(&self, task: &Task) -> RouteResult {
        let start = Instant::now();
        match self.generate(task).await {
            Ok(api_response) => {
                let tokens = api_response.tokens_used();
                RouteResult::success(
                    &self.name,
                    &self.model,
                    api_response.response,
                    tokens,
                    0.0,
                    start.elapsed(),
                )
            }
            Err(e) => {
                tracing::warn!(
                    backend = %self.name,
                    category = e.category(),
                    error = %e,
                    "Ollama request failed"
                );
                RouteResult::failure(&self.name, &self.model, &e, start.elapsed())
            }
        }
    }
}
