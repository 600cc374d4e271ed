//! Metered remote backend: a pay-per-token OpenAI-compatible API

use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::chat;
use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::pricing::{default_max_tokens, price_for, ModelPrice};
use crate::provider::{Backend, BackendError, BackendKind, RouteResult};
use crate::task::Task;

pub const DEFAULT_REMOTE_URL: &str = "https://api.openai.com";
pub const DEFAULT_REMOTE_MODEL: &str = "gpt-4o";

/// Remote backend billed per token.
///
/// Availability is the presence of a credential; it never touches the network to check.
#[derive(Clone)]
pub struct MeteredBackend {
    name: String,
    base_url: String,
    model: String,
    credential: Option<String>,
    price: ModelPrice,
    max_tokens: u32,
    timeout: Duration,
}

impl MeteredBackend {
    pub fn new(name: &str, base_url: &str, model: &str, credential: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            credential: credential.filter(|c| !c.trim().is_empty()),
            price: price_for(model),
            max_tokens: default_max_tokens(model),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create against the OpenAI API with the default model
    pub fn openai(name: &str, credential: Option<String>) -> Self {
        Self::new(name, DEFAULT_REMOTE_URL, DEFAULT_REMOTE_MODEL, credential)
    }

    /// Override the price table entry for this model
    pub fn with_price(mut self, price: ModelPrice) -> Self {
        self.price = price;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    fn credential(&self) -> Result<&str, BackendError> {
        self.credential
            .as_deref()
            .ok_or_else(|| BackendError::AuthMissing(self.name.clone()))
    }
}

impl std::fmt::Debug for MeteredBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteredBackend")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("price", &self.price)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Backend for MeteredBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Metered
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn estimate_cost(&self, tokens: u64) -> f64 {
        self.price.estimate(tokens)
    }

    async fn probe(&self) -> Result<(), BackendError> {
        self.credential().map(|_| ())
    }

    async fn execute(&self, task: &Task) -> RouteResult {
        let start = Instant::now();
        let outcome = match self.credential() {
            Ok(token) => {
                chat::complete(&self.base_url, &self.model, Some(token), task, self.timeout).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(completion) => {
                let cost = self.estimate_cost(completion.tokens_used);
                tracing::debug!(
                    backend = %self.name,
                    tokens = completion.tokens_used,
                    cost,
                    "Metered completion finished"
                );
                RouteResult::success(
                    &self.name,
                    &self.model,
                    completion.content,
                    completion.tokens_used,
                    cost,
                    start.elapsed(),
                )
            }
            Err(e) => {
                tracing::warn!(
                    backend = %self.name,
                    category = e.category(),
                    error = %e,
                    "Metered request failed"
                );
                RouteResult::failure(&self.name, &self.model, &e, start.elapsed())
            }
        }
    }
}
