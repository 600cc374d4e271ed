//! Router configuration
//!
//! Handles backend definitions, credentials, the fallback order and the cost budget.
//! Configuration can come from code, from environment variables, or from a file
//! layered with `SWITCHYARD__*` environment overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::local_chat::{LocalChatBackend, DEFAULT_LOCAL_MODEL, DEFAULT_LOCAL_URL};
use crate::metered::{MeteredBackend, DEFAULT_REMOTE_MODEL, DEFAULT_REMOTE_URL};
use crate::mock::MockBackend;
use crate::ollama::{OllamaBackend, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use crate::provider::{Backend, BackendKind, NO_BACKEND};

/// Upper bound on a single `execute` call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
/// Upper bound on a liveness probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_COST_BUDGET: f64 = 10.0;

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which implementation a configured backend uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    LocalChat,
    Ollama,
    Metered,
    /// Scripted backend for offline runs; plays the role given by `role`
    Mock,
}

/// Settings for one backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendType,
    /// Base URL (default depends on `kind`)
    #[serde(default)]
    pub url: Option<String>,
    /// Model id (default depends on `kind`)
    #[serde(default)]
    pub model: Option<String>,
    /// API credential for metered backends
    #[serde(default, skip_serializing)]
    pub credential: Option<String>,
    /// Environment variable read when `credential` is unset
    #[serde(default)]
    pub credential_env: Option<String>,
    /// Overrides the built-in context table
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub probe_timeout_secs: Option<u64>,
    /// Role played by a `mock` backend
    #[serde(default)]
    pub role: Option<BackendKind>,
}

impl BackendConfig {
    pub fn new(kind: BackendType) -> Self {
        Self {
            kind,
            url: None,
            model: None,
            credential: None,
            credential_env: None,
            max_tokens: None,
            timeout_secs: None,
            probe_timeout_secs: None,
            role: None,
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_credential(mut self, credential: &str) -> Self {
        self.credential = Some(credential.to_string());
        self
    }

    pub fn with_credential_env(mut self, var: &str) -> Self {
        self.credential_env = Some(var.to_string());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }

    /// Credential from the config, else from `credential_env`
    pub fn resolve_credential(&self) -> Option<String> {
        self.credential
            .clone()
            .or_else(|| self.credential_env.as_ref().and_then(|var| env::var(var).ok()))
            .filter(|c| !c.trim().is_empty())
    }

    /// Construct the backend this entry describes
    pub fn build(&self, name: &str) -> Arc<dyn Backend> {
        match self.kind {
            BackendType::LocalChat => {
                let model = self.model.as_deref().unwrap_or(DEFAULT_LOCAL_MODEL);
                let mut backend =
                    LocalChatBackend::new(name, self.url.as_deref().unwrap_or(DEFAULT_LOCAL_URL), model)
                        .with_timeout(self.timeout())
                        .with_probe_timeout(self.probe_timeout());
                if let Some(max_tokens) = self.max_tokens {
                    backend = backend.with_max_tokens(max_tokens);
                }
                Arc::new(backend)
            }
            BackendType::Ollama => {
                let model = self.model.as_deref().unwrap_or(DEFAULT_OLLAMA_MODEL);
                let mut backend =
                    OllamaBackend::with_url(name, self.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL), model)
                        .with_timeout(self.timeout())
                        .with_probe_timeout(self.probe_timeout());
                if let Some(max_tokens) = self.max_tokens {
                    backend = backend.with_max_tokens(max_tokens);
                }
                Arc::new(backend)
            }
            BackendType::Metered => {
                let mut backend = MeteredBackend::new(
                    name,
                    self.url.as_deref().unwrap_or(DEFAULT_REMOTE_URL),
                    self.model.as_deref().unwrap_or(DEFAULT_REMOTE_MODEL),
                    self.resolve_credential(),
                )
                .with_timeout(self.timeout());
                if let Some(max_tokens) = self.max_tokens {
                    backend = backend.with_max_tokens(max_tokens);
                }
                Arc::new(backend)
            }
            BackendType::Mock => {
                let mut backend = MockBackend::new(name, self.role.unwrap_or(BackendKind::LocalChat));
                if let Some(model) = &self.model {
                    backend = backend.with_model(model);
                }
                Arc::new(backend)
            }
        }
    }
}

/// Full router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Backends by registry name
    pub backends: BTreeMap<String, BackendConfig>,
    /// Names tried, in order, after the preferred backend fails
    pub fallback_order: Vec<String>,
    /// Spend ceiling for metered backends over the router's lifetime
    pub cost_budget: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let mut backends = BTreeMap::new();
        backends.insert(
            "local".to_string(),
            BackendConfig::new(BackendType::LocalChat)
                .with_url(DEFAULT_LOCAL_URL)
                .with_model(DEFAULT_LOCAL_MODEL),
        );
        backends.insert(
            "ollama".to_string(),
            BackendConfig::new(BackendType::Ollama)
                .with_url(DEFAULT_OLLAMA_URL)
                .with_model(DEFAULT_OLLAMA_MODEL),
        );
        backends.insert(
            "remote".to_string(),
            BackendConfig::new(BackendType::Metered)
                .with_url(DEFAULT_REMOTE_URL)
                .with_model(DEFAULT_REMOTE_MODEL)
                .with_credential_env("OPENAI_API_KEY"),
        );

        Self {
            backends,
            fallback_order: vec!["local".into(), "ollama".into(), "remote".into()],
            cost_budget: DEFAULT_COST_BUDGET,
        }
    }
}

impl RouterConfig {
    /// Defaults with overrides read from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("SWITCHYARD_LOCAL_URL") {
            if let Some(local) = config.backends.get_mut("local") {
                local.url = Some(url);
            }
        }
        if let Ok(url) = env::var("SWITCHYARD_OLLAMA_URL") {
            if let Some(ollama) = config.backends.get_mut("ollama") {
                ollama.url = Some(url);
            }
        }
        if let Some(remote) = config.backends.get_mut("remote") {
            if let Ok(url) = env::var("SWITCHYARD_REMOTE_URL") {
                remote.url = Some(url);
            }
            if let Ok(model) = env::var("SWITCHYARD_REMOTE_MODEL") {
                remote.model = Some(model);
            }
        }
        config.cost_budget = env::var("SWITCHYARD_COST_BUDGET")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.cost_budget);

        config
    }

    /// Load from an optional file (JSON, TOML or YAML by extension), then apply
    /// `SWITCHYARD__*` environment overrides, e.g. `SWITCHYARD__COST_BUDGET=2.5`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("SWITCHYARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: RouterConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the router cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cost_budget.is_finite() || self.cost_budget < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "cost_budget must be a non-negative number, got {}",
                self.cost_budget
            )));
        }

        for (name, backend) in &self.backends {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("backend names must not be empty".into()));
            }
            if name == NO_BACKEND {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is reserved and cannot name a backend",
                    NO_BACKEND
                )));
            }
            if let Some(url) = &backend.url {
                reqwest::Url::parse(url).map_err(|e| {
                    ConfigError::Invalid(format!("backend '{}' has invalid url '{}': {}", name, url, e))
                })?;
            }
            if backend.timeout_secs == Some(0) || backend.probe_timeout_secs == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "backend '{}' timeouts must be greater than zero",
                    name
                )));
            }
            if backend.max_tokens == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "backend '{}' max_tokens must be greater than zero",
                    name
                )));
            }
        }

        for name in &self.fallback_order {
            if !self.backends.contains_key(name) {
                tracing::warn!(backend = %name, "Fallback order names an unregistered backend; it will be skipped");
            }
        }

        Ok(())
    }

    /// Instantiate every configured backend
    pub fn build_backends(&self) -> Vec<Arc<dyn Backend>> {
        self.backends
            .iter()
            .map(|(name, backend)| backend.build(name))
            .collect()
    }
}
