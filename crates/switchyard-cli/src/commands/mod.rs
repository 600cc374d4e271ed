pub mod route;
pub mod serve;
pub mod status;

use anyhow::{Context, Result};
use std::path::Path;

use switchyard_llm::{Router, RouterConfig};

/// Load configuration from `path`, or from defaults and environment variables
pub fn load_router(path: Option<&Path>) -> Result<Router> {
    let config = match path {
        Some(path) => RouterConfig::load(Some(path))
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => RouterConfig::from_env(),
    };

    tracing::debug!(
        backends = config.backends.len(),
        cost_budget = config.cost_budget,
        "Configuration loaded"
    );

    Router::from_config(&config).context("Invalid router configuration")
}
