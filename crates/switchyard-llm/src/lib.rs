//! # Switchyard LLM
//!
//! Routes analysis tasks across self-hosted and metered LLM backends with
//! ordered fallback and a spend ceiling on the metered one.
//!
//! ## Supported Backends
//!
//! | Backend | Role | Key Required |
//! |---------|------|--------------|
//! | OpenAI-compatible local server | Primary | None |
//! | Ollama | Secondary | None |
//! | Remote chat API | Metered | `OPENAI_API_KEY` (configurable) |
//! | Mock | Testing | None |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use switchyard_llm::{BackendKind, MockBackend, Router, Task, TaskKind};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::builder()
//!         .backend(Arc::new(MockBackend::unavailable("local", BackendKind::LocalChat)))
//!         .backend(Arc::new(MockBackend::new("ollama", BackendKind::Ollama)))
//!         .fallback_order(["local", "ollama"])
//!         .build();
//!
//!     let result = router.route(&Task::new(TaskKind::Quality, "fn main() {}")).await;
//!     assert!(result.success);
//!     assert_eq!(result.backend_id, "ollama");
//! }
//! ```
//!
//! ## From Configuration
//!
//! ```rust,ignore
//! use switchyard_llm::{Router, RouterConfig};
//!
//! let config = RouterConfig::load(Some("switchyard.toml".as_ref()))?;
//! let router = Router::from_config(&config)?;
//! println!("{:#?}", router.status().await);
//! ```

pub mod budget;
mod chat;
pub mod config;
pub mod local_chat;
pub mod metered;
pub mod metrics;
pub mod mock;
pub mod ollama;
pub mod pricing;
pub mod provider;
pub mod router;
pub mod status;
pub mod task;

pub use budget::{Budget, BudgetSnapshot, SECURITY_HEADROOM};
pub use config::{BackendConfig, BackendType, ConfigError, RouterConfig};
pub use local_chat::LocalChatBackend;
pub use metered::MeteredBackend;
pub use metrics::{MetricsSnapshot, RouterMetrics};
pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use pricing::{price_for, ModelPrice};
pub use provider::{Attempt, Backend, BackendError, BackendKind, RouteResult, NO_BACKEND};
pub use router::{Router, RouterBuilder, LARGE_TASK_THRESHOLD};
pub use status::{BackendStatus, RouterStatus};
pub use task::{InvalidTask, Task, TaskBuilder, TaskKind, TaskSpec};
