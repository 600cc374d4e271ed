//! Task descriptor handed to the router

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Rejection raised while building a [`Task`]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvalidTask {
    #[error("priority must be at least 1, got {0}")]
    Priority(u32),
    #[error("max_output_tokens must be at least 1, got {0}")]
    MaxOutputTokens(u32),
    #[error("temperature must be within [0, 2], got {0}")]
    Temperature(f32),
}

/// What kind of analysis a task asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    General,
    Security,
    Dependency,
    Quality,
    Documentation,
    Performance,
}

impl TaskKind {
    /// System prompt sent alongside tasks of this kind
    pub fn system_prompt(self) -> &'static str {
        match self {
            TaskKind::General => "You are an experienced software engineer reviewing a codebase. Be precise and concise.",
            TaskKind::Security => "You are a security auditor. Identify vulnerabilities, rate their severity and suggest concrete fixes.",
            TaskKind::Dependency => "You are a dependency analyst. Assess third-party packages for outdated versions, known advisories and licensing concerns.",
            TaskKind::Quality => "You are a code reviewer focused on maintainability, correctness and idiomatic style.",
            TaskKind::Documentation => "You are a technical writer. Produce clear documentation for the supplied code.",
            TaskKind::Performance => "You are a performance engineer. Find hot paths, needless allocations and algorithmic inefficiencies.",
        }
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(TaskKind::General),
            "security" => Ok(TaskKind::Security),
            "dependency" | "dependencies" => Ok(TaskKind::Dependency),
            "quality" => Ok(TaskKind::Quality),
            "documentation" | "docs" => Ok(TaskKind::Documentation),
            "performance" | "perf" => Ok(TaskKind::Performance),
            other => Err(format!("unknown task kind '{}'", other)),
        }
    }
}

/// One unit of analysis work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    kind: TaskKind,
    content: String,
    context: Map<String, Value>,
    priority: u32,
    max_output_tokens: u32,
    temperature: f32,
}

impl Task {
    pub const DEFAULT_PRIORITY: u32 = 5;
    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;

    /// Create a task with default limits
    pub fn new(kind: TaskKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            context: Map::new(),
            priority: Self::DEFAULT_PRIORITY,
            max_output_tokens: Self::DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: Self::DEFAULT_TEMPERATURE,
        }
    }

    pub fn builder(kind: TaskKind, content: impl Into<String>) -> TaskBuilder {
        TaskBuilder {
            task: Self::new(kind, content),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Content length in characters, not bytes
    pub fn content_chars(&self) -> usize {
        self.content.chars().count()
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn system_prompt(&self) -> &'static str {
        self.kind.system_prompt()
    }

    /// User message: the content, then the context as pretty JSON when present
    pub fn render_prompt(&self) -> String {
        if self.context.is_empty() {
            return self.content.clone();
        }
        let context = serde_json::to_string_pretty(&self.context).unwrap_or_default();
        format!("{}\n\nContext:\n{}", self.content, context)
    }

    fn validate(&self) -> Result<(), InvalidTask> {
        if self.priority < 1 {
            return Err(InvalidTask::Priority(self.priority));
        }
        if self.max_output_tokens < 1 {
            return Err(InvalidTask::MaxOutputTokens(self.max_output_tokens));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(InvalidTask::Temperature(self.temperature));
        }
        Ok(())
    }
}

/// Builder for [`Task`]; validation happens in [`build`](Self::build)
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn priority(mut self, priority: u32) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.task.max_output_tokens = max_output_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.task.temperature = temperature;
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.task.context.insert(key.into(), value.into());
        self
    }

    pub fn context_map(mut self, context: Map<String, Value>) -> Self {
        self.task.context.extend(context);
        self
    }

    pub fn build(self) -> Result<Task, InvalidTask> {
        self.task.validate()?;
        Ok(self.task)
    }
}

/// Wire form of a task, as accepted by the HTTP gateway
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub kind: TaskKind,
    pub content: String,
    #[serde(default)]
    pub context: Map<String, Value>,
    pub priority: Option<u32>,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl TryFrom<TaskSpec> for Task {
    type Error = InvalidTask;

    fn try_from(spec: TaskSpec) -> Result<Self, Self::Error> {
        Task::builder(spec.kind, spec.content)
            .context_map(spec.context)
            .priority(spec.priority.unwrap_or(Task::DEFAULT_PRIORITY))
            .max_output_tokens(spec.max_output_tokens.unwrap_or(Task::DEFAULT_MAX_OUTPUT_TOKENS))
            .temperature(spec.temperature.unwrap_or(Task::DEFAULT_TEMPERATURE))
            .build()
    }
}
