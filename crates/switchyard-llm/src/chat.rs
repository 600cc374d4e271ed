//! OpenAI-compatible chat completion wire format, shared by the local chat server
//! and the metered remote backend

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::provider::{estimate_tokens, BackendError};
use crate::task::Task;

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

/// Parsed result of a successful completion
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Completion {
    pub content: String,
    pub model: Option<String>,
    pub tokens_used: u64,
}

/// Build a client scoped to a single call
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BackendError::Transport(e.to_string()))
}

/// GET `url` within `timeout`; any 2xx answer counts as alive
pub(crate) async fn probe_get(
    url: &str,
    bearer: Option<&str>,
    timeout: Duration,
) -> Result<(), BackendError> {
    let client = http_client(timeout)?;
    let mut request = client.get(url);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    let response = request
        .send()
        .await
        .map_err(|e| BackendError::from_reqwest(e, timeout))?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(BackendError::Http {
            status: response.status().as_u16(),
            body: String::new(),
        })
    }
}

/// Send `task` to `{base_url}/v1/chat/completions`
pub(crate) async fn complete(
    base_url: &str,
    model: &str,
    bearer: Option<&str>,
    task: &Task,
    timeout: Duration,
) -> Result<Completion, BackendError> {
    let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
    let prompt = task.render_prompt();

    let body = ChatRequest {
        model,
        messages: vec![
            Message {
                role: "system",
                content: task.system_prompt(),
            },
            Message {
                role: "user",
                content: &prompt,
            },
        ],
        temperature: task.temperature(),
        max_tokens: task.max_output_tokens(),
        stream: false,
    };

    let client = http_client(timeout)?;
    let mut request = client.post(&url).json(&body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| BackendError::from_reqwest(e, timeout))?;

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
        .map_err(|e| BackendError::from_reqwest(e, timeout))?;
    parse_response(&text)
}

fn parse_response(text: &str) -> Result<Completion, BackendError> {
    let api_response: ChatResponse =
        serde_json::from_str(text).map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

    let content = api_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| BackendError::InvalidResponse("response contained no choices".to_string()))?;

    let tokens_used = api_response
        .usage
        .map(|u| u.total_tokens)
        .unwrap_or_else(|| estimate_tokens(&content));

    Ok(Completion {
        content,
        model: api_response.model,
        tokens_used,
    })
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
