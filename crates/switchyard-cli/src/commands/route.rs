//! Route command - send one task through the router
//!
//! Usage:
//! ```bash
//! switchyard route --kind security --file src/auth.rs
//! git diff | switchyard route --kind quality --context repo=switchyard --json
//! ```

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};

use switchyard_llm::{RouteResult, Task, TaskKind};

use crate::{print_error, print_success};

/// Arguments for the route command
#[derive(Args)]
pub struct RouteArgs {
    /// Task kind (general, security, dependency, quality, documentation, performance)
    #[arg(short, long, default_value = "general")]
    kind: TaskKind,

    /// Read task content from a file instead of stdin
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Priority, 1 or higher
    #[arg(long, default_value_t = Task::DEFAULT_PRIORITY)]
    priority: u32,

    /// Output token cap
    #[arg(long, default_value_t = Task::DEFAULT_MAX_OUTPUT_TOKENS)]
    max_tokens: u32,

    /// Sampling temperature in [0, 2]
    #[arg(long, default_value_t = Task::DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Extra context as key=value (repeatable)
    #[arg(long = "context", value_parser = parse_key_value)]
    context: Vec<(String, String)>,

    /// Print the envelope as JSON
    #[arg(long)]
    json: bool,
}

/// Run the route command
pub async fn run(config: Option<&Path>, args: RouteArgs) -> Result<()> {
    let content = read_content(args.file.as_deref())?;
    if content.trim().is_empty() {
        bail!("Task content is empty");
    }

    let mut builder = Task::builder(args.kind, content)
        .priority(args.priority)
        .max_output_tokens(args.max_tokens)
        .temperature(args.temperature);
    for (key, value) in args.context {
        builder = builder.context(key, value);
    }
    let task = builder.build().context("Invalid task")?;

    let router = super::load_router(config)?;
    let result = router.route(&task).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn read_content(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read task content from stdin")?;
            Ok(content)
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

fn print_result(result: &RouteResult) {
    if result.success {
        print_success(&format!(
            "Served by {} ({})",
            result.backend_id.green().bold(),
            result.model_id
        ));
        println!();
        println!("{}", result.content);
        println!();
        println!(
            "{} {}  {} {}  {} ${:.6}",
            "Tokens:".dimmed(),
            result.tokens_used,
            "Latency:".dimmed(),
            format!("{}ms", result.latency_ms),
            "Cost:".dimmed(),
            result.cost_estimate
        );
    } else {
        print_error(result.error.as_deref().unwrap_or("Routing failed"));
    }

    if result.attempts.len() > 1 || !result.success {
        println!();
        println!("{}", "Attempts:".bold());
        for attempt in &result.attempts {
            let marker = if attempt.success {
                "✓".green()
            } else {
                "✗".red()
            };
            match &attempt.error {
                Some(error) => println!("  {} {} {}", marker, attempt.backend_id, error.dimmed()),
                None => println!("  {} {}", marker, attempt.backend_id),
            }
        }
    }
}
