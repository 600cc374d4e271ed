//! Status command - show backend availability and spend
//!
//! Usage:
//! ```bash
//! switchyard status
//! switchyard status --json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use std::path::Path;

use switchyard_llm::{BackendKind, RouterStatus};

/// Arguments for the status command
#[derive(Args)]
pub struct StatusArgs {
    /// Print status as JSON
    #[arg(long)]
    json: bool,
}

/// Run the status command
pub async fn run(config: Option<&Path>, args: StatusArgs) -> Result<()> {
    let router = super::load_router(config)?;
    let status = router.status().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn role(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::LocalChat => "primary",
        BackendKind::Ollama => "secondary",
        BackendKind::Metered => "metered",
    }
}

fn print_status(status: &RouterStatus) {
    println!("{}", "Switchyard Backends".bold().cyan());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Role").fg(Color::Cyan),
            Cell::new("Model").fg(Color::Cyan),
            Cell::new("Max Tokens").fg(Color::Cyan),
            Cell::new("Available").fg(Color::Cyan),
        ]);

    for (name, backend) in &status.backends {
        let available = if backend.available {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(name).fg(Color::Green),
            Cell::new(role(backend.kind)),
            Cell::new(&backend.model_id),
            Cell::new(backend.max_tokens),
            available,
        ]);
    }

    println!("{table}");
    println!();
    println!("{}", "Budget:".bold());
    println!(
        "  {} ${:.4} of ${:.4} ({} ${:.4} remaining)",
        "Spend:".dimmed(),
        status.spend,
        status.cost_budget,
        "→".dimmed(),
        status.budget_remaining
    );
    println!(
        "  {} {}",
        "Fallback order:".dimmed(),
        status.fallback_order.join(" → ")
    );

    if status.available_backends().is_empty() {
        println!();
        crate::print_info("No backend is reachable; routed tasks will fail until one comes up");
    }
}
