//! Switchyard CLI - route analysis tasks across self-hosted and metered LLM backends
//!
//! # Usage
//!
//! ```bash
//! # Route a file as a security review
//! switchyard route --kind security --file src/auth.rs
//!
//! # Pipe content in and get the envelope as JSON
//! cat Cargo.lock | switchyard route --kind dependency --json
//!
//! # Show backend availability and spend
//! switchyard status
//!
//! # Run the HTTP gateway
//! switchyard --config switchyard.toml serve --addr 0.0.0.0:8080
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use commands::{route, serve, status};

/// Switchyard - task routing with fallback and a metered spend ceiling
#[derive(Parser)]
#[command(
    name = "switchyard",
    version,
    about = "Switchyard - multi-backend LLM task router",
    long_about = "Switchyard sends each analysis task to the best available backend.\n\n\
                  Self-hosted servers are preferred, a metered API is used within its\n\
                  budget, and failures fall back through a configured order."
)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML); built-in defaults when omitted
    #[arg(short, long, env = "SWITCHYARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route one task and print the result envelope
    #[command(name = "route")]
    Route(route::RouteArgs),

    /// Show backend availability, spend and counters
    #[command(name = "status")]
    Status(status::StatusArgs),

    /// Serve the router over HTTP
    #[command(name = "serve")]
    Serve(serve::ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Route(args) => route::run(config, args).await,
        Commands::Status(args) => status::run(config, args).await,
        Commands::Serve(args) => serve::run(config, args).await,
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message with an X
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}
