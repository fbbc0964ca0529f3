//! Vigil - quality-controlled RAG support assistant
//!
//! Main entry point for the Vigil CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ask, config, health, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Vigil - quality-controlled RAG support assistant
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Load configuration from this file only (skips discovery)
    #[arg(long, global = true, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Write console logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(serve::ServeArgs),

    /// Answer a single question in-process
    Ask(ask::AskArgs),

    /// Query a running server's health
    Health(health::HealthArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

const CRATES: [&str; 11] = [
    "vigil",
    "vigil_agent",
    "vigil_cache",
    "vigil_config",
    "vigil_domain",
    "vigil_llm",
    "vigil_memory",
    "vigil_metrics",
    "vigil_ratelimit",
    "vigil_retrieval",
    "vigil_server",
];

/// Build an `EnvFilter` directive string: `level` for every vigil crate,
/// `rest` for everything else.
fn filter_directives(level: &str, rest: &str) -> String {
    let mut directives: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
    directives.push(rest.to_string());
    directives.join(",")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable or JSON) + rotating JSON file
    let console_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            filter_directives("debug", "info")
        } else {
            filter_directives("info", "warn")
        }
    });

    let log_dir = vigil_config::data_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "vigil.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    let console_layer = if cli.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(tracing_subscriber::EnvFilter::new(&console_filter))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(tracing_subscriber::EnvFilter::new(&console_filter))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(filter_directives(
                    "trace", "info",
                ))),
        )
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Health(args) => health::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
