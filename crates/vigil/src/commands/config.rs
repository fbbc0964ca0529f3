//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde::Serialize;

use vigil_config::{ResolvedSecret, VigilConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and where keys come from
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./vigil.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local } => cmd_init(local),
        ConfigCommand::Path => cmd_path(),
    }
}

#[derive(Debug, Serialize)]
struct ShowOutput<'a> {
    sources: Vec<String>,
    warnings: &'a [String],
    config: &'a VigilConfig,
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    if ctx.json_output {
        let output = ShowOutput {
            sources: loaded
                .loaded_from()
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            warnings: &loaded.warnings,
            config,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!();
    println!("{}", style("Vigil Configuration").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    println!("Services:");
    println!(
        "  {:<10} {} / {}  {}",
        "llm",
        config.llm.base_url,
        config.llm.model,
        key_status(config.llm.resolve_api_key())
    );
    match &config.retriever.url {
        Some(url) => println!(
            "  {:<10} {} (top_k {})  {}",
            "retriever",
            url,
            config.retriever.top_k,
            key_status(config.retriever.resolve_api_key())
        ),
        None => println!("  {:<10} {}", "retriever", dim.apply_to("(none)")),
    }
    println!(
        "  {:<10} {}  {}",
        "memory",
        config.memory.base_url,
        key_status(config.memory.resolve_api_key())
    );
    if config.safety.enabled {
        println!(
            "  {:<10} {} / {}  {}",
            "safety",
            config.safety.base_url,
            config.safety.model,
            key_status(config.safety.resolve_api_key())
        );
    } else {
        println!("  {:<10} {}", "safety", dim.apply_to("(disabled)"));
    }
    println!();

    println!("Quality:");
    println!(
        "  groundedness >= {}, precision >= {}, max {} iterations",
        config.quality.groundedness_threshold,
        config.quality.precision_threshold,
        config.quality.max_refinement_iterations
    );
    println!();

    println!("Server:");
    println!("  bind: {}", config.server.address());
    println!();

    if !loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nEffective config:\n");
        println!("{}", config.to_toml()?);
    }

    Ok(())
}

fn key_status(secret: Option<ResolvedSecret>) -> String {
    match secret {
        Some(secret) => format!("✓ key from {}", secret.source),
        None => "· no key".to_string(),
    }
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    println!("Config file search order (later overrides earlier):\n");

    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'vigil config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("vigil.toml")
    } else {
        vigil_config::xdg_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        println!("Use 'vigil config show' to inspect it.");
        return Ok(());
    }

    vigil_config::save_config(&VigilConfig::default(), &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✓ Created {}", path.display());
    println!("Set OPENAI_API_KEY (or edit [llm]) before running 'vigil serve'.");

    Ok(())
}

fn cmd_path() -> Result<()> {
    if let Some(path) = vigil_config::xdg_config_path() {
        println!("{}", path.display());
    } else {
        eprintln!("Could not determine config directory");
    }
    Ok(())
}
