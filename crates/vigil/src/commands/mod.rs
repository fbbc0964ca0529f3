//! CLI command handlers.

pub mod ask;
pub mod config;
pub mod health;
pub mod serve;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use console::Style;
use vigil_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file; discovery is skipped when set.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load configuration from `--config` or by discovery.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        match &self.config_path {
            Some(path) => LoadedConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display())),
            None => vigil_config::load_config(None).context("Failed to load configuration"),
        }
    }

    /// Load configuration and print any warnings to stderr.
    pub fn load_config_reporting(&self) -> Result<LoadedConfig> {
        let loaded = self.load_config()?;
        if !self.json_output {
            let yellow = Style::new().yellow();
            for warning in &loaded.warnings {
                eprintln!("{} {}", yellow.apply_to("⚠"), warning);
            }
        }
        Ok(loaded)
    }
}
