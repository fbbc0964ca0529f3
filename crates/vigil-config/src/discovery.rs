//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/vigil/config.toml` (XDG user config)
//! 2. `./vigil.toml` (project-local)
//! 3. CLI arguments (handled externally)
//!
//! Layers merge field by field: a project file that sets only
//! `quality.domain` keeps every other value from the user file.

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, VigilConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "vigil.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "vigil";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: VigilConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Primary source file (first successfully loaded), for save operations.
    pub source: Option<ConfigSource>,
    /// Warnings generated during loading (e.g., plaintext API keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Wrap a config loaded from a single explicit file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = load_config_file(path)?;
        let mut warnings = Vec::new();
        check_plaintext_keys(&config, &mut warnings);
        let source = ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        };
        Ok(Self {
            config,
            sources: vec![source.clone()],
            source: Some(source),
            warnings,
        })
    }

    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
///
/// Searches for config files in order:
/// 1. User config dir (`VIGIL_CONFIG_DIR` env, or platform default)
/// 2. Project-local (`./vigil.toml` or specified project dir)
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `VIGIL_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut merged = toml::Table::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut merged, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut merged, &project_path, &mut warnings));

    let config = VigilConfig::from_table(merged)?;
    check_plaintext_keys(&config, &mut warnings);

    let source = sources.iter().find(|s| s.loaded).cloned();

    Ok(LoadedConfig {
        config,
        sources,
        source,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<VigilConfig> {
    VigilConfig::from_toml(&read_file(path)?)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &VigilConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "VIGIL_CONFIG_DIR";

/// Get the XDG config file path for vigil.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for vigil.
///
/// Checks `VIGIL_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Directory for log files and other runtime data.
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join(APP_NAME))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Try to load a config file and merge it into the accumulated table.
///
/// A file that does not parse, or does not fit the schema, is skipped
/// with a warning so one bad layer doesn't hide the others.
fn load_layer(merged: &mut toml::Table, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    let skipped = ConfigSource {
        path: path.to_path_buf(),
        loaded: false,
    };
    if !path.is_file() {
        return skipped;
    }

    let layer = read_file(path).and_then(|contents| {
        let table: toml::Table = toml::from_str(&contents)?;
        VigilConfig::from_table(table.clone())?;
        Ok(table)
    });

    match layer {
        Ok(table) => {
            tracing::debug!(path = %path.display(), "Loaded config layer");
            merge_tables(merged, table);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            skipped
        }
    }
}

/// Recursively overlay `other` onto `base`. Nested tables merge; any other
/// value replaces.
fn merge_tables(base: &mut toml::Table, other: toml::Table) {
    for (key, value) in other {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Check for plaintext API keys in the config and emit warnings.
fn check_plaintext_keys(config: &VigilConfig, warnings: &mut Vec<String>) {
    let sections = [
        ("llm", config.llm.api_key.as_ref(), &config.llm.api_key_env),
        (
            "retriever",
            config.retriever.api_key.as_ref(),
            &config.retriever.api_key_env,
        ),
        ("memory", config.memory.api_key.as_ref(), &config.memory.api_key_env),
        ("safety", config.safety.api_key.as_ref(), &config.safety.api_key_env),
    ];

    for (name, key, env_var) in sections {
        if key.is_some() {
            warnings.push(format!(
                "[{}] contains a plaintext API key. Consider using the {} environment variable instead.",
                name, env_var
            ));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
