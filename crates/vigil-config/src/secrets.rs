//! API key resolution.
//!
//! Resolution order:
//! 1. Environment variable named by the section's `api_key_env`
//! 2. Config file `api_key` (with a warning at load time)

/// Result of API key resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve an API key from `env_var`, then from the config value.
///
/// Blank values count as unset.
pub fn resolve_api_key(env_var: &str, config_value: Option<&str>) -> Option<ResolvedSecret> {
    if let Ok(value) = std::env::var(env_var)
        && !value.trim().is_empty()
    {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var.to_string()),
        });
    }

    config_value
        .filter(|v| !v.trim().is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_value_used_when_env_unset() {
        let resolved = resolve_api_key("VIGIL_TEST_UNSET_KEY_9F2A", Some("sk-file")).unwrap();
        assert_eq!(resolved.value, "sk-file");
        assert_eq!(resolved.source, SecretSource::ConfigFile);
    }

    #[test]
    fn test_blank_config_value_is_none() {
        assert!(resolve_api_key("VIGIL_TEST_UNSET_KEY_9F2A", Some("  ")).is_none());
        assert!(resolve_api_key("VIGIL_TEST_UNSET_KEY_9F2A", None).is_none());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(
            SecretSource::EnvVar("OPENAI_API_KEY".into()).to_string(),
            "env var OPENAI_API_KEY"
        );
        assert_eq!(SecretSource::ConfigFile.to_string(), "config file (plaintext)");
    }
}
