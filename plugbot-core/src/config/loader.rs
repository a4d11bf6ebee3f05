//! Configuration loader

use crate::config::BotConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding `plugin_dir`
pub const ENV_PLUGIN_DIR: &str = "PLUGBOT_PLUGIN_DIR";
/// Environment variable overriding `prefix`
pub const ENV_PREFIX: &str = "PLUGBOT_PREFIX";
/// Environment variable overriding `invoker.timeout_ms`
pub const ENV_TIMEOUT_MS: &str = "PLUGBOT_TIMEOUT_MS";

/// Configuration loader for various formats
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<BotConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "json" => Self::from_json(&content),
            "toml" => Self::from_toml(&content),
            _ => Err(Error::Config(format!("Unknown config format: {:?}", ext))),
        }
    }

    /// Parse JSON configuration
    pub fn from_json(content: &str) -> Result<BotConfig> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid JSON: {}", e)))
    }

    /// Parse TOML configuration
    pub fn from_toml(content: &str) -> Result<BotConfig> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Default config file location (`$HOME/.plugbot.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".plugbot.toml"))
    }

    /// Load the explicit file if given, else the default file if it exists,
    /// else built-in defaults. Environment overrides are applied on top.
    pub fn discover(explicit: Option<&Path>) -> Result<BotConfig> {
        let mut config = match explicit {
            Some(path) => {
                let config = Self::load(path)?;
                tracing::debug!(configfile = %path.display(), "parsed config file");
                config
            }
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => {
                    let config = Self::load(&path)?;
                    tracing::debug!(configfile = %path.display(), "parsed config file");
                    config
                }
                None => BotConfig::default(),
            },
        };

        Self::apply_env(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `PLUGBOT_*` overrides using the given variable lookup.
    pub fn apply_env<F>(config: &mut BotConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_PLUGIN_DIR).filter(|v| !v.is_empty()) {
            config.plugin_dir = Some(PathBuf::from(dir));
        }
        if let Some(prefix) = lookup(ENV_PREFIX).filter(|v| !v.is_empty()) {
            config.prefix = prefix;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS).filter(|v| !v.is_empty()) {
            config.invoker.timeout_ms = raw.parse().map_err(|_| {
                Error::Config(format!("{} must be an integer, got {:?}", ENV_TIMEOUT_MS, raw))
            })?;
        }
        Ok(())
    }
}
