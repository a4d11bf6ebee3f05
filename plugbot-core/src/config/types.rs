//! Configuration type definitions
//!
//! These types represent the runtime configuration for Plugbot.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for Plugbot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Directory scanned once at startup for plugin executables
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,

    /// Address prefix that marks a message as a command for the bot
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Only treat the prefix as an address when whitespace or the end of
    /// the message follows it (`"botany"` then no longer runs `any`)
    #[serde(default)]
    pub prefix_boundary: bool,

    /// Prefix answered with "pong" (empty disables the ping handler)
    #[serde(default = "default_ping_prefix")]
    pub ping_prefix: String,

    /// Plugin invocation settings
    #[serde(default)]
    pub invoker: InvokerConfig,

    /// Output delivery settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// How inbound messages are scheduled
    #[serde(default)]
    pub dispatch: DispatchMode,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Console transport configuration
    #[serde(default)]
    pub console: ConsoleConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            prefix: default_prefix(),
            prefix_boundary: false,
            ping_prefix: default_ping_prefix(),
            invoker: InvokerConfig::default(),
            delivery: DeliveryConfig::default(),
            dispatch: DispatchMode::default(),
            logging: LoggingConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

fn default_prefix() -> String {
    "bot".to_string()
}

fn default_ping_prefix() -> String {
    "ping".to_string()
}

impl BotConfig {
    /// Check the values that the rest of the system relies on.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(Error::Config("prefix must not be empty".to_string()));
        }
        if self.prefix.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!(
                "prefix must be a single word, got {:?}",
                self.prefix
            )));
        }
        if self.invoker.timeout_ms == 0 {
            return Err(Error::Config("invoker.timeout_ms must be positive".to_string()));
        }
        if self.delivery.inline_limit == 0 {
            return Err(Error::Config(
                "delivery.inline_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The plugin directory, or a configuration error when none was given.
    pub fn require_plugin_dir(&self) -> Result<&PathBuf> {
        self.plugin_dir.as_ref().ok_or_else(|| {
            Error::Config(
                "no plugin directory set (use --plugin-dir, PLUGBOT_PLUGIN_DIR or plugin_dir)"
                    .to_string(),
            )
        })
    }
}

/// Plugin invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Wall-clock deadline per invocation in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of plugins running at once (0 = unlimited)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl InvokerConfig {
    /// Deadline as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_max_concurrent() -> usize {
    8
}

/// Output delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Outputs with fewer characters than this are sent inline; longer ones are uploaded
    #[serde(default = "default_inline_limit")]
    pub inline_limit: usize,

    /// File name used for uploaded output
    #[serde(default = "default_upload_filename")]
    pub upload_filename: String,

    /// File type reported for uploaded output
    #[serde(default = "default_upload_filetype")]
    pub upload_filetype: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            inline_limit: default_inline_limit(),
            upload_filename: default_upload_filename(),
            upload_filetype: default_upload_filetype(),
        }
    }
}

fn default_inline_limit() -> usize {
    2000
}

fn default_upload_filename() -> String {
    "output.txt".to_string()
}

fn default_upload_filetype() -> String {
    "text".to_string()
}

/// Scheduling of inbound messages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One message at a time, in arrival order
    #[default]
    Serial,
    /// One task per message
    Concurrent,
}

/// Global logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Console transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Where uploaded files are written
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join("plugbot-uploads")
}
