//! Bot configuration
//!
//! Layered as defaults, config file, environment, then command-line flags.

mod loader;
mod types;

pub use loader::{ConfigLoader, ENV_PLUGIN_DIR, ENV_PREFIX, ENV_TIMEOUT_MS};
pub use types::{
    BotConfig, ConsoleConfig, DeliveryConfig, DispatchMode, InvokerConfig, LoggingConfig,
};
