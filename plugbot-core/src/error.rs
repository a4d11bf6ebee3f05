//! Error types for Plugbot

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Plugbot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Plugbot
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin directory could not be listed
    #[error("Plugin directory error: {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No plugin registered under the requested name
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Delivery through the chat transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_error_names_path() {
        let err = Error::Directory {
            path: PathBuf::from("/nope/plugins"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let msg = err.to_string();
        assert!(msg.contains("/nope/plugins"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_unknown_command_message() {
        let err = Error::UnknownCommand("deploy".to_string());
        assert_eq!(err.to_string(), "unknown command: deploy");
    }
}
