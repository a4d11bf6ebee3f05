//! Plugbot Core Library
//!
//! Shared pieces for the Plugbot workspace: the error type used across
//! crates and the layered bot configuration.

pub mod config;
pub mod error;

pub use error::{Error, Result};

/// Plugbot version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
