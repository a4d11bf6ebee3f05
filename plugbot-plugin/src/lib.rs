//! Plugbot Plugin System
//!
//! Plugins are plain executables dropped into a directory. The [`Registry`]
//! maps each file name to its path once at startup, and the [`Invoker`] runs
//! them under a wall-clock deadline, capturing standard output.

mod invoker;
pub mod metrics;
mod registry;

pub use invoker::{InvocationResult, InvocationStatus, InvokeError, Invoker, tokenize};
pub use registry::Registry;
