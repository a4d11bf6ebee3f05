//! Command dispatcher
//!
//! Parses `<prefix> <command> [args...]`, runs the matching plugin and
//! decides whether its output goes out inline or as a file.

use crate::handlers::{Handled, MessageHandler, addressed};
use crate::transport::{FileUpload, InboundMessage, Transport};
use async_trait::async_trait;
use plugbot_core::Result;
use plugbot_core::config::BotConfig;
use plugbot_plugin::{InvocationResult, InvocationStatus, Invoker, Registry};
use std::sync::Arc;

/// Reply sent when the prefix is given without a command
pub const PROMPT: &str = "please provide a command to me to run";

/// A parsed command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Command name; empty when the message held only the prefix
    pub command: String,
    /// Remaining tokens joined with single spaces
    pub arguments: String,
}

/// How a message should be answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryAction {
    /// Plain text reply (prompt or rejection)
    Reply(String),
    /// Plugin output shown inline as a code block
    Block { command: String, text: String },
    /// Plugin output uploaded as a file
    Upload(FileUpload),
}

/// Result of dispatching one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The message was not addressed to the bot
    NotApplicable,
    /// Deliver this to the sender's channel
    Deliver(DeliveryAction),
}

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub prefix: String,
    /// Require whitespace or end of text after the prefix
    pub prefix_boundary: bool,
    /// Outputs shorter than this many characters are sent inline
    pub inline_limit: usize,
    pub upload_filename: String,
    pub upload_filetype: String,
}

impl DispatchConfig {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            prefix_boundary: config.prefix_boundary,
            inline_limit: config.delivery.inline_limit,
            upload_filename: config.delivery.upload_filename.clone(),
            upload_filetype: config.delivery.upload_filetype.clone(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from_config(&BotConfig::default())
    }
}

/// Routes addressed messages to plugins
pub struct Dispatcher {
    registry: Arc<Registry>,
    invoker: Invoker,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, invoker: Invoker, config: DispatchConfig) -> Self {
        Self {
            registry,
            invoker,
            config,
        }
    }

    /// Split an addressed message into command and arguments.
    ///
    /// Returns `None` when `text` is not addressed with the prefix.
    pub fn parse(&self, text: &str) -> Option<CommandRequest> {
        let rest = addressed(text, &self.config.prefix, self.config.prefix_boundary)?;
        let mut tokens = rest.split_whitespace();
        let command = tokens.next().unwrap_or_default().to_string();
        let arguments = tokens.collect::<Vec<_>>().join(" ");
        Some(CommandRequest { command, arguments })
    }

    /// Decide what to send back for `text`, running a plugin if needed.
    ///
    /// Plugin failures are logged here and never returned; whatever output
    /// was produced is still delivered.
    pub async fn dispatch(&self, text: &str) -> Dispatch {
        let Some(request) = self.parse(text) else {
            return Dispatch::NotApplicable;
        };
        if request.command.is_empty() {
            return Dispatch::Deliver(DeliveryAction::Reply(PROMPT.to_string()));
        }
        let path = match self.registry.resolve(&request.command) {
            Ok(path) => path,
            Err(e) => {
                tracing::info!(error = %e, "rejecting message");
                return Dispatch::Deliver(DeliveryAction::Reply(format!(
                    "unknown command: `{}`",
                    request.command
                )));
            }
        };

        let result = self.invoker.run(path, &request.arguments).await;
        log_outcome(&request.command, &result);
        Dispatch::Deliver(self.deliver(&request.command, result.output))
    }

    /// Choose inline or file delivery for a plugin's output.
    ///
    /// Lengths are counted in characters; exactly `inline_limit` goes to a file.
    pub fn deliver(&self, command: &str, output: String) -> DeliveryAction {
        if output.chars().count() < self.config.inline_limit {
            DeliveryAction::Block {
                command: command.to_string(),
                text: output.trim_end().to_string(),
            }
        } else {
            DeliveryAction::Upload(FileUpload {
                title: format!("Bot {} Output", command),
                filename: self.config.upload_filename.clone(),
                filetype: self.config.upload_filetype.clone(),
                content: output,
            })
        }
    }

    async fn send(
        &self,
        message: &InboundMessage,
        action: &DeliveryAction,
        transport: &dyn Transport,
    ) -> Result<()> {
        match action {
            DeliveryAction::Reply(text) => {
                transport
                    .send_text(&message.channel, text, message.timestamp.as_deref())
                    .await
            }
            DeliveryAction::Block { text, .. } => transport.send_block(&message.channel, text).await,
            DeliveryAction::Upload(upload) => transport.upload_file(&message.channel, upload).await,
        }
    }
}

fn log_outcome(command: &str, result: &InvocationResult) {
    let error = result
        .error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    match result.status {
        InvocationStatus::Success => {
            tracing::info!(command, elapsed = ?result.elapsed, "command finished");
        }
        InvocationStatus::NonZeroExit { .. } | InvocationStatus::TimedOut | InvocationStatus::IoFailed => {
            tracing::warn!(command, status = result.status.label(), %error, "command failed");
        }
        InvocationStatus::LaunchFailed => {
            tracing::error!(command, %error, "command could not be started");
        }
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    fn name(&self) -> &str {
        "command"
    }

    async fn handle(&self, message: &InboundMessage, transport: &dyn Transport) -> Result<Handled> {
        match self.dispatch(&message.text).await {
            Dispatch::NotApplicable => Ok(Handled::Ignored),
            Dispatch::Deliver(action) => {
                tracing::info!(channel_id = %message.channel, "handle plugin");
                self.send(message, &action, transport).await?;
                Ok(Handled::Done)
            }
        }
    }
}
