//! Message handlers

use crate::transport::{InboundMessage, Transport};
use async_trait::async_trait;
use plugbot_core::Result;

/// What a handler did with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The message was for this handler and a reply was delivered
    Done,
    /// The message was not addressed to this handler
    Ignored,
}

/// A consumer of inbound messages.
///
/// Every registered handler sees every message and decides for itself
/// whether it applies.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handler name for logs
    fn name(&self) -> &str;

    /// Handle one message; `Err` only when delivery failed
    async fn handle(&self, message: &InboundMessage, transport: &dyn Transport) -> Result<Handled>;
}

/// Remainder of `text` after `prefix`, if `text` starts with it.
///
/// A plain prefix match, so `"botany"` is addressed to `"bot"` with
/// remainder `"any"`. With `word_boundary` the prefix must be followed by
/// whitespace or the end of the text.
pub(crate) fn addressed<'a>(text: &'a str, prefix: &str, word_boundary: bool) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    if !word_boundary || rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// Liveness check: answers "pong" in-thread
pub struct PingHandler {
    prefix: String,
}

impl PingHandler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for PingHandler {
    fn name(&self) -> &str {
        "ping"
    }

    async fn handle(&self, message: &InboundMessage, transport: &dyn Transport) -> Result<Handled> {
        if addressed(&message.text, &self.prefix, false).is_none() {
            return Ok(Handled::Ignored);
        }
        tracing::info!(channel_id = %message.channel, "handle ping");
        transport
            .send_text(&message.channel, "pong", message.timestamp.as_deref())
            .await?;
        Ok(Handled::Done)
    }
}
