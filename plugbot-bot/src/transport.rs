//! Chat transport seam

use async_trait::async_trait;
use plugbot_core::Result;

/// A text message received from the chat network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel the message arrived on; replies go back here
    pub channel: String,
    /// Raw message text
    pub text: String,
    /// Message timestamp, used to reply in-thread
    pub timestamp: Option<String>,
}

impl InboundMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            timestamp: None,
        }
    }
}

/// Output delivered as a file instead of inline text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub title: String,
    pub filename: String,
    pub filetype: String,
    pub content: String,
}

/// Outbound primitives of a chat network.
///
/// Errors are returned to the caller so the connection owner can decide
/// whether to retry or reconnect.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send plain text, threaded under `thread_ts` when given
    async fn send_text(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Result<()>;

    /// Send text rendered as a code block
    async fn send_block(&self, channel: &str, text: &str) -> Result<()>;

    /// Upload a file to the channel
    async fn upload_file(&self, channel: &str, upload: &FileUpload) -> Result<()>;
}

/// Wrap text in a fenced code block
pub fn format_block(text: &str) -> String {
    format!("```{}```", text)
}
