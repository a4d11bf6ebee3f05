//! Test doubles shared by the unit tests

use crate::transport::{FileUpload, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use plugbot_core::{Error, Result};

/// Something a [`RecordingTransport`] was asked to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        channel: String,
        text: String,
        thread_ts: Option<String>,
    },
    Block {
        channel: String,
        text: String,
    },
    Upload {
        channel: String,
        upload: FileUpload,
    },
}

/// Transport that records every delivery, optionally failing them all
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    fn push(&self, sent: Sent) -> Result<()> {
        if self.fail {
            return Err(Error::Transport("channel_not_found".to_string()));
        }
        self.sent.lock().push(sent);
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Result<()> {
        self.push(Sent::Text {
            channel: channel.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.map(str::to_string),
        })
    }

    async fn send_block(&self, channel: &str, text: &str) -> Result<()> {
        self.push(Sent::Block {
            channel: channel.to_string(),
            text: text.to_string(),
        })
    }

    async fn upload_file(&self, channel: &str, upload: &FileUpload) -> Result<()> {
        self.push(Sent::Upload {
            channel: channel.to_string(),
            upload: upload.clone(),
        })
    }
}
