//! Console transport
//!
//! A local stand-in for a chat network: stdin lines become messages on the
//! `console` channel, replies are printed, and uploads land in a directory.

use crate::bot::BotEvent;
use crate::transport::{FileUpload, InboundMessage, Transport, format_block};
use async_trait::async_trait;
use parking_lot::Mutex;
use plugbot_core::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Channel name used for console messages
pub const CONSOLE_CHANNEL: &str = "console";

/// Prints replies to a writer and stores uploads on disk
pub struct ConsoleTransport {
    upload_dir: PathBuf,
    out: Mutex<Box<dyn Write + Send>>,
    uploads: AtomicU64,
}

impl ConsoleTransport {
    /// Console transport printing to stdout
    pub fn stdout(upload_dir: impl Into<PathBuf>) -> Self {
        Self::with_writer(upload_dir, Box::new(std::io::stdout()))
    }

    pub fn with_writer(upload_dir: impl Into<PathBuf>, out: Box<dyn Write + Send>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            out: Mutex::new(out),
            uploads: AtomicU64::new(0),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn print(&self, line: &str) -> Result<()> {
        let mut out = self.out.lock();
        writeln!(out, "{}", line)
            .and_then(|_| out.flush())
            .map_err(|e| Error::Transport(format!("console write failed: {}", e)))
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_text(&self, channel: &str, text: &str, _thread_ts: Option<&str>) -> Result<()> {
        self.print(&format!("[{}] {}", channel, text))
    }

    async fn send_block(&self, channel: &str, text: &str) -> Result<()> {
        self.print(&format!("[{}] {}", channel, format_block(text)))
    }

    async fn upload_file(&self, channel: &str, upload: &FileUpload) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| Error::Transport(format!("cannot create {}: {}", self.upload_dir.display(), e)))?;

        let n = self.uploads.fetch_add(1, Ordering::Relaxed);
        let path = self.upload_dir.join(format!("{:04}-{}", n, upload.filename));
        tokio::fs::write(&path, upload.content.as_bytes())
            .await
            .map_err(|e| Error::Transport(format!("cannot write {}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), bytes = upload.content.len(), "stored upload");
        self.print(&format!("[{}] 📎 {} -> {}", channel, upload.title, path.display()))
    }
}

/// Turn each line of `reader` into a message event.
///
/// Sends `Connected` first. Returns when the reader hits EOF or the
/// receiving side is gone; dropping `tx` then ends the bot loop.
pub async fn read_events<R>(reader: R, tx: mpsc::Sender<BotEvent>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    if tx.send(BotEvent::Connected(CONSOLE_CHANNEL.to_string())).await.is_err() {
        return Ok(());
    }

    let mut lines = reader.lines();
    let mut seq: u64 = 0;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        seq += 1;
        let message = InboundMessage {
            channel: CONSOLE_CHANNEL.to_string(),
            text: line,
            timestamp: Some(seq.to_string()),
        };
        if tx.send(BotEvent::Message(message)).await.is_err() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Clonable in-memory writer
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_prints_text_and_blocks() {
        let buf = SharedBuf::default();
        let transport = ConsoleTransport::with_writer("/unused", Box::new(buf.clone()));

        transport.send_text("console", "pong", Some("1")).await.unwrap();
        transport.send_block("console", "up 3 days").await.unwrap();

        assert_eq!(buf.contents(), "[console] pong\n[console] ```up 3 days```\n");
    }

    #[tokio::test]
    async fn test_upload_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().join("uploads");
        let buf = SharedBuf::default();
        let transport = ConsoleTransport::with_writer(&upload_dir, Box::new(buf.clone()));

        let upload = FileUpload {
            title: "Bot dump Output".to_string(),
            filename: "output.txt".to_string(),
            filetype: "text".to_string(),
            content: "x".repeat(3000),
        };
        transport.upload_file("console", &upload).await.unwrap();
        transport.upload_file("console", &upload).await.unwrap();

        let first = upload_dir.join("0000-output.txt");
        let second = upload_dir.join("0001-output.txt");
        assert_eq!(std::fs::read_to_string(&first).unwrap(), upload.content);
        assert!(second.exists());
        assert!(buf.contents().contains("Bot dump Output"));
    }

    #[tokio::test]
    async fn test_upload_failure_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        // a regular file where the upload directory should be
        let transport = ConsoleTransport::with_writer(&blocker, Box::new(SharedBuf::default()));

        let upload = FileUpload {
            title: "t".to_string(),
            filename: "output.txt".to_string(),
            filetype: "text".to_string(),
            content: "data".to_string(),
        };
        let result = transport.upload_file("console", &upload).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_read_events_skips_blank_lines() {
        let input: &[u8] = b"bot echo hi\n\n   \nping\n";
        let (tx, mut rx) = mpsc::channel(8);
        read_events(input, tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(BotEvent::Connected("console".to_string())));
        let texts: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| match event {
                BotEvent::Message(m) => m.text,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(texts, vec!["bot echo hi", "ping"]);
    }

    #[tokio::test]
    async fn test_read_events_reports_unreadable_input() {
        let input: &[u8] = b"ping\n\xff\xfe\n";
        let (tx, mut rx) = mpsc::channel(8);
        let result = read_events(input, tx).await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(rx.recv().await, Some(BotEvent::Connected("console".to_string())));
        assert!(matches!(rx.recv().await, Some(BotEvent::Message(m)) if m.text == "ping"));
    }

    #[test]
    fn test_upload_dir_is_kept() {
        let transport = ConsoleTransport::with_writer("/var/tmp/uploads", Box::new(SharedBuf::default()));
        assert_eq!(transport.upload_dir(), Path::new("/var/tmp/uploads"));
    }
}
