//! Inbound event loop

use crate::handlers::{Handled, MessageHandler};
use crate::transport::{InboundMessage, Transport};
use plugbot_core::config::DispatchMode;
use plugbot_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Events delivered by a transport's connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// Connection established; carries a description for the log
    Connected(String),
    /// A chat message
    Message(InboundMessage),
    /// Non-fatal transport error
    Error(String),
    /// Credentials were rejected; the loop stops
    InvalidAuth,
}

/// Feeds inbound messages to every registered handler
pub struct Bot {
    transport: Arc<dyn Transport>,
    handlers: Vec<Arc<dyn MessageHandler>>,
    mode: DispatchMode,
}

impl Bot {
    pub fn new(transport: Arc<dyn Transport>, mode: DispatchMode) -> Self {
        Self {
            transport,
            handlers: Vec::new(),
            mode,
        }
    }

    /// Register a handler; handlers run in registration order
    pub fn handler(&mut self, handler: Arc<dyn MessageHandler>) -> &mut Self {
        tracing::debug!("Registering handler: {}", handler.name());
        self.handlers.push(handler);
        self
    }

    /// Consume events until the channel closes or credentials are rejected.
    ///
    /// In concurrent mode every message gets its own task; tasks still
    /// running when the channel closes are awaited before returning.
    pub async fn run(&self, mut events: mpsc::Receiver<BotEvent>) -> Result<()> {
        let mut in_flight = JoinSet::new();

        let outcome = loop {
            let Some(event) = events.recv().await else {
                break Ok(());
            };
            match event {
                BotEvent::Connected(info) => {
                    tracing::info!(event = "connected", "{}", info);
                }
                BotEvent::Message(message) => {
                    tracing::info!(event = "message", channel = %message.channel, "{}", message.text);
                    match self.mode {
                        DispatchMode::Serial => {
                            process(&self.handlers, self.transport.as_ref(), &message).await;
                        }
                        DispatchMode::Concurrent => {
                            let handlers = self.handlers.clone();
                            let transport = self.transport.clone();
                            in_flight.spawn(async move {
                                process(&handlers, transport.as_ref(), &message).await;
                            });
                        }
                    }
                }
                BotEvent::Error(e) => {
                    tracing::error!(event = "error", "transport error: {}", e);
                }
                BotEvent::InvalidAuth => {
                    tracing::error!("invalid credentials");
                    break Err(Error::Transport("invalid credentials".to_string()));
                }
            }

            // reap finished tasks so panics surface in the log promptly
            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }
        };

        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        outcome
    }
}

async fn process(handlers: &[Arc<dyn MessageHandler>], transport: &dyn Transport, message: &InboundMessage) {
    for handler in handlers {
        match handler.handle(message, transport).await {
            Ok(Handled::Done) => {
                tracing::debug!(handler = handler.name(), "message handled");
            }
            Ok(Handled::Ignored) => {}
            Err(e) => {
                tracing::error!(handler = handler.name(), error = %e, "failed to process message");
            }
        }
    }
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("message task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::PingHandler;
    use crate::testing::{RecordingTransport, Sent};
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    /// Replies with its own text after a delay
    struct SlowEcho {
        delay: Duration,
    }

    #[async_trait]
    impl MessageHandler for SlowEcho {
        fn name(&self) -> &str {
            "slow-echo"
        }

        async fn handle(&self, message: &InboundMessage, transport: &dyn Transport) -> Result<Handled> {
            tokio::time::sleep(self.delay).await;
            transport.send_text(&message.channel, &message.text, None).await?;
            Ok(Handled::Done)
        }
    }

    fn texts(sent: &[Sent]) -> Vec<String> {
        sent.iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_serial_preserves_order_and_stops_on_close() {
        let transport = Arc::new(RecordingTransport::new());
        let mut bot = Bot::new(transport.clone(), DispatchMode::Serial);
        bot.handler(Arc::new(PingHandler::new("ping")));

        let (tx, rx) = mpsc::channel(8);
        tx.send(BotEvent::Connected("console".into())).await.unwrap();
        tx.send(BotEvent::Message(InboundMessage::new("C1", "ping"))).await.unwrap();
        tx.send(BotEvent::Error("latency spike".into())).await.unwrap();
        tx.send(BotEvent::Message(InboundMessage::new("C1", "not for me"))).await.unwrap();
        tx.send(BotEvent::Message(InboundMessage::new("C2", "ping again"))).await.unwrap();
        drop(tx);

        bot.run(rx).await.unwrap();

        let sent = transport.sent();
        assert_eq!(texts(&sent), vec!["pong", "pong"]);
        assert!(matches!(&sent[1], Sent::Text { channel, .. } if channel == "C2"));
    }

    #[tokio::test]
    async fn test_invalid_auth_stops_loop() {
        let transport = Arc::new(RecordingTransport::new());
        let mut bot = Bot::new(transport.clone(), DispatchMode::Serial);
        bot.handler(Arc::new(PingHandler::new("ping")));

        let (tx, rx) = mpsc::channel(8);
        tx.send(BotEvent::InvalidAuth).await.unwrap();
        tx.send(BotEvent::Message(InboundMessage::new("C1", "ping"))).await.unwrap();

        let result = bot.run(rx).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_handler_errors_are_not_fatal() {
        let transport = Arc::new(RecordingTransport::failing());
        let mut bot = Bot::new(transport, DispatchMode::Serial);
        bot.handler(Arc::new(PingHandler::new("ping")));

        let (tx, rx) = mpsc::channel(8);
        tx.send(BotEvent::Message(InboundMessage::new("C1", "ping"))).await.unwrap();
        tx.send(BotEvent::Message(InboundMessage::new("C1", "ping"))).await.unwrap();
        drop(tx);

        assert!(bot.run(rx).await.is_ok());
    }

    #[tokio::test]
    async fn test_serial_mode_blocks_behind_slow_handler() {
        let transport = Arc::new(RecordingTransport::new());
        let mut bot = Bot::new(transport.clone(), DispatchMode::Serial);
        bot.handler(Arc::new(SlowEcho {
            delay: Duration::from_millis(200),
        }));

        let (tx, rx) = mpsc::channel(8);
        for text in ["one", "two", "three"] {
            tx.send(BotEvent::Message(InboundMessage::new("C1", text))).await.unwrap();
        }
        drop(tx);

        let started = Instant::now();
        bot.run(rx).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(600));
        assert_eq!(texts(&transport.sent()), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_concurrent_mode_overlaps_and_drains() {
        let transport = Arc::new(RecordingTransport::new());
        let mut bot = Bot::new(transport.clone(), DispatchMode::Concurrent);
        bot.handler(Arc::new(SlowEcho {
            delay: Duration::from_millis(300),
        }));

        let (tx, rx) = mpsc::channel(8);
        for text in ["one", "two", "three"] {
            tx.send(BotEvent::Message(InboundMessage::new("C1", text))).await.unwrap();
        }
        drop(tx);

        let started = Instant::now();
        bot.run(rx).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(800));

        let mut got = texts(&transport.sent());
        got.sort();
        assert_eq!(got, vec!["one", "three", "two"]);
    }
}
