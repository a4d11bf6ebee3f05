//! Plugbot message handling
//!
//! Turns inbound chat text into plugin invocations and delivers the output
//! through a [`Transport`]. The chat network itself lives behind that trait.

mod bot;
mod console;
mod dispatcher;
mod handlers;
mod transport;

#[cfg(test)]
mod testing;

pub use bot::{Bot, BotEvent};
pub use console::{CONSOLE_CHANNEL, ConsoleTransport, read_events};
pub use dispatcher::{CommandRequest, DeliveryAction, Dispatch, DispatchConfig, Dispatcher};
pub use handlers::{Handled, MessageHandler, PingHandler};
pub use transport::{FileUpload, InboundMessage, Transport, format_block};
