//! Realtime core: hub, dispatcher, message envelope, connection pumps.
//!
//! This is the concurrency heart of the gateway. One [`Hub`] task per
//! logical channel owns the client roster; per-connection read/write
//! pumps feed it through bounded queues; the [`Dispatcher`] routes each
//! inbound [`Message`] by type.

pub mod client;
pub mod dispatcher;
pub mod hub;
pub mod message;
pub mod news;

pub use client::{ClientHandle, run_connection};
pub use dispatcher::Dispatcher;
pub use hub::{Hub, HubHandle, Roster};
pub use message::{Message, MessageKind};
pub use news::spawn_news_ticker;
