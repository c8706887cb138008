//! Fixed routing table from message type to handler.
//!
//! Built once at hub construction and never mutated afterwards; the
//! dispatcher performs no I/O of its own. Handlers run on the hub's
//! coordinating task and call back into the roster's fan-out primitives.

use std::collections::HashMap;
use std::fmt;

use super::hub::Roster;
use super::message::{Message, MessageKind};
use crate::error::RelayError;

/// A routed handler for one message type.
pub trait MessageHandler: Send + Sync {
    /// Processes `message` against the live roster.
    fn handle(&self, roster: &mut Roster, message: &Message);
}

/// Type-to-handler routing table.
///
/// Holds no mutable state after construction, so one instance could be
/// shared read-only across any number of hubs.
pub struct Dispatcher {
    handlers: HashMap<MessageKind, Box<dyn MessageHandler>>,
}

impl Dispatcher {
    /// Builds the routing table.
    #[must_use]
    pub fn new() -> Self {
        let mut handlers: HashMap<MessageKind, Box<dyn MessageHandler>> = HashMap::new();
        handlers.insert(MessageKind::Chat, Box::new(BroadcastHandler));
        handlers.insert(MessageKind::Join, Box::new(BroadcastHandler));
        handlers.insert(MessageKind::Leave, Box::new(BroadcastHandler));
        handlers.insert(MessageKind::BroadcastNews, Box::new(BroadcastHandler));
        handlers.insert(MessageKind::Private, Box::new(PrivateHandler));
        handlers.insert(MessageKind::Ping, Box::new(PingHandler));
        Self { handlers }
    }

    /// Routes `message` to its handler.
    ///
    /// A type with no routed handler is logged and dropped; roster state
    /// is untouched.
    pub fn dispatch(&self, roster: &mut Roster, message: &Message) {
        match self.handlers.get(&message.kind) {
            Some(handler) => handler.handle(roster, message),
            None => {
                let error = RelayError::Unroutable(format!("{:?}", message.kind));
                tracing::warn!(%error, "message dropped");
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Fans the message out to every registered client.
struct BroadcastHandler;

impl MessageHandler for BroadcastHandler {
    fn handle(&self, roster: &mut Roster, message: &Message) {
        roster.broadcast_to_all(message);
    }
}

/// Delivers the message to its target client only.
struct PrivateHandler;

impl MessageHandler for PrivateHandler {
    fn handle(&self, roster: &mut Roster, message: &Message) {
        match message.target_id.as_deref() {
            Some(target) if !target.is_empty() => roster.send_to_one(target, message),
            _ => {
                tracing::info!(
                    sender_id = %message.sender_id,
                    "private message without target, dropping"
                );
            }
        }
    }
}

/// Records receipt of an application-level ping; no fan-out.
struct PingHandler;

impl MessageHandler for PingHandler {
    fn handle(&self, _roster: &mut Roster, message: &Message) {
        tracing::info!(sender_id = %message.sender_id, "application ping received");
    }
}
