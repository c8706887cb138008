//! Connection hub: concurrent client registry and message router.
//!
//! One [`Hub`] task owns the roster of registered clients outright. All
//! mutation — registration, unregistration, fan-out, eviction — happens
//! on that single task, fed by bounded mpsc streams, so the roster needs
//! no lock. Pumps talk to the hub exclusively through a [`HubHandle`].
//! Independent hub instances (one per logical channel) share no state.

use std::collections::HashMap;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::client::ClientHandle;
use super::dispatcher::Dispatcher;
use super::message::{Message, MessageKind};
use crate::error::RelayError;

/// Teardown notice sent by a read pump when its connection ends.
#[derive(Debug)]
struct Departure {
    client_id: String,
    conn_id: Uuid,
}

/// Event pulled from one of the hub's three input streams.
#[derive(Debug)]
enum HubEvent {
    Register(ClientHandle),
    Depart(Departure),
    Inbound(Message),
}

/// Cloneable handle for submitting events to a [`Hub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<ClientHandle>,
    unregister_tx: mpsc::Sender<Departure>,
    inbound_tx: mpsc::Sender<Message>,
}

impl HubHandle {
    /// Submits a freshly authenticated connection for registration.
    pub async fn register(&self, client: ClientHandle) {
        if self.register_tx.send(client).await.is_err() {
            tracing::warn!("hub is gone, dropping registration");
        }
    }

    /// Signals that connection `conn_id` of `client_id` has ended.
    ///
    /// Idempotent on the hub side: unknown ids and stale generations are
    /// no-ops, so either pump (or an eviction racing them) may win.
    pub async fn unregister(&self, client_id: impl Into<String>, conn_id: Uuid) {
        let departure = Departure {
            client_id: client_id.into(),
            conn_id,
        };
        let _ = self.unregister_tx.send(departure).await;
    }

    /// Non-blocking enqueue onto the hub's inbound message stream.
    ///
    /// When the stream is saturated the message is dropped with a
    /// warning; the submitting task is never blocked.
    pub fn ingest(&self, message: Message) {
        use mpsc::error::TrySendError;

        match self.inbound_tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                let error = RelayError::Saturated { queue: "inbound" };
                tracing::warn!(kind = ?message.kind, %error, "message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("hub is gone, message dropped");
            }
        }
    }

    /// Returns `true` once the hub task has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inbound_tx.is_closed()
    }
}

/// Live roster of registered clients with the hub's fan-out primitives.
///
/// Mutated only from the hub's event loop; dispatcher handlers receive
/// it as `&mut Roster` for the duration of one dispatch.
#[derive(Debug, Default)]
pub struct Roster {
    clients: HashMap<String, ClientHandle>,
}

impl Roster {
    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` when no clients are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Returns `true` if `client_id` is currently registered.
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    pub(crate) fn insert(&mut self, client: ClientHandle) -> Option<ClientHandle> {
        self.clients.insert(client.id.clone(), client)
    }

    pub(crate) fn remove(&mut self, client_id: &str) -> Option<ClientHandle> {
        self.clients.remove(client_id)
    }

    pub(crate) fn get(&self, client_id: &str) -> Option<&ClientHandle> {
        self.clients.get(client_id)
    }

    /// Encodes `message` once and enqueues it to every registered client.
    ///
    /// Clients whose outbound queue is full or closed are evicted on the
    /// spot: entry removed, queue dropped. No `leave` is routed from in
    /// here — eviction is a direct removal, not a re-entrant unregister.
    pub fn broadcast_to_all(&mut self, message: &Message) {
        let Some(frame) = encode(message) else { return };

        let mut evicted = Vec::new();
        for (id, client) in &self.clients {
            if client.try_deliver(frame.clone()).is_err() {
                evicted.push(id.clone());
            }
        }
        for id in evicted {
            self.clients.remove(&id);
            tracing::warn!(client_id = %id, "outbound queue unavailable, client evicted");
        }
    }

    /// Encodes `message` and enqueues it to `target_id` only.
    ///
    /// An absent target is logged and ignored with no side effects; a
    /// saturated target is evicted exactly like a saturated broadcast
    /// recipient.
    pub fn send_to_one(&mut self, target_id: &str, message: &Message) {
        let Some(client) = self.clients.get(target_id) else {
            tracing::info!(target_id, "target not found for direct message");
            return;
        };
        let Some(frame) = encode(message) else { return };

        if client.try_deliver(frame).is_err() {
            self.clients.remove(target_id);
            tracing::warn!(target_id, "outbound queue unavailable, client evicted");
        }
    }
}

/// Encodes a message to its wire form, logging on failure.
fn encode(message: &Message) -> Option<Utf8Bytes> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Utf8Bytes::from(json)),
        Err(error) => {
            tracing::error!(%error, "failed to encode message");
            None
        }
    }
}

/// Builds the ad-hoc welcome frame delivered directly to a newcomer.
fn welcome_frame(client: &ClientHandle) -> Utf8Bytes {
    let welcome = serde_json::json!({
        "type": "welcome",
        "user_id": client.id,
        "user_name": client.display_name,
        "message": "Welcome!",
    });
    Utf8Bytes::from(welcome.to_string())
}

/// Central registry and message router for one logical channel.
///
/// The client set goes through a single state machine per id:
/// unregistered → registered → unregistered, terminal. A replacement
/// connection under the same id is a brand-new registration with its own
/// generation tag.
#[derive(Debug)]
pub struct Hub {
    name: &'static str,
    roster: Roster,
    dispatcher: Dispatcher,
    register_rx: mpsc::Receiver<ClientHandle>,
    unregister_rx: mpsc::Receiver<Departure>,
    inbound_rx: mpsc::Receiver<Message>,
}

impl Hub {
    /// Creates a hub named `name` (for diagnostics) and its handle.
    ///
    /// `queue_capacity` bounds each of the three input streams.
    #[must_use]
    pub fn new(name: &'static str, queue_capacity: usize) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(queue_capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(queue_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(queue_capacity);

        let hub = Self {
            name,
            roster: Roster::default(),
            dispatcher: Dispatcher::new(),
            register_rx,
            unregister_rx,
            inbound_rx,
        };
        let handle = HubHandle {
            register_tx,
            unregister_tx,
            inbound_tx,
        };
        (hub, handle)
    }

    /// Runs the coordinating loop until every [`HubHandle`] is dropped.
    ///
    /// Exactly one event — registration, departure, or inbound message —
    /// is processed at a time, so roster mutation and fan-out decisions
    /// never race each other.
    pub async fn run(mut self) {
        tracing::info!(hub = self.name, "hub started");
        loop {
            let event = tokio::select! {
                Some(client) = self.register_rx.recv() => HubEvent::Register(client),
                Some(departure) = self.unregister_rx.recv() => HubEvent::Depart(departure),
                Some(message) = self.inbound_rx.recv() => HubEvent::Inbound(message),
                else => break,
            };
            match event {
                HubEvent::Register(client) => self.handle_register(client),
                HubEvent::Depart(departure) => self.handle_unregister(departure),
                HubEvent::Inbound(message) => self.route(message),
            }
        }
        tracing::info!(hub = self.name, "hub stopped");
    }

    /// Registers a newcomer: force-closes any previous connection under
    /// the same id, notifies the clients already present, then inserts
    /// and welcomes the newcomer.
    fn handle_register(&mut self, client: ClientHandle) {
        if let Some(previous) = self.roster.remove(&client.id) {
            tracing::warn!(
                hub = self.name,
                client_id = %client.id,
                replaced_conn = %previous.conn_id,
                "duplicate identity, force-closing previous connection"
            );
            // Dropping `previous` closes its queue; its stale departure
            // is filtered by the generation check later.
        }

        let join = Message::system(
            MessageKind::Join,
            client.id.clone(),
            serde_json::json!({ "display_name": client.display_name }),
        );
        self.route(join);

        if client.try_deliver(welcome_frame(&client)).is_err() {
            tracing::warn!(
                hub = self.name,
                client_id = %client.id,
                "welcome undeliverable, tearing connection down"
            );
            return;
        }

        let client_id = client.id.clone();
        self.roster.insert(client);
        tracing::info!(
            hub = self.name,
            client_id = %client_id,
            total_clients = self.roster.len(),
            "client registered"
        );
    }

    /// Removes a departed client and routes its `leave`.
    ///
    /// No-op when the id is absent or the generation does not match the
    /// registered connection.
    fn handle_unregister(&mut self, departure: Departure) {
        let Some(current) = self.roster.get(&departure.client_id) else {
            return;
        };
        if current.conn_id != departure.conn_id {
            tracing::debug!(
                hub = self.name,
                client_id = %departure.client_id,
                "stale departure for a replaced connection, ignoring"
            );
            return;
        }

        self.roster.remove(&departure.client_id);
        tracing::info!(
            hub = self.name,
            client_id = %departure.client_id,
            total_clients = self.roster.len(),
            "client unregistered"
        );
        let leave = Message::system(
            MessageKind::Leave,
            departure.client_id,
            serde_json::Value::Null,
        );
        self.route(leave);
    }

    /// Routes one message. Unknown types are rejected here, before the
    /// dispatcher ever sees them.
    fn route(&mut self, message: Message) {
        if message.kind == MessageKind::Unknown {
            tracing::warn!(
                hub = self.name,
                sender_id = %message.sender_id,
                "unknown message type, dropping"
            );
            return;
        }
        self.dispatcher.dispatch(&mut self.roster, &message);
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn test_client(
        id: &str,
        conn_id: Uuid,
        capacity: usize,
    ) -> (ClientHandle, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            ClientHandle::new(id, format!("{id}-name"), conn_id, tx),
            rx,
        )
    }

    fn spawn_hub() -> HubHandle {
        let (hub, handle) = Hub::new("test", 16);
        tokio::spawn(hub.run());
        handle
    }

    async fn next_message(rx: &mut mpsc::Receiver<Utf8Bytes>) -> Message {
        let Some(frame) = rx.recv().await else {
            panic!("expected a frame, queue closed");
        };
        let Ok(message) = serde_json::from_str::<Message>(frame.as_str()) else {
            panic!("frame is not a message envelope: {frame}");
        };
        message
    }

    #[tokio::test]
    async fn register_welcomes_directly_and_does_not_echo_the_join() {
        let hub = spawn_hub();
        let (u1, mut u1_rx) = test_client("u1", Uuid::new_v4(), 8);

        hub.register(u1).await;

        let Some(frame) = u1_rx.recv().await else {
            panic!("expected a welcome frame");
        };
        let Ok(welcome) = serde_json::from_str::<serde_json::Value>(frame.as_str()) else {
            panic!("welcome is not JSON");
        };
        assert_eq!(welcome.get("type"), Some(&serde_json::json!("welcome")));
        assert_eq!(welcome.get("user_id"), Some(&serde_json::json!("u1")));

        // The newcomer's own join went out before it was inserted.
        assert!(u1_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_registration_notifies_the_first_client() {
        let hub = spawn_hub();
        let (u1, mut u1_rx) = test_client("u1", Uuid::new_v4(), 8);
        let (u2, mut u2_rx) = test_client("u2", Uuid::new_v4(), 8);

        hub.register(u1).await;
        let _welcome = u1_rx.recv().await;

        hub.register(u2).await;
        let _welcome = u2_rx.recv().await;

        let join = next_message(&mut u1_rx).await;
        assert_eq!(join.kind, MessageKind::Join);
        assert_eq!(join.sender_id, "u2");
        assert!(u2_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn private_message_reaches_only_its_target() {
        let hub = spawn_hub();
        let (u1, mut u1_rx) = test_client("u1", Uuid::new_v4(), 8);
        let (u2, mut u2_rx) = test_client("u2", Uuid::new_v4(), 8);

        hub.register(u1).await;
        let _welcome = u1_rx.recv().await;
        hub.register(u2).await;
        let _welcome = u2_rx.recv().await;
        let _join = u1_rx.recv().await;

        hub.ingest(Message {
            kind: MessageKind::Private,
            sender_id: "u1".to_string(),
            target_id: Some("u2".to_string()),
            payload: serde_json::json!({"content": "psst"}),
        });

        let private = next_message(&mut u2_rx).await;
        assert_eq!(private.kind, MessageKind::Private);
        assert_eq!(private.sender_id, "u1");
        assert!(u1_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn private_without_target_reaches_no_queue() {
        let hub = spawn_hub();
        let (u1, mut u1_rx) = test_client("u1", Uuid::new_v4(), 8);
        let (u2, mut u2_rx) = test_client("u2", Uuid::new_v4(), 8);

        hub.register(u1).await;
        let _welcome = u1_rx.recv().await;
        hub.register(u2).await;
        let _welcome = u2_rx.recv().await;
        let _join = u1_rx.recv().await;

        hub.ingest(Message {
            kind: MessageKind::Private,
            sender_id: "u1".to_string(),
            target_id: None,
            payload: serde_json::json!({"content": "to nobody"}),
        });
        // A follow-up broadcast acts as a barrier: if the private had
        // been delivered anywhere, it would arrive before the chat.
        hub.ingest(Message {
            kind: MessageKind::Chat,
            sender_id: "u1".to_string(),
            target_id: None,
            payload: serde_json::json!({"content": "hello"}),
        });

        let first_u1 = next_message(&mut u1_rx).await;
        assert_eq!(first_u1.kind, MessageKind::Chat);
        let first_u2 = next_message(&mut u2_rx).await;
        assert_eq!(first_u2.kind, MessageKind::Chat);
    }

    #[tokio::test]
    async fn saturated_client_is_evicted_on_the_second_broadcast() {
        let hub = spawn_hub();
        let (u1, mut u1_rx) = test_client("u1", Uuid::new_v4(), 1);

        hub.register(u1).await;
        let _welcome = u1_rx.recv().await;

        // Two broadcasts without the writer draining: the first fills
        // the queue, the second evicts.
        hub.ingest(Message {
            kind: MessageKind::Chat,
            sender_id: "u2".to_string(),
            target_id: None,
            payload: serde_json::json!({"n": 1}),
        });
        hub.ingest(Message {
            kind: MessageKind::Chat,
            sender_id: "u2".to_string(),
            target_id: None,
            payload: serde_json::json!({"n": 2}),
        });

        let buffered = next_message(&mut u1_rx).await;
        assert_eq!(buffered.kind, MessageKind::Chat);
        // Eviction closed the queue; nothing else can arrive.
        assert_eq!(u1_rx.recv().await, None);
    }

    #[tokio::test]
    async fn unregistering_an_unknown_id_is_a_no_op() {
        let hub = spawn_hub();
        let (u1, mut u1_rx) = test_client("u1", Uuid::new_v4(), 8);

        hub.register(u1).await;
        let _welcome = u1_rx.recv().await;

        hub.unregister("ghost", Uuid::new_v4()).await;

        hub.ingest(Message {
            kind: MessageKind::Chat,
            sender_id: "u1".to_string(),
            target_id: None,
            payload: serde_json::json!({"content": "still here"}),
        });
        let chat = next_message(&mut u1_rx).await;
        assert_eq!(chat.kind, MessageKind::Chat);
    }

    #[tokio::test]
    async fn unregistered_client_gets_a_leave_broadcast() {
        let hub = spawn_hub();
        let conn_u1 = Uuid::new_v4();
        let (u1, mut u1_rx) = test_client("u1", conn_u1, 8);
        let (u2, mut u2_rx) = test_client("u2", Uuid::new_v4(), 8);

        hub.register(u1).await;
        let _welcome = u1_rx.recv().await;
        hub.register(u2).await;
        let _welcome = u2_rx.recv().await;
        let _join = u1_rx.recv().await;

        hub.unregister("u1", conn_u1).await;

        let leave = next_message(&mut u2_rx).await;
        assert_eq!(leave.kind, MessageKind::Leave);
        assert_eq!(leave.sender_id, "u1");
        // The departed client's queue is closed, not broadcast to.
        assert_eq!(u1_rx.recv().await, None);
    }

    #[tokio::test]
    async fn duplicate_identity_force_closes_the_first_connection() {
        let hub = spawn_hub();
        let conn_a = Uuid::new_v4();
        let (first, mut first_rx) = test_client("u1", conn_a, 8);
        let (second, mut second_rx) = test_client("u1", Uuid::new_v4(), 8);

        hub.register(first).await;
        let _welcome = first_rx.recv().await;

        hub.register(second).await;
        let _welcome = second_rx.recv().await;

        // The replaced connection's queue is closed...
        assert_eq!(first_rx.recv().await, None);

        // ...and its stale departure cannot remove the replacement.
        hub.unregister("u1", conn_a).await;
        hub.ingest(Message {
            kind: MessageKind::Chat,
            sender_id: "u2".to_string(),
            target_id: None,
            payload: serde_json::json!({"content": "still routed"}),
        });
        let chat = next_message(&mut second_rx).await;
        assert_eq!(chat.kind, MessageKind::Chat);
    }

    #[tokio::test]
    async fn unknown_message_type_changes_nothing() {
        let hub = spawn_hub();
        let (u1, mut u1_rx) = test_client("u1", Uuid::new_v4(), 8);

        hub.register(u1).await;
        let _welcome = u1_rx.recv().await;

        let Ok(teleport) = serde_json::from_str::<Message>(
            r#"{"type":"teleport","sender_id":"u1","payload":{}}"#,
        ) else {
            panic!("foreign frame must decode");
        };
        hub.ingest(teleport);
        hub.ingest(Message {
            kind: MessageKind::Chat,
            sender_id: "u1".to_string(),
            target_id: None,
            payload: serde_json::json!({"content": "after"}),
        });

        let first = next_message(&mut u1_rx).await;
        assert_eq!(first.kind, MessageKind::Chat);
    }
}
