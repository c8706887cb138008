//! Per-connection read/write pumps.
//!
//! Each registered connection owns two independently scheduled tasks: a
//! read pump that decodes inbound frames and hands them to the hub, and
//! a write pump that drains the outbound queue and keeps the connection
//! alive with protocol pings. They communicate only through the bounded
//! outbound queue, so neither can ever block the other.

use std::time::Duration;

use axum::extract::ws::{Message as WsFrame, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout, timeout_at};
use uuid::Uuid;

use super::hub::HubHandle;
use super::message::Message;
use crate::auth::Principal;
use crate::config::PumpConfig;
use crate::error::RelayError;

/// Hub-side handle to one registered connection.
///
/// Holds the sending half of the connection's bounded outbound queue.
/// Dropping the handle closes the queue, which makes the write pump emit
/// a close frame and shut the transport down.
#[derive(Debug)]
pub struct ClientHandle {
    /// Subject identity; the hub registry key.
    pub id: String,
    /// Human-readable label, carried for presentation only.
    pub display_name: String,
    /// Per-connection generation tag. Teardown of a replaced connection
    /// must never remove its successor's registry entry.
    pub conn_id: Uuid,
    sender: mpsc::Sender<Utf8Bytes>,
}

impl ClientHandle {
    /// Creates a handle over the sending half of an outbound queue.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        conn_id: Uuid,
        sender: mpsc::Sender<Utf8Bytes>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            conn_id,
            sender,
        }
    }

    /// Non-blocking enqueue of an encoded frame.
    ///
    /// # Errors
    ///
    /// Returns the frame back if the queue is full or closed.
    pub fn try_deliver(&self, frame: Utf8Bytes) -> Result<(), mpsc::error::TrySendError<Utf8Bytes>> {
        self.sender.try_send(frame)
    }
}

/// Drives one authenticated WebSocket connection until it terminates.
///
/// Registers the connection with `hub`, spawns the write pump, runs the
/// read pump on the current task, and signals unregistration exactly
/// once when the read pump returns. The write pump winds down on its own
/// when the hub drops the outbound queue.
pub async fn run_connection(
    socket: WebSocket,
    hub: HubHandle,
    principal: Principal,
    pump: PumpConfig,
) {
    let conn_id = Uuid::new_v4();
    let (frame_tx, frame_rx) = mpsc::channel(pump.outbound_capacity);
    let client_id = principal.subject_id;

    let handle = ClientHandle::new(
        client_id.clone(),
        principal.display_name,
        conn_id,
        frame_tx,
    );
    hub.register(handle).await;

    let (ws_tx, ws_rx) = socket.split();
    tokio::spawn(write_pump(ws_tx, frame_rx, pump));

    read_pump(ws_rx, &hub, &client_id, pump).await;

    hub.unregister(client_id, conn_id).await;
}

/// Reads frames until transport error, close, or deadline expiry.
///
/// The read deadline is refreshed only by pong frames: steady chat
/// traffic from a peer that stopped answering pings still times out.
/// The frame size limit is enforced upstream by the upgrade gate.
async fn read_pump(
    mut ws_rx: SplitStream<WebSocket>,
    hub: &HubHandle,
    client_id: &str,
    pump: PumpConfig,
) {
    let mut deadline = Instant::now() + pump.read_window;

    loop {
        let frame = match timeout_at(deadline, ws_rx.next()).await {
            Err(_) => {
                tracing::warn!(client_id, "read deadline expired, closing connection");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(error))) => {
                let error = RelayError::Transport(error);
                tracing::debug!(client_id, %error, "read pump terminating");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsFrame::Text(text) => {
                if let Err(error) = ingest_frame(hub, text.as_bytes()) {
                    tracing::warn!(client_id, %error, "skipping malformed frame");
                }
            }
            WsFrame::Binary(data) => {
                if let Err(error) = ingest_frame(hub, &data) {
                    tracing::warn!(client_id, %error, "skipping malformed frame");
                }
            }
            WsFrame::Pong(_) => {
                deadline = Instant::now() + pump.read_window;
            }
            // The websocket stack answers incoming pings itself.
            WsFrame::Ping(_) => {}
            WsFrame::Close(_) => break,
        }
    }
}

/// Decodes one inbound frame and hands it to the hub.
///
/// One bad frame does not cost the client its connection; the caller
/// logs the decode error and moves on.
fn ingest_frame(hub: &HubHandle, raw: &[u8]) -> Result<(), RelayError> {
    let message = serde_json::from_slice::<Message>(raw)?;
    hub.ingest(message);
    Ok(())
}

/// Drains the outbound queue and emits heartbeat pings.
///
/// The heartbeat fires at 9/10 of the read window, first tick one full
/// period after start. Every write runs under the per-write deadline.
/// A closed queue produces a best-effort close frame before exit; any
/// write failure exits immediately. On exit the sink is closed so the
/// peer and the read pump observe EOF — the write pump never signals
/// unregistration itself.
async fn write_pump(
    mut ws_tx: SplitSink<WebSocket, WsFrame>,
    mut frames: mpsc::Receiver<Utf8Bytes>,
    pump: PumpConfig,
) {
    let period = pump.ping_period();
    let mut heartbeat = interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            queued = frames.recv() => match queued {
                Some(frame) => {
                    if write(&mut ws_tx, WsFrame::Text(frame), pump.write_wait)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                None => {
                    let _ = write(&mut ws_tx, WsFrame::Close(None), pump.write_wait).await;
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if write(&mut ws_tx, WsFrame::Ping(Bytes::new()), pump.write_wait)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    let _ = ws_tx.close().await;
}

/// Sends one frame under the per-write deadline.
async fn write(
    ws_tx: &mut SplitSink<WebSocket, WsFrame>,
    frame: WsFrame,
    write_wait: Duration,
) -> Result<(), ()> {
    match timeout(write_wait, ws_tx.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => {
            let error = RelayError::Transport(error);
            tracing::debug!(%error, "write pump terminating");
            Err(())
        }
        Err(_) => {
            tracing::debug!("write deadline expired");
            Err(())
        }
    }
}
