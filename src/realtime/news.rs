//! Periodic broadcast-news announcer.
//!
//! Publishes a bulletin on a fixed interval through the same
//! non-blocking ingest path as client traffic, so a saturated hub drops
//! bulletins instead of stalling the ticker.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use super::hub::HubHandle;
use super::message::{Message, MessageKind};

/// Sender identity attached to announcer bulletins.
const NEWS_SENDER: &str = "system";

/// Spawns a task that ingests one `broadcast-news` message per interval.
///
/// The first bulletin goes out one full interval after start. The task
/// stops once the hub has shut down.
pub fn spawn_news_ticker(hub: HubHandle, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        loop {
            ticker.tick().await;
            if hub.is_closed() {
                tracing::debug!("hub is gone, stopping news ticker");
                break;
            }
            hub.ingest(bulletin());
        }
    })
}

/// Builds one bulletin message.
fn bulletin() -> Message {
    Message::system(
        MessageKind::BroadcastNews,
        NEWS_SENDER,
        serde_json::json!({
            "article": {
                "topic": "Crypto",
                "headline": "Bitcoin surges past $65k resistance level.",
            }
        }),
    )
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::realtime::client::ClientHandle;
    use crate::realtime::hub::Hub;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn ticker_publishes_bulletins_to_registered_clients() {
        let (hub, handle) = Hub::new("news-test", 16);
        tokio::spawn(hub.run());

        let (tx, mut rx) = mpsc::channel(8);
        handle
            .register(ClientHandle::new("u1", "Ada", Uuid::new_v4(), tx))
            .await;
        let _welcome = rx.recv().await;

        let ticker = spawn_news_ticker(handle.clone(), Duration::from_millis(10));

        let Some(frame) = rx.recv().await else {
            panic!("expected a bulletin frame");
        };
        let Ok(message) = serde_json::from_str::<Message>(frame.as_str()) else {
            panic!("bulletin is not a message envelope");
        };
        assert_eq!(message.kind, MessageKind::BroadcastNews);
        assert_eq!(message.sender_id, NEWS_SENDER);

        ticker.abort();
    }
}
