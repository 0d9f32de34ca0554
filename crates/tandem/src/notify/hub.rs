//! In-process broadcast hub for message inserts.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::{MessageFeed, MessageStream};
use crate::chat::ChatMessage;

/// Size of each room's broadcast channel.
const EVENT_BUFFER_SIZE: usize = 256;

/// Hub fanning message inserts out to per-room subscribers.
///
/// The chat service publishes every genuinely new insert here; the push
/// feed and the SSE endpoint subscribe. Rooms with no subscribers cost
/// nothing: channels are created on first subscribe and dropped once the
/// last receiver goes away.
pub struct RoomHub {
    channels: DashMap<String, broadcast::Sender<ChatMessage>>,
}

impl RoomHub {
    /// Create a new hub.
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to inserts for a room.
    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<ChatMessage> {
        self.channels
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_BUFFER_SIZE).0)
            .subscribe()
    }

    /// Publish an insert to the room's subscribers, if any.
    pub fn publish(&self, message: &ChatMessage) {
        let Some(tx) = self.channels.get(&message.room_id) else {
            return;
        };
        if tx.send(message.clone()).is_err() {
            debug!("no live subscribers for room {}", message.room_id);
            drop(tx);
            // Last receiver is gone; reclaim the channel.
            self.channels
                .remove_if(&message.room_id, |_, tx| tx.receiver_count() == 0);
        }
    }

    /// Number of live subscribers for a room.
    pub fn subscriber_count(&self, room_id: &str) -> usize {
        self.channels
            .get(room_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Push implementation of [`MessageFeed`] backed by the hub.
pub struct PushFeed {
    hub: Arc<RoomHub>,
}

impl PushFeed {
    pub fn new(hub: Arc<RoomHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl MessageFeed for PushFeed {
    async fn subscribe(&self, room_id: &str) -> Result<MessageStream> {
        let rx = self.hub.subscribe(room_id);
        let room_id = room_id.to_string();
        let stream = BroadcastStream::new(rx).filter_map(move |item| {
            let room_id = room_id.clone();
            async move {
                match item {
                    Ok(message) => Some(message),
                    Err(lag) => {
                        // A slow subscriber misses messages rather than
                        // stalling the hub; the poll path can backfill.
                        warn!("subscriber lagged on room {}: {}", room_id, lag);
                        None
                    }
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_protocol::Role;

    fn message(room_id: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: 1,
            room_id: room_id.to_string(),
            role: Role::User,
            content: content.to_string(),
            client_id: None,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let hub = RoomHub::new();
        let mut rx = hub.subscribe("room-1");

        hub.publish(&message("room-1", "[Alice]: hi"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.content, "[Alice]: hi");
    }

    #[tokio::test]
    async fn test_publish_is_scoped_to_room() {
        let hub = RoomHub::new();
        let mut rx = hub.subscribe("room-1");

        hub.publish(&message("room-2", "[Alice]: other room"));
        hub.publish(&message("room-1", "[Alice]: mine"));
        assert_eq!(rx.recv().await.unwrap().content, "[Alice]: mine");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let hub = RoomHub::new();
        hub.publish(&message("room-1", "[Alice]: nobody listening"));
        assert_eq!(hub.subscriber_count("room-1"), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_reclaims_channel() {
        let hub = RoomHub::new();
        let rx = hub.subscribe("room-1");
        assert_eq!(hub.subscriber_count("room-1"), 1);

        drop(rx);
        hub.publish(&message("room-1", "[Alice]: hi"));
        assert_eq!(hub.subscriber_count("room-1"), 0);
    }

    #[tokio::test]
    async fn test_push_feed_streams_inserts() {
        let hub = Arc::new(RoomHub::new());
        let feed = PushFeed::new(hub.clone());
        let mut stream = feed.subscribe("room-1").await.unwrap();

        hub.publish(&message("room-1", "[Bob]: hello"));
        let received = stream.next().await.unwrap();
        assert_eq!(received.content, "[Bob]: hello");
    }
}
