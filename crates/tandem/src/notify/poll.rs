//! Timer-driven polling implementation of the message feed.

use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{MessageFeed, MessageStream};
use crate::chat::MessageRepository;

/// Size of the per-subscription forwarding channel.
const POLL_BUFFER_SIZE: usize = 64;

/// Polls the offset-based incremental fetch and forwards new rows.
///
/// Trades latency (bounded by the poll interval) for zero server-side
/// subscription state. The offset assumes the transcript is append-only.
pub struct PollFeed {
    messages: MessageRepository,
    interval: Duration,
}

impl PollFeed {
    pub fn new(messages: MessageRepository, interval: Duration) -> Self {
        Self { messages, interval }
    }
}

#[async_trait]
impl MessageFeed for PollFeed {
    async fn subscribe(&self, room_id: &str) -> Result<MessageStream> {
        // Only rows inserted after the subscription was taken are delivered.
        let mut seen = self.messages.count(room_id).await?;

        let messages = self.messages.clone();
        let room_id = room_id.to_string();
        let interval = self.interval;
        let (tx, rx) = mpsc::channel(POLL_BUFFER_SIZE);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    // Subscriber dropped the stream; stop the timer.
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {
                        let batch = match messages.list_after(&room_id, seen).await {
                            Ok(batch) => batch,
                            Err(err) => {
                                warn!("poll fetch failed for room {}: {:#}", room_id, err);
                                continue;
                            }
                        };
                        for message in batch {
                            seen += 1;
                            if tx.send(message).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::room::RoomRepository;
    use futures::StreamExt;
    use tandem_protocol::{Role, RoomCode};

    async fn setup() -> (MessageRepository, String) {
        let db = Database::in_memory().await.unwrap();
        let rooms = RoomRepository::new(db.pool().clone());
        let room = rooms
            .create(&RoomCode::parse("ABC234").unwrap(), "Alice")
            .await
            .unwrap();
        (MessageRepository::new(db.pool().clone()), room.id)
    }

    #[tokio::test]
    async fn test_poll_feed_delivers_new_inserts_only() {
        let (repo, room_id) = setup().await;

        // Already-present history is not replayed.
        repo.append(&room_id, Role::User, "[Alice]: old", None)
            .await
            .unwrap();

        let feed = PollFeed::new(repo.clone(), Duration::from_millis(10));
        let mut stream = feed.subscribe(&room_id).await.unwrap();

        repo.append(&room_id, Role::User, "[Bob]: new", None)
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("poll should deliver within the timeout")
            .unwrap();
        assert_eq!(received.content, "[Bob]: new");
    }

    #[tokio::test]
    async fn test_poll_feed_preserves_insertion_order() {
        let (repo, room_id) = setup().await;
        let feed = PollFeed::new(repo.clone(), Duration::from_millis(10));
        let mut stream = feed.subscribe(&room_id).await.unwrap();

        repo.append(&room_id, Role::User, "[Alice]: one", None)
            .await
            .unwrap();
        repo.append(&room_id, Role::Assistant, "two", None)
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.content, "[Alice]: one");
        assert_eq!(second.content, "two");
    }
}
