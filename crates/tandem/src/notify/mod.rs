//! Delivery of remote message inserts.
//!
//! Clients learn about the other participant's inserts through the
//! [`MessageFeed`] port. Two implementations exist: [`PushFeed`] reads the
//! in-process broadcast hub the chat service publishes to, and [`PollFeed`]
//! drives the offset-based incremental fetch on a timer. Which one serves
//! the events endpoint is chosen by configuration; subscribers are agnostic.

mod hub;
mod poll;

pub use hub::{PushFeed, RoomHub};
pub use poll::PollFeed;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::chat::ChatMessage;

/// An open subscription: messages inserted into the room after the
/// subscription was taken. Dropping the stream releases its resources.
pub type MessageStream = Pin<Box<dyn Stream<Item = ChatMessage> + Send>>;

/// Source of remote message inserts for one room.
#[async_trait]
pub trait MessageFeed: Send + Sync {
    async fn subscribe(&self, room_id: &str) -> Result<MessageStream>;
}
