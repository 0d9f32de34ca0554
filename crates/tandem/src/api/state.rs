//! Application state shared across handlers.

use std::sync::Arc;

use crate::chat::ChatService;
use crate::notify::MessageFeed;
use crate::room::RoomService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Room lifecycle service.
    pub rooms: Arc<RoomService>,
    /// Transcript and turn service.
    pub chat: Arc<ChatService>,
    /// Configured message feed (push or poll) behind the events endpoint.
    pub feed: Arc<dyn MessageFeed>,
}

impl AppState {
    /// Create new application state.
    pub fn new(rooms: Arc<RoomService>, chat: Arc<ChatService>, feed: Arc<dyn MessageFeed>) -> Self {
        Self { rooms, chat, feed }
    }
}
