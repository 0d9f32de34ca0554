//! In-process port bindings for the coordinator.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tandem_protocol::RoomCode;
use tokio_stream::wrappers::ReceiverStream;

use crate::chat::{ChatService, TurnRequest};
use crate::room::{JoinedRoom, Room, RoomService};

use super::{RoomPort, TurnPort};

/// Binds the coordinator to the local services, bypassing HTTP.
#[derive(Clone)]
pub struct LocalPorts {
    rooms: Arc<RoomService>,
    chat: Arc<ChatService>,
}

impl LocalPorts {
    pub fn new(rooms: Arc<RoomService>, chat: Arc<ChatService>) -> Self {
        Self { rooms, chat }
    }
}

#[async_trait]
impl RoomPort for LocalPorts {
    async fn create_room(&self, creator_name: &str) -> Result<Room> {
        self.rooms.create_room(creator_name).await
    }

    async fn join_room(&self, code: &RoomCode, partner_name: &str) -> Result<Option<JoinedRoom>> {
        self.rooms.join_room(code, partner_name).await
    }

    async fn fetch_room(&self, room_id: &str) -> Result<Option<Room>> {
        self.rooms.get_room(room_id).await
    }
}

#[async_trait]
impl TurnPort for LocalPorts {
    async fn stream_turn(
        &self,
        room_id: &str,
        request: TurnRequest,
    ) -> Result<ReceiverStream<String>> {
        self.chat.run_turn(room_id, request).await
    }
}
