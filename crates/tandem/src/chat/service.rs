//! Chat service - transcript appends and turn streaming.

use anyhow::{Context, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use log::{info, warn};
use std::sync::Arc;
use tandem_protocol::{Role, prefix_sender};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::completion::{CompletionBackend, Participants, PromptMessage};
use crate::notify::RoomHub;
use crate::room::{Room, RoomRepository};

use super::models::{AppendMessageRequest, ChatMessage, TurnRequest};
use super::repository::MessageRepository;

/// The single fixed line substituted for a failed reply stream.
///
/// Persisted like any other assistant message, so both participants
/// converge on the same transcript after a failure.
pub const FALLBACK_REPLY: &str = "I'm having a moment. Can you try that again?";

/// Buffer size for the turn fragment channel.
const TURN_BUFFER_SIZE: usize = 64;

/// Service for transcript appends and streamed turns.
#[derive(Clone)]
pub struct ChatService {
    messages: MessageRepository,
    rooms: RoomRepository,
    completion: Arc<dyn CompletionBackend>,
    hub: Arc<RoomHub>,
    /// Rooms with a reply currently streaming. One turn in flight per room;
    /// a second send is rejected rather than cancelling the first.
    streaming: Arc<DashMap<String, ()>>,
}

impl ChatService {
    /// Create a new chat service.
    pub fn new(
        messages: MessageRepository,
        rooms: RoomRepository,
        completion: Arc<dyn CompletionBackend>,
        hub: Arc<RoomHub>,
    ) -> Self {
        Self {
            messages,
            rooms,
            completion,
            hub,
            streaming: Arc::new(DashMap::new()),
        }
    }

    /// Append a message to a room's transcript.
    ///
    /// Genuinely new rows bump the room's `updated_at` and fan out to
    /// subscribers; a replay of an already-stored `client_id` returns the
    /// existing row without either.
    pub async fn append_message(
        &self,
        room_id: &str,
        request: AppendMessageRequest,
    ) -> Result<ChatMessage> {
        if request.content.trim().is_empty() {
            anyhow::bail!("message content must not be empty");
        }
        if self.rooms.get(room_id).await?.is_none() {
            anyhow::bail!("room not found: {}", room_id);
        }

        let (message, inserted) = self
            .messages
            .append(
                room_id,
                request.role,
                &request.content,
                request.client_id.as_deref(),
            )
            .await?;

        if inserted {
            self.rooms.touch(room_id).await?;
            self.hub.publish(&message);
        }
        Ok(message)
    }

    /// List a room's transcript, optionally past an offset the caller
    /// already holds.
    pub async fn list_messages(&self, room_id: &str, after: Option<i64>) -> Result<Vec<ChatMessage>> {
        match after {
            Some(after) if after > 0 => self.messages.list_after(room_id, after).await,
            _ => self.messages.list(room_id).await,
        }
    }

    /// Run one turn: persist the prefixed user line, stream the assistant
    /// reply, persist the accumulated reply when the stream ends.
    ///
    /// Returns the live fragment stream for the sender. Fails with a
    /// conflict while another reply is streaming in the same room. A failed
    /// reply stream substitutes [`FALLBACK_REPLY`], persisted exactly once.
    pub async fn run_turn(
        &self,
        room_id: &str,
        request: TurnRequest,
    ) -> Result<ReceiverStream<String>> {
        let sender_name = request.sender_name.trim().to_string();
        let text = request.text.trim().to_string();
        if sender_name.is_empty() {
            anyhow::bail!("sender name must not be empty");
        }
        if text.is_empty() {
            anyhow::bail!("message text must not be empty");
        }

        let room = self
            .rooms
            .get(room_id)
            .await?
            .with_context(|| format!("room not found: {}", room_id))?;

        match self.streaming.entry(room_id.to_string()) {
            Entry::Occupied(_) => {
                anyhow::bail!("a reply is already streaming in room {}", room_id)
            }
            Entry::Vacant(entry) => {
                entry.insert(());
            }
        }

        match self.start_turn(&room, sender_name, text, request.client_id).await {
            Ok(stream) => Ok(stream),
            Err(err) => {
                self.streaming.remove(room_id);
                Err(err)
            }
        }
    }

    /// True while a reply is streaming in the room.
    pub fn is_streaming(&self, room_id: &str) -> bool {
        self.streaming.contains_key(room_id)
    }

    async fn start_turn(
        &self,
        room: &Room,
        sender_name: String,
        text: String,
        client_id: Option<String>,
    ) -> Result<ReceiverStream<String>> {
        let client_id = client_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let prefixed = prefix_sender(&sender_name, &text);

        let (user_message, inserted) = self
            .messages
            .append(&room.id, Role::User, &prefixed, Some(&client_id))
            .await?;
        if inserted {
            self.rooms.touch(&room.id).await?;
            self.hub.publish(&user_message);
        }

        let transcript: Vec<PromptMessage> = self
            .messages
            .list(&room.id)
            .await?
            .into_iter()
            .map(|m| PromptMessage {
                role: m.role,
                content: m.content,
            })
            .collect();

        let participants = Participants {
            partner_a: room.creator_name.clone(),
            partner_b: room
                .partner_name
                .clone()
                .unwrap_or_else(|| "Partner".to_string()),
        };

        info!("turn started in room {} by {}", room.id, sender_name);

        let (tx, rx) = mpsc::channel(TURN_BUFFER_SIZE);
        let service = self.clone();
        let room_id = room.id.clone();
        tokio::spawn(async move {
            service
                .stream_reply(&room_id, transcript, participants, tx)
                .await;
            service.streaming.remove(&room_id);
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Drive the completion stream, forwarding fragments to the sender and
    /// persisting the outcome. Runs to completion even if the sender
    /// disconnects, so the other participant still converges.
    async fn stream_reply(
        &self,
        room_id: &str,
        transcript: Vec<PromptMessage>,
        participants: Participants,
        tx: mpsc::Sender<String>,
    ) {
        let mut stream = match self.completion.stream_reply(&transcript, &participants).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!("completion request failed in room {}: {}", room_id, err);
                self.finish_with_fallback(room_id, &tx).await;
                return;
            }
        };

        let mut reply = String::new();
        let mut errored = false;
        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(text) => {
                    reply.push_str(&text);
                    // The sender may have gone away; keep accumulating so
                    // the reply is still persisted.
                    let _ = tx.send(text).await;
                }
                Err(err) => {
                    warn!("completion stream failed in room {}: {}", room_id, err);
                    errored = true;
                    break;
                }
            }
        }

        if errored {
            self.finish_with_fallback(room_id, &tx).await;
        } else if !reply.is_empty() {
            self.persist_assistant(room_id, &reply).await;
        }
    }

    /// Append the fallback line once, persisted and forwarded.
    async fn finish_with_fallback(&self, room_id: &str, tx: &mpsc::Sender<String>) {
        self.persist_assistant(room_id, FALLBACK_REPLY).await;
        let _ = tx.send(FALLBACK_REPLY.to_string()).await;
    }

    async fn persist_assistant(&self, room_id: &str, content: &str) {
        let client_id = uuid::Uuid::new_v4().to_string();
        match self
            .messages
            .append(room_id, Role::Assistant, content, Some(&client_id))
            .await
        {
            Ok((message, inserted)) => {
                if inserted {
                    if let Err(err) = self.rooms.touch(room_id).await {
                        warn!("failed to touch room {}: {:#}", room_id, err);
                    }
                    self.hub.publish(&message);
                }
            }
            Err(err) => {
                warn!(
                    "failed to persist assistant reply in room {}: {:#}",
                    room_id, err
                );
            }
        }
    }
}
