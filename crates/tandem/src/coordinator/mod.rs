//! Client-side session coordinator.
//!
//! Drives one participant's view of a room through its phases: create or
//! join in the lobby, wait for a partner, then exchange turns. The
//! coordinator talks to the backend only through the [`RoomPort`] and
//! [`TurnPort`] seams, so it never depends on a specific storage or
//! transport; [`LocalPorts`] binds it to the in-process services.
//!
//! The local transcript is optimistic: the participant's own sends appear
//! immediately, while the store's insertion order stays authoritative.
//! Remote inserts arrive through a message feed and are deduplicated by
//! message identity, falling back to the last-entry content heuristic for
//! rows without one.

mod local;

pub use local::LocalPorts;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use tandem_protocol::{Role, RoomCode, prefix_sender};
use thiserror::Error;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatMessage, FALLBACK_REPLY, TurnRequest};
use crate::room::{JoinedRoom, Room};

/// Default interval between partner polls while waiting.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Where the participant is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Waiting,
    Chat,
}

/// One line of the local transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub client_id: Option<String>,
}

/// Coordinator errors. Each maps to a recoverable outcome: the phase is
/// never left half-changed.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("no session matches that code")]
    NotFound,

    #[error("a reply is already streaming")]
    TurnInFlight,

    #[error("operation not allowed in the {0:?} phase")]
    WrongPhase(Phase),

    #[error("session backend error: {0}")]
    Backend(String),
}

impl CoordinatorError {
    fn backend(err: anyhow::Error) -> Self {
        Self::Backend(format!("{:#}", err))
    }
}

/// Room operations the coordinator needs from its backend.
#[async_trait]
pub trait RoomPort: Send + Sync {
    async fn create_room(&self, creator_name: &str) -> Result<Room>;
    async fn join_room(&self, code: &RoomCode, partner_name: &str) -> Result<Option<JoinedRoom>>;
    async fn fetch_room(&self, room_id: &str) -> Result<Option<Room>>;
}

/// Turn streaming as the coordinator sees it: one request, one finite
/// fragment stream. Reply-stream failures surface in-band as the fallback
/// line; an `Err` here means the turn never started.
#[async_trait]
pub trait TurnPort: Send + Sync {
    async fn stream_turn(
        &self,
        room_id: &str,
        request: TurnRequest,
    ) -> Result<ReceiverStream<String>>;
}

struct RoomHandle {
    id: String,
    code: RoomCode,
}

/// One participant's session state machine.
pub struct SessionCoordinator<R, T> {
    rooms: R,
    turns: T,
    phase: Phase,
    my_name: Option<String>,
    partner_name: Option<String>,
    room: Option<RoomHandle>,
    transcript: Vec<TranscriptEntry>,
    seen_ids: HashSet<String>,
    streaming: bool,
    poll_interval: Duration,
}

impl<R: RoomPort, T: TurnPort> SessionCoordinator<R, T> {
    /// Create a coordinator in the lobby.
    pub fn new(rooms: R, turns: T) -> Self {
        Self {
            rooms,
            turns,
            phase: Phase::Lobby,
            my_name: None,
            partner_name: None,
            room: None,
            transcript: Vec::new(),
            seen_ids: HashSet::new(),
            streaming: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the partner poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn room_code(&self) -> Option<&RoomCode> {
        self.room.as_ref().map(|r| &r.code)
    }

    /// Room ID for feed subscriptions and polling, once out of the lobby.
    pub fn room_id(&self) -> Option<&str> {
        self.room.as_ref().map(|r| r.id.as_str())
    }

    pub fn partner_name(&self) -> Option<&str> {
        self.partner_name.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Create a room and move to `Waiting`.
    ///
    /// Two calls create two independent rooms. On failure the coordinator
    /// stays in the lobby with nothing recorded, so the caller can retry.
    pub async fn create_session(
        &mut self,
        display_name: &str,
    ) -> Result<RoomCode, CoordinatorError> {
        if self.phase != Phase::Lobby {
            return Err(CoordinatorError::WrongPhase(self.phase));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(CoordinatorError::InvalidInput("display name must not be empty"));
        }

        let room = self
            .rooms
            .create_room(display_name)
            .await
            .map_err(CoordinatorError::backend)?;

        let code = room.code.clone();
        self.my_name = Some(display_name.to_string());
        self.room = Some(RoomHandle {
            id: room.id,
            code: room.code,
        });
        self.phase = Phase::Waiting;
        Ok(code)
    }

    /// Join a room by code and move straight to `Chat`.
    ///
    /// `NotFound` leaves the coordinator in the lobby; the caller may retry
    /// with a different code.
    pub async fn join_session(
        &mut self,
        code_input: &str,
        display_name: &str,
    ) -> Result<(), CoordinatorError> {
        if self.phase != Phase::Lobby {
            return Err(CoordinatorError::WrongPhase(self.phase));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(CoordinatorError::InvalidInput("display name must not be empty"));
        }
        let code = RoomCode::parse(code_input)
            .map_err(|_| CoordinatorError::InvalidInput("invalid room code"))?;

        let Some(joined) = self
            .rooms
            .join_room(&code, display_name)
            .await
            .map_err(CoordinatorError::backend)?
        else {
            return Err(CoordinatorError::NotFound);
        };

        self.my_name = Some(display_name.to_string());
        self.partner_name = Some(joined.room.creator_name.clone());
        self.room = Some(RoomHandle {
            id: joined.room.id.clone(),
            code: joined.room.code.clone(),
        });
        self.transcript = joined
            .messages
            .into_iter()
            .map(|m| TranscriptEntry {
                role: m.role,
                content: m.content,
                client_id: m.client_id,
            })
            .collect();
        self.seen_ids = self
            .transcript
            .iter()
            .filter_map(|e| e.client_id.clone())
            .collect();
        self.phase = Phase::Chat;
        Ok(())
    }

    /// One partner poll. Returns true when the partner arrived and the
    /// coordinator moved to `Chat`.
    pub async fn poll_partner_once(&mut self) -> Result<bool, CoordinatorError> {
        if self.phase != Phase::Waiting {
            return Err(CoordinatorError::WrongPhase(self.phase));
        }
        let Some(room) = &self.room else {
            return Err(CoordinatorError::WrongPhase(self.phase));
        };

        let fetched = self
            .rooms
            .fetch_room(&room.id)
            .await
            .map_err(CoordinatorError::backend)?;

        match fetched.and_then(|r| r.partner_name) {
            Some(partner) => {
                self.partner_name = Some(partner);
                self.phase = Phase::Chat;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Poll until the partner joins or the token cancels.
    ///
    /// Returns true when the partner arrived, false on cancellation. The
    /// loop stops as soon as either happens; no timer outlives it.
    pub async fn await_partner(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<bool, CoordinatorError> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                _ = ticker.tick() => {
                    if self.poll_partner_once().await? {
                        return Ok(true);
                    }
                }
            }
        }
    }

    /// Abandon a waiting room and return to the lobby.
    pub fn cancel_waiting(&mut self) {
        if self.phase == Phase::Waiting {
            self.phase = Phase::Lobby;
            self.room = None;
            self.partner_name = None;
        }
    }

    /// Send one turn and stream the assistant reply into the transcript.
    ///
    /// The user line appears locally before any round trip completes. A
    /// send while a reply is streaming is rejected, not queued. A turn that
    /// never starts appends the fallback line; a reply stream that fails
    /// mid-flight already carries the fallback in-band.
    pub async fn send_turn(&mut self, text: &str) -> Result<(), CoordinatorError> {
        if self.phase != Phase::Chat {
            return Err(CoordinatorError::WrongPhase(self.phase));
        }
        if self.streaming {
            return Err(CoordinatorError::TurnInFlight);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(CoordinatorError::InvalidInput("message text must not be empty"));
        }
        let (room_id, my_name) = match (&self.room, &self.my_name) {
            (Some(room), Some(name)) => (room.id.clone(), name.clone()),
            _ => return Err(CoordinatorError::WrongPhase(self.phase)),
        };

        self.streaming = true;
        let result = self.run_send(&room_id, &my_name, text).await;
        self.streaming = false;
        result
    }

    async fn run_send(
        &mut self,
        room_id: &str,
        my_name: &str,
        text: &str,
    ) -> Result<(), CoordinatorError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let prefixed = prefix_sender(my_name, text);
        self.push_entry(Role::User, prefixed, Some(client_id.clone()));

        let request = TurnRequest {
            sender_name: my_name.to_string(),
            text: text.to_string(),
            client_id: Some(client_id),
        };

        let mut stream = match self.turns.stream_turn(room_id, request).await {
            Ok(stream) => stream,
            Err(err) => {
                if format!("{:#}", err).contains("already streaming") {
                    // The send was rejected outright; take the optimistic
                    // line back out.
                    self.pop_entry();
                    return Err(CoordinatorError::TurnInFlight);
                }
                self.push_entry(Role::Assistant, FALLBACK_REPLY.to_string(), None);
                return Ok(());
            }
        };

        // Live assistant entry, grown fragment by fragment.
        self.push_entry(Role::Assistant, String::new(), None);
        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            reply.push_str(&fragment);
            if let Some(last) = self.transcript.last_mut() {
                last.content = reply.clone();
            }
        }

        if reply.is_empty() {
            self.pop_entry();
        }
        Ok(())
    }

    /// Apply a remote insert, skipping duplicates.
    ///
    /// Identity wins when the message carries a client id; otherwise the
    /// last-entry heuristic applies: a candidate matching the last entry's
    /// role and content is dropped. Returns whether the transcript grew.
    pub fn on_remote_insert(&mut self, message: &ChatMessage) -> bool {
        if let Some(id) = &message.client_id {
            if self.seen_ids.contains(id) {
                return false;
            }
        }
        if let Some(last) = self.transcript.last() {
            if last.role == message.role && last.content == message.content {
                return false;
            }
        }
        self.push_entry(
            message.role,
            message.content.clone(),
            message.client_id.clone(),
        );
        true
    }

    fn push_entry(&mut self, role: Role, content: String, client_id: Option<String>) {
        if let Some(id) = &client_id {
            self.seen_ids.insert(id.clone());
        }
        self.transcript.push(TranscriptEntry {
            role,
            content,
            client_id,
        });
    }

    fn pop_entry(&mut self) {
        if let Some(entry) = self.transcript.pop() {
            if let Some(id) = entry.client_id {
                self.seen_ids.remove(&id);
            }
        }
    }
}
