//! Shared test fixtures.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;

use tandem::api::{AppState, create_router};
use tandem::chat::{ChatService, MessageRepository};
use tandem::completion::{
    CompletionBackend, CompletionError, Participants, PromptMessage, ReplyStream,
};
use tandem::db::Database;
use tandem::notify::{PushFeed, RoomHub};
use tandem::room::{RoomRepository, RoomService, RoomServiceConfig};

/// One scripted turn outcome.
pub enum TurnScript {
    /// Reply with these fragments.
    Reply(Vec<&'static str>),
    /// Fail mid-stream before any fragment.
    Error,
}

/// Completion backend driven by a queue of scripted outcomes; replies with
/// a fixed line once the queue is empty.
pub struct ScriptedCompletion {
    scripts: Mutex<VecDeque<TurnScript>>,
}

impl ScriptedCompletion {
    pub fn new(scripts: Vec<TurnScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
        }
    }
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl CompletionBackend for ScriptedCompletion {
    async fn stream_reply(
        &self,
        _transcript: &[PromptMessage],
        _participants: &Participants,
    ) -> Result<ReplyStream, CompletionError> {
        let script = self
            .scripts
            .lock()
            .expect("script queue poisoned")
            .pop_front();
        let items: Vec<Result<String, CompletionError>> = match script {
            Some(TurnScript::Reply(fragments)) => {
                fragments.iter().map(|f| Ok((*f).to_string())).collect()
            }
            Some(TurnScript::Error) => {
                vec![Err(CompletionError::Stream("connection reset".to_string()))]
            }
            None => vec![Ok("Thanks for sharing.".to_string())],
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Build a test app over an in-memory database and the default scripted
/// completion backend.
pub async fn test_app() -> Router {
    test_app_with(Arc::new(ScriptedCompletion::default())).await
}

/// Build a test app with a specific completion backend.
pub async fn test_app_with(completion: Arc<dyn CompletionBackend>) -> Router {
    let db = Database::in_memory().await.expect("in-memory database");
    let room_repo = RoomRepository::new(db.pool().clone());
    let message_repo = MessageRepository::new(db.pool().clone());
    let hub = Arc::new(RoomHub::new());

    let rooms = Arc::new(RoomService::new(
        room_repo.clone(),
        message_repo.clone(),
        RoomServiceConfig::default(),
    ));
    let chat = Arc::new(ChatService::new(
        message_repo,
        room_repo,
        completion,
        hub.clone(),
    ));

    create_router(AppState::new(rooms, chat, Arc::new(PushFeed::new(hub))))
}
