//! Transcript store and turn streaming.

mod models;
mod repository;
mod service;

pub use models::{AppendMessageRequest, ChatMessage, TurnRequest};
pub use repository::MessageRepository;
pub use service::{ChatService, FALLBACK_REPLY};
