//! Completion streaming.
//!
//! The chat service talks to the model through the [`CompletionBackend`]
//! trait; the production implementation forwards an Anthropic-style
//! Messages API SSE stream. Tests substitute scripted backends.

mod client;
mod prompt;

pub use client::{CompletionConfig, MessagesApiClient};
pub use prompt::mediator_prompt;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tandem_protocol::Role;
use thiserror::Error;

/// One transcript line handed to the model.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// Participant context for the mediator prompt.
#[derive(Debug, Clone)]
pub struct Participants {
    pub partner_a: String,
    pub partner_b: String,
}

/// Completion errors.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("completion API key not configured")]
    NotConfigured,

    #[error("completion request failed: {0}")]
    Request(String),

    #[error("completion stream failed: {0}")]
    Stream(String),
}

/// A finite stream of assistant text fragments, terminating on completion
/// or with a single error item.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Streams one assistant reply for a transcript.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn stream_reply(
        &self,
        transcript: &[PromptMessage],
        participants: &Participants,
    ) -> Result<ReplyStream, CompletionError>;
}
