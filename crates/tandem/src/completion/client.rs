//! Messages API streaming client.

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use reqwest_eventsource::{Event, EventSource};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{CompletionBackend, CompletionError, Participants, PromptMessage, ReplyStream};
use super::prompt::mediator_prompt;

/// Buffer size for the fragment forwarding channel.
const FRAGMENT_BUFFER_SIZE: usize = 64;

/// Completion client configuration.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL of the Messages API.
    pub base_url: String,
    /// API key; streaming fails fast when unset.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Reply token budget.
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 500,
        }
    }
}

/// Client for an Anthropic-style streaming Messages API.
#[derive(Debug, Clone)]
pub struct MessagesApiClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl MessagesApiClient {
    /// Create a new client.
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionBackend for MessagesApiClient {
    async fn stream_reply(
        &self,
        transcript: &[PromptMessage],
        participants: &Participants,
    ) -> Result<ReplyStream, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CompletionError::NotConfigured)?;

        let messages: Vec<Value> = transcript
            .iter()
            .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
            .collect();

        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": mediator_prompt(participants),
            "messages": messages,
            "stream": true,
        });

        let request = self
            .client
            .post(format!(
                "{}/v1/messages",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body);

        let mut source =
            EventSource::new(request).map_err(|e| CompletionError::Request(e.to_string()))?;

        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER_SIZE);
        tokio::spawn(async move {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => {
                        debug!("completion stream opened");
                    }
                    Ok(Event::Message(message)) => {
                        if message.event == "message_stop" {
                            break;
                        }
                        if let Some(text) = delta_text(&message.data) {
                            if tx.send(Ok(text)).await.is_err() {
                                // Receiver gone; stop reading the upstream.
                                break;
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(err) => {
                        warn!("completion stream error: {}", err);
                        let _ = tx.send(Err(CompletionError::Stream(err.to_string()))).await;
                        break;
                    }
                }
            }
            source.close();
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Extract the text fragment from a `content_block_delta` event payload.
fn delta_text(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    if value.get("type")?.as_str()? != "content_block_delta" {
        return None;
    }
    value
        .get("delta")?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}
