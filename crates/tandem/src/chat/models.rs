//! Transcript data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tandem_protocol::Role;

/// One persisted transcript line.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    /// Row ID; insertion order is the only ordering guarantee.
    pub id: i64,
    /// Room this message belongs to.
    pub room_id: String,
    /// Who authored the line.
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Message text. User lines carry the `[<Name>]: ` sender prefix;
    /// assistant lines never do.
    pub content: String,
    /// Sender-generated message identity for idempotent inserts and remote
    /// dedup. Legacy rows have none.
    pub client_id: Option<String>,
    /// When the row was inserted.
    pub created_at: String,
}

/// Request to append a message to a room's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendMessageRequest {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Request to send one turn: a user line that provokes one streamed
/// assistant reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Display name of the sending participant.
    pub sender_name: String,
    /// The unprefixed message text.
    pub text: String,
    /// Sender-generated identity for the user line.
    #[serde(default)]
    pub client_id: Option<String>,
}
