//! Message repository for database operations.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tandem_protocol::Role;
use tracing::instrument;

use super::models::ChatMessage;

const MESSAGE_COLUMNS: &str = "id, room_id, role, content, client_id, created_at";

/// Page size for offset-based incremental fetches.
const FETCH_WINDOW: i64 = 51;

/// Repository for transcript database operations.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new message repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message to a room's transcript.
    ///
    /// Inserts are idempotent on `client_id`: re-sending a message with an
    /// already-stored identity returns the existing row with `inserted`
    /// false instead of duplicating it.
    #[instrument(skip(self, content, client_id))]
    pub async fn append(
        &self,
        room_id: &str,
        role: Role,
        content: &str,
        client_id: Option<&str>,
    ) -> Result<(ChatMessage, bool)> {
        if let Some(client_id) = client_id {
            if let Some(existing) = self.get_by_client_id(client_id).await? {
                return Ok((existing, false));
            }
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO messages (room_id, role, content, client_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(client_id) DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(role.to_string())
        .bind(content)
        .bind(client_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("inserting message")?;

        if result.rows_affected() == 0 {
            // Lost a race with a concurrent insert of the same client_id.
            if let Some(client_id) = client_id {
                let existing = self
                    .get_by_client_id(client_id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("message not found after conflict"))?;
                return Ok((existing, false));
            }
            anyhow::bail!("message insert affected no rows");
        }

        let message = self.get(result.last_insert_rowid()).await?;
        Ok((message, true))
    }

    /// Get a message by row ID.
    pub async fn get(&self, id: i64) -> Result<ChatMessage> {
        sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("fetching message")
    }

    /// Get a message by sender-generated identity.
    pub async fn get_by_client_id(&self, client_id: &str) -> Result<Option<ChatMessage>> {
        sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE client_id = ?"
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching message by client id")
    }

    /// List a room's full transcript in insertion order.
    #[instrument(skip(self))]
    pub async fn list(&self, room_id: &str) -> Result<Vec<ChatMessage>> {
        sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE room_id = ? ORDER BY id ASC"
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .context("listing messages")
    }

    /// Incrementally fetch messages past the count the caller already has.
    ///
    /// Offset-based on insertion order; assumes the transcript is
    /// append-only (a deletion would desynchronize callers).
    #[instrument(skip(self))]
    pub async fn list_after(&self, room_id: &str, after: i64) -> Result<Vec<ChatMessage>> {
        sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE room_id = ? ORDER BY id ASC LIMIT ? OFFSET ?"
        ))
        .bind(room_id)
        .bind(FETCH_WINDOW)
        .bind(after.max(0))
        .fetch_all(&self.pool)
        .await
        .context("listing messages after offset")
    }

    /// Count a room's messages.
    pub async fn count(&self, room_id: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .context("counting messages")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::room::RoomRepository;
    use tandem_protocol::RoomCode;

    async fn setup() -> (MessageRepository, String) {
        let db = Database::in_memory().await.unwrap();
        let rooms = RoomRepository::new(db.pool().clone());
        let room = rooms
            .create(&RoomCode::parse("ABC234").unwrap(), "Alice")
            .await
            .unwrap();
        (MessageRepository::new(db.pool().clone()), room.id)
    }

    #[tokio::test]
    async fn test_append_and_list_in_insertion_order() {
        let (repo, room_id) = setup().await;

        repo.append(&room_id, Role::User, "[Alice]: first", None)
            .await
            .unwrap();
        repo.append(&room_id, Role::Assistant, "second", None)
            .await
            .unwrap();
        repo.append(&room_id, Role::User, "[Bob]: third", None)
            .await
            .unwrap();

        let messages = repo.list(&room_id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["[Alice]: first", "second", "[Bob]: third"]);

        // Listing twice with no intervening writes is identical.
        let again = repo.list(&room_id).await.unwrap();
        let again_contents: Vec<&str> = again.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, again_contents);
    }

    #[tokio::test]
    async fn test_append_is_idempotent_on_client_id() {
        let (repo, room_id) = setup().await;

        let (first, inserted) = repo
            .append(&room_id, Role::User, "[Alice]: hello", Some("msg-1"))
            .await
            .unwrap();
        assert!(inserted);

        let (second, inserted) = repo
            .append(&room_id, Role::User, "[Alice]: hello", Some("msg-1"))
            .await
            .unwrap();
        assert!(!inserted);
        assert_eq!(second.id, first.id);

        assert_eq!(repo.count(&room_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_after_offset() {
        let (repo, room_id) = setup().await;

        for i in 0..5 {
            repo.append(&room_id, Role::User, &format!("[Alice]: {}", i), None)
                .await
                .unwrap();
        }

        let tail = repo.list_after(&room_id, 3).await.unwrap();
        let contents: Vec<&str> = tail.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["[Alice]: 3", "[Alice]: 4"]);

        assert!(repo.list_after(&room_id, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rooms_do_not_share_transcripts() {
        let (repo, room_id) = setup().await;
        repo.append(&room_id, Role::User, "[Alice]: hi", None)
            .await
            .unwrap();

        assert!(repo.list("room_other").await.unwrap().is_empty());
    }
}
