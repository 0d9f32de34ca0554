//! Room repository for database operations.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tandem_protocol::{LegacyTitle, RoomCode};
use tracing::{debug, instrument};

use super::models::Room;

const ROOM_COLUMNS: &str = "id, code, creator_name, partner_name, created_at, updated_at";

/// Repository for room database operations.
#[derive(Debug, Clone)]
pub struct RoomRepository {
    pool: SqlitePool,
}

impl RoomRepository {
    /// Create a new room repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Generate a new room ID.
    fn generate_id() -> String {
        format!("room_{}", uuid::Uuid::new_v4().simple())
    }

    /// Insert a new room with no partner.
    #[instrument(skip(self, creator_name))]
    pub async fn create(&self, code: &RoomCode, creator_name: &str) -> Result<Room> {
        let id = Self::generate_id();
        let now = Utc::now().to_rfc3339();

        debug!("creating room {} with code {}", id, code);

        sqlx::query(
            r#"
            INSERT INTO rooms (id, code, creator_name, partner_name, created_at, updated_at)
            VALUES (?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(code.as_str())
        .bind(creator_name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("inserting room")?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("room not found after creation"))
    }

    /// Get a room by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Room>> {
        sqlx::query_as::<_, Room>(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("fetching room")
    }

    /// Look up a room by its shareable code.
    ///
    /// Codes are stored uppercase and [`RoomCode`] normalizes on parse, so
    /// this is effectively case-insensitive for callers.
    #[instrument(skip(self))]
    pub async fn find_by_code(&self, code: &RoomCode) -> Result<Option<Room>> {
        sqlx::query_as::<_, Room>(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE code = ?"))
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("fetching room by code")
    }

    /// Record the joined partner's name.
    ///
    /// Overwrites any previous partner without conflict detection; a later
    /// joiner racing an earlier one simply wins.
    #[instrument(skip(self, partner_name))]
    pub async fn set_partner(&self, id: &str, partner_name: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query("UPDATE rooms SET partner_name = ?, updated_at = ? WHERE id = ?")
            .bind(partner_name)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("updating room partner")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("room not found: {}", id);
        }
        Ok(())
    }

    /// Bump a room's `updated_at` to now.
    pub async fn touch(&self, id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE rooms SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("touching room")?;
        Ok(())
    }

    /// Delete partner-pending rooms created before the cutoff.
    ///
    /// Joined rooms are never deleted here. Transcript rows go with the
    /// room via the foreign-key cascade.
    #[instrument(skip(self))]
    pub async fn delete_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM rooms WHERE partner_name IS NULL AND created_at < ?")
                .bind(cutoff.to_rfc3339())
                .execute(&self.pool)
                .await
                .context("deleting stale rooms")?;

        Ok(result.rows_affected())
    }

    /// Adopt a conversation row written in the legacy title encoding.
    ///
    /// Returns `None` when the title does not parse as a legacy room title
    /// (it is some other conversation, not an error). An existing room with
    /// the same code is returned as-is rather than duplicated.
    pub async fn import_legacy(&self, title: &str) -> Result<Option<Room>> {
        let Some(decoded) = LegacyTitle::decode(title) else {
            return Ok(None);
        };

        if let Some(existing) = self.find_by_code(&decoded.code).await? {
            return Ok(Some(existing));
        }

        let room = self.create(&decoded.code, &decoded.creator_name).await?;
        if !decoded.partner_pending() {
            self.set_partner(&room.id, &decoded.partner_name).await?;
        }
        self.get(&room.id).await
    }
}
