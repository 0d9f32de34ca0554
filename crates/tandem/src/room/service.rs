//! Room service - orchestrates room lifecycle.

use anyhow::Result;
use chrono::{Duration, Utc};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tandem_protocol::RoomCode;

use crate::chat::{ChatMessage, MessageRepository};

use super::models::Room;
use super::repository::RoomRepository;

/// Default time-to-live for rooms still waiting on a partner.
const DEFAULT_PENDING_TTL_HOURS: i64 = 24;

/// Default interval between stale-room sweeps.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Room service configuration.
#[derive(Debug, Clone)]
pub struct RoomServiceConfig {
    /// Base URL used to build shareable invite links.
    pub public_base_url: String,
    /// Hours a partner-pending room survives before the sweep removes it.
    pub pending_ttl_hours: i64,
    /// Seconds between sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for RoomServiceConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8477".to_string(),
            pending_ttl_hours: DEFAULT_PENDING_TTL_HOURS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

/// Result of joining a room: the room plus its full ordered history.
#[derive(Debug, Clone, Serialize)]
pub struct JoinedRoom {
    pub room: Room,
    pub messages: Vec<ChatMessage>,
}

/// Service for managing room lifecycle.
#[derive(Clone)]
pub struct RoomService {
    rooms: RoomRepository,
    messages: MessageRepository,
    config: RoomServiceConfig,
}

impl RoomService {
    /// Create a new room service.
    pub fn new(
        rooms: RoomRepository,
        messages: MessageRepository,
        config: RoomServiceConfig,
    ) -> Self {
        Self {
            rooms,
            messages,
            config,
        }
    }

    /// Create a room for the given creator and return it with its fresh code.
    ///
    /// Every call creates an independent room; there is no dedup against
    /// earlier rooms by the same creator.
    pub async fn create_room(&self, creator_name: &str) -> Result<Room> {
        let creator_name = creator_name.trim();
        if creator_name.is_empty() {
            anyhow::bail!("creator name must not be empty");
        }

        let code = RoomCode::generate();
        let room = self.rooms.create(&code, creator_name).await?;
        info!("created room {} with code {}", room.id, room.code);
        Ok(room)
    }

    /// Join a room by code, recording the partner's name and loading the
    /// full ordered history.
    ///
    /// Returns `Ok(None)` when no room matches the code. Joining a room
    /// whose partner is already set silently overwrites the previous name;
    /// the creator's name is preserved exactly as stored.
    pub async fn join_room(&self, code: &RoomCode, partner_name: &str) -> Result<Option<JoinedRoom>> {
        let partner_name = partner_name.trim();
        if partner_name.is_empty() {
            anyhow::bail!("partner name must not be empty");
        }

        let Some(room) = self.rooms.find_by_code(code).await? else {
            return Ok(None);
        };

        if let Some(previous) = &room.partner_name {
            warn!(
                "room {} already had partner {:?}, overwriting with {:?}",
                room.id, previous, partner_name
            );
        }

        self.rooms.set_partner(&room.id, partner_name).await?;
        let room = self
            .rooms
            .get(&room.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("room not found after join: {}", room.id))?;
        let messages = self.messages.list(&room.id).await?;

        info!("{} joined room {}", partner_name, room.id);
        Ok(Some(JoinedRoom { room, messages }))
    }

    /// Get a room by ID. Drives the creator's partner poll.
    pub async fn get_room(&self, id: &str) -> Result<Option<Room>> {
        self.rooms.get(id).await
    }

    /// Adopt a legacy title-encoded conversation into the structured schema.
    pub async fn import_legacy_title(&self, title: &str) -> Result<Option<Room>> {
        self.rooms.import_legacy(title).await
    }

    /// The shareable invite link for a room.
    pub fn invite_link(&self, room: &Room) -> String {
        room.invite_link(&self.config.public_base_url)
    }

    /// Delete partner-pending rooms older than the configured TTL.
    pub async fn sweep_stale(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::hours(self.config.pending_ttl_hours);
        let deleted = self.rooms.delete_stale_pending(cutoff).await?;
        if deleted > 0 {
            info!("swept {} stale pending rooms", deleted);
        }
        Ok(deleted)
    }

    /// Spawn the periodic stale-room sweep task.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        let interval = std::time::Duration::from_secs(self.config.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = service.sweep_stale().await {
                    warn!("stale-room sweep failed: {:#}", err);
                }
            }
        })
    }
}
