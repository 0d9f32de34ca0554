//! Room data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tandem_protocol::{LegacyTitle, PARTNER_PLACEHOLDER, RoomCode};

/// A two-party room.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    /// Unique room ID.
    pub id: String,
    /// Shareable room code, immutable after creation.
    #[sqlx(try_from = "String")]
    pub code: RoomCode,
    /// Display name of the participant who created the room.
    pub creator_name: String,
    /// Display name of the joined partner; `None` while the room is
    /// waiting for one.
    pub partner_name: Option<String>,
    /// When the room was created.
    pub created_at: String,
    /// Last time the room or its transcript changed.
    pub updated_at: String,
}

impl Room {
    /// True while no partner has joined.
    pub fn partner_pending(&self) -> bool {
        self.partner_name.is_none()
    }

    /// Render this room in the legacy title encoding (export shim).
    pub fn legacy_title(&self) -> String {
        LegacyTitle::encode(
            &self.code,
            &self.creator_name,
            self.partner_name.as_deref().unwrap_or(PARTNER_PLACEHOLDER),
        )
    }

    /// The shareable invite link for this room.
    pub fn invite_link(&self, public_base_url: &str) -> String {
        format!(
            "{}/couples?room={}",
            public_base_url.trim_end_matches('/'),
            self.code
        )
    }
}

/// Request to create a new room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    /// Display name of the creator.
    pub creator_name: String,
}

/// Request to join an existing room by code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    /// The shared room code, any case.
    pub code: String,
    /// Display name of the joining partner.
    pub partner_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(partner: Option<&str>) -> Room {
        Room {
            id: "room-1".to_string(),
            code: RoomCode::parse("ABC234").unwrap(),
            creator_name: "Alice".to_string(),
            partner_name: partner.map(|s| s.to_string()),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            updated_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn legacy_title_uses_placeholder_while_pending() {
        assert_eq!(room(None).legacy_title(), "[COUPLES:ABC234] Alice & ...");
        assert_eq!(
            room(Some("Bob")).legacy_title(),
            "[COUPLES:ABC234] Alice & Bob"
        );
    }

    #[test]
    fn invite_link_normalizes_trailing_slash() {
        let r = room(None);
        assert_eq!(
            r.invite_link("https://example.com/"),
            "https://example.com/couples?room=ABC234"
        );
        assert_eq!(
            r.invite_link("https://example.com"),
            "https://example.com/couples?room=ABC234"
        );
    }
}
