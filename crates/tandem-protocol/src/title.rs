//! Legacy title encoding.
//!
//! Early deployments had no structured room columns and packed the room
//! code and both participant names into a conversation's display title:
//!
//! ```text
//! [COUPLES:ABC234] Alice & Bob
//! ```
//!
//! with the literal `...` standing in for a partner who has not joined yet.
//! The structured schema replaces this, so the codec survives only as an
//! import/export shim for rows written in the old format.
//!
//! Known limitation carried over from the original encoding: names
//! containing the literal `&` or `]` substrings do not round-trip.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::code::RoomCode;

/// Literal marker used in place of a not-yet-known partner name.
pub const PARTNER_PLACEHOLDER: &str = "...";

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[COUPLES:([A-Z0-9]+)\] (.+) & (.+)$").expect("valid title regex"));

/// The three logical fields packed into a legacy room title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTitle {
    pub code: RoomCode,
    pub creator_name: String,
    pub partner_name: String,
}

impl LegacyTitle {
    /// Render the legacy title string for these fields.
    pub fn encode(code: &RoomCode, creator_name: &str, partner_name: &str) -> String {
        format!("[COUPLES:{}] {} & {}", code, creator_name, partner_name)
    }

    /// Parse a title written in the legacy format.
    ///
    /// Returns `None` for anything that does not conform, including codes
    /// outside the room-code alphabet. Callers treat `None` as "not a
    /// shared-room title", never as a fatal error.
    pub fn decode(title: &str) -> Option<Self> {
        let caps = TITLE_RE.captures(title)?;
        let code = RoomCode::parse(&caps[1]).ok()?;
        Some(Self {
            code,
            creator_name: caps[2].to_string(),
            partner_name: caps[3].to_string(),
        })
    }

    /// True exactly when no partner has joined yet.
    pub fn partner_pending(&self) -> bool {
        self.partner_name == PARTNER_PLACEHOLDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> RoomCode {
        RoomCode::parse(s).unwrap()
    }

    #[test]
    fn encode_decode_is_identity() {
        let encoded = LegacyTitle::encode(&code("ABC234"), "Alice", "Bob");
        assert_eq!(encoded, "[COUPLES:ABC234] Alice & Bob");

        let decoded = LegacyTitle::decode(&encoded).unwrap();
        assert_eq!(decoded.code, code("ABC234"));
        assert_eq!(decoded.creator_name, "Alice");
        assert_eq!(decoded.partner_name, "Bob");
        assert!(!decoded.partner_pending());
    }

    #[test]
    fn pending_partner_round_trips() {
        let encoded = LegacyTitle::encode(&code("XYZ789"), "Alice", PARTNER_PLACEHOLDER);
        let decoded = LegacyTitle::decode(&encoded).unwrap();
        assert_eq!(decoded.partner_name, PARTNER_PLACEHOLDER);
        assert!(decoded.partner_pending());
    }

    #[test]
    fn decode_rejects_non_conforming_titles() {
        assert_eq!(LegacyTitle::decode("My journal"), None);
        assert_eq!(LegacyTitle::decode("[COUPLES:ABC234]"), None);
        assert_eq!(LegacyTitle::decode("[COUPLES:ABC234] Alice"), None);
        // Lowercase codes never occur in legacy data
        assert_eq!(LegacyTitle::decode("[COUPLES:abc234] Alice & Bob"), None);
        // Codes with confusable characters are outside the alphabet
        assert_eq!(LegacyTitle::decode("[COUPLES:ABC230] Alice & Bob"), None);
    }

    #[test]
    fn names_with_spaces_round_trip() {
        let encoded = LegacyTitle::encode(&code("ABC234"), "Mary Ann", "Jo Beth");
        let decoded = LegacyTitle::decode(&encoded).unwrap();
        assert_eq!(decoded.creator_name, "Mary Ann");
        assert_eq!(decoded.partner_name, "Jo Beth");
    }

    #[test]
    fn ampersand_in_creator_name_shifts_the_split() {
        // Known encoding limitation: " & " inside a name is indistinguishable
        // from the field separator, and the greedy match assigns the extra
        // segment to the creator.
        let encoded = LegacyTitle::encode(&code("ABC234"), "Tom & Co", "Bob");
        let decoded = LegacyTitle::decode(&encoded).unwrap();
        assert_eq!(decoded.creator_name, "Tom & Co");
        assert_eq!(decoded.partner_name, "Bob");
    }
}
