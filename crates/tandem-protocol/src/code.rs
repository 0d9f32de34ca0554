//! Short human-shareable room codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of characters in a room code.
pub const CODE_LEN: usize = 6;

/// Alphabet for room codes: uppercase letters and digits with the visually
/// confusable `0/O` and `1/I` pairs removed.
pub const CODE_ALPHABET: [char; 32] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Error parsing a room code from user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCodeError {
    #[error("room code must be exactly {CODE_LEN} characters")]
    InvalidLength,

    #[error("room code contains invalid character: {0:?}")]
    InvalidChar(char),
}

/// A validated 6-character room code.
///
/// Codes are the only shareable handle to a room. They are generated once at
/// room creation and never change. Uniqueness is probabilistic (32^6 ≈ 1e9
/// combinations); a collision silently resolves to whichever room the lookup
/// finds first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a fresh random room code.
    pub fn generate() -> Self {
        Self(nanoid::nanoid!(CODE_LEN, &CODE_ALPHABET))
    }

    /// Parse a code from user input.
    ///
    /// Input is normalized to uppercase before validation, so joiners may
    /// type codes in any case.
    pub fn parse(input: &str) -> Result<Self, ParseCodeError> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.chars().count() != CODE_LEN {
            return Err(ParseCodeError::InvalidLength);
        }
        if let Some(bad) = normalized.chars().find(|c| !CODE_ALPHABET.contains(c)) {
            return Err(ParseCodeError::InvalidChar(bad));
        }
        Ok(Self(normalized))
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ParseCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..100 {
            let code = RoomCode::generate();
            assert_eq!(code.as_str().len(), CODE_LEN);
            assert!(code.as_str().chars().all(|c| CODE_ALPHABET.contains(&c)));
        }
    }

    #[test]
    fn parse_normalizes_case() {
        let code = RoomCode::parse("abc234").unwrap();
        assert_eq!(code.as_str(), "ABC234");
    }

    #[test]
    fn parse_trims_whitespace() {
        let code = RoomCode::parse("  ABC234 ").unwrap();
        assert_eq!(code.as_str(), "ABC234");
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(RoomCode::parse("ABC23"), Err(ParseCodeError::InvalidLength));
        assert_eq!(
            RoomCode::parse("ABC2345"),
            Err(ParseCodeError::InvalidLength)
        );
        assert_eq!(RoomCode::parse(""), Err(ParseCodeError::InvalidLength));
    }

    #[test]
    fn parse_rejects_confusable_chars() {
        // 0, O, 1, I are excluded from the alphabet
        assert_eq!(
            RoomCode::parse("ABC230"),
            Err(ParseCodeError::InvalidChar('0'))
        );
        assert_eq!(
            RoomCode::parse("ABCO34"),
            Err(ParseCodeError::InvalidChar('O'))
        );
        assert_eq!(
            RoomCode::parse("ABC1DE"),
            Err(ParseCodeError::InvalidChar('1'))
        );
    }
}
