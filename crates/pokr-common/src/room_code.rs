use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const ROOM_CODE_LEN: usize = 6;
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Short, human-shareable room identifier: six uppercase alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a random code. Uniqueness is not checked: a collision joins the
    /// existing room.
    pub fn generate() -> Self {
        Self(generate_code())
    }

    /// Normalize user input (trim, uppercase) and validate it.
    pub fn parse(input: &str) -> Result<Self, RoomCodeError> {
        let value = input.trim().to_ascii_uppercase();
        if value.is_empty() {
            return Err(RoomCodeError::Empty);
        }
        if value.chars().count() != ROOM_CODE_LEN {
            return Err(RoomCodeError::InvalidLength {
                expected: ROOM_CODE_LEN,
                found: value.chars().count(),
            });
        }
        for (index, ch) in value.chars().enumerate() {
            if !ch.is_ascii_alphanumeric() {
                return Err(RoomCodeError::InvalidCharacter { ch, index });
            }
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RoomCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomCodeError {
    #[error("Please enter a room code")]
    Empty,
    #[error("room code must be {expected} characters, got {found}")]
    InvalidLength { expected: usize, found: usize },
    #[error("invalid character '{ch}' at position {index}")]
    InvalidCharacter { ch: char, index: usize },
}

/// Generate a random 6-character uppercase alphanumeric room code.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_valid() {
        for _ in 0..200 {
            let code = RoomCode::generate();
            assert_eq!(code.as_str().len(), ROOM_CODE_LEN);
            assert!(code
                .as_str()
                .bytes()
                .all(|b| ROOM_CODE_ALPHABET.contains(&b)));
            assert_eq!(RoomCode::parse(code.as_str()).unwrap(), code);
        }
    }

    #[test]
    fn test_parse_normalizes() {
        let code = RoomCode::parse("  ab12cd ").unwrap();
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(RoomCode::parse("   "), Err(RoomCodeError::Empty));
        assert_eq!(
            RoomCode::parse("ABC"),
            Err(RoomCodeError::InvalidLength {
                expected: 6,
                found: 3
            })
        );
        assert_eq!(
            RoomCode::parse("AB-2CD"),
            Err(RoomCodeError::InvalidCharacter { ch: '-', index: 2 })
        );
    }

    #[test]
    fn test_serde_validates() {
        let code: RoomCode = serde_json::from_str("\"xy99zz\"").unwrap();
        assert_eq!(code.as_str(), "XY99ZZ");
        assert!(serde_json::from_str::<RoomCode>("\"nope\"").is_err());
    }
}
