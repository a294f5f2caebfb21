use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Wire form of [`Vote::Unsure`].
pub const UNSURE_LABEL: &str = "?";

/// Point values offered on the vote buttons, in display order.
pub const POINT_LABELS: [&str; 9] = ["0", "1", "2", "3", "5", "8", "13", "21", UNSURE_LABEL];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for ParticipantId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Points(u32),
    Unsure,
}

impl Vote {
    /// Parse a vote button label: a number or `?`.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label == UNSURE_LABEL {
            return Some(Vote::Unsure);
        }
        label.parse().ok().map(Vote::Points)
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Points(p) => write!(f, "{}", p),
            Vote::Unsure => f.write_str(UNSURE_LABEL),
        }
    }
}

// Votes travel as a bare integer or the "?" string.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum VoteRepr {
    Points(u32),
    Label(String),
}

impl Serialize for Vote {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Vote::Points(p) => VoteRepr::Points(*p),
            Vote::Unsure => VoteRepr::Label(UNSURE_LABEL.to_string()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Vote {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match VoteRepr::deserialize(deserializer)? {
            VoteRepr::Points(p) => Ok(Vote::Points(p)),
            VoteRepr::Label(label) => Vote::from_label(&label).ok_or_else(|| {
                serde::de::Error::custom(format!("unrecognised vote label '{}'", label))
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vote: Option<Vote>,
}

impl Participant {
    /// A freshly joined participant: named, no vote yet.
    pub fn joined(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vote: None,
        }
    }

    pub fn has_voted(&self) -> bool {
        self.vote.is_some()
    }
}

/// The shared room document.
///
/// Both fields default when absent so that partially written or older documents
/// read as an empty, hidden room instead of failing to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    #[serde(default)]
    pub participants: HashMap<ParticipantId, Participant>,
    #[serde(default)]
    pub revealed: bool,
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn vote_of(&self, id: &ParticipantId) -> Option<Vote> {
        self.participants.get(id).and_then(|p| p.vote)
    }

    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_wire_format() {
        assert_eq!(serde_json::to_string(&Vote::Points(8)).unwrap(), "8");
        assert_eq!(serde_json::to_string(&Vote::Unsure).unwrap(), "\"?\"");
        assert_eq!(serde_json::from_str::<Vote>("13").unwrap(), Vote::Points(13));
        assert_eq!(serde_json::from_str::<Vote>("\"?\"").unwrap(), Vote::Unsure);
        assert!(serde_json::from_str::<Vote>("\"maybe\"").is_err());
    }

    #[test]
    fn test_null_vote_is_none() {
        let p: Participant = serde_json::from_str(r#"{"name":"Alice","vote":null}"#).unwrap();
        assert_eq!(p, Participant::joined("Alice"));
        assert!(!p.has_voted());
    }

    #[test]
    fn test_missing_participants_defaults_to_empty() {
        let room: Room = serde_json::from_str(r#"{"revealed":true}"#).unwrap();
        assert!(room.participants.is_empty());
        assert!(room.revealed);

        let room: Room = serde_json::from_str("{}").unwrap();
        assert_eq!(room, Room::new());
    }

    #[test]
    fn test_vote_from_label() {
        assert_eq!(Vote::from_label("5"), Some(Vote::Points(5)));
        assert_eq!(Vote::from_label("?"), Some(Vote::Unsure));
        assert_eq!(Vote::from_label("x"), None);
        for label in POINT_LABELS {
            let vote = Vote::from_label(label).unwrap();
            assert_eq!(vote.to_string(), label);
        }
    }

    #[test]
    fn test_vote_of() {
        let alice = ParticipantId::new("a");
        let mut room = Room::new();
        room.participants.insert(
            alice.clone(),
            Participant {
                name: "Alice".into(),
                vote: Some(Vote::Points(3)),
            },
        );
        assert_eq!(room.vote_of(&alice), Some(Vote::Points(3)));
        assert_eq!(room.vote_of(&ParticipantId::new("b")), None);
    }
}
