use serde::{Deserialize, Serialize};

use crate::room::{Participant, ParticipantId, Room, Vote};

/// One field-scoped write against a room document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchOp {
    SetRevealed(bool),
    PutParticipant {
        id: ParticipantId,
        participant: Participant,
    },
    SetVote {
        id: ParticipantId,
        vote: Option<Vote>,
    },
    SetName {
        id: ParticipantId,
        name: String,
    },
}

impl PatchOp {
    /// Dotted path of the field this op writes, e.g. `participants.<id>.vote`.
    pub fn path(&self) -> String {
        match self {
            PatchOp::SetRevealed(_) => "revealed".to_string(),
            PatchOp::PutParticipant { id, .. } => format!("participants.{}", id),
            PatchOp::SetVote { id, .. } => format!("participants.{}.vote", id),
            PatchOp::SetName { id, .. } => format!("participants.{}.name", id),
        }
    }

    fn apply(&self, room: &mut Room) {
        match self {
            PatchOp::SetRevealed(revealed) => room.revealed = *revealed,
            PatchOp::PutParticipant { id, participant } => {
                room.participants.insert(id.clone(), participant.clone());
            }
            // Nested writes materialize the parent entry, like a document store would.
            PatchOp::SetVote { id, vote } => {
                room.participants.entry(id.clone()).or_default().vote = *vote;
            }
            PatchOp::SetName { id, name } => {
                room.participants.entry(id.clone()).or_default().name = name.clone();
            }
        }
    }
}

/// Condition checked against the stored document before a patch is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
    Revealed(bool),
}

impl Precondition {
    pub fn holds(&self, room: &Room) -> bool {
        match self {
            Precondition::Revealed(expected) => room.revealed == *expected,
        }
    }
}

/// A partial update: an ordered list of field writes applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub ops: Vec<PatchOp>,
    #[serde(default)]
    pub precondition: Option<Precondition>,
    #[serde(default)]
    pub create_if_absent: bool,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(mut self, op: PatchOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn revealed(self, revealed: bool) -> Self {
        self.op(PatchOp::SetRevealed(revealed))
    }

    pub fn vote(self, id: ParticipantId, vote: Option<Vote>) -> Self {
        self.op(PatchOp::SetVote { id, vote })
    }

    pub fn participant(self, id: ParticipantId, participant: Participant) -> Self {
        self.op(PatchOp::PutParticipant { id, participant })
    }

    pub fn when(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    pub fn upsert(mut self) -> Self {
        self.create_if_absent = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        self.ops.iter().map(PatchOp::path).collect()
    }

    /// Apply every op in order. Precondition and existence checks are the store's
    /// job; this only mutates.
    pub fn apply_to(&self, room: &mut Room) {
        for op in &self.ops {
            op.apply(room);
        }
    }
}
