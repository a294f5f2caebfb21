//! Pure view-model rendering: everything the room screen shows is derived here
//! from a [`RoomView`], so the ratatui layer only lays out strings.

use pokr_common::room::{Vote, POINT_LABELS};

use crate::sync::{ParticipantEntry, RoomView};

pub const YOU_MARKER: &str = " (you)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteCell {
    /// Before reveal only readiness is shown, never the value.
    Hidden { ready: bool },
    Shown(Option<Vote>),
}

impl VoteCell {
    pub fn text(&self) -> String {
        match self {
            VoteCell::Hidden { ready: true } => "[ready]".to_string(),
            VoteCell::Hidden { ready: false } => "[...]".to_string(),
            VoteCell::Shown(Some(vote)) => vote.to_string(),
            VoteCell::Shown(None) => "-".to_string(),
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(
            self,
            VoteCell::Hidden { ready: true } | VoteCell::Shown(Some(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRow {
    pub label: String,
    pub vote: VoteCell,
    pub is_me: bool,
}

/// Case-insensitive by display name; ties fall back to id so the order is the
/// same on every client.
pub fn sort_by_name(entries: &mut [ParticipantEntry]) {
    entries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub fn participant_rows(view: &RoomView) -> Vec<ParticipantRow> {
    view.participants
        .iter()
        .map(|p| ParticipantRow {
            label: if p.is_me {
                format!("{}{}", p.name, YOU_MARKER)
            } else {
                p.name.clone()
            },
            vote: if view.revealed {
                VoteCell::Shown(p.vote)
            } else {
                VoteCell::Hidden {
                    ready: p.vote.is_some(),
                }
            },
            is_me: p.is_me,
        })
        .collect()
}

/// Whether the point button labelled `label` matches our stored vote.
pub fn is_selected(label: &str, my_vote: Option<Vote>) -> bool {
    my_vote.is_some_and(|vote| vote.to_string() == label)
}

pub fn selected_index(my_vote: Option<Vote>) -> Option<usize> {
    POINT_LABELS
        .iter()
        .position(|label| is_selected(label, my_vote))
}

pub fn reveal_label(revealed: bool) -> &'static str {
    if revealed {
        "[ HIDE ]"
    } else {
        "[ REVEAL ]"
    }
}

pub fn voted_count(view: &RoomView) -> usize {
    view.participants.iter().filter(|p| p.vote.is_some()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokr_common::room::ParticipantId;
    use pokr_common::room_code::RoomCode;

    fn entry(id: &str, name: &str, vote: Option<Vote>, is_me: bool) -> ParticipantEntry {
        ParticipantEntry {
            id: ParticipantId::new(id),
            name: name.into(),
            vote,
            is_me,
        }
    }

    fn view(participants: Vec<ParticipantEntry>, revealed: bool) -> RoomView {
        let my_vote = participants.iter().find(|p| p.is_me).and_then(|p| p.vote);
        RoomView {
            session: 1,
            code: RoomCode::parse("AB12CD").unwrap(),
            participants,
            revealed,
            my_vote,
        }
    }

    #[test]
    fn test_sort_is_case_insensitive() {
        let mut entries = vec![
            entry("1", "bob", None, false),
            entry("2", "Alice", None, false),
        ];
        sort_by_name(&mut entries);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "bob"]);
    }

    #[test]
    fn test_sort_ties_are_deterministic() {
        let mut a = vec![entry("z", "sam", None, false), entry("a", "Sam", None, false)];
        let mut b = vec![entry("a", "Sam", None, false), entry("z", "sam", None, false)];
        sort_by_name(&mut a);
        sort_by_name(&mut b);
        assert_eq!(a, b);
        assert_eq!(a[0].id.as_str(), "a");
    }

    #[test]
    fn test_hidden_votes_do_not_leak() {
        let v = view(
            vec![
                entry("a", "Alice", Some(Vote::Points(13)), true),
                entry("b", "Bob", None, false),
            ],
            false,
        );
        let rows = participant_rows(&v);
        assert_eq!(rows[0].label, "Alice (you)");
        assert_eq!(rows[0].vote.text(), "[ready]");
        assert_eq!(rows[1].label, "Bob");
        assert_eq!(rows[1].vote.text(), "[...]");
        assert!(rows.iter().all(|r| !r.vote.text().contains("13")));
    }

    #[test]
    fn test_revealed_votes_show_values() {
        let v = view(
            vec![
                entry("a", "Alice", Some(Vote::Unsure), false),
                entry("b", "Bob", None, true),
            ],
            true,
        );
        let rows = participant_rows(&v);
        assert_eq!(rows[0].vote.text(), "?");
        assert!(rows[0].vote.is_filled());
        assert_eq!(rows[1].vote.text(), "-");
        assert!(!rows[1].vote.is_filled());
        assert_eq!(voted_count(&v), 1);
    }

    #[test]
    fn test_button_selection_compares_labels() {
        assert!(is_selected("8", Some(Vote::Points(8))));
        assert!(is_selected("?", Some(Vote::Unsure)));
        assert!(!is_selected("8", Some(Vote::Points(5))));
        assert!(!is_selected("?", None));
        assert_eq!(selected_index(Some(Vote::Unsure)), Some(POINT_LABELS.len() - 1));
        assert_eq!(selected_index(Some(Vote::Points(4))), None);
    }

    #[test]
    fn test_reveal_label() {
        assert_eq!(reveal_label(false), "[ REVEAL ]");
        assert_eq!(reveal_label(true), "[ HIDE ]");
    }
}
