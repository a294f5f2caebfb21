use std::time::{Duration, Instant};

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use pokr_common::room::POINT_LABELS;
use pokr_common::room_code::RoomCode;

use super::palette::Palette;
use crate::sync::RoomView;
use crate::view;

const STATUS_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RoomScreen {
    pub code: RoomCode,
    pub session: u64,
    pub link: String,
    pub view: Option<RoomView>,
    pub cursor: usize,
    pub status_message: Option<(String, Instant)>,
    pub error_message: Option<String>,
}

impl RoomScreen {
    pub fn new(code: RoomCode, session: u64, link: String) -> Self {
        Self {
            code,
            session,
            link,
            view: None,
            cursor: 0,
            status_message: None,
            error_message: None,
        }
    }

    /// Take a fresh snapshot. The cursor follows our vote when we have one.
    pub fn apply_view(&mut self, view: RoomView) {
        if let Some(idx) = view::selected_index(view.my_vote) {
            self.cursor = idx;
        }
        self.view = Some(view);
    }

    pub fn select_next(&mut self) {
        self.cursor = (self.cursor + 1) % POINT_LABELS.len();
    }

    pub fn select_prev(&mut self) {
        self.cursor = match self.cursor {
            0 => POINT_LABELS.len() - 1,
            i => i - 1,
        };
    }

    pub fn cursor_label(&self) -> &'static str {
        POINT_LABELS[self.cursor]
    }

    pub fn show_status(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Report the outcome of copying the share link. Without a clipboard the
    /// link goes into the error banner so it can still be copied by hand.
    pub fn link_copied(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.error_message = None;
                self.show_status(format!("[ copied ] {}", self.link));
            }
            Err(e) => {
                self.status_message = None;
                self.error_message = Some(format!("Clipboard unavailable ({}): {}", e, self.link));
            }
        }
    }

    pub fn expire_status(&mut self, now: Instant) {
        if let Some((_, shown_at)) = &self.status_message {
            if now.duration_since(*shown_at) >= STATUS_TTL {
                self.status_message = None;
            }
        }
    }

    pub fn draw(&self, frame: &mut Frame, palette: &Palette) {
        let area = frame.area();
        frame.render_widget(Block::default().style(palette.base()), area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title bar
                Constraint::Min(5),    // Participants
                Constraint::Length(3), // Point buttons
                Constraint::Length(1), // Status / error
                Constraint::Length(3), // Help bar
            ])
            .split(area);

        let revealed = self.view.as_ref().is_some_and(|v| v.revealed);
        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                "  POKR ",
                palette.fg(palette.accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled("room ", palette.fg(palette.muted)),
            Span::styled(
                self.code.as_str(),
                palette.fg(palette.text).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("   {}", self.link), palette.fg(palette.muted)),
        ]))
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(palette.fg(palette.border)),
        );
        frame.render_widget(title, chunks[0]);

        // Participants
        let mut lines: Vec<Line> = Vec::new();
        let mut summary = String::new();
        match &self.view {
            Some(room) => {
                for row in view::participant_rows(room) {
                    let vote_color = if row.vote.is_filled() {
                        palette.ready
                    } else {
                        palette.pending
                    };
                    let mut vote_style = palette.fg(vote_color);
                    if revealed {
                        vote_style = vote_style.add_modifier(Modifier::BOLD);
                    }
                    let mut label_style = palette.fg(palette.text);
                    if row.is_me {
                        label_style = label_style.add_modifier(Modifier::BOLD);
                    }
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(format!("{:<28}", row.label), label_style),
                        Span::styled(row.vote.text(), vote_style),
                    ]));
                }
                summary = format!(
                    " {}/{} voted ",
                    view::voted_count(room),
                    room.participants.len()
                );
            }
            None => lines.push(Line::from(Span::styled(
                "  Waiting for room state...",
                palette.fg(palette.muted),
            ))),
        }
        let participants = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(palette.fg(palette.border))
                .title(" Participants ")
                .title_bottom(summary)
                .title_style(palette.fg(palette.text)),
        );
        frame.render_widget(participants, chunks[1]);

        // Point buttons
        let my_vote = self.view.as_ref().and_then(|v| v.my_vote);
        let mut buttons: Vec<Span> = vec![Span::raw(" ")];
        for (idx, label) in POINT_LABELS.iter().enumerate() {
            let mut style = if view::is_selected(label, my_vote) {
                palette
                    .fg(palette.selected_fg)
                    .bg(palette.selected_bg)
                    .add_modifier(Modifier::BOLD)
            } else {
                palette.fg(palette.text)
            };
            if idx == self.cursor {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            buttons.push(Span::styled(format!(" {:>2} ", label), style));
            buttons.push(Span::raw(" "));
        }
        buttons.push(Span::styled(
            format!("  {}", view::reveal_label(revealed)),
            palette.fg(palette.accent).add_modifier(Modifier::BOLD),
        ));
        let point_row = Paragraph::new(Line::from(buttons)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(palette.fg(palette.border))
                .title(" Your Vote "),
        );
        frame.render_widget(point_row, chunks[2]);

        // Error banner wins over transient status
        if let Some(ref err) = self.error_message {
            let banner = Paragraph::new(format!("  {}", err)).style(palette.fg(palette.error));
            frame.render_widget(banner, chunks[3]);
        } else if let Some((ref msg, _)) = self.status_message {
            let status = Paragraph::new(format!("  {}", msg)).style(palette.fg(palette.accent));
            frame.render_widget(status, chunks[3]);
        }

        let help = Paragraph::new(Line::from(vec![
            Span::raw("  "),
            Span::styled("[<-/->]", palette.fg(palette.accent)),
            Span::styled(" Pick  ", palette.fg(palette.muted)),
            Span::styled("[Enter]", palette.fg(palette.accent)),
            Span::styled(" Vote  ", palette.fg(palette.muted)),
            Span::styled("[R]", palette.fg(palette.accent)),
            Span::styled(" Reveal/Hide  ", palette.fg(palette.muted)),
            Span::styled("[X]", palette.fg(palette.accent)),
            Span::styled(" Reset  ", palette.fg(palette.muted)),
            Span::styled("[C]", palette.fg(palette.accent)),
            Span::styled(" Copy link  ", palette.fg(palette.muted)),
            Span::styled("[Esc]", palette.fg(palette.error)),
            Span::styled(" Leave  ", palette.fg(palette.muted)),
            Span::styled("[Q]", palette.fg(palette.error)),
            Span::styled(" Quit", palette.fg(palette.muted)),
        ]))
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(palette.fg(palette.border)),
        );
        frame.render_widget(help, chunks[4]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokr_common::room::{ParticipantId, Vote};

    use crate::sync::ParticipantEntry;

    fn screen() -> RoomScreen {
        RoomScreen::new(
            RoomCode::parse("AB12CD").unwrap(),
            1,
            "pokr://test/?room=AB12CD".into(),
        )
    }

    #[test]
    fn test_cursor_wraps() {
        let mut s = screen();
        s.select_prev();
        assert_eq!(s.cursor_label(), "?");
        s.select_next();
        assert_eq!(s.cursor_label(), "0");
    }

    #[test]
    fn test_cursor_follows_own_vote() {
        let mut s = screen();
        s.apply_view(RoomView {
            session: 1,
            code: s.code.clone(),
            participants: vec![ParticipantEntry {
                id: ParticipantId::new("me"),
                name: "Me".into(),
                vote: Some(Vote::Points(8)),
                is_me: true,
            }],
            revealed: false,
            my_vote: Some(Vote::Points(8)),
        });
        assert_eq!(s.cursor_label(), "8");
    }

    #[test]
    fn test_copied_link_shows_status() {
        let mut s = screen();
        s.error_message = Some("reset failed".into());
        s.link_copied(Ok(()));
        assert!(s.error_message.is_none());
        assert_eq!(
            s.status_message.as_ref().map(|(m, _)| m.as_str()),
            Some("[ copied ] pokr://test/?room=AB12CD")
        );
    }

    #[test]
    fn test_clipboard_failure_shows_link_in_banner() {
        let mut s = screen();
        s.link_copied(Err("no display".into()));
        assert!(s.status_message.is_none());
        assert_eq!(
            s.error_message.as_deref(),
            Some("Clipboard unavailable (no display): pokr://test/?room=AB12CD")
        );
    }

    #[test]
    fn test_status_expires() {
        let mut s = screen();
        s.show_status("copied".into());
        let shown_at = s.status_message.as_ref().unwrap().1;
        s.expire_status(shown_at + Duration::from_millis(500));
        assert!(s.status_message.is_some());
        s.expire_status(shown_at + STATUS_TTL);
        assert!(s.status_message.is_none());
    }
}
