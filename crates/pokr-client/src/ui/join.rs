use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use pokr_common::room_code::ROOM_CODE_LEN;

use super::palette::Palette;

#[derive(Debug, Clone)]
pub struct JoinScreen {
    pub name: String,
    pub room_input: String,
    pub active_field: JoinField,
    /// Code taken from a share link; replaces manual code entry.
    pub link_room: Option<String>,
    pub error_message: Option<String>,
    pub joining: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinField {
    Name,
    RoomCode,
}

impl JoinScreen {
    pub fn new(name: String, link_room: Option<String>) -> Self {
        Self {
            name,
            room_input: String::new(),
            active_field: JoinField::Name,
            link_room,
            error_message: None,
            joining: false,
        }
    }

    pub fn switch_field(&mut self) {
        if self.link_room.is_some() {
            return;
        }
        self.active_field = match self.active_field {
            JoinField::Name => JoinField::RoomCode,
            JoinField::RoomCode => JoinField::Name,
        };
    }

    pub fn type_char(&mut self, c: char) {
        match self.active_field {
            JoinField::Name => self.name.push(c),
            JoinField::RoomCode => {
                if self.room_input.chars().count() < ROOM_CODE_LEN {
                    self.room_input.push(c.to_ascii_uppercase());
                }
            }
        }
    }

    pub fn backspace(&mut self) {
        match self.active_field {
            JoinField::Name => {
                self.name.pop();
            }
            JoinField::RoomCode => {
                self.room_input.pop();
            }
        }
    }

    /// Drop the share-link code and fall back to create/join entry.
    pub fn clear_link(&mut self) {
        self.link_room = None;
        self.active_field = JoinField::Name;
    }

    pub fn draw(&self, frame: &mut Frame, palette: &Palette) {
        let area = frame.area();
        frame.render_widget(Block::default().style(palette.base()), area);

        // Center the form
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(25),
                Constraint::Length(15),
                Constraint::Percentage(25),
            ])
            .split(area);

        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(25),
                Constraint::Percentage(50),
                Constraint::Percentage(25),
            ])
            .split(vertical[1]);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Title
                Constraint::Length(3), // Name field
                Constraint::Length(3), // Room code field / link banner
                Constraint::Length(2), // Status/Error
                Constraint::Length(2), // Help
            ])
            .split(horizontal[1]);

        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                "  POKR ",
                palette.fg(palette.accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" - planning poker", palette.fg(palette.muted)),
        ]));
        frame.render_widget(title, chunks[0]);

        let field_style = |field: JoinField| {
            if self.active_field == field {
                palette.fg(palette.accent)
            } else {
                palette.fg(palette.border)
            }
        };

        let name_input = Paragraph::new(self.name.as_str())
            .style(palette.fg(palette.text))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(field_style(JoinField::Name))
                    .title(" Your Name "),
            );
        frame.render_widget(name_input, chunks[1]);

        match &self.link_room {
            Some(code) => {
                let banner = Paragraph::new(Line::from(vec![
                    Span::styled("joining room ", palette.fg(palette.muted)),
                    Span::styled(
                        code.as_str(),
                        palette.fg(palette.accent).add_modifier(Modifier::BOLD),
                    ),
                ]))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(palette.fg(palette.border))
                        .title(" Shared Link "),
                );
                frame.render_widget(banner, chunks[2]);
            }
            None => {
                let room_input = Paragraph::new(self.room_input.as_str())
                    .style(palette.fg(palette.text))
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(field_style(JoinField::RoomCode))
                            .title(" Room Code "),
                    );
                frame.render_widget(room_input, chunks[2]);
            }
        }

        if self.joining {
            let status = Paragraph::new("  Joining...").style(palette.fg(palette.accent));
            frame.render_widget(status, chunks[3]);
        } else if let Some(ref err) = self.error_message {
            let error = Paragraph::new(format!("  {}", err)).style(palette.fg(palette.error));
            frame.render_widget(error, chunks[3]);
        }

        let help_text = if self.link_room.is_some() {
            "  [Enter] Join  [Esc] Other room  [^T] Theme  [^C] Quit"
        } else {
            "  [Tab] Switch  [Enter] Join  [^N] New room  [^T] Theme  [Esc] Quit"
        };
        let help = Paragraph::new(help_text).style(palette.fg(palette.muted));
        frame.render_widget(help, chunks[4]);

        if !self.joining {
            let (cursor_x, cursor_y) = match self.active_field {
                JoinField::Name => (chunks[1].x + self.name.chars().count() as u16 + 1, chunks[1].y + 1),
                JoinField::RoomCode => (
                    chunks[2].x + self.room_input.chars().count() as u16 + 1,
                    chunks[2].y + 1,
                ),
            };
            frame.set_cursor_position((cursor_x, cursor_y));
        }
    }
}
