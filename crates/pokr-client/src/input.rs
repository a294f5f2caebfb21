use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::Screen;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Global
    Quit,
    ToggleTheme,
    DismissAlert,

    // Join screen
    TypeChar(char),
    Backspace,
    SwitchField,
    Submit,
    CreateRoom,
    ClearLink,

    // Room screen
    SelectPrev,
    SelectNext,
    VoteSelected,
    VoteLabel(&'static str),
    ToggleReveal,
    Reset,
    CopyLink,
    Leave,
}

pub fn map_key(key: KeyEvent, screen: &Screen, alert_open: bool) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Ctrl+C always quits
    if ctrl && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }

    if alert_open {
        return Some(Action::DismissAlert);
    }

    if ctrl && key.code == KeyCode::Char('t') {
        return Some(Action::ToggleTheme);
    }

    match screen {
        Screen::Join(s) => match key.code {
            KeyCode::Char('n') if ctrl => Some(Action::CreateRoom),
            KeyCode::Enter => Some(Action::Submit),
            KeyCode::Tab | KeyCode::BackTab => Some(Action::SwitchField),
            KeyCode::Char(c) if !ctrl => Some(Action::TypeChar(c)),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Esc if s.link_room.is_some() => Some(Action::ClearLink),
            KeyCode::Esc => Some(Action::Quit),
            _ => None,
        },

        Screen::Room(_) => match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Left | KeyCode::Char('h') => Some(Action::SelectPrev),
            KeyCode::Right | KeyCode::Char('l') => Some(Action::SelectNext),
            KeyCode::Enter | KeyCode::Char(' ') => Some(Action::VoteSelected),
            KeyCode::Char('0') => Some(Action::VoteLabel("0")),
            KeyCode::Char('1') => Some(Action::VoteLabel("1")),
            KeyCode::Char('2') => Some(Action::VoteLabel("2")),
            KeyCode::Char('3') => Some(Action::VoteLabel("3")),
            KeyCode::Char('5') => Some(Action::VoteLabel("5")),
            KeyCode::Char('8') => Some(Action::VoteLabel("8")),
            KeyCode::Char('?') => Some(Action::VoteLabel("?")),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(Action::ToggleReveal),
            KeyCode::Char('x') | KeyCode::Char('X') => Some(Action::Reset),
            KeyCode::Char('c') | KeyCode::Char('C') => Some(Action::CopyLink),
            KeyCode::Esc => Some(Action::Leave),
            _ => None,
        },
    }
}
