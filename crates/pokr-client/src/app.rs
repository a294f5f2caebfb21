use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use pokr_common::room::Vote;
use pokr_common::room_code::RoomCode;
use pokr_common::store::RoomStore;

use crate::event::{self, AppEvent};
use crate::input::{self, Action};
use crate::link::Location;
use crate::prefs::PreferenceStore;
use crate::sync::{self, RoomSynchronizer, SyncCommand, SyncEvent};
use crate::ui::join::JoinScreen;
use crate::ui::palette::Palette;
use crate::ui::popup;
use crate::ui::room::RoomScreen;

#[derive(Debug)]
pub enum Screen {
    Join(JoinScreen),
    Room(RoomScreen),
}

/// What the join screen starts with.
#[derive(Debug, Clone, Default)]
pub struct Startup {
    pub name: String,
    pub link_room: Option<String>,
}

pub async fn run<S: RoomStore>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    store: Arc<S>,
    mut prefs: PreferenceStore,
    location: Location,
    startup: Startup,
) -> anyhow::Result<()> {
    let participant_id = prefs.participant_id()?;
    let mut theme = prefs.theme();

    let (sync_tx, sync_rx) = mpsc::channel::<SyncEvent>(64);
    let (command_tx, command_rx) = mpsc::channel::<SyncCommand>(16);
    let synchronizer = RoomSynchronizer::new(store, participant_id, location, sync_tx);
    let sync_task = tokio::spawn(sync::drive(synchronizer, command_rx));

    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(64);
    let event_task = tokio::spawn(event::event_loop(sync_rx, event_tx));

    let mut screen = Screen::Join(JoinScreen::new(startup.name, startup.link_room));
    let mut alert: Option<String> = None;
    // Kept alive so the copied text stays owned on X11.
    let mut clipboard: Option<arboard::Clipboard> = None;
    let mut running = true;

    while running {
        let palette = Palette::for_theme(theme);
        terminal.draw(|frame| {
            match &screen {
                Screen::Join(s) => s.draw(frame, &palette),
                Screen::Room(s) => s.draw(frame, &palette),
            }
            if let Some(ref message) = alert {
                popup::draw_alert(frame, message, &palette);
            }
        })?;

        let event = match event_rx.recv().await {
            Some(e) => e,
            None => break,
        };

        let action = match event {
            AppEvent::Key(key) => input::map_key(key, &screen, alert.is_some()),
            AppEvent::Sync(event) => {
                for command in handle_sync_event(event, &mut screen) {
                    if !dispatch(&command_tx, command).await {
                        running = false;
                    }
                }
                None
            }
            AppEvent::Tick => {
                if let Screen::Room(s) = &mut screen {
                    s.expire_status(Instant::now());
                }
                None
            }
        };

        let Some(action) = action else {
            continue;
        };

        let mut command = None;
        match action {
            Action::Quit => running = false,
            Action::DismissAlert => alert = None,
            Action::ToggleTheme => {
                theme = theme.toggled();
                if let Err(e) = prefs.set_theme(theme) {
                    tracing::warn!("Could not save theme: {}", e);
                }
            }

            Action::TypeChar(c) => {
                if let Screen::Join(s) = &mut screen {
                    s.type_char(c);
                }
            }
            Action::Backspace => {
                if let Screen::Join(s) = &mut screen {
                    s.backspace();
                }
            }
            Action::SwitchField => {
                if let Screen::Join(s) = &mut screen {
                    s.switch_field();
                }
            }
            Action::ClearLink => {
                if let Screen::Join(s) = &mut screen {
                    s.clear_link();
                }
            }
            Action::Submit | Action::CreateRoom => {
                if let Screen::Join(s) = &mut screen {
                    if s.joining {
                        continue;
                    }
                    let create = action == Action::CreateRoom;
                    match validate_join(&s.name, &s.room_input, s.link_room.as_deref(), create) {
                        Ok((code, name)) => {
                            if let Err(e) = prefs.set_user_name(&name) {
                                tracing::warn!("Could not save name: {}", e);
                            }
                            s.name = name.clone();
                            s.joining = true;
                            s.error_message = None;
                            command = Some(SyncCommand::Join { code, name });
                        }
                        Err(message) => alert = Some(message),
                    }
                }
            }

            Action::SelectPrev => {
                if let Screen::Room(s) = &mut screen {
                    s.select_prev();
                }
            }
            Action::SelectNext => {
                if let Screen::Room(s) = &mut screen {
                    s.select_next();
                }
            }
            Action::VoteSelected | Action::VoteLabel(_) => {
                if let Screen::Room(s) = &mut screen {
                    if let Action::VoteLabel(label) = action {
                        if let Some(idx) = pokr_common::room::POINT_LABELS
                            .iter()
                            .position(|l| *l == label)
                        {
                            s.cursor = idx;
                        }
                    }
                    if let Some(vote) = Vote::from_label(s.cursor_label()) {
                        s.error_message = None;
                        command = Some(SyncCommand::Vote(vote));
                    }
                }
            }
            Action::ToggleReveal => {
                if let Screen::Room(s) = &mut screen {
                    s.error_message = None;
                    command = Some(SyncCommand::ToggleReveal);
                }
            }
            Action::Reset => {
                if let Screen::Room(s) = &mut screen {
                    s.error_message = None;
                    command = Some(SyncCommand::Reset);
                }
            }
            Action::CopyLink => {
                if let Screen::Room(s) = &mut screen {
                    let result = copy_to_clipboard(&mut clipboard, &s.link);
                    if let Err(ref e) = result {
                        tracing::warn!("Could not copy {}: {}", s.link, e);
                    }
                    s.link_copied(result.map_err(|e| e.to_string()));
                }
            }
            Action::Leave => {
                if matches!(screen, Screen::Room(_)) {
                    // Swap the view out first; late snapshots no longer match a screen.
                    let name = prefs.user_name().unwrap_or_default().to_string();
                    screen = Screen::Join(JoinScreen::new(name, None));
                    command = Some(SyncCommand::Leave);
                }
            }
        }

        if let Some(command) = command {
            if !dispatch(&command_tx, command).await {
                running = false;
            }
        }
    }

    event_task.abort();
    drop(command_tx);
    // Let the synchronizer leave cleanly, but do not hang on exit.
    let _ = tokio::time::timeout(Duration::from_secs(1), sync_task).await;

    Ok(())
}

/// Hand a command to the synchronizer. False once it has stopped.
async fn dispatch(commands: &mpsc::Sender<SyncCommand>, command: SyncCommand) -> bool {
    if commands.send(command).await.is_err() {
        tracing::error!("Synchronizer stopped");
        return false;
    }
    true
}

fn copy_to_clipboard(
    slot: &mut Option<arboard::Clipboard>,
    text: &str,
) -> Result<(), arboard::Error> {
    let mut clipboard = match slot.take() {
        Some(clipboard) => clipboard,
        None => arboard::Clipboard::new()?,
    };
    let result = clipboard.set_text(text);
    *slot = Some(clipboard);
    result
}

/// Check join input and pick the room: the shared-link code, a fresh one when
/// creating, or else the typed code, which must not be empty.
pub fn validate_join(
    name: &str,
    room_input: &str,
    link_room: Option<&str>,
    create: bool,
) -> Result<(RoomCode, String), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Please enter your name".to_string());
    }

    let code = match (link_room, create) {
        (Some(linked), _) => RoomCode::parse(linked).map_err(|e| e.to_string())?,
        (None, true) => RoomCode::generate(),
        (None, false) => RoomCode::parse(room_input).map_err(|e| e.to_string())?,
    };

    Ok((code, name.to_string()))
}

fn handle_sync_event(event: SyncEvent, screen: &mut Screen) -> Vec<SyncCommand> {
    let mut outbound = Vec::new();

    match event {
        SyncEvent::Joined {
            session,
            code,
            link,
        } => {
            if matches!(screen, Screen::Join(s) if s.joining) {
                *screen = Screen::Room(RoomScreen::new(code, session, link));
            } else {
                // The user backed out while the join was in flight.
                outbound.push(SyncCommand::Leave);
            }
        }

        SyncEvent::View(view) => {
            if let Screen::Room(s) = screen {
                if s.session == view.session {
                    s.apply_view(view);
                }
            }
        }

        SyncEvent::Left { link } => {
            tracing::debug!("Location reset to {}", link);
        }

        SyncEvent::Failed { action, message } => match screen {
            Screen::Join(s) => {
                s.joining = false;
                s.error_message = Some(format!("Could not {}: {}", action, message));
            }
            Screen::Room(s) => {
                s.error_message = Some(format!("{} failed: {}", action, message));
            }
        },
    }

    outbound
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokr_common::room::ParticipantId;

    use crate::sync::{ParticipantEntry, RoomView};

    fn code() -> RoomCode {
        RoomCode::parse("AB12CD").unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_detects_stopped_synchronizer() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(dispatch(&tx, SyncCommand::Reset).await);
        assert!(matches!(rx.recv().await, Some(SyncCommand::Reset)));

        drop(rx);
        assert!(!dispatch(&tx, SyncCommand::Leave).await);
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        assert_eq!(
            validate_join("   ", "AB12CD", None, false),
            Err("Please enter your name".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_empty_room_code() {
        assert_eq!(
            validate_join("Alice", "", None, false),
            Err("Please enter a room code".to_string())
        );
        assert_eq!(
            validate_join("Alice", "   ", None, false),
            Err("Please enter a room code".to_string())
        );
    }

    #[test]
    fn test_validate_picks_room() {
        let (c, name) = validate_join(" Alice ", "ab12cd", None, false).unwrap();
        assert_eq!(c, code());
        assert_eq!(name, "Alice");

        let (linked, _) = validate_join("Bob", "ZZZZZZ", Some("ab12cd"), false).unwrap();
        assert_eq!(linked, code());

        let (fresh, _) = validate_join("Cy", "", None, true).unwrap();
        assert_eq!(fresh.as_str().len(), 6);

        let (created, _) = validate_join("Cy", "AB12CD", None, true).unwrap();
        assert_eq!(created.as_str().len(), 6);

        assert!(validate_join("Dee", "AB", None, false).is_err());
    }

    #[test]
    fn test_joined_switches_to_room_screen() {
        let mut join = JoinScreen::new("Alice".into(), None);
        join.joining = true;
        let mut screen = Screen::Join(join);

        let out = handle_sync_event(
            SyncEvent::Joined {
                session: 4,
                code: code(),
                link: "pokr://x/?room=AB12CD".into(),
            },
            &mut screen,
        );
        assert!(out.is_empty());
        match &screen {
            Screen::Room(s) => assert_eq!(s.session, 4),
            other => panic!("expected room screen, got {:?}", other),
        }
    }

    #[test]
    fn test_late_join_is_undone() {
        let mut screen = Screen::Join(JoinScreen::new("Alice".into(), None));
        let out = handle_sync_event(
            SyncEvent::Joined {
                session: 1,
                code: code(),
                link: String::new(),
            },
            &mut screen,
        );
        assert!(matches!(out.as_slice(), [SyncCommand::Leave]));
        assert!(matches!(screen, Screen::Join(_)));
    }

    #[test]
    fn test_stale_views_are_ignored() {
        let mut screen = Screen::Room(RoomScreen::new(code(), 2, String::new()));
        let stale = RoomView {
            session: 1,
            code: code(),
            participants: vec![ParticipantEntry {
                id: ParticipantId::new("x"),
                name: "Ghost".into(),
                vote: None,
                is_me: false,
            }],
            revealed: false,
            my_vote: None,
        };
        handle_sync_event(SyncEvent::View(stale.clone()), &mut screen);
        match &screen {
            Screen::Room(s) => assert!(s.view.is_none()),
            _ => unreachable!(),
        }

        let fresh = RoomView { session: 2, ..stale };
        handle_sync_event(SyncEvent::View(fresh), &mut screen);
        match &screen {
            Screen::Room(s) => assert_eq!(s.view.as_ref().unwrap().participants.len(), 1),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_failures_surface_as_banners() {
        let mut screen = Screen::Room(RoomScreen::new(code(), 1, String::new()));
        handle_sync_event(
            SyncEvent::Failed {
                action: "vote",
                message: "store request timed out".into(),
            },
            &mut screen,
        );
        match &screen {
            Screen::Room(s) => assert_eq!(
                s.error_message.as_deref(),
                Some("vote failed: store request timed out")
            ),
            _ => unreachable!(),
        }
    }
}
