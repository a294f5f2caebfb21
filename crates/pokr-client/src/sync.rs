use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pokr_common::patch::{Patch, Precondition};
use pokr_common::room::{Participant, ParticipantId, Room, Vote};
use pokr_common::room_code::RoomCode;
use pokr_common::store::{RoomStore, StoreError};

use crate::link::Location;
use crate::retry::{self, RetryPolicy};
use crate::view;

/// How many times a reveal toggle re-reads after losing a race.
const REVEAL_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantEntry {
    pub id: ParticipantId,
    pub name: String,
    pub vote: Option<Vote>,
    pub is_me: bool,
}

/// Normalized room state handed to the view: participants sorted for display,
/// plus the local participant's own vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub session: u64,
    pub code: RoomCode,
    pub participants: Vec<ParticipantEntry>,
    pub revealed: bool,
    pub my_vote: Option<Vote>,
}

impl RoomView {
    pub fn from_snapshot(
        session: u64,
        code: &RoomCode,
        snapshot: Option<Room>,
        me: &ParticipantId,
    ) -> Self {
        let room = snapshot.unwrap_or_default();
        let mut participants: Vec<ParticipantEntry> = room
            .participants
            .into_iter()
            .map(|(id, p)| ParticipantEntry {
                is_me: &id == me,
                id,
                name: p.name,
                vote: p.vote,
            })
            .collect();
        view::sort_by_name(&mut participants);
        let my_vote = participants.iter().find(|p| p.is_me).and_then(|p| p.vote);

        Self {
            session,
            code: code.clone(),
            participants,
            revealed: room.revealed,
            my_vote,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    Joined {
        session: u64,
        code: RoomCode,
        link: String,
    },
    View(RoomView),
    Left {
        link: String,
    },
    Failed {
        action: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub enum SyncCommand {
    Join { code: RoomCode, name: String },
    Vote(Vote),
    ToggleReveal,
    Reset,
    Leave,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("not in a room")]
    NotInRoom,
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct Session {
    id: u64,
    code: RoomCode,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Keeps the local participant in sync with one room document at a time.
///
/// Created once per client; a [`Session`] exists between `join` and `leave`.
/// Room snapshots are republished as [`SyncEvent::View`] on the event channel.
pub struct RoomSynchronizer<S> {
    store: Arc<S>,
    me: ParticipantId,
    events: mpsc::Sender<SyncEvent>,
    retry: RetryPolicy,
    location: Location,
    session: Option<Session>,
    next_session: u64,
}

impl<S: RoomStore> RoomSynchronizer<S> {
    pub fn new(
        store: Arc<S>,
        me: ParticipantId,
        location: Location,
        events: mpsc::Sender<SyncEvent>,
    ) -> Self {
        Self {
            store,
            me,
            events,
            retry: RetryPolicy::default(),
            location,
            session: None,
            next_session: 0,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.me
    }

    pub fn current_code(&self) -> Option<&RoomCode> {
        self.session.as_ref().map(|s| &s.code)
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Enter `code`, creating the room if needed, and start following it.
    ///
    /// The local entry is written as a single field-scoped upsert, so concurrent
    /// joiners never overwrite each other. Re-joining resets our own vote.
    pub async fn join(&mut self, code: RoomCode, name: &str) -> Result<(), SyncError> {
        if self.session.is_some() {
            self.leave().await;
        }

        let store = &self.store;
        let code_ref = &code;
        let patch = Patch::new()
            .participant(self.me.clone(), Participant::joined(name.trim()))
            .upsert();
        let patch_ref = &patch;
        retry::with_backoff(&self.retry, "join", move || {
            store.patch(code_ref, patch_ref.clone())
        })
        .await?;
        let mut subscription =
            retry::with_backoff(&self.retry, "subscribe", move || store.subscribe(code_ref))
                .await?;

        self.next_session += 1;
        let session_id = self.next_session;
        self.location.enter(&code);
        self.emit(SyncEvent::Joined {
            session: session_id,
            code: code.clone(),
            link: self.location.href(),
        })
        .await;

        let token = subscription.cancellation_token();
        let events = self.events.clone();
        let me = self.me.clone();
        let feed_code = code.clone();
        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                let view = RoomView::from_snapshot(session_id, &feed_code, snapshot, &me);
                if events.send(SyncEvent::View(view)).await.is_err() {
                    break;
                }
            }
        });

        tracing::info!("Joined room {} as {}", code, self.me);
        self.session = Some(Session {
            id: session_id,
            code,
            token,
            task,
        });
        Ok(())
    }

    /// Record our vote. Only `participants.<me>.vote` is written.
    pub async fn cast_vote(&self, vote: Vote) -> Result<(), SyncError> {
        let code = self.active_code()?;
        let store = &self.store;
        let patch = Patch::new().vote(self.me.clone(), Some(vote));
        let patch = &patch;
        retry::with_backoff(&self.retry, "vote", move || store.patch(code, patch.clone())).await?;
        tracing::debug!("Voted {} in {}", vote, code);
        Ok(())
    }

    /// Flip the room-wide reveal flag and return its new value.
    ///
    /// The write is conditional on the value just read; if another participant
    /// toggled in between, the read is repeated. A write whose reply was lost may
    /// still have landed, so transient failures re-read before writing again.
    pub async fn toggle_reveal(&self) -> Result<bool, SyncError> {
        let code = self.active_code()?;
        let store = &self.store;
        let mut delays = self.retry.delays().iter();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.read_revealed(code).await?;
            let target = !current;

            let patch = Patch::new()
                .revealed(target)
                .when(Precondition::Revealed(current));
            match store.patch(code, patch).await {
                Ok(()) => return Ok(target),
                Err(StoreError::PreconditionFailed(_)) if attempt < REVEAL_ATTEMPTS => {
                    tracing::debug!("Reveal on {} lost a race, re-reading", code);
                }
                Err(e) if e.is_transient() => {
                    if self.read_revealed(code).await? == target {
                        tracing::debug!("Reveal on {} landed despite {}", code, e);
                        return Ok(target);
                    }
                    match delays.next() {
                        Some(delay) => {
                            tracing::warn!("reveal failed ({}), retrying in {:?}", e, delay);
                            tokio::time::sleep(*delay).await;
                        }
                        None => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn read_revealed(&self, code: &RoomCode) -> Result<bool, SyncError> {
        let store = &self.store;
        let room = retry::with_backoff(&self.retry, "read room", move || store.get(code)).await?;
        Ok(room.map(|room| room.revealed).unwrap_or(false))
    }

    /// Clear every known vote and hide them, in one patch.
    ///
    /// Participants are read first, so someone joining between the read and the
    /// write keeps their vote.
    pub async fn reset(&self) -> Result<(), SyncError> {
        let code = self.active_code()?;
        let store = &self.store;
        let Some(room) =
            retry::with_backoff(&self.retry, "read room", move || store.get(code)).await?
        else {
            return Ok(());
        };

        let patch = room
            .participants
            .keys()
            .fold(Patch::new().revealed(false), |patch, id| {
                patch.vote(id.clone(), None)
            });
        let patch = &patch;
        retry::with_backoff(&self.retry, "reset", move || store.patch(code, patch.clone())).await?;
        tracing::info!("Reset room {}", code);
        Ok(())
    }

    /// Stop following the current room. Our entry stays in the document.
    pub async fn leave(&mut self) -> Option<RoomCode> {
        // Stop the feed before forgetting the session.
        if let Some(session) = &self.session {
            session.token.cancel();
            session.task.abort();
        }
        let session = self.session.take()?;
        self.location.clear();
        tracing::info!("Left room {}", session.code);
        self.emit(SyncEvent::Left {
            link: self.location.href(),
        })
        .await;
        Some(session.code)
    }

    fn active_code(&self) -> Result<&RoomCode, SyncError> {
        self.current_code().ok_or(SyncError::NotInRoom)
    }

    async fn emit(&self, event: SyncEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("Sync event channel closed");
        }
    }
}

impl<S> Drop for RoomSynchronizer<S> {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.token.cancel();
            session.task.abort();
        }
    }
}

/// Run `sync` against a command channel until it closes. Failures are reported
/// as [`SyncEvent::Failed`] instead of ending the loop.
pub async fn drive<S: RoomStore>(
    mut sync: RoomSynchronizer<S>,
    mut commands: mpsc::Receiver<SyncCommand>,
) {
    while let Some(command) = commands.recv().await {
        let (action, result) = match command {
            SyncCommand::Join { code, name } => ("join", sync.join(code, &name).await),
            SyncCommand::Vote(vote) => ("vote", sync.cast_vote(vote).await),
            SyncCommand::ToggleReveal => ("reveal", sync.toggle_reveal().await.map(|_| ())),
            SyncCommand::Reset => ("reset", sync.reset().await),
            SyncCommand::Leave => {
                sync.leave().await;
                continue;
            }
        };
        if let Err(e) = result {
            tracing::error!("{} failed: {}", action, e);
            sync.emit(SyncEvent::Failed {
                action,
                message: e.to_string(),
            })
            .await;
        }
    }
    sync.leave().await;
}
