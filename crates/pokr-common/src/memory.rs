use std::collections::HashMap;

use tokio::sync::{mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::patch::Patch;
use crate::room::Room;
use crate::room_code::RoomCode;
use crate::store::{RoomStore, StoreError, Subscription};

const SUBSCRIPTION_BUFFER: usize = 16;

/// In-process room document store.
///
/// Each room lives in a `watch` channel: writers replace the value, subscribers
/// observe the latest snapshot. All writes go through one lock, so a patch and its
/// precondition check are atomic with respect to every other write.
pub struct MemoryStore {
    rooms: RwLock<HashMap<RoomCode, watch::Sender<Option<Room>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms
            .read()
            .await
            .values()
            .filter(|tx| tx.borrow().is_some())
            .count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomStore for MemoryStore {
    async fn get(&self, code: &RoomCode) -> Result<Option<Room>, StoreError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(code).and_then(|tx| tx.borrow().clone()))
    }

    async fn set(&self, code: &RoomCode, room: Room) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(code.clone())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(room));
        tracing::debug!("Room {} overwritten", code);
        Ok(())
    }

    async fn patch(&self, code: &RoomCode, patch: Patch) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        let current = rooms.get(code).and_then(|tx| tx.borrow().clone());

        let mut room = match current {
            Some(room) => room,
            None if patch.create_if_absent => {
                tracing::info!("Creating room {}", code);
                Room::new()
            }
            None => return Err(StoreError::NotFound(code.clone())),
        };

        if let Some(precondition) = patch.precondition {
            if !precondition.holds(&room) {
                tracing::debug!("Patch on {} rejected: {:?} does not hold", code, precondition);
                return Err(StoreError::PreconditionFailed(code.clone()));
            }
        }

        patch.apply_to(&mut room);
        tracing::debug!("Room {} patched: {}", code, patch.paths().join(", "));

        rooms
            .entry(code.clone())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(room));
        Ok(())
    }

    async fn subscribe(&self, code: &RoomCode) -> Result<Subscription, StoreError> {
        let mut watch_rx = {
            let mut rooms = self.rooms.write().await;
            rooms
                .entry(code.clone())
                .or_insert_with(|| watch::channel(None).0)
                .subscribe()
        };

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let code = code.clone();

        tokio::spawn(async move {
            let initial = watch_rx.borrow_and_update().clone();
            if tx.send(initial).await.is_err() {
                return;
            }
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    changed = watch_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = watch_rx.borrow_and_update().clone();
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Subscription to {} closed", code);
        });

        Ok(Subscription::new(rx, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Precondition;
    use crate::room::{Participant, ParticipantId, Vote};

    fn code() -> RoomCode {
        RoomCode::parse("AB12CD").unwrap()
    }

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    #[tokio::test]
    async fn test_get_absent_room() {
        let store = MemoryStore::new();
        assert_eq!(store.get(&code()).await.unwrap(), None);
        assert_eq!(store.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_patch_absent_room_requires_upsert() {
        let store = MemoryStore::new();
        let err = store
            .patch(&code(), Patch::new().revealed(true))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(code()));

        store
            .patch(&code(), Patch::new().revealed(true).upsert())
            .await
            .unwrap();
        assert!(store.get(&code()).await.unwrap().unwrap().revealed);
    }

    #[tokio::test]
    async fn test_precondition_rejects_stale_write() {
        let store = MemoryStore::new();
        store.set(&code(), Room::new()).await.unwrap();

        let stale = Patch::new()
            .revealed(false)
            .when(Precondition::Revealed(true));
        assert_eq!(
            store.patch(&code(), stale).await.unwrap_err(),
            StoreError::PreconditionFailed(code())
        );

        let fresh = Patch::new()
            .revealed(true)
            .when(Precondition::Revealed(false));
        store.patch(&code(), fresh).await.unwrap();
        assert!(store.get(&code()).await.unwrap().unwrap().revealed);
    }

    #[tokio::test]
    async fn test_subscription_sees_initial_and_updates() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(&code()).await.unwrap();
        assert_eq!(sub.next().await, Some(None));

        store
            .patch(
                &code(),
                Patch::new()
                    .participant(id("a"), Participant::joined("Alice"))
                    .upsert(),
            )
            .await
            .unwrap();

        let room = sub.next().await.unwrap().unwrap();
        assert_eq!(room.participant(&id("a")).unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_subscription_converges_on_latest() {
        let store = MemoryStore::new();
        store.set(&code(), Room::new()).await.unwrap();
        let mut sub = store.subscribe(&code()).await.unwrap();
        assert_eq!(sub.next().await, Some(Some(Room::new())));

        for points in [1, 2, 3] {
            store
                .patch(&code(), Patch::new().vote(id("a"), Some(Vote::Points(points))))
                .await
                .unwrap();
        }

        let mut last = None;
        while last != Some(Vote::Points(3)) {
            let room = sub.next().await.unwrap().unwrap();
            last = room.vote_of(&id("a"));
        }
    }

    #[tokio::test]
    async fn test_cancelled_subscription_stops() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(&code()).await.unwrap();
        sub.next().await;
        sub.cancel();
        store.set(&code(), Room::new()).await.unwrap();
        assert_eq!(sub.next().await, None);
    }
}
