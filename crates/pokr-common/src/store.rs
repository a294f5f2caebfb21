use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::patch::Patch;
use crate::room::Room;
use crate::room_code::RoomCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("room {0} not found")]
    NotFound(RoomCode),
    #[error("precondition failed for room {0}")]
    PreconditionFailed(RoomCode),
    #[error("store connection closed")]
    Disconnected,
    #[error("store request timed out")]
    Timeout,
    #[error("store rejected request: {0}")]
    Remote(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether the same request may succeed if sent again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout | StoreError::Io(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Live feed of full room snapshots. `None` means the document does not exist.
///
/// Snapshots are idempotent: a subscriber may miss intermediate states but always
/// converges on the latest one. Dropping the subscription cancels it.
pub struct Subscription {
    rx: mpsc::Receiver<Option<Room>>,
    token: CancellationToken,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<Option<Room>>, token: CancellationToken) -> Self {
        Self { rx, token }
    }

    /// Next snapshot, or `None` once cancelled or the feed has closed.
    pub async fn next(&mut self) -> Option<Option<Room>> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            snapshot = self.rx.recv() => snapshot,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The four operations the synchronizer needs from a document store.
pub trait RoomStore: Send + Sync + 'static {
    fn get(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send;

    /// Full-document overwrite.
    fn set(
        &self,
        code: &RoomCode,
        room: Room,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Field-scoped update, applied atomically together with its precondition.
    fn patch(
        &self,
        code: &RoomCode,
        patch: Patch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn subscribe(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;
}

impl<S: RoomStore> RoomStore for Arc<S> {
    fn get(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send {
        (**self).get(code)
    }

    fn set(
        &self,
        code: &RoomCode,
        room: Room,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).set(code, room)
    }

    fn patch(
        &self,
        code: &RoomCode,
        patch: Patch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).patch(code, patch)
    }

    fn subscribe(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send {
        (**self).subscribe(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Timeout.is_transient());
        assert!(StoreError::Io("reset".into()).is_transient());
        assert!(!StoreError::Disconnected.is_transient());
        let code = RoomCode::parse("AAAAAA").unwrap();
        assert!(!StoreError::PreconditionFailed(code).is_transient());
    }

    #[tokio::test]
    async fn test_cancelled_subscription_yields_none() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = Subscription::new(rx, CancellationToken::new());
        tx.send(Some(Room::new())).await.unwrap();
        assert_eq!(sub.next().await, Some(Some(Room::new())));
        sub.cancel();
        tx.send(None).await.unwrap();
        assert_eq!(sub.next().await, None);
    }
}
