use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::patch::Patch;
use crate::protocol::{
    self, deserialize_message, framed_transport, serialize_message, ClientMessage, RequestId,
    ServerMessage,
};
use crate::room::Room;
use crate::room_code::RoomCode;
use crate::store::{RoomStore, StoreError, Subscription};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const CHANNEL_BUFFER: usize = 64;

type Pending = HashMap<RequestId, oneshot::Sender<ServerMessage>>;
/// Latest pushed snapshot per subscription. Overwriting keeps the reader from
/// ever waiting on a slow subscriber.
type Feeds = HashMap<RequestId, watch::Sender<Option<Room>>>;

#[derive(Default)]
struct Routes {
    pending: Mutex<Pending>,
    feeds: Mutex<Feeds>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`RoomStore`] backed by a `pokr-server` over TCP.
///
/// Replies are matched to requests by id; pushed snapshots are routed to the
/// subscription opened with the same id.
pub struct RemoteStore {
    tx: mpsc::Sender<ClientMessage>,
    routes: Arc<Routes>,
    next_id: AtomicU64,
}

impl RemoteStore {
    pub async fn connect(addr: &str) -> Result<Self, StoreError> {
        let stream = TcpStream::connect(addr).await?;
        let mut transport = framed_transport(stream);

        protocol::send_message(
            &mut transport,
            &ClientMessage::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?;

        let welcome = tokio::time::timeout(
            DEFAULT_TIMEOUT,
            protocol::recv_message::<ServerMessage>(&mut transport),
        )
        .await
        .map_err(|_| StoreError::Timeout)?
        .map_err(|e| StoreError::Io(e.to_string()))?;

        match welcome {
            Some(ServerMessage::Welcome { server_version }) => {
                tracing::info!("Connected to store at {} (server {})", addr, server_version);
            }
            Some(ServerMessage::HandshakeError { reason }) => {
                return Err(StoreError::Remote(reason));
            }
            Some(other) => {
                return Err(StoreError::Remote(format!(
                    "unexpected handshake reply: {:?}",
                    other
                )));
            }
            None => return Err(StoreError::Disconnected),
        }

        let (mut sink, mut stream) = transport.split();
        let (tx, mut rx) = mpsc::channel::<ClientMessage>(CHANNEL_BUFFER);
        let routes = Arc::new(Routes::default());

        // Writer task: rx -> TCP sink
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match serialize_message(&msg) {
                    Ok(bytes) => {
                        if sink.send(bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to serialize store request: {}", e);
                    }
                }
            }
        });

        // Reader task: TCP stream -> pending replies and subscription feeds
        let reader_routes = routes.clone();
        tokio::spawn(async move {
            while let Some(Ok(frame)) = stream.next().await {
                match deserialize_message::<ServerMessage>(&frame) {
                    Ok(msg) => route_reply(&reader_routes, msg),
                    Err(e) => {
                        tracing::warn!("Failed to parse store message: {}", e);
                    }
                }
            }
            tracing::warn!("Store connection closed");
            // Dropping the senders fails every waiter with Disconnected.
            lock(&reader_routes.pending).clear();
            lock(&reader_routes.feeds).clear();
        });

        Ok(Self {
            tx,
            routes,
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(
        &self,
        request_id: RequestId,
        msg: ClientMessage,
    ) -> Result<ServerMessage, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.routes.pending).insert(request_id, reply_tx);

        if self.tx.send(msg).await.is_err() {
            lock(&self.routes.pending).remove(&request_id);
            return Err(StoreError::Disconnected);
        }

        match tokio::time::timeout(DEFAULT_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(StoreError::Disconnected),
            Err(_) => {
                lock(&self.routes.pending).remove(&request_id);
                Err(StoreError::Timeout)
            }
        }
    }

    fn next_request_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

fn route_reply(routes: &Routes, msg: ServerMessage) {
    let request_id = match &msg {
        ServerMessage::Room { request_id, .. }
        | ServerMessage::Ack { request_id }
        | ServerMessage::Error { request_id, .. } => *request_id,
        ServerMessage::Changed {
            subscription_id,
            room,
        } => {
            if let Some(feed) = lock(&routes.feeds).get(subscription_id) {
                feed.send_replace(room.clone());
            }
            return;
        }
        ServerMessage::Welcome { .. } | ServerMessage::HandshakeError { .. } => return,
    };

    let waiter = lock(&routes.pending).remove(&request_id);
    match waiter {
        Some(waiter) => {
            let _ = waiter.send(msg);
        }
        None => tracing::debug!("Dropping reply for unknown request {}", request_id),
    }
}

fn expect_ack(code: &RoomCode, reply: ServerMessage) -> Result<(), StoreError> {
    match reply {
        ServerMessage::Ack { .. } => Ok(()),
        ServerMessage::Error { code: err, message, .. } => Err(err.into_store_error(code, message)),
        other => Err(StoreError::Remote(format!("unexpected reply: {:?}", other))),
    }
}

impl RoomStore for RemoteStore {
    async fn get(&self, code: &RoomCode) -> Result<Option<Room>, StoreError> {
        let request_id = self.next_request_id();
        let reply = self
            .request(
                request_id,
                ClientMessage::Get {
                    request_id,
                    code: code.clone(),
                },
            )
            .await?;
        match reply {
            ServerMessage::Room { room, .. } => Ok(room),
            ServerMessage::Error { code: err, message, .. } => {
                Err(err.into_store_error(code, message))
            }
            other => Err(StoreError::Remote(format!("unexpected reply: {:?}", other))),
        }
    }

    async fn set(&self, code: &RoomCode, room: Room) -> Result<(), StoreError> {
        let request_id = self.next_request_id();
        let reply = self
            .request(
                request_id,
                ClientMessage::Set {
                    request_id,
                    code: code.clone(),
                    room,
                },
            )
            .await?;
        expect_ack(code, reply)
    }

    async fn patch(&self, code: &RoomCode, patch: Patch) -> Result<(), StoreError> {
        let request_id = self.next_request_id();
        let reply = self
            .request(
                request_id,
                ClientMessage::Patch {
                    request_id,
                    code: code.clone(),
                    patch,
                },
            )
            .await?;
        expect_ack(code, reply)
    }

    async fn subscribe(&self, code: &RoomCode) -> Result<Subscription, StoreError> {
        let request_id = self.next_request_id();
        let (feed_tx, mut feed_rx) = watch::channel(None);
        // Register before asking, so the first snapshot cannot race the ack.
        lock(&self.routes.feeds).insert(request_id, feed_tx);

        let reply = self
            .request(
                request_id,
                ClientMessage::Subscribe {
                    request_id,
                    code: code.clone(),
                },
            )
            .await;
        if let Err(e) = reply.and_then(|r| expect_ack(code, r)) {
            lock(&self.routes.feeds).remove(&request_id);
            return Err(e);
        }

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let routes = self.routes.clone();
        let requests = self.tx.clone();
        let code = code.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    changed = feed_rx.changed() => {
                        // Sender gone: the connection closed.
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = feed_rx.borrow_and_update().clone();
                        tokio::select! {
                            _ = cancelled.cancelled() => break,
                            sent = tx.send(snapshot) => {
                                if sent.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            lock(&routes.feeds).remove(&request_id);
            let _ = requests
                .send(ClientMessage::Unsubscribe {
                    subscription_id: request_id,
                })
                .await;
            tracing::debug!("Subscription #{} to {} closed", request_id, code);
        });

        Ok(Subscription::new(rx, token))
    }
}
