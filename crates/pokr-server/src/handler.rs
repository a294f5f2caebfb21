use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pokr_common::protocol::{ClientMessage, ErrorCode, RequestId, ServerMessage};
use pokr_common::store::{RoomStore, StoreError};

use crate::server::SharedState;

/// Per-connection state owned by the reader loop.
pub struct ConnectionContext {
    pub connection_id: Uuid,
    pub tx: mpsc::Sender<ServerMessage>,
    pub subscriptions: HashMap<RequestId, CancellationToken>,
}

impl ConnectionContext {
    pub fn new(connection_id: Uuid, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            connection_id,
            tx,
            subscriptions: HashMap::new(),
        }
    }

    async fn send(&self, msg: ServerMessage) -> anyhow::Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| anyhow::anyhow!("outbound channel closed"))
    }

    async fn send_error(&self, request_id: RequestId, err: &StoreError) -> anyhow::Result<()> {
        self.send(ServerMessage::Error {
            request_id,
            code: ErrorCode::from_store_error(err),
            message: err.to_string(),
        })
        .await
    }

    async fn reply_ack(
        &self,
        request_id: RequestId,
        result: Result<(), StoreError>,
    ) -> anyhow::Result<()> {
        match result {
            Ok(()) => self.send(ServerMessage::Ack { request_id }).await,
            Err(e) => self.send_error(request_id, &e).await,
        }
    }
}

pub async fn handle_message(
    ctx: &mut ConnectionContext,
    msg: ClientMessage,
    state: &SharedState,
) -> anyhow::Result<()> {
    match msg {
        ClientMessage::Get { request_id, code } => match state.store.get(&code).await {
            Ok(room) => ctx.send(ServerMessage::Room { request_id, room }).await?,
            Err(e) => ctx.send_error(request_id, &e).await?,
        },

        ClientMessage::Set {
            request_id,
            code,
            room,
        } => {
            tracing::debug!("{} overwrites room {}", ctx.connection_id, code);
            let result = state.store.set(&code, room).await;
            ctx.reply_ack(request_id, result).await?;
        }

        ClientMessage::Patch {
            request_id,
            code,
            patch,
        } => {
            let result = state.store.patch(&code, patch).await;
            if let Err(ref e) = result {
                tracing::debug!("Patch {} on {} failed: {}", request_id, code, e);
            }
            ctx.reply_ack(request_id, result).await?;
        }

        ClientMessage::Subscribe { request_id, code } => {
            let mut subscription = match state.store.subscribe(&code).await {
                Ok(s) => s,
                Err(e) => return ctx.send_error(request_id, &e).await,
            };

            // Ack goes out first; snapshots follow on the same ordered channel.
            ctx.send(ServerMessage::Ack { request_id }).await?;
            ctx.subscriptions
                .insert(request_id, subscription.cancellation_token());

            let tx = ctx.tx.clone();
            tokio::spawn(async move {
                while let Some(room) = subscription.next().await {
                    let msg = ServerMessage::Changed {
                        subscription_id: request_id,
                        room,
                    };
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
            });
            tracing::debug!("{} subscribed to {} as #{}", ctx.connection_id, code, request_id);
        }

        ClientMessage::Unsubscribe { subscription_id } => {
            if let Some(token) = ctx.subscriptions.remove(&subscription_id) {
                token.cancel();
                tracing::debug!("{} unsubscribed #{}", ctx.connection_id, subscription_id);
            }
        }

        ClientMessage::Hello { .. } => {
            tracing::warn!("{} sent a second Hello, ignoring", ctx.connection_id);
        }
    }

    Ok(())
}

pub async fn handle_disconnect(ctx: &mut ConnectionContext, state: &SharedState) {
    for (_, token) in ctx.subscriptions.drain() {
        token.cancel();
    }
    let mut connections = state.connections.write().await;
    if let Some(peer_addr) = connections.remove(&ctx.connection_id) {
        tracing::debug!(
            "Released connection {} from {} ({} still open)",
            ctx.connection_id,
            peer_addr,
            connections.len()
        );
    }
}
