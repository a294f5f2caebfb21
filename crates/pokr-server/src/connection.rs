use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use pokr_common::protocol::{
    self, framed_transport, serialize_message, ClientMessage, ServerMessage,
};

use crate::handler::{self, ConnectionContext};
use crate::server::SharedState;

pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: SharedState,
) -> anyhow::Result<()> {
    let mut transport = framed_transport(stream);

    // Step 1: Handshake -- expect Hello
    let hello: ClientMessage = match protocol::recv_message(&mut transport).await? {
        Some(msg) => msg,
        None => return Ok(()),
    };

    match hello {
        ClientMessage::Hello { version } => {
            tracing::info!("Client {} connected (client version: {})", peer_addr, version);
            protocol::send_message(
                &mut transport,
                &ServerMessage::Welcome {
                    server_version: env!("CARGO_PKG_VERSION").to_string(),
                },
            )
            .await?;
        }
        _ => {
            protocol::send_message(
                &mut transport,
                &ServerMessage::HandshakeError {
                    reason: "Expected Hello message".into(),
                },
            )
            .await?;
            return Ok(());
        }
    }

    // Step 2: Create mpsc channel for outbound messages
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);
    let connection_id = Uuid::new_v4();

    // Register connection
    state
        .connections
        .write()
        .await
        .insert(connection_id, peer_addr);

    // Step 3: Split transport for independent read/write
    let (mut sink, mut stream) = transport.split();

    // Writer task: drains rx and writes to sink
    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serialize_message(&msg) {
                Ok(bytes) => {
                    if sink.send(bytes).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                }
            }
        }
    });

    let mut ctx = ConnectionContext::new(connection_id, tx);

    // Step 4: Reader loop
    loop {
        match stream.next().await {
            Some(Ok(frame)) => match protocol::deserialize_message::<ClientMessage>(&frame) {
                Ok(msg) => {
                    if let Err(e) = handler::handle_message(&mut ctx, msg, &state).await {
                        tracing::error!("Handler error for {}: {}", peer_addr, e);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to parse message from {}: {}", peer_addr, e);
                }
            },
            Some(Err(e)) => {
                tracing::warn!("Read error from {}: {}", peer_addr, e);
                break;
            }
            None => {
                tracing::info!("Client {} disconnected", peer_addr);
                break;
            }
        }
    }

    // Cleanup
    handler::handle_disconnect(&mut ctx, &state).await;
    write_task.abort();
    Ok(())
}
