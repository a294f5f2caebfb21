use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::patch::Patch;
use crate::room::Room;
use crate::room_code::RoomCode;
use crate::store::StoreError;

// -- Framing --

pub type Transport = Framed<TcpStream, LengthDelimitedCodec>;

pub fn framed_transport(stream: TcpStream) -> Transport {
    LengthDelimitedCodec::builder()
        .max_frame_length(64 * 1024)
        .new_framed(stream)
}

pub type RequestId = u64;

// -- Client -> Server Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    // Handshake
    Hello {
        version: String,
    },

    // Document operations
    Get {
        request_id: RequestId,
        code: RoomCode,
    },
    Set {
        request_id: RequestId,
        code: RoomCode,
        room: Room,
    },
    Patch {
        request_id: RequestId,
        code: RoomCode,
        patch: Patch,
    },

    // Subscriptions are identified by the request id that opened them.
    Subscribe {
        request_id: RequestId,
        code: RoomCode,
    },
    Unsubscribe {
        subscription_id: RequestId,
    },
}

// -- Server -> Client Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    // Handshake
    Welcome {
        server_version: String,
    },
    HandshakeError {
        reason: String,
    },

    // Replies
    Room {
        request_id: RequestId,
        room: Option<Room>,
    },
    Ack {
        request_id: RequestId,
    },
    Error {
        request_id: RequestId,
        code: ErrorCode,
        message: String,
    },

    // Pushed snapshots
    Changed {
        subscription_id: RequestId,
        room: Option<Room>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    RoomNotFound,
    PreconditionFailed,
    InvalidRequest,
    InternalError,
}

impl ErrorCode {
    pub fn from_store_error(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ErrorCode::RoomNotFound,
            StoreError::PreconditionFailed(_) => ErrorCode::PreconditionFailed,
            StoreError::Serialization(_) => ErrorCode::InvalidRequest,
            _ => ErrorCode::InternalError,
        }
    }

    pub fn into_store_error(self, code: &RoomCode, message: String) -> StoreError {
        match self {
            ErrorCode::RoomNotFound => StoreError::NotFound(code.clone()),
            ErrorCode::PreconditionFailed => StoreError::PreconditionFailed(code.clone()),
            ErrorCode::InvalidRequest | ErrorCode::InternalError => StoreError::Remote(message),
        }
    }
}

// -- Serialization helpers --

pub fn serialize_message<T: Serialize>(msg: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_vec(msg)?;
    Ok(Bytes::from(json))
}

pub fn deserialize_message<T: for<'de> Deserialize<'de>>(
    data: &[u8],
) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

// -- Transport helpers --

pub async fn send_message<T: Serialize>(
    transport: &mut Transport,
    msg: &T,
) -> anyhow::Result<()> {
    let bytes = serialize_message(msg).map_err(|e| anyhow::anyhow!("serialize error: {}", e))?;
    transport
        .send(bytes)
        .await
        .map_err(|e| anyhow::anyhow!("send error: {}", e))
}

pub async fn recv_message<T: for<'de> Deserialize<'de>>(
    transport: &mut Transport,
) -> anyhow::Result<Option<T>> {
    match transport.next().await {
        Some(Ok(frame)) => {
            let msg = deserialize_message(&frame)
                .map_err(|e| anyhow::anyhow!("deserialize error: {}", e))?;
            Ok(Some(msg))
        }
        Some(Err(e)) => Err(anyhow::anyhow!("recv error: {}", e)),
        None => Ok(None),
    }
}
