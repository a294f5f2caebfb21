use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::RwLock;
use uuid::Uuid;

use pokr_common::memory::MemoryStore;

use crate::connection;

pub struct ServerState {
    pub store: Arc<MemoryStore>,
    /// Live connections and their peers.
    pub connections: RwLock<HashMap<Uuid, SocketAddr>>,
    pub max_connections: usize,
}

pub type SharedState = Arc<ServerState>;

pub fn new_state(max_connections: usize) -> SharedState {
    Arc::new(ServerState {
        store: Arc::new(MemoryStore::new()),
        connections: RwLock::new(HashMap::new()),
        max_connections,
    })
}

pub async fn run(addr: SocketAddr, max_connections: usize) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    serve(listener, new_state(max_connections)).await
}

pub async fn serve(listener: TcpListener, state: SharedState) -> anyhow::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;

        // Enforce max connections
        let conn_count = state.connections.read().await.len();
        if conn_count >= state.max_connections {
            tracing::warn!(
                "Rejecting connection from {} (max {} reached)",
                peer_addr,
                state.max_connections
            );
            drop(stream);
            continue;
        }

        tracing::info!("New connection from {} ({}/{})", peer_addr, conn_count + 1, state.max_connections);

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = connection::handle_connection(stream, peer_addr, state).await {
                tracing::warn!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}
