use std::net::SocketAddr;

use clap::Parser;

/// pokr store server - hosts planning poker room documents
#[derive(Parser, Debug)]
#[command(name = "pokr-server", version, about)]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:9877")]
    bind: String,

    /// Maximum simultaneous connections allowed
    #[arg(short, long, default_value_t = 100)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pokr_server=debug,pokr_common=debug".into()),
        )
        .init();

    let args = Args::parse();

    let addr: SocketAddr = args.bind.parse()?;

    tracing::info!("Starting pokr server on {} (max {} connections)", addr, args.max_connections);
    pokr_server::run(addr, args.max_connections).await
}
