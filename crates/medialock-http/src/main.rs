//! Media server binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve a store directory to a local player
//! medialock-http --store ~/.medialock/assets --client-id device-1234
//!
//! # Signed-in user (must match the identity used at import time)
//! medialock-http --store ./assets --client-id device-1234 --user-id user-42
//! ```

use clap::Parser;
use medialock_core::{AssetStore, Identity};
use medialock_http::{MediaServer, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Offline media store HTTP range server
#[derive(Parser, Debug)]
#[command(name = "medialock-http")]
#[command(about = "Serves encrypted offline media to a local player over HTTP byte ranges")]
#[command(version)]
struct Args {
    /// Directory holding encrypted assets and their metadata sidecars
    #[arg(short, long, env = "MEDIALOCK_STORE")]
    store: std::path::PathBuf,

    /// Stable identifier of this client/device (feeds key derivation)
    #[arg(long, env = "MEDIALOCK_CLIENT_ID")]
    client_id: String,

    /// Identifier of the signed-in user, if any (feeds key derivation)
    #[arg(long, env = "MEDIALOCK_USER_ID")]
    user_id: Option<String>,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: std::net::IpAddr,

    /// Port to bind to (0 = auto-assign)
    #[arg(short, long, default_value = "8732")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let store = AssetStore::open(&args.store).await?;
    let identity = Identity::new(args.client_id, args.user_id);

    let server = MediaServer::start(
        store,
        identity,
        ServerConfig {
            port: args.port,
            bind_address: args.bind,
        },
    )
    .await?;

    tracing::info!("Serving media at {}/media/<playback_id>", server.url());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    server.stop().await;

    Ok(())
}
