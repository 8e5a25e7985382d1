use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ghost_common::config::{load_config, ServerConfig};
use ghost_common::token::TokenKey;

use crate::app::AppState;
use crate::state::ServerState;
use crate::storage::Storage;

mod app;
mod auth;
mod error;
mod events;
mod routes;
mod state;
mod storage;

#[derive(Parser, Debug)]
#[command(name = "ghost-server", about = "anonymous message space server")]
struct Args {
    /// Path to the server configuration file.
    #[arg(long, default_value = "config/server.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config: ServerConfig = load_config(&args.config)?;

    let storage = Storage::new(&config.data_dir)?;
    let creators = storage.load_creators()?;
    let chats = storage.load_chats()?;
    let messages = storage.load_messages()?;
    info!(
        "loaded {} creators, {} chats, {} messages",
        creators.len(),
        chats.len(),
        messages.len()
    );
    let state = ServerState::new(creators, chats, messages);
    let token_key = TokenKey::load_or_generate(Path::new(&config.token_key_file))?;

    let bind_addr = config.bind_addr.clone();
    let app = Arc::new(AppState {
        config,
        state: RwLock::new(state),
        storage,
        token_key,
    });

    let events_app = app.clone();
    tokio::spawn(async move {
        if let Err(err) = events::run_events_listener(events_app).await {
            error!("events listener failed: {err:#}");
        }
    });

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("api listening on {bind_addr}");
    let service = routes::router(app).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, service).await?;
    Ok(())
}
