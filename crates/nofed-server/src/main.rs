//! # nofed
//!
//! Main binary. Loads configuration, connects storage (PostgreSQL, or the
//! in-memory store when no database URL is set), wires the relay pool and
//! federation client into the bridge and serves the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nofed_api::{build_router, AppState};
use nofed_bridge::Bridge;
use nofed_common::AppConfig;
use nofed_db::{CacheStore, Database, MemoryStore, Store};
use nofed_federation::ApClient;
use nofed_nostr::WsConnector;

#[derive(Parser)]
#[command(name = "nofed", author, version, about = "Bridge between Nostr relays and the ActivityPub fediverse")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Print the Nostr public key bridged for an ActivityPub actor.
    DeriveKey {
        /// Actor URL, e.g. `https://mastodon.example/users/alice`.
        actor_url: String,
    },
    /// Delete expired cache entries once and exit.
    PurgeCache,
}

/// Storage handles for one run.
struct Storage {
    db: Option<Database>,
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheStore>,
}

async fn connect_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    if config.database.url.is_empty() {
        tracing::warn!("No database URL configured; running in lite mode with in-memory storage");
        let memory = Arc::new(MemoryStore::new());
        return Ok(Storage { db: None, store: memory.clone(), cache: memory });
    }

    let db = Database::connect(&config.database).await?;
    db.migrate().await?;
    let pg = Arc::new(db.store());
    Ok(Storage { db: Some(db), store: pg.clone(), cache: pg })
}

fn build_bridge(config: &AppConfig, storage: &Storage) -> anyhow::Result<Bridge> {
    let federation = Arc::new(ApClient::new()?);
    Ok(Bridge::new(
        config,
        storage.store.clone(),
        storage.cache.clone(),
        Arc::new(WsConnector),
        federation,
    )?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing (structured logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nofed=debug,tower_http=debug".into()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let storage = connect_storage(&config).await?;
    let bridge = build_bridge(&config, &storage)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, bridge, storage.db).await,
        Command::DeriveKey { actor_url } => {
            let keys = bridge.identity.keys_for_actor(&actor_url).await?;
            println!("{}", keys.public_key_hex());
            Ok(())
        }
        Command::PurgeCache => {
            let purged = bridge.cache.purge().await?;
            tracing::info!("Purged {} expired cache entries", purged);
            Ok(())
        }
    }
}

async fn serve(config: Arc<AppConfig>, bridge: Bridge, db: Option<Database>) -> anyhow::Result<()> {
    tracing::info!("Starting nofed v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("   Service URL: {}", config.service_url());
    tracing::info!("   Relay URL:   {}", config.relay_url());
    tracing::info!("   Peers:       {}", config.relays.peers.len());

    // Background cache purge
    let purge = bridge.cache.spawn_purge(config.cache.purge_interval());

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let router = build_router(AppState::new(config.clone(), bridge, db));

    tracing::info!("HTTP API listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    purge.abort();
    Ok(())
}
