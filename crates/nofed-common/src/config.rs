//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults
//!
//! The loaded [`AppConfig`] is an ordinary value: the server builds it once at
//! startup, wraps it in an `Arc` and hands it to every component that needs it.

use std::time::Duration;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;

/// Relays queried when `relays.peers` is not configured.
pub const DEFAULT_PEERS: &[&str] = &[
    "wss://nostr.zerofeerouting.com",
    "wss://nostr.rocks",
    "wss://nostr.semisol.dev",
    "wss://nostr.shadownode.org",
    "wss://nostr.sandwich.farm",
    "wss://nostr.fmt.wiz.biz",
    "wss://brb.io",
    "wss://nostr.ono.re",
    "wss://nostr-pub.wellorder.net",
    "wss://nostr.nymsrelay.com",
    "wss://nostr.delo.software",
    "wss://nostr.oxtr.dev",
    "wss://relay.stoner.com",
    "wss://nostr-verified.wellorder.net",
    "wss://nostr-pub.semisol.dev",
    "wss://nostr.unknown.place",
    "wss://nostr.bitcoiner.social",
    "wss://nostr-relay.lnmarkets.com",
    "wss://public.nostr.swissrouting.com",
    "wss://nostr-2.zebedee.cloud",
    "wss://relay.kronkltd.net",
    "wss://relay.nostr.bg",
    "wss://nostr.v0l.io",
    "wss://nostr.zaprite.io",
    "wss://nostr.drss.io",
    "wss://nostr.coinos.io",
    "wss://nostr.bongbong.com",
    "wss://relay.minds.com/nostr/v1/ws",
    "wss://nostr.zebedee.cloud",
    "wss://relay.nostr.info",
    "wss://nostr.walletofsatoshi.com",
    "wss://satstacker.cloud",
    "wss://nostr-relay.wlvs.space",
    "wss://relay.damus.io",
    "wss://relayer.fiatjaf.com",
    "wss://expensive-relay.fiatjaf.com",
    "wss://nostr.openchain.fr",
    "wss://nostr.onsats.org",
    "wss://rsslay.fiatjaf.com",
];

/// Configuration builder pre-populated with every default.
///
/// `bridge.secret` has no default; callers must supply it through a source
/// or an override.
pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("server.name", "nofed")?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.service_url", "http://localhost:8080")?
        .set_default("server.icon_svg", "")?
        .set_default("database.url", "")?
        .set_default("database.max_connections", 10)?
        .set_default("database.min_connections", 1)?
        .set_default("bridge.max_thread_depth", 16)?
        .set_default("relays.peers", DEFAULT_PEERS.to_vec())?
        .set_default("relays.max_concurrent", 5)?
        .set_default("relays.connect_timeout_ms", 2_000)?
        .set_default("relays.query_timeout_ms", 5_000)?
        .set_default("relays.verify_signatures", true)?
        .set_default("cache.ttl_days", 10)?
        .set_default("cache.purge_interval_secs", 7_200) // 2 hours
}

impl AppConfig {
    /// Load configuration from `.env`, `config.toml` and `NOFED_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        defaults()?
            // Optional config file
            .add_source(config::File::with_name("config").required(false))
            // Environment variables (NOFED_SERVER__PORT, NOFED_BRIDGE__SECRET, etc.)
            .add_source(
                config::Environment::with_prefix("NOFED")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("relays.peers")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Build a configuration from the defaults plus explicit `key = value` overrides.
    pub fn with_overrides(overrides: &[(&str, &str)]) -> Result<Self, ConfigError> {
        let mut builder = defaults()?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize()
    }

    /// WebSocket URL under which this service advertises itself as a relay.
    pub fn relay_url(&self) -> String {
        self.service_url().replacen("http", "ws", 1)
    }

    /// Public base URL without a trailing slash.
    pub fn service_url(&self) -> &str {
        self.server.service_url.trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bridge: BridgeConfig,
    pub relays: RelaysConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Human-readable service name.
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Public base URL, e.g. `https://nofed.example.com`.
    /// Maps to `NOFED_SERVER__SERVICE_URL` or `server.service_url` in config.toml.
    pub service_url: String,
    /// SVG document served at `/icon.svg`.
    pub icon_svg: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Leave empty for lite / in-process-only mode.
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    /// Server secret; every bridged identity is derived from it.
    pub secret: String,
    /// Maximum number of ancestors fetched when resolving a reply thread.
    pub max_thread_depth: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelaysConfig {
    pub peers: Vec<String>,
    /// Peers queried at the same time during one fan-out.
    pub max_concurrent: usize,
    pub connect_timeout_ms: u64,
    /// Overall deadline for one fan-out query.
    pub query_timeout_ms: u64,
    /// Drop received events whose id or signature does not check out.
    pub verify_signatures: bool,
}

impl RelaysConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Retention window applied on every cache write.
    pub ttl_days: u32,
    pub purge_interval_secs: u64,
}

impl CacheConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}
