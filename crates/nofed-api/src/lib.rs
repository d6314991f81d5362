//! # nofed-api
//!
//! HTTP surface of the bridge. Remote ActivityPub servers talk to the inbox
//! and the actor/note/collection documents; Nostr clients use NIP-05 and the
//! relay-style `/query` endpoint.

pub mod routes;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use nofed_bridge::Bridge;
use nofed_common::AppConfig;
use nofed_db::Database;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub bridge: Bridge,
    /// `None` in lite mode (in-memory store).
    pub db: Option<Database>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, bridge: Bridge, db: Option<Database>) -> Self {
        Self { config, bridge, db, started_at: Instant::now() }
    }
}

/// Largest activity body the inbox accepts.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::inbox::router())
        .merge(routes::users::router())
        .merge(routes::notes::router())
        .merge(routes::well_known::router())
        .merge(routes::query::router())
        .merge(routes::icon::router())
        .merge(routes::health::router())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::limit::RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(30)))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(Arc::new(state))
}

#[cfg(test)]
pub(crate) mod testkit;
