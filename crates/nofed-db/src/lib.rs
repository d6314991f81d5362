//! # nofed-db
//!
//! Persistence for the bridge. Everything above this crate talks to storage
//! through two traits:
//! - [`Store`]: identity mappings, follow edges and note mappings
//! - [`CacheStore`]: rows of the read-through event cache
//!
//! [`PgStore`] implements both on PostgreSQL; [`MemoryStore`] keeps the same
//! semantics in process for lite mode and tests. Writes are single statements
//! that rely on unique constraints for idempotency.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{CacheEntry, CacheStore, Store};

use anyhow::Result;
use nofed_common::config::DatabaseConfig;
use sqlx::PgPool;

/// Shared database handle.
#[derive(Clone)]
pub struct Database {
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");
        let pg = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pg })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pg).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    /// A [`Store`] + [`CacheStore`] backed by this pool.
    pub fn store(&self) -> PgStore {
        PgStore::new(self.pg.clone())
    }
}
