//! Read-through event cache.
//!
//! Events are stored as JSON under namespaced keys:
//!
//! | kind | keys |
//! |---|---|
//! | 0 metadata | `0:<pubkey>` |
//! | 1 note | `1:<id>` and `1:<pubkey>:<id>` |
//! | 3 contacts | `3:<pubkey>` |
//!
//! The second note key makes "notes by author" a prefix scan. Entries are
//! advisory; the network is always the source of truth.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nofed_db::{CacheEntry, CacheStore};
use nofed_nostr::{kind, Event};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::BridgeError;

/// Most entries returned by a range read.
pub const RANGE_LIMIT: usize = 100;

#[derive(Clone)]
pub struct EventCache {
    store: Arc<dyn CacheStore>,
    ttl: chrono::Duration,
}

impl EventCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_days: u32) -> Self {
        Self { store, ttl: chrono::Duration::days(i64::from(ttl_days)) }
    }

    /// The event stored under `<kind>:<subject>`.
    pub async fn get_by_id(&self, kind: u32, subject: &str) -> Result<Option<Event>, BridgeError> {
        let entry = self.store.get_cache(&format!("{kind}:{subject}")).await?;
        Ok(entry.and_then(|e| decode(&e)))
    }

    /// Events under `<kind>:<subject>:`, newest first.
    pub async fn get_range(&self, kind: u32, subject: &str) -> Result<Vec<Event>, BridgeError> {
        let entries = self
            .store
            .scan_cache(&format!("{kind}:{subject}:"), RANGE_LIMIT)
            .await?;
        Ok(entries.iter().filter_map(decode).collect())
    }

    /// Upsert every key for `event`. Kinds other than 0, 1 and 3 are not cached.
    pub async fn put(&self, event: &Event) -> Result<(), BridgeError> {
        let keys = cache_keys(event);
        if keys.is_empty() {
            debug!("Not caching event {} of kind {}", event.id, event.kind);
            return Ok(());
        }

        let value = serde_json::to_string(event).map_err(nofed_nostr::NostrError::from)?;
        let now = Utc::now();
        for key in keys {
            let entry = CacheEntry {
                key,
                value: value.clone(),
                created_at: i64::try_from(event.created_at).unwrap_or(i64::MAX),
                observed_at: now,
                expires_at: now + self.ttl,
            };
            self.store.upsert_cache(&entry).await?;
        }
        Ok(())
    }

    /// Remove both keys of a cached note.
    pub async fn evict_note(&self, id: &str) -> Result<(), BridgeError> {
        let direct = format!("{}:{id}", kind::NOTE);
        if let Some(event) = self.store.get_cache(&direct).await?.and_then(|e| decode(&e)) {
            self.store
                .delete_cache(&format!("{}:{}:{id}", kind::NOTE, event.pubkey))
                .await?;
        }
        self.store.delete_cache(&direct).await?;
        Ok(())
    }

    /// Delete expired entries.
    pub async fn purge(&self) -> Result<u64, BridgeError> {
        Ok(self.store.purge_cache(Utc::now()).await?)
    }

    /// Purge every `interval` for as long as the runtime lives.
    pub fn spawn_purge(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.purge().await {
                    Ok(0) => {}
                    Ok(n) => info!("Purged {} expired cache entries", n),
                    Err(e) => error!("Cache purge failed: {}", e),
                }
            }
        })
    }
}

fn cache_keys(event: &Event) -> Vec<String> {
    match event.kind {
        kind::METADATA | kind::CONTACTS => vec![format!("{}:{}", event.kind, event.pubkey)],
        kind::NOTE => vec![
            format!("{}:{}", kind::NOTE, event.id),
            format!("{}:{}:{}", kind::NOTE, event.pubkey, event.id),
        ],
        _ => Vec::new(),
    }
}

fn decode(entry: &CacheEntry) -> Option<Event> {
    match serde_json::from_str(&entry.value) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Ignoring undecodable cache entry {}: {}", entry.key, e);
            None
        }
    }
}
