//! Cache-first access to Nostr events.
//!
//! Every lookup tries the [`EventCache`] and falls back to a fan-out relay
//! query. Cache writes for network results happen in detached tasks so a slow
//! or failing cache never delays an answer.

use std::collections::HashSet;
use std::sync::Arc;

use nofed_db::Store;
use nofed_nostr::{kind, Event, Filter, RelayPool};
use tracing::{debug, warn};

use crate::{cache::EventCache, error::BridgeError};

/// Lower bound for note queries when nothing is cached (1971-01-01).
pub const NOTES_EPOCH: u64 = 31_536_000;
/// Network results requested per author note query.
pub const NOTES_QUERY_LIMIT: usize = 50;

#[derive(Clone)]
pub struct EventService {
    pool: RelayPool,
    cache: EventCache,
    store: Arc<dyn Store>,
    service_url: String,
}

impl EventService {
    pub fn new(pool: RelayPool, cache: EventCache, store: Arc<dyn Store>, service_url: impl Into<String>) -> Self {
        Self { pool, cache, store, service_url: service_url.into() }
    }

    /// A note by id.
    pub async fn get_by_id(&self, id: &str) -> Result<Event, BridgeError> {
        match self.cache.get_by_id(kind::NOTE, id).await {
            Ok(Some(event)) => return Ok(event),
            Ok(None) => {}
            Err(e) => warn!("Cache read for event {} failed: {}", id, e),
        }

        let event = self
            .pool
            .query(&Filter::new().id(id), 1)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::NotFound(format!("event {id}")))?;
        self.cache_detached(vec![event.clone()]);
        Ok(event)
    }

    /// Notes by `pubkey`: cached notes first (newest first), then anything
    /// newer the relays know about.
    pub async fn get_notes_by_pubkey(&self, pubkey: &str) -> Result<Vec<Event>, BridgeError> {
        let mut notes = self.cache.get_range(kind::NOTE, pubkey).await?;
        let since = notes.first().map_or(NOTES_EPOCH, |n| n.created_at);

        let filter = Filter::new().author(pubkey).kind(kind::NOTE).since(since);
        let fetched = self.pool.query(&filter, NOTES_QUERY_LIMIT).await;
        debug!("Relays returned {} notes for {}", fetched.len(), pubkey);

        let known: HashSet<String> = notes.iter().map(|n| n.id.clone()).collect();
        let fresh: Vec<Event> = fetched.into_iter().filter(|e| !known.contains(&e.id)).collect();
        if !fresh.is_empty() {
            self.cache_detached(fresh.clone());
        }
        notes.extend(fresh);
        Ok(notes)
    }

    /// The latest profile metadata event of `pubkey`.
    pub async fn get_metadata(&self, pubkey: &str) -> Result<Event, BridgeError> {
        self.get_singleton(kind::METADATA, pubkey)
            .await?
            .ok_or_else(|| BridgeError::NotFound(format!("metadata for {pubkey}")))
    }

    /// The contact list of `pubkey`, if it has published one.
    pub async fn get_contact_list(&self, pubkey: &str) -> Result<Option<Event>, BridgeError> {
        self.get_singleton(kind::CONTACTS, pubkey).await
    }

    /// Pubkeys `pubkey` follows. No contact list means no follows.
    pub async fn get_following(&self, pubkey: &str) -> Result<Vec<String>, BridgeError> {
        Ok(self
            .get_contact_list(pubkey)
            .await?
            .map(|list| list.tag_values("p").map(str::to_owned).collect())
            .unwrap_or_default())
    }

    /// Actor URLs following `pubkey`.
    ///
    /// The key's own latest contact list is fetched and its author recorded
    /// under a synthetic actor URL before answering from persisted edges.
    pub async fn get_followers(&self, pubkey: &str) -> Result<Vec<String>, BridgeError> {
        let filter = Filter::new().author(pubkey).kind(kind::CONTACTS);
        if let Some(contact_list) = self.pool.query(&filter, 1).await.into_iter().next() {
            self.store.save_followers(&contact_list, &self.service_url).await?;
        }
        Ok(self.store.get_followers_by_pubkey(pubkey).await?)
    }

    async fn get_singleton(&self, kind: u32, pubkey: &str) -> Result<Option<Event>, BridgeError> {
        match self.cache.get_by_id(kind, pubkey).await {
            Ok(Some(event)) => return Ok(Some(event)),
            Ok(None) => {}
            Err(e) => warn!("Cache read for {}:{} failed: {}", kind, pubkey, e),
        }

        let filter = Filter::new().author(pubkey).kind(kind);
        let found = self.pool.query(&filter, 1).await.into_iter().next();
        if let Some(event) = &found {
            self.cache_detached(vec![event.clone()]);
        }
        Ok(found)
    }

    fn cache_detached(&self, events: Vec<Event>) {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            for event in events {
                if let Err(e) = cache.put(&event).await {
                    warn!("Failed to cache event {}: {}", event.id, e);
                }
            }
        });
    }
}
