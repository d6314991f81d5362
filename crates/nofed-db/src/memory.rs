//! In-process store for lite mode and tests.
//!
//! Mirrors the PostgreSQL semantics: unique keys, insert-or-ignore writes,
//! no-op deletes of missing rows, newest-first cache scans.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nofed_nostr::Event;
use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    store::{merge_entry, synthetic_actor_url, CacheEntry, CacheStore, Store},
};

#[derive(Default)]
struct Tables {
    /// pubkey → (privkey, actor URL)
    keys: HashMap<String, (String, String)>,
    /// actor URL → pubkey
    actors: HashMap<String, String>,
    /// (pubkey, actor URL), insertion order
    followers: Vec<(String, String)>,
    /// (event id, note URL), insertion order
    notes: Vec<(String, String)>,
    cache: HashMap<String, CacheEntry>,
}

/// [`Store`] and [`CacheStore`] kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cache rows currently held.
    pub async fn cache_len(&self) -> usize {
        self.tables.read().await.cache.len()
    }

    async fn insert_follower(&self, pubkey: &str, actor_url: &str) {
        let mut tables = self.tables.write().await;
        let exists = tables.followers.iter().any(|(p, a)| p == pubkey && a == actor_url);
        if !exists {
            tables.followers.push((pubkey.to_owned(), actor_url.to_owned()));
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn follow_nostr_pubkey(&self, actor_url: &str, pubkey: &str) -> Result<(), StoreError> {
        self.insert_follower(pubkey, actor_url).await;
        Ok(())
    }

    async fn unfollow_nostr_pubkey(&self, actor_url: &str, pubkey: &str) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .followers
            .retain(|(p, a)| !(p == pubkey && a == actor_url));
        Ok(())
    }

    async fn get_followers_by_pubkey(&self, pubkey: &str) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .followers
            .iter()
            .filter(|(p, _)| p == pubkey)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn save_followers(&self, contact_list: &Event, service_url: &str) -> Result<(), StoreError> {
        let actor_url = synthetic_actor_url(&contact_list.pubkey, service_url);
        self.insert_follower(&contact_list.pubkey, &actor_url).await;
        Ok(())
    }

    async fn get_note_url_by_event_id(&self, event_id: &str) -> Result<Option<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notes
            .iter()
            .find(|(id, _)| id == event_id)
            .map(|(_, url)| url.clone()))
    }

    /// The oldest mapping wins when several events share a URL.
    async fn get_event_id_by_note_url(&self, note_url: &str) -> Result<Option<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notes
            .iter()
            .find(|(_, url)| url == note_url)
            .map(|(id, _)| id.clone()))
    }

    async fn save_note(&self, event_id: &str, note_url: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.notes.iter().any(|(id, _)| id == event_id) {
            tables.notes.push((event_id.to_owned(), note_url.to_owned()));
        }
        Ok(())
    }

    async fn delete_note_by_url(&self, note_url: &str) -> Result<Vec<String>, StoreError> {
        let mut tables = self.tables.write().await;
        let ids: Vec<String> = tables
            .notes
            .iter()
            .filter(|(_, url)| url == note_url)
            .map(|(id, _)| id.clone())
            .collect();
        tables.notes.retain(|(_, url)| url != note_url);
        Ok(ids)
    }

    async fn save_nostr_keypair(&self, pubkey: &str, privkey: &str, actor_url: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.keys.contains_key(pubkey) || tables.actors.contains_key(actor_url) {
            return Ok(());
        }
        tables
            .keys
            .insert(pubkey.to_owned(), (privkey.to_owned(), actor_url.to_owned()));
        tables.actors.insert(actor_url.to_owned(), pubkey.to_owned());
        Ok(())
    }

    async fn get_actor_url_by_pubkey(&self, pubkey: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .keys
            .get(pubkey)
            .map(|(_, actor)| actor.clone()))
    }

    async fn get_pubkey_by_actor_url(&self, actor_url: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tables.read().await.actors.get(actor_url).cloned())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn upsert_cache(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.cache.get_mut(&entry.key) {
            Some(existing) => merge_entry(existing, entry),
            None => {
                tables.cache.insert(entry.key.clone(), entry.clone());
            }
        }
        Ok(())
    }

    async fn get_cache(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.tables.read().await.cache.get(key).cloned())
    }

    async fn scan_cache(&self, prefix: &str, limit: usize) -> Result<Vec<CacheEntry>, StoreError> {
        let tables = self.tables.read().await;
        let mut entries: Vec<CacheEntry> = tables
            .cache
            .values()
            .filter(|e| e.key.starts_with(prefix))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.key.cmp(&b.key)));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn delete_cache(&self, key: &str) -> Result<(), StoreError> {
        self.tables.write().await.cache.remove(key);
        Ok(())
    }

    async fn purge_cache(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.cache.len();
        tables.cache.retain(|_, e| e.expires_at >= now);
        Ok((before - tables.cache.len()) as u64)
    }
}
