//! PostgreSQL implementation of [`Store`] and [`CacheStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nofed_nostr::Event;
use sqlx::PgPool;

use crate::{
    error::StoreError,
    repository::{cache, followers, keys, notes},
    store::{CacheEntry, CacheStore, Store},
};

/// Health check: verify the database is reachable.
pub async fn health_check(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .is_ok()
}

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn follow_nostr_pubkey(&self, actor_url: &str, pubkey: &str) -> Result<(), StoreError> {
        followers::insert(&self.pool, pubkey, actor_url).await?;
        Ok(())
    }

    async fn unfollow_nostr_pubkey(&self, actor_url: &str, pubkey: &str) -> Result<(), StoreError> {
        followers::delete(&self.pool, pubkey, actor_url).await?;
        Ok(())
    }

    async fn get_followers_by_pubkey(&self, pubkey: &str) -> Result<Vec<String>, StoreError> {
        Ok(followers::list_for_pubkey(&self.pool, pubkey).await?)
    }

    async fn save_followers(&self, contact_list: &Event, service_url: &str) -> Result<(), StoreError> {
        let actor_url = crate::store::synthetic_actor_url(&contact_list.pubkey, service_url);
        Ok(followers::insert(&self.pool, &contact_list.pubkey, &actor_url).await?)
    }

    async fn get_note_url_by_event_id(&self, event_id: &str) -> Result<Option<String>, StoreError> {
        Ok(notes::find_url(&self.pool, event_id).await?)
    }

    async fn get_event_id_by_note_url(&self, note_url: &str) -> Result<Option<String>, StoreError> {
        Ok(notes::find_event_id(&self.pool, note_url).await?)
    }

    async fn save_note(&self, event_id: &str, note_url: &str) -> Result<(), StoreError> {
        notes::insert(&self.pool, event_id, note_url).await?;
        Ok(())
    }

    async fn delete_note_by_url(&self, note_url: &str) -> Result<Vec<String>, StoreError> {
        Ok(notes::delete_by_url(&self.pool, note_url).await?)
    }

    async fn save_nostr_keypair(&self, pubkey: &str, privkey: &str, actor_url: &str) -> Result<(), StoreError> {
        keys::insert(&self.pool, pubkey, privkey, actor_url).await?;
        Ok(())
    }

    async fn get_actor_url_by_pubkey(&self, pubkey: &str) -> Result<Option<String>, StoreError> {
        Ok(keys::find_actor_url(&self.pool, pubkey).await?)
    }

    async fn get_pubkey_by_actor_url(&self, actor_url: &str) -> Result<Option<String>, StoreError> {
        Ok(keys::find_pubkey(&self.pool, actor_url).await?)
    }
}

#[async_trait]
impl CacheStore for PgStore {
    async fn upsert_cache(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        cache::upsert(&self.pool, entry).await?;
        Ok(())
    }

    async fn get_cache(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Ok(cache::find(&self.pool, key).await?)
    }

    async fn scan_cache(&self, prefix: &str, limit: usize) -> Result<Vec<CacheEntry>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(cache::scan_prefix(&self.pool, prefix, limit).await?)
    }

    async fn delete_cache(&self, key: &str) -> Result<(), StoreError> {
        cache::delete(&self.pool, key).await?;
        Ok(())
    }

    async fn purge_cache(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(cache::delete_expired(&self.pool, now).await?)
    }
}
