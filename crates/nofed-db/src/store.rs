//! Storage traits consumed by the bridge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nofed_nostr::Event;

use crate::error::StoreError;

/// Identity mappings, follow edges and note mappings.
///
/// Every write is idempotent: inserting an existing row or deleting a missing
/// one succeeds without effect.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Record that `actor_url` follows `pubkey`.
    async fn follow_nostr_pubkey(&self, actor_url: &str, pubkey: &str) -> Result<(), StoreError>;

    async fn unfollow_nostr_pubkey(&self, actor_url: &str, pubkey: &str) -> Result<(), StoreError>;

    /// Actor URLs following `pubkey`, oldest edge first.
    async fn get_followers_by_pubkey(&self, pubkey: &str) -> Result<Vec<String>, StoreError>;

    /// Record a follow edge for the author of `contact_list`.
    ///
    /// The edge is `(author pubkey, <author pubkey>@<service_url>)` (see
    /// [`synthetic_actor_url`]); the list's `p` tags are not read.
    async fn save_followers(&self, contact_list: &Event, service_url: &str) -> Result<(), StoreError>;

    async fn get_note_url_by_event_id(&self, event_id: &str) -> Result<Option<String>, StoreError>;

    /// The event id first mapped to `note_url`.
    async fn get_event_id_by_note_url(&self, note_url: &str) -> Result<Option<String>, StoreError>;

    async fn save_note(&self, event_id: &str, note_url: &str) -> Result<(), StoreError>;

    /// Remove every mapping for `note_url`, returning the event ids it had.
    async fn delete_note_by_url(&self, note_url: &str) -> Result<Vec<String>, StoreError>;

    async fn save_nostr_keypair(&self, pubkey: &str, privkey: &str, actor_url: &str) -> Result<(), StoreError>;

    async fn get_actor_url_by_pubkey(&self, pubkey: &str) -> Result<Option<String>, StoreError>;

    async fn get_pubkey_by_actor_url(&self, actor_url: &str) -> Result<Option<String>, StoreError>;
}

/// One cached event under one key.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CacheEntry {
    pub key: String,
    /// Serialized event JSON.
    pub value: String,
    /// The event's own `created_at`; orders range scans.
    pub created_at: i64,
    pub observed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Raw rows of the event cache.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Insert `entry`, or refresh an existing row with the same key.
    ///
    /// On conflict `observed_at` is overwritten, `expires_at` only moves
    /// forward, and `value` is replaced only by an event at least as new.
    async fn upsert_cache(&self, entry: &CacheEntry) -> Result<(), StoreError>;

    async fn get_cache(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Entries whose key starts with `prefix`, newest `created_at` first.
    async fn scan_cache(&self, prefix: &str, limit: usize) -> Result<Vec<CacheEntry>, StoreError>;

    async fn delete_cache(&self, key: &str) -> Result<(), StoreError>;

    /// Delete entries that expired before `now`; returns how many went.
    async fn purge_cache(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Actor URL recorded for a Nostr key seen only through a contact list.
///
/// This is not a dereferenceable URL and does not go through the identity
/// bridge; it only keeps follower edges unique per Nostr author.
pub fn synthetic_actor_url(pubkey: &str, service_url: &str) -> String {
    format!("{pubkey}@{service_url}")
}

/// Merge an incoming cache write into an existing row.
pub(crate) fn merge_entry(existing: &mut CacheEntry, incoming: &CacheEntry) {
    if incoming.created_at >= existing.created_at {
        existing.value.clone_from(&incoming.value);
        existing.created_at = incoming.created_at;
    }
    existing.observed_at = incoming.observed_at;
    existing.expires_at = existing.expires_at.max(incoming.expires_at);
}
