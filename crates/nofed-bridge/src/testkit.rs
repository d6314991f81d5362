//! In-process fakes shared by the bridge tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nofed_common::config::RelaysConfig;
use nofed_db::{MemoryStore, Store};
use nofed_federation::{Actor, FederationError, FederationSource, Note, ServerKeyPair};
use nofed_nostr::{kind, Event, Filter, Keys, NostrError, RelayConnection, RelayConnector, RelayPool, Tag};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{identity::IdentityBridge, translator::Translator};

pub const SERVICE_URL: &str = "https://bridge.example";

pub fn signed(keys: &Keys, created_at: u64, kind: u32, tags: Vec<Tag>, content: &str) -> Event {
    let mut event = Event::new(keys.public_key_hex(), created_at, kind, tags, content);
    event.sign(keys).unwrap();
    event
}

pub fn note_by(keys: &Keys, created_at: u64, content: &str) -> Event {
    signed(keys, created_at, kind::NOTE, vec![], content)
}

/// Poll `check` until it holds; detached writes land shortly after the call
/// that spawned them returns.
pub async fn eventually<F, Fut>(check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

// ─── Relays ──────────────────────────────────────────────────────────────────

/// A single relay holding a fixed set of events.
#[derive(Clone)]
pub struct FakeRelays {
    events: Arc<Vec<Event>>,
}

impl FakeRelays {
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self { events: Arc::new(events.into_iter().collect()) }
    }

    pub fn pool(&self) -> RelayPool {
        let config = RelaysConfig {
            peers: vec!["wss://relay.fake".into()],
            max_concurrent: 1,
            connect_timeout_ms: 1_000,
            query_timeout_ms: 2_000,
            verify_signatures: true,
        };
        RelayPool::new(Arc::new(self.clone()), &config)
    }
}

#[async_trait]
impl RelayConnector for FakeRelays {
    async fn connect(&self, _url: &str) -> Result<Box<dyn RelayConnection>, NostrError> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl RelayConnection for FakeRelays {
    async fn query(&mut self, filter: &Filter, sink: &mpsc::Sender<Event>) -> Result<usize, NostrError> {
        let mut sent = 0;
        for event in self.events.iter().filter(|e| filter.matches(e)) {
            if sink.send(event.clone()).await.is_err() {
                break;
            }
            sent += 1;
        }
        Ok(sent)
    }

    async fn close(self: Box<Self>) {}
}

// ─── Federation ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeFederation {
    notes: HashMap<String, Note>,
    actors: HashMap<String, Actor>,
    outboxes: HashMap<String, Vec<Note>>,
    following: HashMap<String, Vec<String>>,
    fetches: Arc<AtomicUsize>,
    pub sent: Arc<Mutex<Vec<(String, String, Value)>>>,
}

impl FakeFederation {
    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.insert(note.id.clone(), note);
        self
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actors.insert(actor.id.clone(), actor);
        self
    }

    pub fn with_outbox(mut self, url: &str, notes: impl IntoIterator<Item = Note>) -> Self {
        self.outboxes.insert(url.to_owned(), notes.into_iter().collect());
        self
    }

    pub fn with_following<'a>(mut self, url: &str, actors: impl IntoIterator<Item = &'a str>) -> Self {
        self.following
            .insert(url.to_owned(), actors.into_iter().map(str::to_owned).collect());
        self
    }

    /// Counter of note fetches.
    pub fn fetch_count(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }

    fn missing(url: &str) -> FederationError {
        FederationError::RemoteHttp(url.to_owned(), "404 Not Found".into())
    }
}

#[async_trait]
impl FederationSource for FakeFederation {
    async fn fetch_note(&self, url: &str) -> Result<Note, FederationError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.notes.get(url).cloned().ok_or_else(|| Self::missing(url))
    }

    async fn fetch_actor(&self, url: &str) -> Result<Actor, FederationError> {
        self.actors.get(url).cloned().ok_or_else(|| Self::missing(url))
    }

    async fn fetch_notes(&self, outbox_url: &str) -> Result<Vec<Note>, FederationError> {
        self.outboxes.get(outbox_url).cloned().ok_or_else(|| Self::missing(outbox_url))
    }

    async fn fetch_following(&self, following_url: &str) -> Result<Vec<String>, FederationError> {
        self.following
            .get(following_url)
            .cloned()
            .ok_or_else(|| Self::missing(following_url))
    }

    async fn fetch_activitypub_url(&self, handle: &str) -> Result<String, FederationError> {
        let (user, host) = nofed_federation::client::split_handle(handle)?;
        let url = format!("https://{host}/users/{user}");
        if self.actors.contains_key(&url) {
            Ok(url)
        } else {
            Err(FederationError::NoActivityPubLink(handle.to_owned()))
        }
    }

    async fn send_signed(
        &self,
        _key: &ServerKeyPair,
        key_id: &str,
        inbox: &str,
        payload: &Value,
    ) -> Result<(), FederationError> {
        self.sent
            .lock()
            .unwrap()
            .push((key_id.to_owned(), inbox.to_owned(), payload.clone()));
        Ok(())
    }
}

// ─── Assembly ────────────────────────────────────────────────────────────────

pub fn server_key() -> Arc<ServerKeyPair> {
    Arc::new(ServerKeyPair::from_secret("test-secret").unwrap())
}

pub fn translator(store: &Arc<MemoryStore>, federation: FakeFederation) -> Translator {
    let key = server_key();
    let store: Arc<dyn Store> = store.clone();
    let identity = IdentityBridge::new(store.clone(), key.seed_bytes());
    Translator::new(identity, store, Arc::new(federation), key, SERVICE_URL, "wss://bridge.example", 16)
}
