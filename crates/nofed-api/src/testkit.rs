//! Router harness: a bridge over in-memory storage, one fake relay and a
//! fake federation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use nofed_bridge::Bridge;
use nofed_common::AppConfig;
use nofed_db::MemoryStore;
use nofed_federation::{Actor, FederationError, FederationSource, Note, ServerKeyPair};
use nofed_nostr::{Event, Filter, Keys, NostrError, RelayConnection, RelayConnector, Tag};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use crate::{build_router, AppState};

pub const SERVICE_URL: &str = "https://bridge.example";

pub fn keys(seed: u8) -> Keys {
    Keys::from_secret_bytes(&[seed; 32]).unwrap()
}

pub fn signed(keys: &Keys, created_at: u64, kind: u32, tags: Vec<Tag>, content: &str) -> Event {
    let mut event = Event::new(keys.public_key_hex(), created_at, kind, tags, content);
    event.sign(keys).unwrap();
    event
}

#[derive(Clone)]
pub struct FakeRelay {
    events: Arc<Vec<Event>>,
}

#[async_trait]
impl RelayConnector for FakeRelay {
    async fn connect(&self, _url: &str) -> Result<Box<dyn RelayConnection>, NostrError> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl RelayConnection for FakeRelay {
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

/// Federation side: known actors and outboxes; deliveries are recorded.
#[derive(Default)]
pub struct FakeFederation {
    pub actors: HashMap<String, Actor>,
    pub outboxes: HashMap<String, Vec<Note>>,
    pub sent: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeFederation {
    fn missing(url: &str) -> FederationError {
        FederationError::RemoteHttp(url.to_owned(), "404 Not Found".into())
    }
}

#[async_trait]
impl FederationSource for FakeFederation {
    async fn fetch_note(&self, url: &str) -> Result<Note, FederationError> {
        Err(Self::missing(url))
    }

    async fn fetch_actor(&self, url: &str) -> Result<Actor, FederationError> {
        self.actors.get(url).cloned().ok_or_else(|| Self::missing(url))
    }

    async fn fetch_notes(&self, outbox_url: &str) -> Result<Vec<Note>, FederationError> {
        self.outboxes.get(outbox_url).cloned().ok_or_else(|| Self::missing(outbox_url))
    }

    async fn fetch_following(&self, following_url: &str) -> Result<Vec<String>, FederationError> {
        Err(Self::missing(following_url))
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
        _key_id: &str,
        inbox: &str,
        payload: &Value,
    ) -> Result<(), FederationError> {
        self.sent.lock().unwrap().push((inbox.to_owned(), payload.clone()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub bridge: Bridge,
}

impl TestApp {
    pub fn new(relay_events: Vec<Event>, federation: FakeFederation) -> Self {
        Self::with_config(relay_events, federation, &[])
    }

    pub fn with_config(relay_events: Vec<Event>, federation: FakeFederation, extra: &[(&str, &str)]) -> Self {
        let mut overrides = vec![("server.service_url", SERVICE_URL), ("bridge.secret", "test-secret")];
        overrides.extend_from_slice(extra);
        let mut config = AppConfig::with_overrides(&overrides).unwrap();
        config.relays.peers = vec!["wss://relay.fake".into()];

        let store = Arc::new(MemoryStore::new());
        let relay = FakeRelay { events: Arc::new(relay_events) };
        let bridge = Bridge::new(&config, store.clone(), store.clone(), Arc::new(relay), Arc::new(federation)).unwrap();
        let state = AppState::new(Arc::new(config), bridge.clone(), None);
        Self { router: build_router(state), store, bridge }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::post(uri)
            .header("content-type", "application/activity+json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, body.to_vec())
    }
}
