//! # nofed-bridge
//!
//! The translation and aggregation engine between Nostr and ActivityPub.
//!
//! ```text
//!  POST /pub ──► Inbox ──► Translator ──► IdentityBridge ──► Store
//!                              │
//!  GET /pub/... ──► EventService ──► EventCache ──► RelayPool (relays)
//!                              │
//!                              └──► Translator (federation documents)
//! ```
//!
//! [`Bridge`] wires the components together from an [`AppConfig`].

pub mod cache;
pub mod error;
pub mod events;
pub mod html;
pub mod identity;
pub mod inbox;
pub mod translator;

#[cfg(test)]
mod testkit;

use std::sync::Arc;

pub use cache::EventCache;
pub use error::BridgeError;
pub use events::EventService;
pub use identity::IdentityBridge;
pub use inbox::{InboundActivity, Inbox, InboxOutcome};
pub use translator::{ProfileMetadata, Translator};

use nofed_common::AppConfig;
use nofed_db::{CacheStore, Store};
use nofed_federation::{FederationSource, ServerKeyPair};
use nofed_nostr::{RelayConnector, RelayPool};

/// Every bridge component, sharing one store, cache and server key.
#[derive(Clone)]
pub struct Bridge {
    pub server_key: Arc<ServerKeyPair>,
    pub identity: IdentityBridge,
    pub cache: EventCache,
    pub events: EventService,
    pub translator: Translator,
    pub inbox: Inbox,
    pub federation: Arc<dyn FederationSource>,
}

impl Bridge {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn Store>,
        cache_store: Arc<dyn CacheStore>,
        connector: Arc<dyn RelayConnector>,
        federation: Arc<dyn FederationSource>,
    ) -> Result<Self, BridgeError> {
        let server_key = Arc::new(ServerKeyPair::from_secret(&config.bridge.secret)?);
        let identity = IdentityBridge::new(store.clone(), server_key.seed_bytes());
        let cache = EventCache::new(cache_store, config.cache.ttl_days);
        let pool = RelayPool::new(connector, &config.relays);
        let events = EventService::new(pool, cache.clone(), store.clone(), config.service_url());
        let translator = Translator::new(
            identity.clone(),
            store.clone(),
            federation.clone(),
            server_key.clone(),
            config.service_url(),
            config.relay_url(),
            config.bridge.max_thread_depth,
        );
        let inbox = Inbox::new(
            store,
            cache.clone(),
            identity.clone(),
            translator.clone(),
            federation.clone(),
            server_key.clone(),
        );

        Ok(Self { server_key, identity, cache, events, translator, inbox, federation })
    }
}
