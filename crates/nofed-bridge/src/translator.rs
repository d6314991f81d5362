//! Nostr ⇄ ActivityPub object translation.
//!
//! Federation → Nostr conversions sign with the derived identity of the
//! object's author, so every emitted event verifies. Nostr → federation
//! conversions produce documents served under the bridge's own URLs.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nofed_db::Store;
use nofed_federation::{
    types::{default_context, Image, PublicKey, PUBLIC},
    Actor, FederationSource, Note, ServerKeyPair,
};
use nofed_nostr::{kind, Event, Filter, Keys, Tag};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::BridgeError,
    html::{strip_html, text_to_html},
    identity::IdentityBridge,
};

/// Profile metadata carried in the content of a kind 0 event.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub about: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub picture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nip05: String,
}

#[derive(Clone)]
pub struct Translator {
    identity: IdentityBridge,
    store: Arc<dyn Store>,
    federation: Arc<dyn FederationSource>,
    server_key: Arc<ServerKeyPair>,
    service_url: String,
    relay_url: String,
    max_thread_depth: usize,
}

impl Translator {
    pub fn new(
        identity: IdentityBridge,
        store: Arc<dyn Store>,
        federation: Arc<dyn FederationSource>,
        server_key: Arc<ServerKeyPair>,
        service_url: impl Into<String>,
        relay_url: impl Into<String>,
        max_thread_depth: usize,
    ) -> Self {
        Self {
            identity,
            store,
            federation,
            server_key,
            service_url: service_url.into(),
            relay_url: relay_url.into(),
            max_thread_depth,
        }
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    /// `<service>/pub/user/<pubkey>`
    pub fn user_url(&self, pubkey: &str) -> String {
        format!("{}/pub/user/{}", self.service_url, pubkey)
    }

    /// `<service>/pub/note/<id>`
    pub fn note_url(&self, id: &str) -> String {
        format!("{}/pub/note/{}", self.service_url, id)
    }

    // ── Federation → Nostr ──────────────────────────────────────────────────

    /// Translate `note` into a signed kind 1 event.
    ///
    /// A reply is linked to its parent's event id. Parents never seen before
    /// are fetched and translated as well, walking up the thread until a known
    /// note, the thread root or `max_thread_depth` fetches.
    pub async fn note_to_event(&self, note: &Note) -> Result<Event, BridgeError> {
        let mut chain: Vec<Note> = vec![note.clone()];
        let mut visited: HashSet<String> = HashSet::from([note.id.clone()]);
        let mut parent_id: Option<String> = None;

        while let Some(parent_url) = chain.last().and_then(|n| n.in_reply_to.clone()) {
            if let Some(id) = self.store.get_event_id_by_note_url(&parent_url).await? {
                parent_id = Some(id);
                break;
            }
            if chain.len() > self.max_thread_depth || !visited.insert(parent_url.clone()) {
                debug!("Stopping thread walk at {}", parent_url);
                break;
            }
            match self.federation.fetch_note(&parent_url).await {
                Ok(parent) => chain.push(parent),
                Err(e) => {
                    warn!("Failed to fetch parent note {}: {}", parent_url, e);
                    break;
                }
            }
        }

        // Translate from the oldest ancestor down so each reply knows its parent.
        let mut event = None;
        while let Some(current) = chain.pop() {
            let translated = self.translate_note(&current, parent_id.take()).await?;
            parent_id = Some(translated.id.clone());
            event = Some(translated);
        }
        event.ok_or_else(|| BridgeError::NotFound(note.id.clone()))
    }

    async fn translate_note(&self, note: &Note, parent_id: Option<String>) -> Result<Event, BridgeError> {
        let keys = self.identity.keys_for_actor(&note.attributed_to).await?;

        let mut tags = Vec::new();
        if let Some(parent) = parent_id {
            tags.push(Tag::new(["e", parent.as_str(), self.relay_url.as_str()]));
        }
        let mut mentioned = HashSet::new();
        for address in note.to.iter().chain(&note.cc) {
            if is_collection_address(address) || !mentioned.insert(address.as_str()) {
                continue;
            }
            match self.identity.keys_for_actor(address).await {
                Ok(k) => tags.push(Tag::new(["p", k.public_key_hex().as_str(), self.relay_url.as_str()])),
                Err(e) => warn!("Skipping mention of {}: {}", address, e),
            }
        }

        let event = signed_event(&keys, unix(note.published), kind::NOTE, tags, strip_html(&note.content));

        let store = self.store.clone();
        let (event_id, note_url) = (event.id.clone(), note.id.clone());
        tokio::spawn(async move {
            if let Err(e) = store.save_note(&event_id, &note_url).await {
                warn!("Failed to save note mapping {} -> {}: {}", note_url, event_id, e);
            }
        });

        Ok(event)
    }

    /// Translate `actor` into a signed kind 0 metadata event.
    pub async fn actor_to_event(&self, actor: &Actor) -> Result<Event, BridgeError> {
        let keys = self.identity.keys_for_actor(&actor.id).await?;

        let username = actor.preferred_username.clone().unwrap_or_default();
        let nip05 = match url::Url::parse(&actor.id).ok().and_then(|u| u.host_str().map(str::to_owned)) {
            Some(host) if !username.is_empty() => format!("{username}@{host}"),
            _ => String::new(),
        };
        let metadata = ProfileMetadata {
            name: actor.name.clone().filter(|n| !n.is_empty()).unwrap_or_else(|| username.clone()),
            about: actor.summary.clone().unwrap_or_default(),
            picture: actor.icon.as_ref().map(|i| i.url.clone()).unwrap_or_default(),
            nip05,
        };
        let content = serde_json::to_string(&metadata)?;

        Ok(signed_event(&keys, unix(actor.published), kind::METADATA, vec![], content))
    }

    /// Translate the accounts `actor` follows into a signed kind 3 contact list.
    pub async fn actor_follows_to_event(&self, actor: &Actor) -> Result<Event, BridgeError> {
        let keys = self.identity.keys_for_actor(&actor.id).await?;

        let follows = match &actor.following {
            Some(url) => self.federation.fetch_following(url).await.unwrap_or_else(|e| {
                warn!("Failed to fetch following of {}: {}", actor.id, e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let mut tags = Vec::with_capacity(follows.len());
        for followed in &follows {
            match self.identity.keys_for_actor(followed).await {
                Ok(k) => tags.push(Tag::new(["p", k.public_key_hex().as_str(), self.relay_url.as_str()])),
                Err(e) => warn!("Failed to get nostr keys for followed actor {}: {}", followed, e),
            }
        }

        Ok(signed_event(&keys, unix(actor.published), kind::CONTACTS, tags, ""))
    }

    // ── Nostr → federation ──────────────────────────────────────────────────

    /// The actor document for a metadata event.
    pub fn event_to_actor(&self, event: &Event) -> Actor {
        let metadata: ProfileMetadata = serde_json::from_str(&event.content).unwrap_or_else(|e| {
            debug!("Metadata of {} is not valid JSON: {}", event.pubkey, e);
            ProfileMetadata::default()
        });
        let id = self.user_url(&event.pubkey);
        let non_empty = |s: String| Some(s).filter(|s| !s.is_empty());

        Actor {
            context: Some(default_context()),
            kind: "Person".into(),
            name: non_empty(metadata.name),
            preferred_username: Some(event.pubkey.clone()),
            summary: non_empty(metadata.about),
            icon: non_empty(metadata.picture).map(Image::new),
            inbox: format!("{}/pub", self.service_url),
            outbox: Some(format!("{id}/outbox")),
            following: Some(format!("{id}/following")),
            followers: Some(format!("{id}/followers")),
            public_key: Some(PublicKey {
                id: format!("{id}#main-key"),
                owner: id.clone(),
                public_key_pem: self.server_key.public_key_pem(),
            }),
            published: timestamp(event.created_at),
            id,
        }
    }

    /// The note object for a kind 1 event.
    ///
    /// Notes and authors that came from the federation side keep their
    /// original URLs; everything else gets a bridge-local URL.
    pub async fn event_to_note(&self, event: &Event) -> Result<Note, BridgeError> {
        let id = self.note_url_for(&event.id).await?;
        let attributed_to = self.actor_url_for(&event.pubkey).await?;
        let in_reply_to = match event.reply_to() {
            Some(parent) => Some(self.note_url_for(parent).await?),
            None => None,
        };

        let mut cc = vec![format!("{attributed_to}/followers")];
        for mentioned in event.tag_values("p") {
            cc.push(self.actor_url_for(mentioned).await?);
        }

        Ok(Note {
            context: None,
            kind: "Note".into(),
            attributed_to,
            content: text_to_html(&event.content),
            published: timestamp(event.created_at),
            in_reply_to,
            to: vec![PUBLIC.to_owned()],
            cc,
            url: Some(self.note_url(&event.id)),
            id,
        })
    }

    async fn note_url_for(&self, event_id: &str) -> Result<String, BridgeError> {
        Ok(self
            .store
            .get_note_url_by_event_id(event_id)
            .await?
            .unwrap_or_else(|| self.note_url(event_id)))
    }

    /// The actor URL for `pubkey`: the federation actor it was derived from,
    /// or its bridge-local URL.
    pub async fn actor_url_for(&self, pubkey: &str) -> Result<String, BridgeError> {
        Ok(self
            .store
            .get_actor_url_by_pubkey(pubkey)
            .await?
            .unwrap_or_else(|| self.user_url(pubkey)))
    }

    // ── Relay-style queries answered from the federation side ───────────────

    /// Answer `filter` by fetching and translating federation objects:
    /// `ids` resolve through note mappings, `authors` through identity
    /// mappings (kind 0 → actor, 1 → outbox notes, 3 → follows), and `#e`
    /// yields the referenced notes. Unreachable objects are skipped.
    pub async fn query_federation(&self, filter: &Filter) -> Vec<Event> {
        let mut events = Vec::new();

        for id in &filter.ids {
            if let Some(event) = self.fetch_mapped_note(id).await {
                events.push(event);
            }
        }

        if filter.ids.is_empty() {
            let wants = |k: u32| filter.kinds.is_empty() || filter.kinds.contains(&k);
            for pubkey in &filter.authors {
                let actor = match self.fetch_mapped_actor(pubkey).await {
                    Some(actor) => actor,
                    None => continue,
                };
                if wants(kind::METADATA) {
                    self.collect(&mut events, self.actor_to_event(&actor).await);
                }
                if wants(kind::NOTE) {
                    if let Some(outbox) = &actor.outbox {
                        match self.federation.fetch_notes(outbox).await {
                            Ok(notes) => {
                                for note in &notes {
                                    self.collect(&mut events, self.note_to_event(note).await);
                                }
                            }
                            Err(e) => warn!("Failed to fetch outbox {}: {}", outbox, e),
                        }
                    }
                }
                if wants(kind::CONTACTS) {
                    self.collect(&mut events, self.actor_follows_to_event(&actor).await);
                }
            }

            for id in &filter.e_tags {
                if let Some(event) = self.fetch_mapped_note(id).await {
                    events.push(event);
                }
            }
        }

        let mut seen = HashSet::new();
        events.retain(|e| filter.matches(e) && seen.insert(e.id.clone()));
        if let Some(limit) = filter.limit {
            events.truncate(limit);
        }
        events
    }

    fn collect(&self, events: &mut Vec<Event>, result: Result<Event, BridgeError>) {
        match result {
            Ok(event) => events.push(event),
            Err(e) => warn!("Translation failed: {}", e),
        }
    }

    async fn fetch_mapped_note(&self, event_id: &str) -> Option<Event> {
        let url = self.store.get_note_url_by_event_id(event_id).await.ok().flatten()?;
        let note = self
            .federation
            .fetch_note(&url)
            .await
            .map_err(|e| debug!("Failed to fetch note {}: {}", url, e))
            .ok()?;
        self.note_to_event(&note)
            .await
            .map_err(|e| warn!("Failed to translate note {}: {}", url, e))
            .ok()
    }

    async fn fetch_mapped_actor(&self, pubkey: &str) -> Option<Actor> {
        let url = self.store.get_actor_url_by_pubkey(pubkey).await.ok().flatten()?;
        self.federation
            .fetch_actor(&url)
            .await
            .map_err(|e| debug!("Failed to fetch actor {}: {}", url, e))
            .ok()
    }
}

/// Public and followers collections are audiences, not mentions.
fn is_collection_address(address: &str) -> bool {
    address == PUBLIC
        || address == "as:Public"
        || address == "Public"
        || address.ends_with("/followers")
}

/// Build and sign an event. A signing failure is logged and the unsigned
/// event is still returned.
fn signed_event(keys: &Keys, created_at: u64, kind: u32, tags: Vec<Tag>, content: impl Into<String>) -> Event {
    let mut event = Event::new(keys.public_key_hex(), created_at, kind, tags, content);
    if let Err(e) = event.sign(keys) {
        warn!("Failed to sign event {}: {}", event.id, e);
    }
    event
}

fn unix(time: Option<DateTime<Utc>>) -> u64 {
    let secs = time.unwrap_or_else(Utc::now).timestamp();
    u64::try_from(secs).unwrap_or(0)
}

fn timestamp(created_at: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::try_from(created_at).ok()?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{eventually, translator, FakeFederation};
    use nofed_db::MemoryStore;

    const ALICE: &str = "https://fed.example/users/alice";
    const BOB: &str = "https://fed.example/users/bob";

    fn note(id: &str, author: &str, reply_to: Option<&str>) -> Note {
        Note {
            id: id.into(),
            kind: "Note".into(),
            attributed_to: author.into(),
            content: format!("<p>text of {id}</p>"),
            published: DateTime::from_timestamp(1_717_243_200, 0),
            in_reply_to: reply_to.map(str::to_owned),
            to: vec![PUBLIC.into()],
            cc: vec![format!("{author}/followers"), BOB.into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn note_becomes_signed_event_with_mentions() {
        let store = Arc::new(MemoryStore::new());
        let t = translator(&store, FakeFederation::default());

        let event = t.note_to_event(&note("https://fed.example/notes/1", ALICE, None)).await.unwrap();
        event.verify().unwrap();
        assert_eq!(event.kind, kind::NOTE);
        assert_eq!(event.created_at, 1_717_243_200);
        assert_eq!(event.content, "text of https://fed.example/notes/1");

        let bob = t.identity.derive_keys(BOB).unwrap().public_key_hex();
        assert_eq!(event.tags, vec![Tag::new(["p", bob.as_str(), t.relay_url()])]);
        assert_eq!(
            store.get_pubkey_by_actor_url(ALICE).await.unwrap(),
            Some(event.pubkey.clone())
        );

        let id = event.id.clone();
        eventually(|| async {
            store.get_note_url_by_event_id(&id).await.unwrap().as_deref() == Some("https://fed.example/notes/1")
        })
        .await;
    }

    #[tokio::test]
    async fn reply_to_known_note_uses_stored_event_id() {
        let store = Arc::new(MemoryStore::new());
        store.save_note("parent-id", "https://fed.example/notes/parent").await.unwrap();
        let t = translator(&store, FakeFederation::default());

        let reply = note("https://fed.example/notes/2", ALICE, Some("https://fed.example/notes/parent"));
        let event = t.note_to_event(&reply).await.unwrap();
        assert_eq!(event.reply_to(), Some("parent-id"));
    }

    #[tokio::test]
    async fn unknown_ancestors_are_fetched_and_linked() {
        let store = Arc::new(MemoryStore::new());
        let root = note("https://fed.example/notes/root", BOB, None);
        let middle = note("https://fed.example/notes/mid", ALICE, Some(&root.id));
        let fed = FakeFederation::default().with_note(root.clone()).with_note(middle.clone());
        let t = translator(&store, fed);

        let leaf = note("https://fed.example/notes/leaf", BOB, Some(&middle.id));
        let leaf_event = t.note_to_event(&leaf).await.unwrap();

        let root_event = t.translate_note(&root, None).await.unwrap();
        let middle_event = t.translate_note(&middle, Some(root_event.id.clone())).await.unwrap();
        assert_eq!(leaf_event.reply_to(), Some(middle_event.id.as_str()));
    }

    #[tokio::test]
    async fn thread_walk_is_bounded_and_survives_cycles() {
        let store = Arc::new(MemoryStore::new());
        let a = note("https://fed.example/notes/a", ALICE, Some("https://fed.example/notes/b"));
        let b = note("https://fed.example/notes/b", BOB, Some("https://fed.example/notes/a"));
        let fed = FakeFederation::default().with_note(a.clone()).with_note(b.clone());
        let fetches = fed.fetch_count();
        let t = translator(&store, fed);

        let event = t.note_to_event(&a).await.unwrap();
        event.verify().unwrap();
        assert_eq!(fetches.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_parent_leaves_event_without_reply_tag() {
        let store = Arc::new(MemoryStore::new());
        let t = translator(&store, FakeFederation::default());

        let orphan = note("https://fed.example/notes/o", ALICE, Some("https://gone.example/notes/x"));
        let event = t.note_to_event(&orphan).await.unwrap();
        assert_eq!(event.reply_to(), None);
    }

    #[tokio::test]
    async fn actor_metadata_falls_back_to_username() {
        let store = Arc::new(MemoryStore::new());
        let t = translator(&store, FakeFederation::default());
        let actor = Actor {
            id: ALICE.into(),
            preferred_username: Some("alice".into()),
            summary: Some("hi".into()),
            icon: Some(Image::new("https://fed.example/a.png")),
            ..Default::default()
        };

        let event = t.actor_to_event(&actor).await.unwrap();
        event.verify().unwrap();
        let metadata: ProfileMetadata = serde_json::from_str(&event.content).unwrap();
        assert_eq!(
            metadata,
            ProfileMetadata {
                name: "alice".into(),
                about: "hi".into(),
                picture: "https://fed.example/a.png".into(),
                nip05: "alice@fed.example".into(),
            }
        );
    }

    #[tokio::test]
    async fn follows_become_contact_list() {
        let store = Arc::new(MemoryStore::new());
        let fed = FakeFederation::default().with_following("https://fed.example/users/alice/following", [BOB]);
        let t = translator(&store, fed);
        let actor = Actor {
            id: ALICE.into(),
            following: Some("https://fed.example/users/alice/following".into()),
            ..Default::default()
        };

        let event = t.actor_follows_to_event(&actor).await.unwrap();
        let bob = t.identity.derive_keys(BOB).unwrap().public_key_hex();
        assert_eq!(event.kind, kind::CONTACTS);
        assert_eq!(event.tag_values("p").collect::<Vec<_>>(), [bob.as_str()]);
    }

    #[tokio::test]
    async fn round_trip_keeps_attribution_time_and_reply() {
        let store = Arc::new(MemoryStore::new());
        store.save_note("parent-id", "https://fed.example/notes/parent").await.unwrap();
        let t = translator(&store, FakeFederation::default());

        let original = note("https://fed.example/notes/3", ALICE, Some("https://fed.example/notes/parent"));
        let event = t.note_to_event(&original).await.unwrap();
        let id = event.id.clone();
        eventually(|| async { store.get_note_url_by_event_id(&id).await.unwrap().is_some() }).await;

        let back = t.event_to_note(&event).await.unwrap();
        assert_eq!(back.id, original.id);
        assert_eq!(back.attributed_to, ALICE);
        assert_eq!(back.published, original.published);
        assert_eq!(back.in_reply_to.as_deref(), Some("https://fed.example/notes/parent"));
        assert_eq!(back.content, "<p>text of https://fed.example/notes/3</p>");
    }

    #[tokio::test]
    async fn native_events_get_local_urls() {
        let store = Arc::new(MemoryStore::new());
        let t = translator(&store, FakeFederation::default());
        let event = Event::new("ab".repeat(32), 10, kind::METADATA, vec![], r#"{"name":"Zed","about":"x"}"#);

        let actor = t.event_to_actor(&event);
        assert_eq!(actor.id, t.user_url(&event.pubkey));
        assert_eq!(actor.name.as_deref(), Some("Zed"));
        assert_eq!(actor.inbox, "https://bridge.example/pub");
        assert!(actor.public_key.unwrap().public_key_pem.contains("BEGIN PUBLIC KEY"));

        let broken = Event::new("cd".repeat(32), 10, kind::METADATA, vec![], "not json");
        assert_eq!(t.event_to_actor(&broken).name, None);
    }

    #[tokio::test]
    async fn federation_query_answers_authors_by_kind() {
        let store = Arc::new(MemoryStore::new());
        let actor = Actor {
            id: ALICE.into(),
            preferred_username: Some("alice".into()),
            outbox: Some(format!("{ALICE}/outbox")),
            ..Default::default()
        };
        let fed = FakeFederation::default()
            .with_actor(actor)
            .with_outbox(&format!("{ALICE}/outbox"), [note("https://fed.example/notes/9", ALICE, None)]);
        let t = translator(&store, fed);
        let pubkey = t.identity.keys_for_actor(ALICE).await.unwrap().public_key_hex();

        let metadata = t.query_federation(&Filter::new().author(&pubkey).kind(kind::METADATA)).await;
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].kind, kind::METADATA);

        let all = t.query_federation(&Filter::new().author(&pubkey)).await;
        let kinds: Vec<u32> = all.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [kind::METADATA, kind::NOTE, kind::CONTACTS]);

        assert!(t.query_federation(&Filter::new().author("unknown")).await.is_empty());
    }
}
