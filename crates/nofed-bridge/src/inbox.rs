//! Inbox state machine.
//!
//! Incoming activities are decoded in two steps: the envelope (`type`,
//! `actor`, raw `object`) and then the concrete [`InboundActivity`] variant.
//! Only fully decoded activities reach storage.
//!
//! | activity | object | effect |
//! |---|---|---|
//! | `Create` | `Note` | translate (mapping saved in the background) |
//! | `Create`/`Follow` | actor URL, `Person` or `Follow` | add follow edge, send `Accept` |
//! | `Delete` | note URL or `Tombstone` | drop note mapping and cached copies |
//! | `Undo` | `Follow` or `Person` | remove follow edge |
//! | anything else | | ignored |

use std::sync::Arc;

use nofed_db::Store;
use nofed_federation::{types::default_context, FederationSource, Note, ServerKeyPair};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{cache::EventCache, error::BridgeError, identity::IdentityBridge, translator::Translator};

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    actor: Option<Value>,
    #[serde(default)]
    object: Value,
}

/// A decoded inbound activity.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundActivity {
    CreateNote(Box<Note>),
    /// `follower` follows the bridged `pubkey`.
    Follow { follower: String, pubkey: String },
    Delete { object: String },
    Unfollow { follower: String, pubkey: String },
    Unsupported(String),
}

/// What handling an activity did.
#[derive(Debug, Clone, PartialEq)]
pub enum InboxOutcome {
    /// The translated event id, or `None` when translation failed.
    NoteBridged(Option<String>),
    Followed,
    Deleted(usize),
    Unfollowed,
    Ignored,
}

impl InboundActivity {
    /// Decode a raw activity body.
    pub fn decode(body: &[u8]) -> Result<Self, BridgeError> {
        let envelope: Envelope = serde_json::from_slice(body)?;
        let actor = envelope.actor.as_ref().and_then(reference_id);
        let object_type = envelope.object.get("type").and_then(Value::as_str);

        let activity = match (envelope.kind.as_str(), object_type) {
            ("Create", Some("Note")) => {
                InboundActivity::CreateNote(Box::new(serde_json::from_value(envelope.object)?))
            }
            ("Create" | "Follow", Some("Follow")) => {
                let (follower, target) = follow_parts(&envelope.object, actor)?;
                InboundActivity::Follow { follower, pubkey: target }
            }
            ("Create" | "Follow", Some("Person" | "Service" | "Application")) | ("Follow", None) => {
                let follower = actor.or_else(|| envelope.object.get("actor").and_then(reference_id));
                let target = followed_actor(&envelope.object)
                    .ok_or_else(|| BridgeError::Malformed("follow without object".into()))?;
                InboundActivity::Follow { follower: require_actor(follower)?, pubkey: last_segment(&target)? }
            }
            ("Delete", _) => {
                let object = reference_id(&envelope.object)
                    .ok_or_else(|| BridgeError::Malformed("delete without object".into()))?;
                InboundActivity::Delete { object }
            }
            ("Undo", Some("Follow")) => {
                let (follower, target) = follow_parts(&envelope.object, actor)?;
                InboundActivity::Unfollow { follower, pubkey: target }
            }
            ("Undo", Some("Person")) => {
                let follower = envelope.object.get("actor").and_then(reference_id).or(actor);
                let target = followed_actor(&envelope.object)
                    .ok_or_else(|| BridgeError::Malformed("undo without object".into()))?;
                InboundActivity::Unfollow { follower: require_actor(follower)?, pubkey: last_segment(&target)? }
            }
            (kind, object) => InboundActivity::Unsupported(format!("{kind}/{}", object.unwrap_or("-"))),
        };
        Ok(activity)
    }
}

/// `(follower, target pubkey)` of an embedded `Follow`.
fn follow_parts(follow: &Value, outer_actor: Option<String>) -> Result<(String, String), BridgeError> {
    let follower = follow.get("actor").and_then(reference_id).or(outer_actor);
    let target = follow
        .get("object")
        .and_then(reference_id)
        .ok_or_else(|| BridgeError::Malformed("follow without object".into()))?;
    Ok((require_actor(follower)?, last_segment(&target)?))
}

/// The followed actor named by a follow-shaped object: its `object` when it
/// has one, otherwise the object itself.
fn followed_actor(object: &Value) -> Option<String> {
    object.get("object").and_then(reference_id).or_else(|| reference_id(object))
}

fn require_actor(actor: Option<String>) -> Result<String, BridgeError> {
    actor.ok_or_else(|| BridgeError::Malformed("activity without actor".into()))
}

fn reference_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

/// The bridged pubkey is the last path segment of the followed actor URL.
fn last_segment(url: &str) -> Result<String, BridgeError> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| BridgeError::Malformed(format!("cannot find a pubkey in '{url}'")))
}

// ─── Handler ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Inbox {
    store: Arc<dyn Store>,
    cache: EventCache,
    identity: IdentityBridge,
    translator: Translator,
    federation: Arc<dyn FederationSource>,
    server_key: Arc<ServerKeyPair>,
}

impl Inbox {
    pub fn new(
        store: Arc<dyn Store>,
        cache: EventCache,
        identity: IdentityBridge,
        translator: Translator,
        federation: Arc<dyn FederationSource>,
        server_key: Arc<ServerKeyPair>,
    ) -> Self {
        Self { store, cache, identity, translator, federation, server_key }
    }

    /// Decode and apply one activity.
    ///
    /// Malformed input fails before anything is written. Only a failure of
    /// the primary write is returned as an error; follow-up work is logged.
    pub async fn handle(&self, body: &[u8]) -> Result<InboxOutcome, BridgeError> {
        let activity = InboundActivity::decode(body)?;
        debug!("Inbox received {:?}", activity);

        match activity {
            InboundActivity::CreateNote(note) => match self.translator.note_to_event(&note).await {
                Ok(event) => {
                    info!("Bridged note {} as {}", note.id, event.id);
                    Ok(InboxOutcome::NoteBridged(Some(event.id)))
                }
                Err(e) => {
                    warn!("Failed to convert note {} to event: {}", note.id, e);
                    Ok(InboxOutcome::NoteBridged(None))
                }
            },
            InboundActivity::Follow { follower, pubkey } => {
                self.store.follow_nostr_pubkey(&follower, &pubkey).await?;
                info!("{} now follows {}", follower, pubkey);
                if let Err(e) = self.identity.keys_for_actor(&follower).await {
                    warn!("Failed to bridge identity of {}: {}", follower, e);
                }
                // `body` decoded above, so it is valid JSON.
                let follow: Value = serde_json::from_slice(body)?;
                self.spawn_accept(follower, pubkey, follow);
                Ok(InboxOutcome::Followed)
            }
            InboundActivity::Delete { object } => {
                let ids = self.store.delete_note_by_url(&object).await?;
                for id in &ids {
                    if let Err(e) = self.cache.evict_note(id).await {
                        warn!("Failed to evict cached note {}: {}", id, e);
                    }
                }
                Ok(InboxOutcome::Deleted(ids.len()))
            }
            InboundActivity::Unfollow { follower, pubkey } => {
                self.store.unfollow_nostr_pubkey(&follower, &pubkey).await?;
                info!("{} no longer follows {}", follower, pubkey);
                Ok(InboxOutcome::Unfollowed)
            }
            InboundActivity::Unsupported(what) => {
                debug!("Ignoring unsupported activity {}", what);
                Ok(InboxOutcome::Ignored)
            }
        }
    }

    /// Deliver an `Accept` for `follow` to the follower's inbox. Best effort.
    fn spawn_accept(&self, follower: String, pubkey: String, follow: Value) {
        let federation = self.federation.clone();
        let key = self.server_key.clone();
        let actor = self.translator.user_url(&pubkey);
        let accept_id = format!(
            "{}/pub/accept/{}",
            self.translator.service_url(),
            hex::encode(Sha256::digest(follow.to_string().as_bytes()))
        );

        tokio::spawn(async move {
            let inbox = match federation.fetch_actor(&follower).await {
                Ok(remote) if !remote.inbox.is_empty() => remote.inbox,
                Ok(_) => {
                    warn!("Follower {} has no inbox; not sending Accept", follower);
                    return;
                }
                Err(e) => {
                    warn!("Failed to fetch follower {}: {}", follower, e);
                    return;
                }
            };
            let accept = json!({
                "@context": default_context(),
                "id": accept_id,
                "type": "Accept",
                "actor": actor,
                "object": follow,
            });
            let key_id = format!("{actor}#main-key");
            if let Err(e) = federation.send_signed(&key, &key_id, &inbox, &accept).await {
                warn!("Failed to deliver Accept to {}: {}", inbox, e);
            }
        });
    }
}
