//! Nostr event model.

use secp256k1::{schnorr::Signature, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::NostrError, keys::Keys};

/// Event kinds the bridge produces and consumes.
pub mod kind {
    /// Profile metadata (`name`, `about`, `picture`, `nip05`).
    pub const METADATA: u32 = 0;
    /// Short text note.
    pub const NOTE: u32 = 1;
    /// Contact list; one `p` tag per followed key.
    pub const CONTACTS: u32 = 3;
}

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// The first element names the tag, e.g. `["e", <event id>, <relay url>]` for a
/// reply or `["p", <pubkey>, <relay url>]` for a mention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tag(parts.into_iter().map(Into::into).collect())
    }

    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    /// NIP-10 marker (`root`, `reply`, `mention`) of an `e` tag.
    pub fn marker(&self) -> Option<&str> {
        self.0.get(3).map(String::as_str)
    }
}

/// A Nostr event as exchanged with relays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Hex SHA-256 of the canonical serialization.
    pub id: String,
    /// Author x-only public key (hex).
    pub pubkey: String,
    /// Unix timestamp of creation.
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Tag>,
    pub content: String,
    /// Schnorr signature over the id (hex). Empty when signing failed.
    pub sig: String,
}

impl Event {
    /// Build an unsigned event and compute its id.
    pub fn new(
        pubkey: impl Into<String>,
        created_at: u64,
        kind: u32,
        tags: Vec<Tag>,
        content: impl Into<String>,
    ) -> Self {
        let mut event = Event {
            id: String::new(),
            pubkey: pubkey.into(),
            created_at,
            kind,
            tags,
            content: content.into(),
            sig: String::new(),
        };
        event.id = hex::encode(event.digest());
        event
    }

    /// SHA-256 over `[0, pubkey, created_at, kind, tags, content]`.
    pub fn digest(&self) -> [u8; 32] {
        let canonical = serde_json::json!([
            0,
            self.pubkey,
            self.created_at,
            self.kind,
            self.tags,
            self.content
        ]);
        Sha256::digest(canonical.to_string().as_bytes()).into()
    }

    /// Sign the event with `keys`, filling in `sig`.
    ///
    /// The id is recomputed first so a mutated event never carries a stale id.
    pub fn sign(&mut self, keys: &Keys) -> Result<(), NostrError> {
        let digest = self.digest();
        self.id = hex::encode(digest);
        self.sig = keys.sign_digest(&digest)?;
        Ok(())
    }

    /// Verify the id and the Schnorr signature.
    pub fn verify(&self) -> Result<(), NostrError> {
        let digest = self.digest();
        if hex::encode(digest) != self.id {
            return Err(NostrError::IdMismatch);
        }
        let sig = Signature::from_slice(&hex::decode(&self.sig)?)?;
        let pk = XOnlyPublicKey::from_slice(&hex::decode(&self.pubkey)?)?;
        let secp = Secp256k1::verification_only();
        let msg = Message::from_digest_slice(&digest)?;
        secp.verify_schnorr(&sig, &msg, &pk)?;
        Ok(())
    }

    /// Values of every tag named `name`, in order.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.name() == Some(name))
            .filter_map(Tag::value)
    }

    /// The event this one replies to.
    ///
    /// Prefers an `e` tag marked `reply`, then falls back to the last `e` tag
    /// (the positional NIP-10 convention).
    pub fn reply_to(&self) -> Option<&str> {
        let e_tags = || self.tags.iter().filter(|t| t.name() == Some("e"));
        e_tags()
            .find(|t| t.marker() == Some("reply"))
            .or_else(|| e_tags().last())
            .and_then(Tag::value)
    }
}
