//! # nofed-federation
//!
//! The ActivityPub side of the bridge.
//!
//! ## Architecture
//!
//! ```text
//!  mastodon.example                     nofed
//!       │                                 │
//!       ├── POST /pub (Follow, Create) ──►│  inbox (nofed-bridge)
//!       │◄── GET actor / note / outbox ───┤  ApClient::fetch_*
//!       │◄── POST inbox (Accept), signed ─┤  ApClient::send_signed
//! ```
//!
//! ## Key concepts
//!
//! - **Wire types** (`types.rs`): actors, notes, activities and ordered
//!   collections as they appear in `application/activity+json`.
//! - **Server key** (`keys.rs`): one Ed25519 key derived from the configured
//!   secret. It signs deliveries and seeds every bridged Nostr identity.
//! - **HTTP Signatures** (`signatures.rs`): `hs2019` signatures over
//!   `(request-target) host date digest`.
//! - **Client** (`client.rs`): [`FederationSource`] is what the bridge needs
//!   from remote servers; [`ApClient`] implements it with `reqwest`.

pub mod client;
pub mod error;
pub mod keys;
pub mod signatures;
pub mod types;

pub use client::{ApClient, FederationSource};
pub use error::FederationError;
pub use keys::ServerKeyPair;
pub use types::{Activity, Actor, Note, OrderedCollection, OrderedCollectionPage};
