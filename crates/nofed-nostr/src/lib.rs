//! # nofed-nostr
//!
//! Client side of the Nostr protocol as the bridge needs it.
//!
//! - **Events** (`event.rs`): the signed, content-addressed event model. Ids are
//!   the SHA-256 of the canonical `[0, pubkey, created_at, kind, tags, content]`
//!   array; signatures are BIP-340 Schnorr over the id.
//! - **Keys** (`keys.rs`): secp256k1 key pairs used to sign bridged events.
//! - **Filters** (`filter.rs`): NIP-01 subscription filters.
//! - **Relay connections** (`relay.rs`): one WebSocket per relay, `REQ` until
//!   `EOSE`, then `CLOSE`.
//! - **Relay pool** (`pool.rs`): the fan-out query engine. Queries a bounded
//!   number of randomly chosen relays at once, deduplicates by event id and
//!   returns on the result cap or the overall deadline.
//!
//! ```text
//!              ┌──────────── RelayPool::query(filter, max) ────────────┐
//!              │  shuffle peers ── spawn ≤ N fetches ── mpsc<Event> ──┤
//!   relay A ◄──┤  REQ … EVENT … EOSE                                  │
//!   relay B ◄──┤  REQ … EVENT … EOSE           dedup by id, stop at   │
//!   relay C ✗  │  (connect timeout, marked failed)   max or deadline  │
//!              └──────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod event;
pub mod filter;
pub mod keys;
pub mod pool;
pub mod relay;

pub use error::NostrError;
pub use event::{kind, Event, Tag};
pub use filter::Filter;
pub use keys::Keys;
pub use pool::RelayPool;
pub use relay::{RelayConnection, RelayConnector, WsConnector};
