//! Outbound ActivityPub HTTP client.
//!
//! [`FederationSource`] is everything the bridge needs from remote servers.
//! [`ApClient`] implements it over `reqwest`; tests substitute in-process fakes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::FederationError,
    keys::ServerKeyPair,
    signatures::sign_request,
    types::{
        Activity, Actor, CollectionFirst, Note, OrderedCollection, OrderedCollectionPage, WebfingerResponse,
        ACTIVITY_JSON,
    },
};

// Upper bound on `next` links followed when reading a following collection.
const MAX_COLLECTION_PAGES: usize = 10;

/// Remote ActivityPub operations used by the bridge.
#[async_trait]
pub trait FederationSource: Send + Sync + 'static {
    async fn fetch_note(&self, url: &str) -> Result<Note, FederationError>;

    async fn fetch_actor(&self, url: &str) -> Result<Actor, FederationError>;

    /// Notes from the first page of an outbox, in collection order.
    async fn fetch_notes(&self, outbox_url: &str) -> Result<Vec<Note>, FederationError>;

    /// Actor URLs in a following collection.
    async fn fetch_following(&self, following_url: &str) -> Result<Vec<String>, FederationError>;

    /// Resolve `user@host` to an actor URL through WebFinger.
    async fn fetch_activitypub_url(&self, handle: &str) -> Result<String, FederationError>;

    /// POST `payload` to `inbox` with an HTTP Signature from `key`.
    async fn send_signed(
        &self,
        key: &ServerKeyPair,
        key_id: &str,
        inbox: &str,
        payload: &Value,
    ) -> Result<(), FederationError>;
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// `reqwest`-backed [`FederationSource`].
#[derive(Clone)]
pub struct ApClient {
    http: Client,
}

impl ApClient {
    pub fn new() -> Result<Self, FederationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("nofed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, accept: &str) -> Result<T, FederationError> {
        debug!("Federation GET {}", url);
        let resp = self.http.get(url).header(header::ACCEPT, accept).send().await?;
        let resp = check_status(url, resp.status(), resp).await?;
        let body = resp.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| FederationError::RemoteProtocol(url.to_owned(), format!("undecodable body: {e}")))
    }

    async fn get_activity_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FederationError> {
        self.get_json(url, ACTIVITY_JSON).await
    }
}

async fn check_status(
    url: &str,
    status: StatusCode,
    resp: reqwest::Response,
) -> Result<reqwest::Response, FederationError> {
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(FederationError::RemoteHttp(url.to_owned(), format!("{status}: {snippet}")))
}

#[async_trait]
impl FederationSource for ApClient {
    async fn fetch_note(&self, url: &str) -> Result<Note, FederationError> {
        self.get_activity_json(url).await
    }

    async fn fetch_actor(&self, url: &str) -> Result<Actor, FederationError> {
        self.get_activity_json(url).await
    }

    async fn fetch_notes(&self, outbox_url: &str) -> Result<Vec<Note>, FederationError> {
        let outbox: OrderedCollection<Value> = self.get_activity_json(outbox_url).await?;
        let items = match outbox.first {
            Some(CollectionFirst::Page(page)) => page.ordered_items,
            Some(CollectionFirst::Link(link)) => {
                let url = resolve(outbox_url, &link)?;
                let page: OrderedCollectionPage<Value> = self.get_activity_json(&url).await?;
                page.ordered_items
            }
            None => outbox.ordered_items,
        };
        Ok(items.into_iter().filter_map(note_from_item).collect())
    }

    async fn fetch_following(&self, following_url: &str) -> Result<Vec<String>, FederationError> {
        let collection: OrderedCollection<Value> = self.get_activity_json(following_url).await?;
        let mut actors: Vec<String> = collection.ordered_items.iter().filter_map(item_id).collect();

        let mut next = match collection.first {
            Some(CollectionFirst::Link(url)) => Some(url),
            Some(CollectionFirst::Page(page)) => {
                actors.extend(page.ordered_items.iter().filter_map(item_id));
                page.next
            }
            None => None,
        };

        let mut pages = 0;
        while let Some(link) = next.take() {
            pages += 1;
            if pages > MAX_COLLECTION_PAGES {
                warn!("Following collection {} exceeds {} pages; truncating", following_url, MAX_COLLECTION_PAGES);
                break;
            }
            let url = resolve(following_url, &link)?;
            let page: OrderedCollectionPage<Value> = self.get_activity_json(&url).await?;
            if page.ordered_items.is_empty() {
                break;
            }
            actors.extend(page.ordered_items.iter().filter_map(item_id));
            next = page.next;
        }

        Ok(actors)
    }

    async fn fetch_activitypub_url(&self, handle: &str) -> Result<String, FederationError> {
        let (user, host) = split_handle(handle)?;
        let url = url::Url::parse_with_params(
            &format!("https://{host}/.well-known/webfinger"),
            &[("resource", format!("acct:{user}@{host}"))],
        )?;

        let wf: WebfingerResponse = self.get_json(url.as_str(), "application/jrd+json").await?;
        wf.actor_url()
            .map(str::to_owned)
            .ok_or_else(|| FederationError::NoActivityPubLink(handle.to_owned()))
    }

    async fn send_signed(
        &self,
        key: &ServerKeyPair,
        key_id: &str,
        inbox: &str,
        payload: &Value,
    ) -> Result<(), FederationError> {
        let body = serde_json::to_vec(payload)?;
        let signed = sign_request(key, key_id, "POST", inbox, &body)?;

        debug!("Federation POST {}", inbox);
        let resp = self
            .http
            .post(inbox)
            .header(header::HOST, signed.host)
            .header(header::DATE, signed.date)
            .header("Digest", signed.digest)
            .header("Signature", signed.signature)
            .header(header::CONTENT_TYPE, ACTIVITY_JSON)
            .body(body)
            .send()
            .await?;
        check_status(inbox, resp.status(), resp).await?;
        Ok(())
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Resolve a possibly relative collection link against the collection URL.
fn resolve(base: &str, link: &str) -> Result<String, FederationError> {
    Ok(url::Url::parse(base)?.join(link)?.to_string())
}

/// Split `user@host` (optionally prefixed with `@` or `acct:`).
pub fn split_handle(handle: &str) -> Result<(&str, &str), FederationError> {
    let trimmed = handle.trim_start_matches("acct:").trim_start_matches('@');
    match trimmed.split_once('@') {
        Some((user, host)) if !user.is_empty() && !host.is_empty() && !host.contains('/') => Ok((user, host)),
        _ => Err(FederationError::InvalidHandle(handle.to_owned())),
    }
}

/// A `Note` from an outbox item: either a `Create` wrapping a note object or a
/// bare note. Announces and link-only objects are skipped.
fn note_from_item(item: Value) -> Option<Note> {
    match item.get("type").and_then(Value::as_str) {
        Some("Create") => serde_json::from_value::<Activity<Note>>(item).ok().map(|a| a.object),
        Some("Note") => serde_json::from_value(item).ok(),
        _ => None,
    }
}

fn item_id(item: &Value) -> Option<String> {
    match item {
        Value::String(id) => Some(id.clone()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}
