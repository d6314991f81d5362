//! WebFinger and NIP-05 discovery.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use nofed_common::NofedError;
use nofed_federation::types::{WebfingerLink, WebfingerResponse, ACTIVITY_JSON};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/.well-known/webfinger", get(webfinger))
        .route("/.well-known/nostr.json", get(nip05))
}

// ── WebFinger ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WebfingerQuery {
    pub resource: Option<String>,
}

async fn webfinger(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebfingerQuery>,
) -> Result<Json<WebfingerResponse>, NofedError> {
    let resource = query
        .resource
        .ok_or_else(|| NofedError::validation("missing resource parameter"))?;
    let name = account_name(&resource)
        .ok_or_else(|| NofedError::validation(format!("broken webfinger query: {resource}")))?;
    debug!("WebFinger lookup for {}", name);

    Ok(Json(WebfingerResponse {
        links: vec![WebfingerLink {
            rel: "self".into(),
            kind: Some(ACTIVITY_JSON.into()),
            href: Some(state.bridge.translator.user_url(name)),
        }],
        subject: resource,
    }))
}

/// The user part of an `acct:user@host` resource.
fn account_name(resource: &str) -> Option<&str> {
    let account = resource.strip_prefix("acct:")?;
    let (name, host) = account.split_once('@')?;
    (!name.is_empty() && !host.is_empty()).then_some(name)
}

// ── NIP-05 ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Nip05Query {
    pub name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Nip05Response {
    pub names: BTreeMap<String, String>,
    pub relays: BTreeMap<String, Vec<String>>,
}

/// Resolve `user_at_host` to the Nostr key bridged for that federation actor.
/// An actor that cannot be found yields an empty document.
async fn nip05(
    State(state): State<Arc<AppState>>,
    Query(query): Query<Nip05Query>,
) -> Result<Json<Nip05Response>, NofedError> {
    let name = query
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| NofedError::validation("missing the ?name= querystring value"))?;

    let handle = name.replacen("_at_", "@", 1);
    let actor_url = match state.bridge.federation.fetch_activitypub_url(&handle).await {
        Ok(url) => url,
        Err(e) => {
            debug!("No ActivityPub actor for {}: {}", handle, e);
            return Ok(Json(Nip05Response::default()));
        }
    };

    let pubkey = state.bridge.identity.keys_for_actor(&actor_url).await?.public_key_hex();
    let mut response = Nip05Response::default();
    response
        .relays
        .insert(pubkey.clone(), vec![state.bridge.translator.relay_url().to_owned()]);
    response.names.insert(name, pubkey);
    Ok(Json(response))
}
