//! Actor documents and their collections under `/pub/user/{pubkey}`.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use nofed_common::NofedError;
use nofed_federation::{Activity, Note, OrderedCollection, OrderedCollectionPage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{activity_json, hex64};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pub/user/{pubkey}", get(actor))
        .route("/pub/user/{pubkey}/followers", get(followers))
        .route("/pub/user/{pubkey}/following", get(following))
        .route("/pub/user/{pubkey}/outbox", get(outbox))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

async fn actor(State(state): State<Arc<AppState>>, Path(pubkey): Path<String>) -> Result<Response, NofedError> {
    let pubkey = hex64(&pubkey, "pubkey")?;
    let metadata = state.bridge.events.get_metadata(&pubkey).await?;
    activity_json(&state.bridge.translator.event_to_actor(&metadata))
}

async fn followers(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, NofedError> {
    let pubkey = hex64(&pubkey, "pubkey")?;
    let followers = state.bridge.events.get_followers(&pubkey).await?;
    paged(&state, &pubkey, "followers", followers, query.page.is_some())
}

async fn following(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, NofedError> {
    let pubkey = hex64(&pubkey, "pubkey")?;
    let mut following = Vec::new();
    for followed in state.bridge.events.get_following(&pubkey).await? {
        following.push(state.bridge.translator.actor_url_for(&followed).await?);
    }
    paged(&state, &pubkey, "following", following, query.page.is_some())
}

async fn outbox(State(state): State<Arc<AppState>>, Path(pubkey): Path<String>) -> Result<Response, NofedError> {
    let pubkey = hex64(&pubkey, "pubkey")?;
    let translator = &state.bridge.translator;
    let events = state.bridge.events.get_notes_by_pubkey(&pubkey).await?;

    let mut creates = Vec::with_capacity(events.len());
    for event in &events {
        let note = translator.event_to_note(event).await?;
        let id = format!("{}/pub/create/{}", translator.service_url(), event.id);
        creates.push(Activity::<Note>::create(id, note));
    }

    let collection = collection_url(&state, &pubkey, "outbox");
    let page = OrderedCollectionPage::new(format!("{collection}?page=1"), collection.clone(), creates);
    activity_json(&OrderedCollection::with_first_page(collection, page))
}

fn collection_url(state: &AppState, pubkey: &str, name: &str) -> String {
    format!("{}/{name}", state.bridge.translator.user_url(pubkey))
}

/// The collection with its single page embedded, or just the page when one
/// was asked for.
fn paged<T: Serialize>(
    state: &AppState,
    pubkey: &str,
    name: &str,
    items: Vec<T>,
    page_only: bool,
) -> Result<Response, NofedError> {
    let collection = collection_url(state, pubkey, name);
    let page = OrderedCollectionPage::new(format!("{collection}?page=1"), collection.clone(), items);
    if page_only {
        activity_json(&page)
    } else {
        activity_json(&OrderedCollection::with_first_page(collection, page))
    }
}
