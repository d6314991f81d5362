//! `GET /pub/note/{id}`

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Router,
};
use nofed_common::NofedError;
use nofed_federation::types::default_context;
use std::sync::Arc;

use super::{activity_json, hex64};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/pub/note/{id}", get(note_by_id))
}

async fn note_by_id(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Response, NofedError> {
    let id = hex64(&id, "note id")?;
    let event = state.bridge.events.get_by_id(&id).await?;
    let mut note = state.bridge.translator.event_to_note(&event).await?;
    note.context = Some(default_context());
    activity_json(&note)
}
