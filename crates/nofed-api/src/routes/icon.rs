//! Service icon.

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use nofed_common::NofedError;
use std::sync::Arc;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/icon.svg", get(icon))
}

async fn icon(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, NofedError> {
    let svg = &state.config.server.icon_svg;
    if svg.is_empty() {
        return Err(NofedError::not_found("icon"));
    }
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg.clone()))
}
