//! `GET /query`: relay-style reads answered from the federation side.
//!
//! Parameters are comma-separated lists; the response is newline-delimited
//! JSON, one event per line.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use nofed_common::NofedError;
use nofed_nostr::Filter;
use serde::Deserialize;
use tracing::debug;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/query", get(query))
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    pub ids: Option<String>,
    pub authors: Option<String>,
    pub kinds: Option<String>,
    pub e: Option<String>,
    pub limit: Option<usize>,
}

fn split(list: Option<&str>) -> Vec<String> {
    list.map(|s| s.split(',').map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Translate URL parameters into a relay filter.
fn params_to_filter(params: &QueryParams) -> Result<Filter, NofedError> {
    let kinds = split(params.kinds.as_deref())
        .iter()
        .map(|k| k.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| NofedError::validation("kinds must be integers"))?;

    Ok(Filter {
        ids: split(params.ids.as_deref()),
        authors: split(params.authors.as_deref()),
        kinds,
        e_tags: split(params.e.as_deref()),
        limit: params.limit,
        ..Filter::default()
    })
}

async fn query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse, NofedError> {
    let filter = params_to_filter(&params)?;
    let events = state.bridge.translator.query_federation(&filter).await;
    debug!("GET /query -> {} events", events.len());

    let lines = events
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| NofedError::Internal(e.into()))?;
    Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_split_on_commas() {
        let params = QueryParams {
            ids: Some("a, b,,c".into()),
            kinds: Some("0,1".into()),
            limit: Some(5),
            ..QueryParams::default()
        };
        let filter = params_to_filter(&params).unwrap();
        assert_eq!(filter.ids, ["a", "b", "c"]);
        assert_eq!(filter.kinds, [0, 1]);
        assert!(filter.authors.is_empty());
        assert_eq!(filter.limit, Some(5));
    }

    #[test]
    fn non_numeric_kinds_are_rejected() {
        let params = QueryParams { kinds: Some("note".into()), ..QueryParams::default() };
        assert!(params_to_filter(&params).is_err());
    }
}

#[cfg(test)]
mod router_tests {
    use crate::testkit::{FakeFederation, TestApp};
    use axum::http::StatusCode;
    use nofed_federation::Actor;
    use nofed_nostr::{kind, Event};

    const ALICE: &str = "https://fed.example/users/alice";

    #[tokio::test]
    async fn authors_are_answered_from_bridged_actors_as_ndjson() {
        let mut federation = FakeFederation::default();
        federation.actors.insert(
            ALICE.into(),
            Actor {
                id: ALICE.into(),
                name: Some("Alice".into()),
                inbox: format!("{ALICE}/inbox"),
                ..Actor::default()
            },
        );
        let app = TestApp::new(vec![], federation);
        let pk = app.bridge.identity.keys_for_actor(ALICE).await.unwrap().public_key_hex();

        let (status, content_type, body) = app.get(&format!("/query?authors={pk}&kinds=0")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/x-ndjson"));

        let text = String::from_utf8(body).unwrap();
        let events: Vec<Event> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, kind::METADATA);
        assert_eq!(events[0].pubkey, pk);
        assert!(events[0].verify().is_ok());
    }

    #[tokio::test]
    async fn unmapped_ids_yield_an_empty_body() {
        let app = TestApp::new(vec![], FakeFederation::default());
        let (status, _, body) = app.get(&format!("/query?ids={}", "ab".repeat(32))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());

        let (status, _, _) = app.get("/query?kinds=x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
