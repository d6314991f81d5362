//! `POST /pub`, the shared inbox.

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Router};
use nofed_common::NofedError;
use std::sync::Arc;
use tracing::error;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/pub", post(receive))
}

async fn receive(State(state): State<Arc<AppState>>, body: Bytes) -> Result<StatusCode, NofedError> {
    state.bridge.inbox.handle(&body).await.map_err(|e| {
        error!("Inbox rejected activity: {}", e);
        NofedError::from(e)
    })?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use crate::testkit::{FakeFederation, TestApp, SERVICE_URL};
    use axum::http::StatusCode;
    use nofed_db::Store;
    use serde_json::json;

    const BOB: &str = "https://fed.example/users/bob";

    #[tokio::test]
    async fn follow_then_undo_updates_followers() {
        let app = TestApp::new(vec![], FakeFederation::default());
        let pk = "ab".repeat(32);
        let follow = json!({
            "type": "Follow",
            "id": "https://fed.example/follows/1",
            "actor": BOB,
            "object": format!("{SERVICE_URL}/pub/user/{pk}"),
        });

        let (status, _, _) = app.post("/pub", follow.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.store.get_followers_by_pubkey(&pk).await.unwrap(), vec![BOB]);

        let undo = json!({ "type": "Undo", "actor": BOB, "object": follow });
        let (status, _, _) = app.post("/pub", undo).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.store.get_followers_by_pubkey(&pk).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_activity_is_a_bad_request() {
        let app = TestApp::new(vec![], FakeFederation::default());
        let (status, content_type, _) = app.post("/pub", json!({ "actor": BOB })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn unsupported_activities_are_accepted() {
        let app = TestApp::new(vec![], FakeFederation::default());
        let like = json!({ "type": "Like", "actor": BOB, "object": "https://fed.example/notes/1" });
        let (status, _, _) = app.post("/pub", like).await;
        assert_eq!(status, StatusCode::OK);
    }
}
