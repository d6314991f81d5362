//! Health check endpoint for load balancers and container probes.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    storage: &'static str,
    uptime_secs: u64,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/healthz", get(health_check))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (storage, ok) = match &state.db {
        Some(db) => ("postgres", nofed_db::postgres::health_check(&db.pg).await),
        None => ("memory", true),
    };

    Json(HealthResponse {
        status: if ok { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        storage,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use crate::testkit::{FakeFederation, TestApp};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn lite_mode_reports_memory_storage() {
        let app = TestApp::new(vec![], FakeFederation::default());
        let (status, body) = app.get_json("/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["storage"], "memory");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
