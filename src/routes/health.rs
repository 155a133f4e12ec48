use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub port: u16,
    pub hub_url: String,
    pub has_credentials: bool,
    pub replay_active: bool,
}

/// GET /health — liveness and effective configuration.
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let replay_active = state.replay.lock().await.is_some();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: state.config.port,
        hub_url: state.hub_url.read().await.to_string(),
        has_credentials: state.config.credentials.is_some(),
        replay_active,
    })
}
