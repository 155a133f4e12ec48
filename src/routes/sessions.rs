use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ScopeError;
use crate::log_capture::{LogLevel, LogSource};
use crate::state::SharedState;

/// GET /sessions/{id} — session metadata from the provider's REST API,
/// including the artifact URLs the download routes consume.
pub async fn session_details(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ScopeError> {
    let details = state.remote().get_session_details(&session_id).await?;
    state
        .logs
        .emit(
            LogSource::Backend,
            LogLevel::Info,
            format!("Fetched session details for {session_id}"),
        )
        .await;
    Ok(Json(details))
}

#[derive(Deserialize)]
pub struct ArtifactBody {
    pub url: String,
}

/// POST /artifacts/download — authenticated raw artifact download (text
/// logs, console logs). The body is returned verbatim.
pub async fn download_artifact(
    State(state): State<SharedState>,
    Json(body): Json<ArtifactBody>,
) -> Result<String, ScopeError> {
    state.remote().download(&body.url).await
}

/// POST /artifacts/selenium-logs — hub log for a session; degrades to a
/// placeholder string when the artifact is missing or unreachable.
pub async fn selenium_logs(
    State(state): State<SharedState>,
    Json(body): Json<ArtifactBody>,
) -> String {
    state.remote().get_selenium_logs(&body.url).await
}

/// POST /artifacts/har-logs — network log for a session, same degradation
/// contract as the hub log route.
pub async fn har_logs(State(state): State<SharedState>, Json(body): Json<ArtifactBody>) -> String {
    state.remote().get_har_logs(&body.url).await
}
