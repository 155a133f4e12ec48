use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

use crate::error::ScopeError;
use crate::log_capture::{LogLevel, LogSource};
use crate::parsers::text_logs;
use crate::replay::{ReplayStep, SessionReplayEngine};
use crate::routes::parse::TextLogVariant;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct StartReplayBody {
    /// Raw text log of the recorded session.
    pub log_text: String,
    #[serde(default)]
    pub variant: TextLogVariant,
    /// Capabilities JSON for the live session. Defaults to the first
    /// capabilities object found in the log.
    pub capabilities: Option<String>,
}

/// POST /replay/start — parse the recording, open a live session and arm
/// the step cursor. One replay at a time; a second start returns 409.
pub async fn start_replay(
    State(state): State<SharedState>,
    Json(body): Json<StartReplayBody>,
) -> Result<Json<Value>, ScopeError> {
    let mut replay = state.replay.lock().await;
    if replay.is_some() {
        return Err(ScopeError::ReplayAlreadyActive);
    }

    let lines: Vec<&str> = body.log_text.lines().collect();
    let logs = match body.variant {
        TextLogVariant::Automate => text_logs::parse_automate_text_logs(&lines),
        TextLogVariant::AppAutomate => text_logs::parse_app_automate_text_logs(&lines),
    };

    let capabilities = match body.capabilities {
        Some(caps) => caps,
        None => logs
            .capabilities
            .first()
            .map(|c| c.to_string())
            .ok_or_else(|| {
                ScopeError::InvalidCapabilities("no capabilities in log".to_string())
            })?,
    };

    let total_requests = logs.requests.len();
    let executor = Arc::new(state.hub_client().await);
    let mut engine = SessionReplayEngine::new(logs, executor);
    let started = engine.start_session(&capabilities).await?;
    let replay_id = uuid::Uuid::new_v4().to_string();

    state
        .logs
        .emit(
            LogSource::Replay,
            LogLevel::Info,
            format!(
                "Replay {replay_id} started: session {}, {} entries",
                started.session_id, total_requests
            ),
        )
        .await;

    *replay = Some(engine);
    Ok(Json(json!({
        "replay_id": replay_id,
        "session_id": started.session_id,
        "total_requests": total_requests,
        "raw": started.raw,
    })))
}

/// POST /replay/step — execute the next recorded entry. Returns the step
/// outcome, or `{"done": true}` once the recording is exhausted or a step
/// has failed.
pub async fn step_replay(State(state): State<SharedState>) -> Result<Json<Value>, ScopeError> {
    let mut replay = state.replay.lock().await;
    let engine = replay.as_mut().ok_or(ScopeError::ReplayNotActive)?;

    match engine.execute_next_request().await? {
        Some(step) => {
            if let ReplayStep::Failed { error, .. } = &step {
                state
                    .logs
                    .emit(
                        LogSource::Replay,
                        LogLevel::Error,
                        format!("Replay step failed: {error}"),
                    )
                    .await;
            }
            Ok(Json(json!({ "done": false, "step": step })))
        }
        None => Ok(Json(json!({ "done": true }))),
    }
}

/// POST /replay/stop — close the live session and drop the replay.
pub async fn stop_replay(State(state): State<SharedState>) -> Result<Json<Value>, ScopeError> {
    let mut replay = state.replay.lock().await;
    let mut engine = replay.take().ok_or(ScopeError::ReplayNotActive)?;

    engine.stop_session().await?;
    state
        .logs
        .emit(LogSource::Replay, LogLevel::Info, "Replay stopped")
        .await;
    Ok(Json(json!({ "stopped": true })))
}

#[derive(Deserialize)]
pub struct HubUrlBody {
    pub hub_url: String,
}

/// POST /replay/hub-url — repoint the hub. Applies to the active replay's
/// remaining commands as well as future runs.
pub async fn set_hub_url(
    State(state): State<SharedState>,
    Json(body): Json<HubUrlBody>,
) -> Result<Json<Value>, ScopeError> {
    let url = Url::parse(&body.hub_url)
        .map_err(|e| ScopeError::BadRequest(format!("bad hub URL {:?}: {e}", body.hub_url)))?;
    *state.hub_url.write().await = url.clone();
    if let Some(engine) = state.replay.lock().await.as_ref() {
        engine.set_hub_url(url.clone());
    }
    state
        .logs
        .emit(
            LogSource::Hub,
            LogLevel::Info,
            format!("Hub URL updated: {url}"),
        )
        .await;
    Ok(Json(json!({ "hub_url": url.to_string() })))
}
