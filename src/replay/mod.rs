//! Session replay: re-executes a parsed text log against a live WebDriver
//! hub, one step at a time.
//!
//! The engine is pull-based. Each `execute_next_request` call consumes one
//! recorded entry and returns what happened, so a caller can pace the
//! replay, render progress, or stop between steps. Element ids minted by
//! the live session replace the recorded ones on the fly (see
//! [`element_map`]).

pub mod element_map;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{FIND_ELEMENT_RETRY_INTERVAL, FIND_ELEMENT_RETRY_TIMEOUT};
use crate::error::ScopeError;
use crate::parsers::text_logs::{LogRequest, ParsedRequest, ParsedTextLogs};
use self::element_map::{
    element_ids_from_value, mentions_element, referenced_element_id, rewrite_element_ids,
    rewrite_endpoint,
};

/// Where recorded commands are actually sent. The production implementation
/// is [`crate::hub::HubClient`]; tests substitute their own.
#[async_trait]
pub trait WebDriverExecutor: Send + Sync {
    async fn start_session(&self, capabilities: &Value) -> Result<StartedSession, ScopeError>;
    async fn execute(&self, request: &ParsedRequest, session_id: &str)
        -> Result<Value, ScopeError>;
    async fn stop_session(&self, session_id: &str) -> Result<(), ScopeError>;
    /// Repoint the remote endpoint. Takes effect from the next dispatch.
    fn set_hub_url(&self, url: Url);
}

#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    pub session_id: String,
    pub raw: Value,
}

/// Retry window for element lookups. Pages need time to render, so a
/// failing findElement / findElements is retried until the deadline; every
/// other command fails immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: FIND_ELEMENT_RETRY_TIMEOUT,
            interval: FIND_ELEMENT_RETRY_INTERVAL,
        }
    }
}

/// Outcome of one replay step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayStep {
    /// A SLEEP marker: the recorded gap was waited out.
    Slept { seconds: u64 },
    /// A root-endpoint entry: nothing to send, passed through.
    Skipped { request: ParsedRequest },
    /// A command executed against the live session. `request` is what was
    /// actually sent, element ids already remapped.
    Executed { request: ParsedRequest, response: Value },
    /// A command failed; the replay stops here.
    Failed { request: ParsedRequest, error: String },
}

pub struct SessionReplayEngine {
    logs: ParsedTextLogs,
    executor: Arc<dyn WebDriverExecutor>,
    retry: RetryPolicy,
    session_id: Option<String>,
    /// Ids returned by the live session, position-paired with
    /// `raw_log_element_ids` from the recording.
    session_element_ids: Vec<String>,
    raw_log_element_ids: Vec<String>,
    cursor: usize,
    finished: bool,
}

impl SessionReplayEngine {
    pub fn new(logs: ParsedTextLogs, executor: Arc<dyn WebDriverExecutor>) -> Self {
        Self::with_retry(logs, executor, RetryPolicy::default())
    }

    pub fn with_retry(
        logs: ParsedTextLogs,
        executor: Arc<dyn WebDriverExecutor>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            logs,
            executor,
            retry,
            session_id: None,
            session_element_ids: Vec::new(),
            raw_log_element_ids: Vec::new(),
            cursor: 0,
            finished: false,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished || self.cursor >= self.logs.requests.len()
    }

    /// Repoint the hub mid-run; the remaining commands go to the new URL.
    pub fn set_hub_url(&self, url: Url) {
        self.executor.set_hub_url(url);
    }

    /// Open a live session with the given capabilities JSON. The string is
    /// validated locally before anything goes over the wire.
    pub async fn start_session(&mut self, capabilities: &str) -> Result<StartedSession, ScopeError> {
        let capabilities: Value = serde_json::from_str(capabilities)
            .map_err(|e| ScopeError::InvalidCapabilities(e.to_string()))?;

        let started = self.executor.start_session(&capabilities).await?;
        info!(session_id = %started.session_id, "replay session started");
        self.session_id = Some(started.session_id.clone());
        Ok(started)
    }

    pub async fn stop_session(&mut self) -> Result<(), ScopeError> {
        let Some(session_id) = self.session_id.take() else {
            return Ok(());
        };
        self.executor.stop_session(&session_id).await?;
        info!(%session_id, "replay session stopped");
        Ok(())
    }

    /// Run the next recorded entry. Returns `None` once the recording is
    /// exhausted or a previous step failed.
    pub async fn execute_next_request(&mut self) -> Result<Option<ReplayStep>, ScopeError> {
        if self.finished {
            return Ok(None);
        }
        let Some(entry) = self.logs.requests.get(self.cursor).cloned() else {
            self.finished = true;
            return Ok(None);
        };
        let index = self.cursor;
        self.cursor += 1;

        let request = match entry {
            LogRequest::Sleep(seconds) => {
                debug!(seconds, "sleep marker");
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                return Ok(Some(ReplayStep::Slept { seconds }));
            }
            LogRequest::Command(request) => request,
        };

        // The recorded session teardown shows up as a bare root endpoint.
        if request.endpoint == "/" {
            debug!("root endpoint, skipping");
            return Ok(Some(ReplayStep::Skipped { request }));
        }

        let Some(session_id) = self.session_id.clone() else {
            self.finished = true;
            return Err(ScopeError::SessionNotStarted);
        };

        let sent = self.remap_request(&request);
        debug!(endpoint = %sent.endpoint, command = %sent.command_name, "executing");

        let result = if matches!(sent.command_name.as_str(), "findElement" | "findElements") {
            self.execute_with_retry(&sent, &session_id).await
        } else {
            self.executor.execute(&sent, &session_id).await
        };

        match result {
            Ok(response) => {
                self.harvest_element_ids(index, &response);
                Ok(Some(ReplayStep::Executed {
                    request: sent,
                    response,
                }))
            }
            Err(err) => {
                warn!(endpoint = %sent.endpoint, %err, "command failed, stopping replay");
                self.finished = true;
                Ok(Some(ReplayStep::Failed {
                    request: sent,
                    error: err.to_string(),
                }))
            }
        }
    }

    /// Copy of the recorded request with its element reference remapped to
    /// the live session's id, when one is known.
    fn remap_request(&self, request: &ParsedRequest) -> ParsedRequest {
        let mapped = referenced_element_id(request).and_then(|raw_id| {
            let position = self.raw_log_element_ids.iter().position(|id| *id == raw_id)?;
            self.session_element_ids.get(position).cloned()
        });

        let Some(mapped) = mapped else {
            return request.clone();
        };

        ParsedRequest {
            method: request.method.clone(),
            endpoint: rewrite_endpoint(&request.endpoint, &mapped),
            data: rewrite_element_ids(&request.data, &mapped),
            command_name: request.command_name.clone(),
        }
    }

    async fn execute_with_retry(
        &self,
        request: &ParsedRequest,
        session_id: &str,
    ) -> Result<Value, ScopeError> {
        let deadline = Instant::now() + self.retry.timeout;
        loop {
            match self.executor.execute(request, session_id).await {
                Ok(response) => return Ok(response),
                Err(err) if Instant::now() >= deadline => return Err(err),
                Err(err) => {
                    debug!(%err, "element lookup failed, retrying");
                    tokio::time::sleep(self.retry.interval).await;
                }
            }
        }
    }

    /// When a live response carries element ids, pair them with the ids the
    /// recording produced at the same step. Both lists grow together, so
    /// earlier pairings keep working after later finds.
    fn harvest_element_ids(&mut self, request_index: usize, response: &Value) {
        if !mentions_element(response) {
            return;
        }
        let live_ids = response
            .get("value")
            .map(element_ids_from_value)
            .unwrap_or_default();
        if live_ids.is_empty() {
            return;
        }

        // Responses are recorded only for real commands; map the raw
        // request index to its position among non-sleep entries. The
        // tokenizer stores them with `value` already extracted.
        let command_index = self.logs.requests[..request_index]
            .iter()
            .filter(|r| r.as_command().is_some())
            .count();
        let recorded_ids = self
            .logs
            .responses
            .get(command_index)
            .map(element_ids_from_value)
            .unwrap_or_default();

        debug!(?live_ids, ?recorded_ids, "element id tables extended");
        self.session_element_ids.extend(live_ids);
        self.raw_log_element_ids.extend(recorded_ids);
    }
}
