use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::diff;
use crate::error::ScopeError;
use crate::log_capture::{LogLevel, LogSource};
use crate::parsers::{selenium_logs, session_logs, text_logs};
use crate::state::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TextLogVariant {
    #[default]
    Automate,
    AppAutomate,
}

#[derive(Deserialize)]
pub struct TextLogsBody {
    pub text: String,
    #[serde(default)]
    pub variant: TextLogVariant,
}

/// POST /parse/text-logs — tokenize a raw text log into capabilities,
/// requests (with sleep markers) and responses.
pub async fn parse_text_logs(
    State(state): State<SharedState>,
    Json(body): Json<TextLogsBody>,
) -> Json<text_logs::ParsedTextLogs> {
    let lines: Vec<&str> = body.text.lines().collect();
    let result = match body.variant {
        TextLogVariant::Automate => text_logs::parse_automate_text_logs(&lines),
        TextLogVariant::AppAutomate => text_logs::parse_app_automate_text_logs(&lines),
    };
    state
        .logs
        .emit(
            LogSource::Parser,
            LogLevel::Info,
            format!(
                "Parsed text log: {} requests, {} responses",
                result.requests.len(),
                result.responses.len()
            ),
        )
        .await;
    Json(result)
}

#[derive(Deserialize)]
pub struct SessionLogsBody {
    pub text: String,
}

/// POST /parse/session-logs — scan a session log into timed exchanges.
pub async fn parse_session_logs(
    State(state): State<SharedState>,
    Json(body): Json<SessionLogsBody>,
) -> Json<session_logs::ScanResult> {
    let result = session_logs::parse_automate_session_logs(&body.text);
    state
        .logs
        .emit(
            LogSource::Parser,
            LogLevel::Info,
            format!("Parsed session log: {} exchanges", result.exchanges.len()),
        )
        .await;
    Json(result)
}

#[derive(Deserialize)]
pub struct SeleniumLogsBody {
    pub text: String,
    /// Calendar date of the session, `YYYY-MM-DD`.
    pub date: String,
    /// Session creation instant in epoch milliseconds, used for timezone
    /// inference.
    pub session_created_at: i64,
}

/// POST /parse/selenium-logs — scan a Selenium hub log into exchanges.
pub async fn parse_selenium_logs(
    State(state): State<SharedState>,
    Json(body): Json<SeleniumLogsBody>,
) -> Result<Json<selenium_logs::SeleniumScanResult>, ScopeError> {
    let date = NaiveDate::parse_from_str(&body.date, "%Y-%m-%d")
        .map_err(|e| ScopeError::BadRequest(format!("bad date {:?}: {e}", body.date)))?;
    let result =
        selenium_logs::parse_automate_selenium_logs(&body.text, date, body.session_created_at);
    state
        .logs
        .emit(
            LogSource::Parser,
            LogLevel::Info,
            format!(
                "Parsed hub log: {} exchanges, dialect {}",
                result.exchanges.len(),
                result.summary.dialect
            ),
        )
        .await;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct DiffBody {
    pub old: String,
    pub new: String,
}

/// POST /diff — side-by-side line diff of two texts.
pub async fn diff_texts(Json(body): Json<DiffBody>) -> Json<Vec<diff::DiffLine>> {
    Json(diff::generate_diff(&body.old, &body.new))
}
