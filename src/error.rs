use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("Invalid capabilities JSON: {0}")]
    InvalidCapabilities(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("No replay session is active")]
    ReplayNotActive,

    #[error("A replay session is already active")]
    ReplayAlreadyActive,

    #[error("Remote session has not been started")]
    SessionNotStarted,

    #[error("Session start failed: {0}")]
    StartSession(String),

    #[error("Session stop failed: {0}")]
    StopSession(String),

    #[error("Command failed ({status}): {body}")]
    CommandFailed { status: u16, body: String },

    #[error("Download failed ({status}): {body}")]
    Download { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl IntoResponse for ScopeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ScopeError::InvalidCapabilities(_) => StatusCode::BAD_REQUEST,
            ScopeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ScopeError::ReplayNotActive => StatusCode::CONFLICT,
            ScopeError::ReplayAlreadyActive => StatusCode::CONFLICT,
            ScopeError::SessionNotStarted => StatusCode::CONFLICT,
            ScopeError::StartSession(_) => StatusCode::BAD_GATEWAY,
            ScopeError::StopSession(_) => StatusCode::BAD_GATEWAY,
            ScopeError::CommandFailed { .. } => StatusCode::BAD_GATEWAY,
            ScopeError::Download { .. } => StatusCode::BAD_GATEWAY,
            ScopeError::Http(_) => StatusCode::BAD_GATEWAY,
            ScopeError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
