use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(crate::routes::health::health))
        // Parsers
        .route("/parse/text-logs", post(crate::routes::parse::parse_text_logs))
        .route(
            "/parse/session-logs",
            post(crate::routes::parse::parse_session_logs),
        )
        .route(
            "/parse/selenium-logs",
            post(crate::routes::parse::parse_selenium_logs),
        )
        .route("/diff", post(crate::routes::parse::diff_texts))
        // Remote sessions and artifacts
        .route(
            "/sessions/{id}",
            get(crate::routes::sessions::session_details),
        )
        .route(
            "/artifacts/download",
            post(crate::routes::sessions::download_artifact),
        )
        .route(
            "/artifacts/selenium-logs",
            post(crate::routes::sessions::selenium_logs),
        )
        .route(
            "/artifacts/har-logs",
            post(crate::routes::sessions::har_logs),
        )
        // Replay lifecycle
        .route("/replay/start", post(crate::routes::replay::start_replay))
        .route("/replay/step", post(crate::routes::replay::step_replay))
        .route("/replay/stop", post(crate::routes::replay::stop_replay))
        .route("/replay/hub-url", post(crate::routes::replay::set_hub_url))
        // Logs
        .route("/logs/history", get(crate::routes::logs::log_history))
        .route("/logs/stream", get(crate::routes::logs::log_stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
