//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        // Game session
        .route("/api/v1/game/start", post(http::http_start_game))
        .route("/api/v1/game", get(http::http_get_session))
        .route("/api/v1/game/answer", post(http::http_post_answer))
        .route("/api/v1/game/expire", post(http::http_post_expire))
        .route("/api/v1/game/next", post(http::http_post_next))
        .route("/api/v1/game/end", post(http::http_post_end))
        .route("/api/v1/game/restart", post(http::http_post_restart))
        .route("/api/v1/game/leave", post(http::http_post_leave))
        // Profile & settings
        .route("/api/v1/profile", get(http::http_get_profile))
        .route("/api/v1/profile/language", post(http::http_post_language))
        .route("/api/v1/profile/location", post(http::http_post_location))
        .route("/api/v1/profile/sound", post(http::http_post_sound))
        .route("/api/v1/key", get(http::http_get_key_status).post(http::http_post_key))
        // Comms hub & personalization
        .route("/api/v1/broadcast", get(http::http_get_broadcast))
        .route("/api/v1/chat", post(http::http_post_chat))
        .route("/api/v1/recommendations", get(http::http_get_recommendations))
        // Static catalogs
        .route("/api/v1/achievements", get(http::http_get_achievements))
        .route("/api/v1/contacts", get(http::http_get_contacts))
        .route("/api/v1/states", get(http::http_get_states))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
