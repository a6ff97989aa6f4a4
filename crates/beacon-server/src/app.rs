use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order:
///
/// 1. `TraceLayer` — structured request/response logging via `tracing`.
/// 2. `CorsLayer` — the track endpoints are called by snippets embedded on
///    third-party sites, so CORS defaults to permissive; operators can pin
///    origins with `BEACON_CORS_ORIGINS`.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/track/session/start", post(routes::track::session_start))
        .route("/api/track/session/end", post(routes::track::session_end))
        .route("/api/track/pageview", post(routes::track::pageview))
        .route("/api/track/event", post(routes::track::event))
        .route("/api/track/batch", post(routes::track::batch))
        .route("/api/reports/overview", get(routes::reports::overview))
        .route("/api/reports/timeseries", get(routes::reports::timeseries))
        .route("/api/reports/top-pages", get(routes::reports::top_pages))
        .route("/api/reports/events", get(routes::reports::events))
        .route("/api/reports/realtime", get(routes::reports::realtime))
        .route("/api/reports/websites", get(routes::reports::websites))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
