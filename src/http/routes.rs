use super::handlers;
use super::state::AppState;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::permissive().allow_origin(AllowOrigin::list(allowed))
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/start-session", post(handlers::start_session))
        .route("/select-question", post(handlers::select_question))
        .route("/sessions/:session_id/end", post(handlers::end_session))
        // Session queries
        .route(
            "/sessions/:session_id/config",
            get(handlers::get_session_config),
        )
        .route(
            "/sessions/:session_id/analytics",
            get(handlers::get_session_analytics),
        )
        .route(
            "/sessions/:session_id/leaderboard",
            get(handlers::get_leaderboard),
        )
        // Live clients
        .route("/ws/:client_type/:session_id", get(handlers::ws_upgrade))
        // Request logging, then CORS
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
