use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session queries
        .route("/session", get(handlers::get_session_status))
        .route("/session/transcript", get(handlers::get_transcript))
        // Recording control
        .route("/session/recording/start", post(handlers::start_recording))
        .route("/session/recording/stop", post(handlers::stop_recording))
        // Summaries
        .route("/session/summary", post(handlers::summarize_room))
        .route(
            "/session/summary/document",
            post(handlers::download_summary_document),
        )
        .route("/session/leave", post(handlers::leave_room))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
