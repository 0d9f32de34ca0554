//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // The service trusts its caller; the UI may be served from anywhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Tracing layer with request timing
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(handlers::health))
        // Room lifecycle
        .route("/rooms", post(handlers::create_room))
        .route("/rooms/join", post(handlers::join_room))
        .route("/rooms/{room_id}", get(handlers::get_room))
        // Transcript
        .route(
            "/rooms/{room_id}/messages",
            post(handlers::append_message).get(handlers::list_messages),
        )
        // Turns
        .route("/rooms/{room_id}/turns", post(handlers::send_turn))
        // Realtime inserts
        .route("/rooms/{room_id}/events", get(handlers::room_events))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
