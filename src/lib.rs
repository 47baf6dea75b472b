// Library crate for the room broadcast server
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod hub;
pub mod session;
pub mod shared;
pub mod stats;
pub mod websockets;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

// Re-export commonly used types for easier access in tests
pub use config::{Config, ConnectionSettings};
pub use hub::{Connection, Hub, Identity, Room};
pub use shared::{AppError, AppState};
pub use stats::{GlobalStats, RoomStats};
pub use websockets::{ChatMessage, ConnectionPump, Frame, FrameSink, FrameStream};

/// Builds the HTTP router around the given state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/session", post(session::create_session))
        .route("/ws/:room", get(websockets::websocket_handler))
        .route("/stats", get(stats::global_stats))
        .route("/stats/rooms/:room", get(stats::room_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
