use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, instrument};

use super::models::{GlobalStats, RoomStats};
use crate::shared::{AppError, AppState};

/// GET /stats
#[instrument(name = "global_stats", skip(state))]
pub async fn global_stats(State(state): State<AppState>) -> Json<GlobalStats> {
    let stats = state.hub.global_stats().await;
    debug!(
        total_rooms = stats.total_rooms,
        total_clients = stats.total_clients,
        "Global stats collected"
    );
    Json(stats)
}

/// GET /stats/rooms/:room
#[instrument(name = "room_stats", skip(state))]
pub async fn room_stats(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<RoomStats>, AppError> {
    state
        .hub
        .room_stats(&room)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Room not found: {}", room)))
}
