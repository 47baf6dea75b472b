use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::pump::ConnectionPump;
use super::socket::split_socket;
use crate::hub::Connection;
use crate::shared::{AppError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// WebSocket endpoint. The token comes from the `token` query parameter or,
/// failing that, the Sec-WebSocket-Protocol header.
/// GET /ws/:room
#[instrument(name = "websocket_upgrade", skip(ws, params, headers, state))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let connection = authorize(&room, params, &headers, &state)?;

    info!(
        room = %connection.room(),
        user_id = %connection.identity().user_id(),
        "Identity verified, upgrading connection"
    );

    let hub = state.hub.clone();
    let settings = state.connection_settings;
    Ok(ws.on_upgrade(move |socket| async move {
        let (sink, stream) = split_socket(socket);
        ConnectionPump::new(hub, connection, settings)
            .run(sink, stream)
            .await;
    }))
}

/// Resolves the caller's identity and builds the connection. Nothing is created on failure.
fn authorize(
    room: &str,
    params: ConnectParams,
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Connection, AppError> {
    let token = params
        .token
        .or_else(|| {
            headers
                .get("sec-websocket-protocol")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .ok_or_else(|| {
            warn!("Missing authentication token");
            AppError::Unauthorized("Missing authentication token".to_string())
        })?;

    let identity = state.tokens.verify(&token).inspect_err(|e| {
        warn!(error = %e, "Token rejected");
    })?;

    Connection::new(identity, room).map_err(|e| AppError::BadRequest(e.to_string()))
}
