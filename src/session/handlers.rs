use axum::{extract::State, Json};
use tracing::{info, instrument};
use uuid::Uuid;

use super::types::{SessionRequest, SessionResponse};
use crate::hub::Identity;
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new session
///
/// POST /session
/// Issues a signed token binding a fresh user id to the requested display name
#[instrument(name = "create_session", skip(state, request))]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let identity = Identity::new(Uuid::new_v4().to_string(), request.username.trim())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let token = state.tokens.issue(&identity)?;

    info!(user_id = %identity.user_id(), username = %identity.username(), "Session created");

    Ok(Json(SessionResponse {
        token,
        user_id: identity.user_id().to_string(),
        username: identity.username().to_string(),
    }))
}
