use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::{Config, ConnectionSettings};
use crate::hub::Hub;
use crate::session::IdentityTokens;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub tokens: IdentityTokens,
    pub connection_settings: ConnectionSettings,
}

impl AppState {
    pub fn new(hub: Hub, tokens: IdentityTokens, connection_settings: ConnectionSettings) -> Self {
        Self {
            hub,
            tokens,
            connection_settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Hub::new(config.room_grace_period),
            IdentityTokens::from_config(config),
            config.connection,
        )
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
