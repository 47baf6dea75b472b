use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hub::Identity;

/// Message type stamped on every chat broadcast
pub const CHAT_MESSAGE_TYPE: &str = "message";

#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Decode(String),

    #[error("Message body is empty")]
    EmptyBody,

    #[error("Message body is {length} characters, limit is {max}")]
    TooLong { length: usize, max: usize },
}

impl MessageError {
    /// Validation failures drop a single message; anything else ends the connection
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MessageError::EmptyBody | MessageError::TooLong { .. })
    }
}

/// What a client sends. Only the body is trusted; any other fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub message: String,
}

impl InboundMessage {
    pub fn decode(text: &str) -> Result<Self, MessageError> {
        serde_json::from_str(text).map_err(|e| MessageError::Decode(e.to_string()))
    }

    /// Checks the body against the length limit, counted in characters
    pub fn validate(&self, max_len: usize) -> Result<(), MessageError> {
        if self.message.is_empty() {
            return Err(MessageError::EmptyBody);
        }
        let length = self.message.chars().count();
        if length > max_len {
            return Err(MessageError::TooLong {
                length,
                max: max_len,
            });
        }
        Ok(())
    }
}

/// Broadcast payload as it goes out on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub room: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub timestamp: i64,
}

impl ChatMessage {
    /// Builds a broadcast from a client body, overwriting every server-owned field
    pub fn stamp(identity: &Identity, room: &str, body: String) -> Self {
        Self {
            message_type: CHAT_MESSAGE_TYPE.to_string(),
            room: room.to_string(),
            user_id: identity.user_id().to_string(),
            username: identity.username().to_string(),
            message: body,
            timestamp: Utc::now().timestamp(),
        }
    }
}
