use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub username: String,
}

/// Response structure for session creation endpoint
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: String,
    pub username: String,
}
