use serde::{Deserialize, Serialize};

/// Hub-wide totals. Summed room by room, so only approximate under churn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_rooms: usize,
    pub total_clients: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStats {
    pub room_id: String,
    pub connected_clients: usize,
    /// Display names, sorted
    pub connected_users: Vec<String>,
}
