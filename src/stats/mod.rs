pub use handlers::{global_stats, room_stats};
pub use models::{GlobalStats, RoomStats};

mod handlers;
pub mod models;
