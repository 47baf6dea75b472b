use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, instrument};

use super::connection::{Connection, RoomMember};
use super::room::{Room, RoomError, RoomRegistry};
use crate::stats::{GlobalStats, RoomStats};

/// Process-wide registry of rooms, keyed by room name
#[derive(Clone)]
pub struct Hub {
    rooms: Arc<RoomRegistry>,
    grace_period: Option<Duration>,
    /// Number of connection pumps still running
    live: Arc<watch::Sender<usize>>,
    closed: Arc<AtomicBool>,
}

/// Held by a connection pump for as long as it runs. Shutdown waits for every guard
/// to be dropped.
pub(crate) struct ConnectionGuard {
    live: Arc<watch::Sender<usize>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.live.send_modify(|count| *count -= 1);
    }
}

impl Hub {
    /// Creates an empty hub. Rooms left empty for `grace_period` are torn down;
    /// `None` keeps them for the life of the process.
    pub fn new(grace_period: Option<Duration>) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            grace_period,
            live: Arc::new(watch::channel(0).0),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn track_connection(&self) -> ConnectionGuard {
        self.live.send_modify(|count| *count += 1);
        ConnectionGuard {
            live: self.live.clone(),
        }
    }

    /// Returns the room for `name`, creating and starting it if needed
    pub async fn get_or_create_room(&self, name: &str) -> Room {
        if let Some(room) = self.rooms.read().await.get(name) {
            return room.clone();
        }

        let mut rooms = self.rooms.write().await;
        self.room_entry(&mut rooms, name)
    }

    pub async fn get_room(&self, name: &str) -> Option<Room> {
        self.rooms.read().await.get(name).cloned()
    }

    /// Registers a connection into its room, creating the room if needed.
    ///
    /// Runs under the registry write lock so it can't interleave with an empty
    /// room deciding to retire. Refused once the hub has started shutting down.
    #[instrument(skip(self, connection, outbound), fields(room = %connection.room(), user_id = %connection.identity().user_id()))]
    pub async fn join(
        &self,
        connection: &Connection,
        outbound: mpsc::Sender<String>,
    ) -> Result<Room, RoomError> {
        let member = RoomMember::new(connection, outbound);
        let mut rooms = self.rooms.write().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(RoomError::HubClosed);
        }

        let room = self.room_entry(&mut rooms, connection.room());
        if room.register(member.clone()).is_ok() {
            return Ok(room);
        }

        // Only reachable if a room task died without deregistering itself
        error!("Room event loop gone, replacing room");
        rooms.remove(connection.room());
        let room = self.room_entry(&mut rooms, connection.room());
        room.register(member)?;
        Ok(room)
    }

    /// Totals across all rooms. Each room is asked in turn, never all locked at once.
    pub async fn global_stats(&self) -> GlobalStats {
        let rooms: Vec<Room> = self.rooms.read().await.values().cloned().collect();

        let mut total_clients = 0;
        for room in &rooms {
            total_clients += room.client_count().await;
        }

        GlobalStats {
            total_rooms: rooms.len(),
            total_clients,
        }
    }

    pub async fn room_stats(&self, name: &str) -> Option<RoomStats> {
        let room = self.get_room(name).await?;
        room.stats().await.ok()
    }

    /// Stops every room, which drops their members and closes all transports, then
    /// waits until every connection pump has finished sending its close frame.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let rooms: Vec<Room> = {
            let mut rooms = self.rooms.write().await;
            self.closed.store(true, Ordering::Release);
            rooms.drain().map(|(_, room)| room).collect()
        };
        info!(
            room_count = rooms.len(),
            connections = *self.live.borrow(),
            "Shutting down hub"
        );

        for room in rooms {
            room.shutdown();
        }

        let mut live = self.live.subscribe();
        if live.wait_for(|count| *count == 0).await.is_ok() {
            info!("All connections drained");
        }
    }

    fn room_entry(&self, rooms: &mut HashMap<String, Room>, name: &str) -> Room {
        rooms
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(room = %name, "No room found - creating one");
                Room::spawn(name, Arc::downgrade(&self.rooms), self.grace_period)
            })
            .clone()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(60)))
    }
}
