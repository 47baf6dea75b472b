use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connection::RoomMember;
use crate::stats::RoomStats;
use crate::websockets::ChatMessage;

/// room name -> running room
pub(crate) type RoomRegistry = RwLock<HashMap<String, Room>>;

#[derive(Debug, Error, PartialEq)]
pub enum RoomError {
    #[error("Room {0} is no longer running")]
    Closed(String),

    #[error("Hub is shutting down")]
    HubClosed,
}

/// Everything the event loop reacts to, in a single queue so arrival order is processing order
enum RoomCommand {
    Register(RoomMember),
    Unregister { user_id: String, connection_id: Uuid },
    Broadcast(ChatMessage),
    Snapshot(oneshot::Sender<RoomStats>),
    Shutdown,
}

/// Handle to a room's event loop. Cheap to clone; every clone talks to the same loop.
#[derive(Clone)]
pub struct Room {
    id: Uuid,
    name: Arc<str>,
    commands: mpsc::UnboundedSender<RoomCommand>,
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl Room {
    /// Starts the event loop for a new room and returns a handle to it
    pub(crate) fn spawn(
        name: &str,
        registry: Weak<RoomRegistry>,
        grace_period: Option<Duration>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let room = Self {
            id: Uuid::new_v4(),
            name: Arc::from(name),
            commands,
        };

        let event_loop = RoomLoop {
            id: room.id,
            name: room.name.clone(),
            members: HashMap::new(),
            commands: receiver,
            registry,
            grace_period,
            empty_since: Instant::now(),
        };
        tokio::spawn(event_loop.run());

        info!(room = %name, room_instance = %room.id, "Room created");
        room
    }

    /// Unique per room instance; a room recreated after teardown gets a new id
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn register(&self, member: RoomMember) -> Result<(), RoomError> {
        self.send(RoomCommand::Register(member))
    }

    /// Removes a member if it is still the connection that registered. Safe to call more than once.
    pub fn unregister(&self, user_id: &str, connection_id: Uuid) {
        let command = RoomCommand::Unregister {
            user_id: user_id.to_string(),
            connection_id,
        };
        if self.send(command).is_err() {
            debug!(room = %self.name, user_id = %user_id, "Unregister after room stopped, nothing to do");
        }
    }

    pub fn broadcast(&self, message: ChatMessage) -> Result<(), RoomError> {
        self.send(RoomCommand::Broadcast(message))
    }

    /// Snapshot of membership, answered by the event loop itself
    pub async fn stats(&self) -> Result<RoomStats, RoomError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Snapshot(reply))?;
        response
            .await
            .map_err(|_| RoomError::Closed(self.name.to_string()))
    }

    /// Current member count; a stopped room reports zero
    pub async fn client_count(&self) -> usize {
        self.stats()
            .await
            .map(|stats| stats.connected_clients)
            .unwrap_or(0)
    }

    /// Display names of current members, sorted
    pub async fn connected_users(&self) -> Vec<String> {
        self.stats()
            .await
            .map(|stats| stats.connected_users)
            .unwrap_or_default()
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.send(RoomCommand::Shutdown);
    }

    fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.commands
            .send(command)
            .map_err(|_| RoomError::Closed(self.name.to_string()))
    }
}

enum Wake {
    Command(Option<RoomCommand>),
    GraceExpired,
}

/// State owned by a room's task. Nothing else ever touches `members`.
struct RoomLoop {
    id: Uuid,
    name: Arc<str>,
    /// user id -> member
    members: HashMap<String, RoomMember>,
    commands: mpsc::UnboundedReceiver<RoomCommand>,
    registry: Weak<RoomRegistry>,
    grace_period: Option<Duration>,
    empty_since: Instant,
}

impl RoomLoop {
    async fn run(mut self) {
        debug!(room = %self.name, "Room event loop started");

        loop {
            let retire_at = match self.grace_period {
                Some(grace) if self.members.is_empty() => Some(self.empty_since + grace),
                _ => None,
            };

            let command = match retire_at {
                Some(deadline) => {
                    let wake = tokio::select! {
                        command = self.commands.recv() => Wake::Command(command),
                        _ = tokio::time::sleep_until(deadline) => Wake::GraceExpired,
                    };
                    match wake {
                        Wake::Command(command) => command,
                        Wake::GraceExpired => {
                            if self.try_retire().await {
                                break;
                            }
                            continue;
                        }
                    }
                }
                None => self.commands.recv().await,
            };

            match command {
                Some(command) => {
                    if !self.handle(command) {
                        break;
                    }
                }
                None => break,
            }
        }

        debug!(room = %self.name, "Room event loop stopped");
    }

    /// Applies one command. Returns false when the loop should stop.
    fn handle(&mut self, command: RoomCommand) -> bool {
        let was_occupied = !self.members.is_empty();

        match command {
            RoomCommand::Register(member) => self.register(member),
            RoomCommand::Unregister {
                user_id,
                connection_id,
            } => self.unregister(&user_id, connection_id),
            RoomCommand::Broadcast(message) => self.fan_out(message),
            RoomCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::Shutdown => {
                info!(
                    room = %self.name,
                    members = self.members.len(),
                    "Room shutting down, dropping all members"
                );
                self.members.clear();
                return false;
            }
        }

        if was_occupied && self.members.is_empty() {
            debug!(room = %self.name, "Room is now empty");
            self.empty_since = Instant::now();
        }
        true
    }

    fn register(&mut self, member: RoomMember) {
        let user_id = member.identity.user_id().to_string();
        let connection_id = member.connection_id;

        // Dropping the superseded member closes its outbound queue, which ends its pump
        if let Some(previous) = self.members.insert(user_id.clone(), member) {
            info!(
                room = %self.name,
                user_id = %user_id,
                previous_connection = %previous.connection_id,
                connection = %connection_id,
                "Member re-registered, previous connection superseded"
            );
        } else {
            info!(
                room = %self.name,
                user_id = %user_id,
                connection = %connection_id,
                members = self.members.len(),
                "Member registered"
            );
        }
    }

    fn unregister(&mut self, user_id: &str, connection_id: Uuid) {
        match self.members.get(user_id) {
            Some(member) if member.connection_id == connection_id => {
                self.members.remove(user_id);
                info!(
                    room = %self.name,
                    user_id = %user_id,
                    connection = %connection_id,
                    members = self.members.len(),
                    "Member unregistered"
                );
            }
            Some(_) => {
                debug!(
                    room = %self.name,
                    user_id = %user_id,
                    connection = %connection_id,
                    "Ignoring unregister from superseded connection"
                );
            }
            None => {
                debug!(room = %self.name, user_id = %user_id, "Member already gone");
            }
        }
    }

    /// Delivers to every member, sender included. Never waits on a member's queue.
    fn fan_out(&mut self, message: ChatMessage) {
        let payload = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                warn!(room = %self.name, error = %e, "Failed to serialize broadcast");
                return;
            }
        };

        let mut dead = Vec::new();
        for (user_id, member) in &self.members {
            match member.outbound.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        room = %self.name,
                        user_id = %user_id,
                        "Outbound queue full, dropping slow member"
                    );
                    dead.push(user_id.clone());
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        room = %self.name,
                        user_id = %user_id,
                        "Outbound queue closed, dropping member"
                    );
                    dead.push(user_id.clone());
                }
            }
        }

        debug!(
            room = %self.name,
            attempted = self.members.len(),
            failed = dead.len(),
            "Broadcast delivered"
        );

        for user_id in dead {
            self.members.remove(&user_id);
        }
    }

    fn snapshot(&self) -> RoomStats {
        let mut connected_users: Vec<String> = self
            .members
            .values()
            .map(|member| member.identity.username().to_string())
            .collect();
        connected_users.sort();

        RoomStats {
            room_id: self.name.to_string(),
            connected_clients: self.members.len(),
            connected_users,
        }
    }

    /// Called when the grace period runs out. Holds the registry lock while deciding, so
    /// a concurrent join either lands in our queue before we look or finds the room gone.
    async fn try_retire(&mut self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return true;
        };
        let mut rooms = registry.write().await;

        while let Ok(command) = self.commands.try_recv() {
            if !self.handle(command) {
                break;
            }
        }

        if !self.members.is_empty() {
            debug!(room = %self.name, "Member joined during grace period, staying up");
            return false;
        }

        if rooms
            .get(self.name.as_ref())
            .is_some_and(|room| room.id == self.id)
        {
            rooms.remove(self.name.as_ref());
        }
        self.commands.close();

        info!(room = %self.name, room_instance = %self.id, "Empty room retired");
        true
    }
}
