use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum ConnectionError {
    #[error("user id must not be empty")]
    MissingUserId,

    #[error("display name must not be empty")]
    MissingUsername,

    #[error("room name must not be empty")]
    MissingRoom,
}

/// An already-verified client identity. Both fields are opaque to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    user_id: String,
    username: String,
}

impl Identity {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<Self, ConnectionError> {
        let user_id = user_id.into();
        let username = username.into();
        if user_id.is_empty() {
            return Err(ConnectionError::MissingUserId);
        }
        if username.is_empty() {
            return Err(ConnectionError::MissingUsername);
        }
        Ok(Self { user_id, username })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// A single client session bound to one room.
///
/// The id is unique per upgrade, so a reconnecting user gets a new id
/// even though the identity is the same.
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    identity: Identity,
    room: String,
}

impl Connection {
    pub fn new(identity: Identity, room: impl Into<String>) -> Result<Self, ConnectionError> {
        let room = room.into();
        if room.trim().is_empty() {
            return Err(ConnectionError::MissingRoom);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            identity,
            room,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn room(&self) -> &str {
        &self.room
    }
}

/// What a room keeps for each member: who it is and where to push outbound frames
#[derive(Debug, Clone)]
pub(crate) struct RoomMember {
    pub connection_id: Uuid,
    pub identity: Identity,
    pub outbound: mpsc::Sender<String>,
}

impl RoomMember {
    pub fn new(connection: &Connection, outbound: mpsc::Sender<String>) -> Self {
        Self {
            connection_id: connection.id(),
            identity: connection.identity().clone(),
            outbound,
        }
    }
}
