use std::time::Duration;

use roomcast::{Connection, ConnectionPump, ConnectionSettings, Hub, Identity};

use super::mocks::{mock_transport, MockClient};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub hub: Hub,
    pub settings: ConnectionSettings,
}

pub struct TestSetupBuilder {
    settings: ConnectionSettings,
    grace_period: Option<Duration>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            settings: ConnectionSettings::default(),
            grace_period: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = Some(grace_period);
        self
    }

    pub fn build(self) -> TestSetup {
        TestSetup {
            hub: Hub::new(self.grace_period),
            settings: self.settings,
        }
    }
}

impl TestSetup {
    /// Connects a client whose socket accepts every write
    pub async fn connect(&self, user_id: &str, username: &str, room: &str) -> MockClient {
        self.connect_with(user_id, username, room, false).await
    }

    /// Connects a client whose socket never finishes a write
    #[allow(dead_code)]
    pub async fn connect_stalled(&self, user_id: &str, username: &str, room: &str) -> MockClient {
        self.connect_with(user_id, username, room, true).await
    }

    async fn connect_with(
        &self,
        user_id: &str,
        username: &str,
        room: &str,
        stalled: bool,
    ) -> MockClient {
        let client = self.spawn_client(user_id, username, room, stalled);
        self.wait_until_registered(room, username).await;
        client
    }

    /// Starts a connection without waiting for it to join its room
    pub fn spawn_client(
        &self,
        user_id: &str,
        username: &str,
        room: &str,
        stalled: bool,
    ) -> MockClient {
        let identity = Identity::new(user_id, username).unwrap();
        let connection = Connection::new(identity, room).unwrap();
        let (sink, stream, to_server, from_server) = mock_transport(stalled);

        let pump = ConnectionPump::new(self.hub.clone(), connection, self.settings);
        let task = tokio::spawn(pump.run(Box::new(sink), Box::new(stream)));

        MockClient::new(user_id, to_server, from_server, task)
    }

    /// Polls the room until `username` shows up as a member
    pub async fn wait_until_registered(&self, room: &str, username: &str) {
        for _ in 0..100 {
            if let Some(stats) = self.hub.room_stats(room).await {
                if stats.connected_users.iter().any(|u| u == username) {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never registered in {}", username, room);
    }

    /// Polls the room until its member count reaches `expected`
    pub async fn wait_for_count(&self, room: &str, expected: usize) {
        for _ in 0..100 {
            let count = match self.hub.get_room(room).await {
                Some(room) => room.client_count().await,
                None => 0,
            };
            if count == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never reached {} members", room, expected);
    }
}
