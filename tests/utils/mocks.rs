use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use roomcast::websockets::{Disconnect, SocketError};
use roomcast::{ChatMessage, Frame, FrameSink, FrameStream};

// ============================================================================
// Mock Transport
// ============================================================================

/// Write half that forwards frames to the test. A stalled sink never completes a write.
pub struct MockSink {
    frames: mpsc::UnboundedSender<Frame>,
    stalled: bool,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), SocketError> {
        if self.stalled {
            futures::future::pending::<()>().await;
        }
        self.frames
            .send(frame)
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        let _ = self.frames.send(Frame::Close);
        Ok(())
    }
}

/// Read half fed by the test. Dropping the feeding sender looks like a closed socket.
pub struct MockStream {
    incoming: mpsc::UnboundedReceiver<Result<Frame, SocketError>>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, SocketError>> {
        self.incoming.recv().await
    }
}

pub fn mock_transport(
    stalled: bool,
) -> (
    MockSink,
    MockStream,
    mpsc::UnboundedSender<Result<Frame, SocketError>>,
    mpsc::UnboundedReceiver<Frame>,
) {
    let (to_client, from_server) = mpsc::unbounded_channel();
    let (to_server, incoming) = mpsc::unbounded_channel();
    (
        MockSink {
            frames: to_client,
            stalled,
        },
        MockStream { incoming },
        to_server,
        from_server,
    )
}

// ============================================================================
// Mock Client
// ============================================================================

/// The test's side of one connection
pub struct MockClient {
    pub user_id: String,
    to_server: Option<mpsc::UnboundedSender<Result<Frame, SocketError>>>,
    from_server: mpsc::UnboundedReceiver<Frame>,
    task: Option<JoinHandle<Disconnect>>,
}

impl MockClient {
    pub fn new(
        user_id: &str,
        to_server: mpsc::UnboundedSender<Result<Frame, SocketError>>,
        from_server: mpsc::UnboundedReceiver<Frame>,
        task: JoinHandle<Disconnect>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            to_server: Some(to_server),
            from_server,
            task: Some(task),
        }
    }

    pub fn send_text(&self, text: &str) {
        self.send_frame(Frame::Text(text.to_string()));
    }

    pub fn send_message(&self, body: &str) {
        self.send_text(&serde_json::json!({ "message": body }).to_string());
    }

    pub fn send_pong(&self) {
        self.send_frame(Frame::Pong(Vec::new()));
    }

    pub fn send_frame(&self, frame: Frame) {
        if let Some(sender) = &self.to_server {
            let _ = sender.send(Ok(frame));
        }
    }

    /// Drops the read side without a close frame
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    pub async fn next_frame(&mut self) -> Option<Frame> {
        tokio::time::timeout(Duration::from_secs(1), self.from_server.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next chat broadcast, skipping keepalive pings
    pub async fn next_chat(&mut self) -> Option<ChatMessage> {
        loop {
            match self.next_frame().await? {
                Frame::Text(text) => return serde_json::from_str(&text).ok(),
                Frame::Ping(_) => continue,
                _ => return None,
            }
        }
    }

    /// Everything the server has written so far, without waiting
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.from_server.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Waits for the connection task to end and returns why it ended
    pub async fn finished(&mut self) -> Disconnect {
        let task = self.task.take().expect("connection already awaited");
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("connection should have ended")
            .expect("connection task panicked")
    }
}
