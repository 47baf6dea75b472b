use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;

/// Transport-neutral view of a web-socket frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

#[derive(Debug, Error, PartialEq)]
pub enum SocketError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Write half of a client transport
#[async_trait]
pub trait FrameSink: Send {
    /// Send a frame to the client
    async fn send_frame(&mut self, frame: Frame) -> Result<(), SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Read half of a client transport
#[async_trait]
pub trait FrameStream: Send {
    /// Receive the next frame (None once the connection is closed)
    async fn next_frame(&mut self) -> Option<Result<Frame, SocketError>>;
}

#[async_trait]
impl FrameSink for SplitSink<WebSocket, Message> {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), SocketError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close => Message::Close(None),
        };
        self.send(message)
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        SinkExt::close(self)
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl FrameStream for SplitStream<WebSocket> {
    async fn next_frame(&mut self) -> Option<Result<Frame, SocketError>> {
        let frame = match self.next().await? {
            Ok(Message::Text(text)) => Ok(Frame::Text(text)),
            Ok(Message::Binary(data)) => Ok(Frame::Binary(data)),
            Ok(Message::Ping(data)) => Ok(Frame::Ping(data)),
            Ok(Message::Pong(data)) => Ok(Frame::Pong(data)),
            Ok(Message::Close(_)) => Ok(Frame::Close),
            Err(e) => Err(SocketError::ReceiveFailed(e.to_string())),
        };
        Some(frame)
    }
}

/// Splits an upgraded axum socket into independently owned halves
pub fn split_socket(socket: WebSocket) -> (Box<dyn FrameSink>, Box<dyn FrameStream>) {
    let (sink, stream) = socket.split();
    (Box::new(sink), Box::new(stream))
}
