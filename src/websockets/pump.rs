use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use super::messages::{ChatMessage, InboundMessage, MessageError};
use super::socket::{Frame, FrameSink, FrameStream, SocketError};
use crate::config::ConnectionSettings;
use crate::hub::{Connection, Hub, Room};

/// Why a connection ended. Every variant takes the same cleanup path.
#[derive(Debug, Error)]
pub enum Disconnect {
    #[error("client closed the connection")]
    ClientClosed,

    #[error("transport error: {0}")]
    Transport(#[from] SocketError),

    #[error("undecodable frame: {0}")]
    Protocol(MessageError),

    #[error("no pong within the liveness timeout")]
    LivenessTimeout,

    #[error("writer stopped")]
    WriterStopped,

    #[error("room is no longer running")]
    RoomClosed,
}

/// Drives one client connection: joins its room, then runs the reader here and the
/// keepalive writer on its own task until either side hits a terminal condition.
pub struct ConnectionPump {
    hub: Hub,
    connection: Connection,
    settings: ConnectionSettings,
}

impl ConnectionPump {
    pub fn new(hub: Hub, connection: Connection, settings: ConnectionSettings) -> Self {
        Self {
            hub,
            connection,
            settings,
        }
    }

    /// Runs until the connection ends. Unregisters exactly once; the sink is closed
    /// exactly once, by the writer (or here, if the hub refuses the join).
    #[instrument(
        name = "connection",
        skip_all,
        fields(
            room = %self.connection.room(),
            user_id = %self.connection.identity().user_id(),
            connection = %self.connection.id()
        )
    )]
    pub async fn run(
        self,
        mut sink: Box<dyn FrameSink>,
        stream: Box<dyn FrameStream>,
    ) -> Disconnect {
        let _live = self.hub.track_connection();

        let (outbound_sender, outbound_receiver) = mpsc::channel(self.settings.outbound_buffer);
        let room = match self.hub.join(&self.connection, outbound_sender).await {
            Ok(room) => room,
            Err(e) => {
                warn!(error = %e, "Could not join room");
                if timeout(self.settings.write_timeout, sink.close()).await.is_err() {
                    debug!("Close timed out");
                }
                return Disconnect::RoomClosed;
            }
        };

        let (stop_sender, stop_receiver) = oneshot::channel();
        let mut writer = tokio::spawn(write_pump(
            sink,
            outbound_receiver,
            stop_receiver,
            self.settings,
        ));

        let reader = Reader {
            connection: &self.connection,
            room: &room,
            settings: &self.settings,
        };
        let (reason, writer_finished) = reader.read_pump(stream, &mut writer).await;

        room.unregister(self.connection.identity().user_id(), self.connection.id());

        if !writer_finished {
            let _ = stop_sender.send(());
            let _ = writer.await;
        }

        match &reason {
            Disconnect::ClientClosed => info!("Connection closed cleanly"),
            other => warn!(reason = %other, "Connection terminated"),
        }
        reason
    }
}

struct Reader<'a> {
    connection: &'a Connection,
    room: &'a Room,
    settings: &'a ConnectionSettings,
}

impl Reader<'_> {
    /// Reads frames until a terminal condition. Also returns whether the writer task
    /// has already completed, so the caller knows not to wait on it again.
    async fn read_pump(
        &self,
        mut stream: Box<dyn FrameStream>,
        writer: &mut JoinHandle<()>,
    ) -> (Disconnect, bool) {
        let mut deadline = Instant::now() + self.settings.liveness_timeout;

        loop {
            let next = tokio::select! {
                _ = &mut *writer => return (Disconnect::WriterStopped, true),
                next = timeout_at(deadline, stream.next_frame()) => next,
            };

            let frame = match next {
                Err(_) => return (Disconnect::LivenessTimeout, false),
                Ok(None) => return (Disconnect::ClientClosed, false),
                Ok(Some(Err(e))) => return (Disconnect::Transport(e), false),
                Ok(Some(Ok(frame))) => frame,
            };

            let text = match frame {
                Frame::Text(text) => text,
                Frame::Binary(data) => match String::from_utf8(data) {
                    Ok(text) => text,
                    Err(e) => {
                        return (
                            Disconnect::Protocol(MessageError::Decode(e.to_string())),
                            false,
                        )
                    }
                },
                Frame::Pong(_) => {
                    deadline = Instant::now() + self.settings.liveness_timeout;
                    debug!("Pong received, read deadline extended");
                    continue;
                }
                // Answered by the transport layer
                Frame::Ping(_) => continue,
                Frame::Close => return (Disconnect::ClientClosed, false),
            };

            if let Err(reason) = self.forward(&text) {
                return (reason, false);
            }
        }
    }

    /// Decodes, validates and stamps one inbound message, then hands it to the room
    fn forward(&self, text: &str) -> Result<(), Disconnect> {
        let checked = InboundMessage::decode(text).and_then(|inbound| {
            inbound.validate(self.settings.max_message_len)?;
            Ok(inbound)
        });

        let inbound = match checked {
            Ok(inbound) => inbound,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Dropping invalid message");
                return Ok(());
            }
            Err(e) => return Err(Disconnect::Protocol(e)),
        };

        let message = ChatMessage::stamp(
            self.connection.identity(),
            self.connection.room(),
            inbound.message,
        );
        self.room
            .broadcast(message)
            .map_err(|_| Disconnect::RoomClosed)
    }
}

/// Owns the sink. Writes queued broadcasts and periodic pings, each under the write
/// deadline, until told to stop, the room drops us, or a write fails.
async fn write_pump(
    mut sink: Box<dyn FrameSink>,
    mut outbound: mpsc::Receiver<String>,
    mut stop: oneshot::Receiver<()>,
    settings: ConnectionSettings,
) {
    let mut ping = interval_at(Instant::now() + settings.ping_period, settings.ping_period);

    loop {
        let frame = tokio::select! {
            _ = &mut stop => break,
            queued = outbound.recv() => match queued {
                Some(text) => Frame::Text(text),
                None => {
                    debug!("Removed from room, closing");
                    break;
                }
            },
            _ = ping.tick() => Frame::Ping(Vec::new()),
        };

        match timeout(settings.write_timeout, sink.send_frame(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "Write failed");
                break;
            }
            Err(_) => {
                warn!(
                    write_timeout_secs = settings.write_timeout.as_secs(),
                    "Write timed out"
                );
                break;
            }
        }
    }

    if timeout(settings.write_timeout, sink.close()).await.is_err() {
        debug!("Close timed out");
    }
}
